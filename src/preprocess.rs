//! Preprocessing pipeline from raw FITS frames to serialized tensors
//!
//! Pure transform, deterministic except for the two augmentation stages.
//! Every stage failure is reported to the caller as-is; the retry decision
//! belongs to the worker loop, not to this module.

use crate::error::{Result, WorkerError};
use fitrs::{Fits, FitsData};
use ndarray::{Array2, Array3, Axis};
use rand::Rng;
use rand_distr::StandardNormal;
use std::path::Path;
use tracing::debug;

/// Standard deviation of the additive Gaussian noise stage.
pub const NOISE_SIGMA: f32 = 0.01;

/// Probability of each independent flip augmentation.
pub const FLIP_PROBABILITY: f64 = 0.58;

/// Percentiles bounding the intensity normalization.
pub const PERCENTILE_LOW: f64 = 2.0;
pub const PERCENTILE_HIGH: f64 = 98.5;

/// Runs the full pipeline: load the FITS frame at `input`, transform it,
/// and serialize the resulting tensor to `output` as `.npy`.
pub fn process_file(input: &Path, output: &Path) -> Result<()> {
    let image = load_fits_image(input)?;
    debug!(
        "Loaded {}x{} frame from {}",
        image.nrows(),
        image.ncols(),
        input.display()
    );
    let tensor = transform(image, &mut rand::thread_rng())?;
    ndarray_npy::write_npy(output, &tensor)?;
    Ok(())
}

/// Normalizes and augments an image, producing a `1xHxW` tensor in standard
/// memory layout.
pub fn transform<R: Rng>(image: Array2<f32>, rng: &mut R) -> Result<Array3<f32>> {
    let mut data = normalize(image)?;
    add_noise(&mut data, rng);
    apply_random_flips(&mut data, rng);

    // Flips reverse strides; materialize a standard-layout copy before
    // shaping the tensor.
    let data = data.as_standard_layout().to_owned();
    Ok(data.insert_axis(Axis(0)))
}

/// Rescales the image so the 2nd and 98.5th percentile intensities map to
/// 0 and 1.
///
/// A flat image (`pmin == pmax`) is rejected explicitly rather than letting
/// the division produce non-finite values.
pub fn normalize(mut image: Array2<f32>) -> Result<Array2<f32>> {
    let (pmin, pmax) = percentile_range(&image)?;
    if !(pmax > pmin) {
        return Err(WorkerError::DegenerateRange(pmin));
    }
    let span = pmax - pmin;
    image.mapv_inplace(|x| (x - pmin) / span);
    Ok(image)
}

fn percentile_range(image: &Array2<f32>) -> Result<(f32, f32)> {
    let mut values: Vec<f32> = image.iter().copied().collect();
    if values.is_empty() {
        return Err(WorkerError::UnsupportedShape(vec![0, 0]));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(WorkerError::ImageRead(
            "image contains non-finite values".to_string(),
        ));
    }
    values.sort_by(f32::total_cmp);
    Ok((
        percentile(&values, PERCENTILE_LOW),
        percentile(&values, PERCENTILE_HIGH),
    ))
}

/// Linear-interpolated empirical percentile over pre-sorted values.
fn percentile(sorted: &[f32], q: f64) -> f32 {
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = (rank - lo as f64) as f32;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Adds elementwise Gaussian noise, mean 0, sigma [`NOISE_SIGMA`].
fn add_noise<R: Rng>(image: &mut Array2<f32>, rng: &mut R) {
    image.mapv_inplace(|x| {
        let z: f32 = rng.sample(StandardNormal);
        x + NOISE_SIGMA * z
    });
}

/// Two independent Bernoulli trials: horizontal flip, then vertical flip.
/// Both, either, or neither may apply.
fn apply_random_flips<R: Rng>(image: &mut Array2<f32>, rng: &mut R) {
    if rng.gen_bool(FLIP_PROBABILITY) {
        image.invert_axis(Axis(1));
    }
    if rng.gen_bool(FLIP_PROBABILITY) {
        image.invert_axis(Axis(0));
    }
}

/// Reads the primary HDU of a FITS file as a 2-D f32 image.
///
/// Only 2-D frames are supported; f32, f64, and integer pixel data are
/// accepted and converted.
pub fn load_fits_image(path: &Path) -> Result<Array2<f32>> {
    let fits = Fits::open(path).map_err(|e| WorkerError::ImageRead(e.to_string()))?;
    let hdu = fits
        .get(0)
        .ok_or_else(|| WorkerError::ImageRead("missing primary HDU".to_string()))?;

    match hdu.read_data() {
        FitsData::FloatingPoint32(arr) => image_from_parts(&arr.shape, arr.data),
        FitsData::FloatingPoint64(arr) => {
            let data = arr.data.into_iter().map(|v| v as f32).collect();
            image_from_parts(&arr.shape, data)
        }
        FitsData::IntegersI32(arr) => {
            let data = arr
                .data
                .into_iter()
                .map(|v| {
                    v.map(|x| x as f32).ok_or_else(|| {
                        WorkerError::ImageRead("blank pixel in integer image".to_string())
                    })
                })
                .collect::<Result<Vec<f32>>>()?;
            image_from_parts(&arr.shape, data)
        }
        FitsData::IntegersU32(arr) => {
            let data = arr
                .data
                .into_iter()
                .map(|v| {
                    v.map(|x| x as f32).ok_or_else(|| {
                        WorkerError::ImageRead("blank pixel in integer image".to_string())
                    })
                })
                .collect::<Result<Vec<f32>>>()?;
            image_from_parts(&arr.shape, data)
        }
        FitsData::Characters(_) => Err(WorkerError::ImageRead(
            "character data is not an image".to_string(),
        )),
    }
}

/// FITS stores the fastest-varying axis first, so `shape` is `[W, H]` and
/// the data is laid out in rows of length W.
fn image_from_parts(shape: &[usize], data: Vec<f32>) -> Result<Array2<f32>> {
    if shape.len() != 2 {
        return Err(WorkerError::UnsupportedShape(shape.to_vec()));
    }
    let (width, height) = (shape[0], shape[1]);
    Array2::from_shape_vec((height, width), data)
        .map_err(|_| WorkerError::UnsupportedShape(shape.to_vec()))
}
