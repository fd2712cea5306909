//! Astro Preproc CLI
//!
//! Runs the preprocessing worker that consumes image-transform jobs from the
//! work queue. Supports continuous mode and single-job mode (--once).

use anyhow::Result;
use astro_preproc::config::Config;
use astro_preproc::queue::RedisQueue;
use astro_preproc::store::ObjectStoreGateway;
use astro_preproc::worker::{setup_signal_handler, JobProcessor, WorkerRunner};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "astro-preproc")]
#[command(about = "Preprocess astronomical FITS frames into training tensors")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as worker, consuming jobs from the work queue
    Worker {
        /// Process a single job and exit (for testing)
        #[arg(long)]
        once: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Worker { once } => {
            // Load .env file if present
            dotenvy::dotenv().ok();

            info!("Initializing worker...");
            let config = Config::from_env();

            // An unreachable broker is fatal; exit rather than entering the
            // loop without a live connection.
            let queue = RedisQueue::connect(&config).await?;
            info!("Broker connection established");

            let store = ObjectStoreGateway::from_config(&config);
            let processor = JobProcessor::new(store, &config);
            let mut runner = WorkerRunner::new(queue, processor, &config);

            if once {
                info!("Running in single-job mode...");
                let outcome = runner.run_once().await?;
                println!("Job resolved: {:?}", outcome);
            } else {
                // Setup graceful shutdown
                let shutdown = runner.shutdown_handle();
                setup_signal_handler(shutdown);

                runner.run().await?;
            }
        }
    }

    Ok(())
}
