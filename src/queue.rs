//! Redis-backed work queue and dead letter queue client

use crate::config::Config;
use crate::error::Result;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{debug, info};

/// The broker operations the worker loop needs.
///
/// The pop is destructive: once a payload is returned it exists nowhere but
/// in this process until the job resolves to success, requeue, or the dead
/// letter queue.
#[async_trait]
pub trait JobQueue: Send {
    /// Blocks indefinitely until a payload is available on the work queue.
    async fn pop_job(&mut self) -> Result<String>;

    /// Pushes a payload onto the front of the work queue.
    async fn push_work(&mut self, payload: &str) -> Result<()>;

    /// Pushes a payload onto the dead letter queue.
    async fn push_dead_letter(&mut self, payload: &str) -> Result<()>;
}

/// Queue client over a multiplexed async Redis connection.
pub struct RedisQueue {
    conn: MultiplexedConnection,
    work_queue: String,
    dead_letter_queue: String,
}

impl RedisQueue {
    /// Connects to the broker and verifies the connection with a PING.
    ///
    /// An unreachable broker is fatal: the caller exits rather than entering
    /// the worker loop without a live connection.
    pub async fn connect(config: &Config) -> Result<Self> {
        info!("Connecting to redis at {}...", config.redis_url);
        let client = redis::Client::open(config.redis_url.as_str())?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        Ok(Self {
            conn,
            work_queue: config.work_queue.clone(),
            dead_letter_queue: config.dead_letter_queue.clone(),
        })
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn pop_job(&mut self) -> Result<String> {
        // BRPOP with a zero timeout blocks until a message arrives.
        let (_list, payload): (String, String) = redis::cmd("BRPOP")
            .arg(&self.work_queue)
            .arg(0)
            .query_async(&mut self.conn)
            .await?;
        debug!(
            "Popped {} byte payload from '{}'",
            payload.len(),
            self.work_queue
        );
        Ok(payload)
    }

    async fn push_work(&mut self, payload: &str) -> Result<()> {
        // LPUSH puts retried jobs at the front of the list, so they are
        // served before longer-waiting new arrivals.
        let _: () = self.conn.lpush(&self.work_queue, payload).await?;
        Ok(())
    }

    async fn push_dead_letter(&mut self, payload: &str) -> Result<()> {
        let _: () = self.conn.lpush(&self.dead_letter_queue, payload).await?;
        Ok(())
    }
}
