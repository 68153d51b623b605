//! Message producers driven by the stream lifecycle loop.

use crate::error::Result;
use async_trait::async_trait;
use chrono::Local;
use std::time::Duration;

/// Format of the timestamps pushed by [`ClockProducer`].
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Source of the outbound messages for one connection.
///
/// `next_message` is the loop's suspension point: it may wait on a timer or an
/// external trigger. Any error it returns is terminal for the connection.
#[async_trait]
pub trait Producer: Send + 'static {
    async fn next_message(&mut self) -> Result<String>;

    /// Application-defined stop predicate, checked after `payload` was sent.
    fn is_terminal(&self, _payload: &str) -> bool {
        false
    }
}

/// Pushes the current local time once per period.
pub struct ClockProducer {
    period: Duration,
    stop_on_minute: bool,
}

impl ClockProducer {
    /// A clock that ticks forever.
    pub fn endless(period: Duration) -> Self {
        Self {
            period,
            stop_on_minute: false,
        }
    }

    /// A clock that stops after sending a timestamp on a full minute (`..:00`).
    pub fn until_minute(period: Duration) -> Self {
        Self {
            period,
            stop_on_minute: true,
        }
    }
}

#[async_trait]
impl Producer for ClockProducer {
    async fn next_message(&mut self) -> Result<String> {
        tokio::time::sleep(self.period).await;
        Ok(Local::now().format(TIMESTAMP_FORMAT).to_string())
    }

    fn is_terminal(&self, payload: &str) -> bool {
        self.stop_on_minute && payload.ends_with("00")
    }
}
