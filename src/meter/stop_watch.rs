//! Stop conditions for a running ticker.
//!
//! A watch only waits for its own condition. Signalling the ticker and
//! abandoning the watches that lost the race is done by the ticker, so any
//! number of watches can be registered for one run.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::Instant;
use tracing::{debug, warn};

/// A condition that ends a ticker run once it holds.
#[async_trait]
pub trait StopWatch: Send {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Resolves when the condition holds. `started_at` is the instant the
    /// ticker started.
    async fn wait(&mut self, started_at: Instant);
}

/// Fires once a fixed duration has passed since the ticker started.
pub struct DeadlineWatch {
    after: Duration,
}

impl DeadlineWatch {
    pub fn new(after: Duration) -> Self {
        Self { after }
    }
}

#[async_trait]
impl StopWatch for DeadlineWatch {
    fn name(&self) -> &'static str {
        "deadline"
    }

    async fn wait(&mut self, started_at: Instant) {
        tokio::time::sleep_until(started_at + self.after).await;
    }
}

/// Fires when the stop token is read as a whole line from `reader`.
///
/// Lines are compared trimmed and ASCII case-insensitively; anything else is
/// ignored. After end of input or a read error the watch never fires, leaving
/// the run to another watch or an explicit stop.
pub struct SentinelWatch<R> {
    reader: R,
    token: String,
}

impl<R> SentinelWatch<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R, token: impl Into<String>) -> Self {
        Self {
            reader,
            token: token.into(),
        }
    }
}

#[async_trait]
impl<R> StopWatch for SentinelWatch<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    fn name(&self) -> &'static str {
        "sentinel"
    }

    async fn wait(&mut self, _started_at: Instant) {
        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line).await {
                Ok(0) => {
                    debug!("Input closed before stop token was seen");
                    break;
                }
                Ok(_) => {
                    if is_token(&line, &self.token) {
                        return;
                    }
                    debug!("Ignoring input line {:?}", line.trim_end());
                }
                Err(e) => {
                    warn!("Failed to read stop input: {}", e);
                    break;
                }
            }
        }
        std::future::pending::<()>().await;
    }
}

pub(crate) fn is_token(line: &str, token: &str) -> bool {
    line.trim().eq_ignore_ascii_case(token.trim())
}

/// How a run ends when no other stop source is registered.
pub enum StopStrategy<R> {
    /// Stop after a fixed duration.
    Deadline(Duration),
    /// Stop when the token is read from the input.
    Sentinel { reader: R, token: String },
}

impl<R> StopStrategy<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    /// Picks the deadline strategy for a non-zero target, the sentinel
    /// strategy otherwise.
    pub fn from_target(target: Option<Duration>, reader: R, token: impl Into<String>) -> Self {
        match target {
            Some(after) if !after.is_zero() => Self::Deadline(after),
            _ => Self::Sentinel {
                reader,
                token: token.into(),
            },
        }
    }

    pub fn into_watch(self) -> Box<dyn StopWatch> {
        match self {
            Self::Deadline(after) => Box::new(DeadlineWatch::new(after)),
            Self::Sentinel { reader, token } => Box::new(SentinelWatch::new(reader, token)),
        }
    }
}
