use thiserror::Error;

#[derive(Debug, Error)]
pub enum TickerError {
    #[error("tick interval must be greater than zero")]
    InvalidInterval,

    #[error("hourly rate must be a finite, non-negative number (got {0})")]
    InvalidRate(f64),

    #[error("no stop condition configured, the meter would never finish")]
    NoStopCondition,

    #[error("the meter must be started from within a tokio runtime")]
    NoRuntime,

    #[error("meter task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
