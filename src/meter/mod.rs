//! Meeting cost meter.
//!
//! Computes the cost of a meeting from a combined hourly rate and, when asked
//! to tick, keeps writing the running cost until a stop condition fires.

pub mod cost;
pub mod error;
pub mod status;
pub mod stop_watch;
pub mod ticker;

pub use cost::{cost, display_cost, format_cost, COST_LABEL};
pub use error::TickerError;
pub use status::{TickerPhase, TickerStatusHandle};
pub use stop_watch::{DeadlineWatch, SentinelWatch, StopStrategy, StopWatch};
pub use ticker::{Ticker, TickerBuilder, TickerHandle};
