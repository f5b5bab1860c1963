pub mod classifier;
pub mod collector;
pub mod config;
pub mod error;
pub mod expander;
pub mod score;
pub mod throttle;
pub mod traits;

pub use config::Config;
pub use error::WorkerError;

/// What a single worker pass accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Nothing eligible right now; worth idling before the next look.
    NoWork,
    /// One unit of work was committed.
    Worked,
}
