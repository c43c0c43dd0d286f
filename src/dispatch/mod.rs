//! Notification dispatch: the send pipeline and the retry sweeper.

mod engine;
mod sweeper;

pub use engine::{
    DispatchEngine, EngineError, EngineStats, EngineStatsSnapshot, SubmitOutcome, SubmitRequest,
};
pub use sweeper::{RetrySweeper, SweepReport};
