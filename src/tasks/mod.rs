//! Background tasks.

mod sweep;

pub use sweep::SweepTask;
