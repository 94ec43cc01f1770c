//! Shared test recorders and clocks for the scopeweave crates.

mod clock;
mod order;
mod recorder;

pub use clock::FixedClock;
pub use order::OrderLog;
pub use recorder::Recorder;
