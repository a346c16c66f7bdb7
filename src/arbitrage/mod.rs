//! Arbitrage Module
//!
//! Sizing and direction decisions, the per-run pipeline and the per-pair
//! scheduler that drives it.

pub mod decision;
pub mod pipeline;
pub mod scheduler;
pub mod snapshot;

pub use decision::{decide, round_quantity, size_trade, swap_input_amount};
pub use pipeline::{ArbEngine, EngineStats};
pub use scheduler::Scheduler;
pub use snapshot::SnapshotReader;
