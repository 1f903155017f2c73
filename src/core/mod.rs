//! 就绪判定核心
//!
//! Worker enumeration, record normalization and the readiness verdict

pub mod aggregator;
pub mod models;
pub mod process_table;
