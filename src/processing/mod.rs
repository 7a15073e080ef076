//! # Processing Module
//!
//! Turns a sampling plan into review units: either a bisection visit order over single
//! frames, or composite grid batches visited in creation order.

pub mod batch;
pub mod schedule;

pub use batch::{batch, parse_cell_timestamp, GridBatch, GridBatcher};
pub use schedule::reorder;
