//! Durable per-stage completion watermarks.
//!
//! This module provides:
//! - WatermarkRecord, the persisted shape of the state file
//! - WatermarkStore, which loads, mutates and atomically saves it

mod record;
mod store;

pub use record::{StageSnapshot, WatermarkRecord};
pub use store::WatermarkStore;
