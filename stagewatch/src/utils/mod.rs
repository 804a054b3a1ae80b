//! Small shared helpers.

pub mod timestamps;

pub use timestamps::{format_iso8601, modified_time, next_stamp, now_utc, Timestamp};
