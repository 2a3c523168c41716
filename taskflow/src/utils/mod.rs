//! Utility functions for timestamps and clocks.

mod clock;
pub mod timestamps;

pub use clock::{Clock, ManualClock, SystemClock};
pub use timestamps::{format_iso8601, iso_timestamp, now_utc, saturating_add, Timestamp};
