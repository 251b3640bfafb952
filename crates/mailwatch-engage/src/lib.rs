//! mailwatch-engage: Measures wall-clock reading attention per message with
//! a validity floor, and flushes measurements reliably on every teardown
//! path.

pub mod tracker;

pub use tracker::{EngagementSessionTracker, MIN_VALID_SECONDS};
