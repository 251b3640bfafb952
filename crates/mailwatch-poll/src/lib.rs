//! mailwatch-poll: Fixed-period polling fallback. Produces the same
//! arrival-batch shape as the push path; the durability backstop when push
//! is unavailable.

pub mod synchronizer;

pub use synchronizer::{PollConfig, PollingSynchronizer, run_poll_loop};
