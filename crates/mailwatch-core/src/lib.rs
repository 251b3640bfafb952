//! mailwatch-core: Shared types and contracts for the inbox sync runtime.
//! Wire frames, arrival batches, reconnect budget math, preference storage,
//! and the collaborator traits the synchronizers and the tracker depend on.

pub mod api;
pub mod backoff;
pub mod frame;
pub mod prefs;
pub mod types;
