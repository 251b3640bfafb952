//! mailwatch-push: Persistent WebSocket client for the mailbox push
//! endpoint. Owns the connection lifecycle state machine, recovers from
//! transient loss with bounded exponential backoff, and converts inbound
//! frames into arrival batches.

pub mod manager;

pub use manager::{PushConfig, PushConnectionManager, PushStatus};
