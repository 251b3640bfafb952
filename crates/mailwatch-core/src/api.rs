//! Collaborator traits for the REST backend. The synchronizers and the
//! engagement tracker are generic over these so tests can inject fakes
//! without any network.

use std::future::Future;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{EngagementEvent, MessageSummary, ViewSessionRecord};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http transport error: {0}")]
    Transport(String),

    #[error("server returned status {0}")]
    Status(u16),

    #[error("response decode error: {0}")]
    Decode(String),
}

/// Read side of the REST collaborator: message queries for the polling
/// fallback.
pub trait MailApi: Send + Sync {
    /// Messages that arrived after `after`, most recent first, at most
    /// `limit` entries.
    fn messages_after(
        &self,
        after: DateTime<Utc>,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<MessageSummary>, ApiError>> + Send;
}

/// Write side: engagement telemetry. `beacon_session` is the best-effort
/// teardown variant — implementations must swallow and log failures rather
/// than return them, since nothing can act on an error during shutdown.
pub trait TelemetrySink: Send + Sync {
    fn record_event(
        &self,
        event: EngagementEvent,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn persist_session(
        &self,
        record: &ViewSessionRecord,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Fire-and-forget delivery used only on shutdown. No delivery
    /// confirmation; authenticated via query-string token because the
    /// transport disallows custom headers.
    fn beacon_session(&self, record: &ViewSessionRecord) -> impl Future<Output = ()> + Send;
}

impl<T: MailApi> MailApi for std::sync::Arc<T> {
    fn messages_after(
        &self,
        after: DateTime<Utc>,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<MessageSummary>, ApiError>> + Send {
        (**self).messages_after(after, limit)
    }
}

impl<T: TelemetrySink> TelemetrySink for std::sync::Arc<T> {
    fn record_event(
        &self,
        event: EngagementEvent,
    ) -> impl Future<Output = Result<(), ApiError>> + Send {
        (**self).record_event(event)
    }

    fn persist_session(
        &self,
        record: &ViewSessionRecord,
    ) -> impl Future<Output = Result<(), ApiError>> + Send {
        (**self).persist_session(record)
    }

    fn beacon_session(&self, record: &ViewSessionRecord) -> impl Future<Output = ()> + Send {
        (**self).beacon_session(record)
    }
}
