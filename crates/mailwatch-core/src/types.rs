use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ─── Connection state ─────────────────────────────────────────────

/// Lifecycle state of the push channel. Owned exclusively by the push
/// connection manager; `Failed` is terminal until an external re-enable.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closing,
    Reconnecting,
    Failed,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        }
    }

    /// True while a connection attempt is in flight or established.
    /// Used as the single-flight check before spawning a new attempt.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Open | Self::Reconnecting)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Message summary ──────────────────────────────────────────────

/// Minimal projection of a message, immutable once constructed.
/// CamelCase on the wire to match the push endpoint's JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    pub id: String,
    pub subject: String,
    pub from_name: String,
    pub from_address: String,
    #[serde(default)]
    pub preview: String,
    /// Classification badges ("important", "newsletter", ...).
    #[serde(default)]
    pub badges: Vec<String>,
    pub received_at: DateTime<Utc>,
}

// ─── Arrival batch ────────────────────────────────────────────────

/// A unit of "new messages showed up", produced by either synchronizer and
/// consumed uniformly downstream.
///
/// `count` reflects the authoritative server-side count even when
/// `message_ids`/`emails` are truncated or empty — consumers must not
/// assume a 1:1 correspondence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivalBatch {
    pub email_address: String,
    pub count: u32,
    pub message_ids: Vec<String>,
    pub emails: Vec<MessageSummary>,
}

impl ArrivalBatch {
    /// First summarized message, if the batch carried any summaries.
    pub fn first_summary(&self) -> Option<&MessageSummary> {
        self.emails.first()
    }
}

// ─── Engagement telemetry ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementEventType {
    Opened,
    Closed,
    LinkClicked,
}

impl EngagementEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Opened => "opened",
            Self::Closed => "closed",
            Self::LinkClicked => "link_clicked",
        }
    }
}

impl fmt::Display for EngagementEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discrete telemetry event emitted by the engagement tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementEvent {
    pub event_type: EngagementEventType,
    pub email_id: String,
    pub event_data: serde_json::Value,
}

/// The measured interval during which a specific message is the one
/// currently being read. At most one live instance per tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSession {
    pub session_id: Uuid,
    pub message_id: String,
    pub opened_at: DateTime<Utc>,
    pub link_click_count: u32,
}

/// Persisted projection of a completed view session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSessionRecord {
    pub session_id: Uuid,
    pub email_id: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub duration_seconds: i64,
    pub link_clicks_count: u32,
}

// ─── Notification state ───────────────────────────────────────────

/// Platform notification permission, mirrored from the backend.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPermissionState {
    #[default]
    Default,
    Granted,
    Denied,
}

/// Intent to bring the referenced message into view, produced when the
/// user clicks a desktop notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationIntent {
    pub message_id: String,
}
