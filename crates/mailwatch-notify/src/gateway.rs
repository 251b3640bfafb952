//! NotificationGateway: permission/enable/show contract over an injectable
//! backend. Constructed once at startup, disposed at shutdown — no global
//! singleton.

use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use mailwatch_core::prefs::{PREF_NOTIFICATIONS_ENABLED, PrefStore};
use mailwatch_core::types::{ArrivalBatch, NavigationIntent, NotificationPermissionState};

use crate::backend::{AudioCue, NotifyBackend};

/// Most recent per-message tags remembered for de-duplication.
const SEEN_TAG_CAPACITY: usize = 256;

/// A notification as the gateway presents it: title/body plus a stable
/// per-message tag so retried deliveries of the same message cannot alert
/// twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxNotification {
    /// Stable de-duplication tag; `None` disables de-duplication (used for
    /// count-only batches with no message identity).
    pub tag: Option<String>,
    pub title: String,
    pub body: String,
    /// Message the click should navigate to; empty for count-only alerts.
    pub message_id: String,
}

impl InboxNotification {
    /// Build the alert for an arrival batch: subject/sender/preview of the
    /// first summarized message, or a generic "N new messages" fallback.
    pub fn for_batch(batch: &ArrivalBatch) -> Self {
        match batch.first_summary() {
            Some(summary) => Self {
                tag: Some(summary.id.clone()),
                title: summary.subject.clone(),
                body: if summary.preview.is_empty() {
                    format!("{} <{}>", summary.from_name, summary.from_address)
                } else {
                    format!(
                        "{} <{}>\n{}",
                        summary.from_name, summary.from_address, summary.preview
                    )
                },
                message_id: summary.id.clone(),
            },
            None => Self {
                tag: batch.message_ids.first().cloned(),
                title: "New mail".to_string(),
                body: format!("{} new messages for {}", batch.count, batch.email_address),
                message_id: batch.message_ids.first().cloned().unwrap_or_default(),
            },
        }
    }
}

// ─── Gateway ──────────────────────────────────────────────────────

struct SeenTags {
    order: VecDeque<String>,
    set: HashSet<String>,
}

impl SeenTags {
    fn new() -> Self {
        Self {
            order: VecDeque::new(),
            set: HashSet::new(),
        }
    }

    /// Returns false if the tag was already present.
    fn insert(&mut self, tag: &str) -> bool {
        if !self.set.insert(tag.to_string()) {
            return false;
        }
        self.order.push_back(tag.to_string());
        while self.order.len() > SEEN_TAG_CAPACITY {
            if let Some(old) = self.order.pop_front() {
                self.set.remove(&old);
            }
        }
        true
    }
}

/// Single point of contact with the platform notification capability.
pub struct NotificationGateway {
    backend: Box<dyn NotifyBackend>,
    cue: Box<dyn AudioCue>,
    prefs: Arc<dyn PrefStore>,
    permission: Mutex<NotificationPermissionState>,
    seen: Mutex<SeenTags>,
    nav_tx: UnboundedSender<NavigationIntent>,
}

impl NotificationGateway {
    /// Returns the gateway plus the receiver of click navigation intents.
    pub fn new(
        backend: Box<dyn NotifyBackend>,
        cue: Box<dyn AudioCue>,
        prefs: Arc<dyn PrefStore>,
    ) -> (Self, UnboundedReceiver<NavigationIntent>) {
        let (nav_tx, nav_rx) = mpsc::unbounded_channel();
        (
            Self {
                backend,
                cue,
                prefs,
                permission: Mutex::new(NotificationPermissionState::Default),
                seen: Mutex::new(SeenTags::new()),
                nav_tx,
            },
            nav_rx,
        )
    }

    /// Query/request platform permission. Capability absence downgrades to
    /// denied, never to an error. The durable enable preference is the
    /// user's explicit choice and is never written here: a prior `disable()`
    /// survives any number of permission grants.
    pub fn request_permission(&self) -> bool {
        let state = if self.backend.supported() {
            self.backend.request_permission()
        } else {
            NotificationPermissionState::Denied
        };
        if let Ok(mut permission) = self.permission.lock() {
            *permission = state;
        }
        state == NotificationPermissionState::Granted
    }

    /// Granted AND not user-disabled. The preference is re-read on every
    /// call so an external toggle takes effect immediately.
    pub fn enabled(&self) -> bool {
        let granted = self
            .permission
            .lock()
            .map(|p| *p == NotificationPermissionState::Granted)
            .unwrap_or(false);
        granted && self.prefs.get(PREF_NOTIFICATIONS_ENABLED)
    }

    /// Unconditionally suppress further notifications and persist that
    /// choice.
    pub fn disable(&self) {
        if let Err(e) = self.prefs.set(PREF_NOTIFICATIONS_ENABLED, false) {
            tracing::warn!(error = %e, "failed to persist notification disable");
        }
    }

    /// Show a notification. No-op unless enabled; duplicate tags are
    /// silently dropped. Returns whether the notification was displayed.
    pub fn show(&self, notification: &InboxNotification) -> bool {
        if !self.enabled() {
            return false;
        }
        if let Some(tag) = &notification.tag {
            let fresh = self.seen.lock().map(|mut s| s.insert(tag)).unwrap_or(true);
            if !fresh {
                tracing::debug!(tag = %tag, "duplicate notification suppressed");
                return false;
            }
        }
        match self.backend.show(notification, &self.nav_tx) {
            Ok(()) => true,
            Err(e) => {
                // Backend failure degrades to a silently-disabled feature.
                tracing::warn!(error = %e, "notification backend failed");
                false
            }
        }
    }

    /// Arrival side effects shared by both synchronizers: the audible cue
    /// fires for every parsed arrival; the desktop notification only when
    /// enabled.
    pub fn notify_arrival(&self, batch: &ArrivalBatch) {
        self.cue.play();
        self.show(&InboxNotification::for_batch(batch));
    }
}
