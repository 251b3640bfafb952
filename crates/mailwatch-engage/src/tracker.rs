//! Engagement session tracker: at most one live view session at any time.
//!
//! Sessions shorter than the validity floor are silently discarded so
//! accidental opens are never counted. The live session is always taken out
//! synchronously before the first flush await, which makes `end_session`
//! idempotent and keeps re-entrant calls from double-persisting.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use mailwatch_core::api::TelemetrySink;
use mailwatch_core::prefs::{PREF_TRACKING_ENABLED, PrefStore};
use mailwatch_core::types::{
    EngagementEvent, EngagementEventType, ViewSession, ViewSessionRecord,
};

/// Sessions below this duration are discarded, not persisted.
pub const MIN_VALID_SECONDS: i64 = 3;

/// Owns the lifecycle of "the user is currently viewing message X".
pub struct EngagementSessionTracker<T: TelemetrySink, P: PrefStore> {
    sink: T,
    prefs: P,
    live: Option<ViewSession>,
    /// Suppresses re-entrant end flows while a flush is in flight.
    flushing: bool,
}

impl<T: TelemetrySink, P: PrefStore> EngagementSessionTracker<T, P> {
    pub fn new(sink: T, prefs: P) -> Self {
        Self {
            sink,
            prefs,
            live: None,
            flushing: false,
        }
    }

    fn tracking_enabled(&self) -> bool {
        // Read on demand: a mid-session toggle prevents future starts but
        // never retroactively discards already-recorded state.
        self.prefs.get(PREF_TRACKING_ENABLED)
    }

    pub fn live_session(&self) -> Option<&ViewSession> {
        self.live.as_ref()
    }

    /// Begin viewing `message_id`. Any live session goes through the full
    /// end flow first, so `closed`/discard ordering always precedes the new
    /// `opened` event. No-op when tracking is disabled.
    pub async fn start_session(&mut self, message_id: &str, now: DateTime<Utc>) {
        if !self.tracking_enabled() {
            return;
        }
        if self.live.is_some() {
            self.end_session(now).await;
        }

        let session = ViewSession {
            session_id: Uuid::new_v4(),
            message_id: message_id.to_string(),
            opened_at: now,
            link_click_count: 0,
        };
        tracing::debug!(message_id = %message_id, session_id = %session.session_id, "view session opened");
        let event = EngagementEvent {
            event_type: EngagementEventType::Opened,
            email_id: message_id.to_string(),
            event_data: serde_json::json!({ "session_id": session.session_id }),
        };
        self.live = Some(session);
        if let Err(e) = self.sink.record_event(event).await {
            tracing::warn!(error = %e, "failed to record opened event");
        }
    }

    /// End the live session, if any. Idempotent: a second call with no
    /// intervening start returns immediately. Below the validity floor the
    /// session is silently discarded; at or above it, exactly one
    /// persistence call and one `closed` event occur.
    pub async fn end_session(&mut self, now: DateTime<Utc>) {
        if self.flushing {
            return;
        }
        // Take the session before any await: a re-entrant call sees no
        // live session and becomes a no-op.
        let Some(session) = self.live.take() else {
            return;
        };

        let duration = (now - session.opened_at).num_seconds();
        if duration < MIN_VALID_SECONDS {
            tracing::debug!(
                session_id = %session.session_id,
                duration_seconds = duration,
                "view session below validity floor, discarded"
            );
            return;
        }

        self.flushing = true;
        let record = Self::record_for(&session, now, duration);
        if let Err(e) = self.sink.persist_session(&record).await {
            tracing::warn!(error = %e, "failed to persist view session");
        }
        let event = EngagementEvent {
            event_type: EngagementEventType::Closed,
            email_id: session.message_id.clone(),
            event_data: serde_json::json!({
                "session_id": session.session_id,
                "duration_seconds": duration,
                "link_clicks_count": session.link_click_count,
            }),
        };
        if let Err(e) = self.sink.record_event(event).await {
            tracing::warn!(error = %e, "failed to record closed event");
        }
        self.flushing = false;
    }

    /// Count a link click inside the live session. No-op without a live
    /// session or with tracking disabled.
    pub async fn record_link_click(&mut self, url: Option<&str>, _now: DateTime<Utc>) {
        if !self.tracking_enabled() {
            return;
        }
        let Some(session) = self.live.as_mut() else {
            return;
        };
        session.link_click_count += 1;
        let event = EngagementEvent {
            event_type: EngagementEventType::LinkClicked,
            email_id: session.message_id.clone(),
            event_data: serde_json::json!({
                "session_id": session.session_id,
                "click_count": session.link_click_count,
                "url": url,
            }),
        };
        if let Err(e) = self.sink.record_event(event).await {
            tracing::warn!(error = %e, "failed to record link click");
        }
    }

    /// Teardown path: flush the live session through the best-effort beacon
    /// instead of the ordinary call, because ordinary requests are not
    /// guaranteed to complete during shutdown. Same validity floor.
    pub async fn flush_on_shutdown(&mut self, now: DateTime<Utc>) {
        let Some(session) = self.live.take() else {
            return;
        };
        let duration = (now - session.opened_at).num_seconds();
        if duration < MIN_VALID_SECONDS {
            return;
        }
        let record = Self::record_for(&session, now, duration);
        tracing::debug!(session_id = %record.session_id, "beacon flush on shutdown");
        self.sink.beacon_session(&record).await;
    }

    fn record_for(session: &ViewSession, now: DateTime<Utc>, duration: i64) -> ViewSessionRecord {
        ViewSessionRecord {
            session_id: session.session_id,
            email_id: session.message_id.clone(),
            opened_at: session.opened_at,
            closed_at: now,
            duration_seconds: duration,
            link_clicks_count: session.link_click_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailwatch_core::api::ApiError;
    use mailwatch_core::prefs::MemPrefStore;
    use std::sync::Arc;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum SinkCall {
        Event(EngagementEventType, String),
        Persist(ViewSessionRecord),
        Beacon(ViewSessionRecord),
    }

    #[derive(Default, Clone)]
    struct RecordingSink {
        calls: Arc<Mutex<Vec<SinkCall>>>,
    }

    impl RecordingSink {
        fn calls(&self) -> Vec<SinkCall> {
            self.calls.lock().unwrap().clone()
        }

        fn persist_count(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| matches!(c, SinkCall::Persist(_)))
                .count()
        }
    }

    impl TelemetrySink for RecordingSink {
        async fn record_event(&self, event: EngagementEvent) -> Result<(), ApiError> {
            self.calls
                .lock()
                .unwrap()
                .push(SinkCall::Event(event.event_type, event.email_id));
            Ok(())
        }

        async fn persist_session(&self, record: &ViewSessionRecord) -> Result<(), ApiError> {
            self.calls
                .lock()
                .unwrap()
                .push(SinkCall::Persist(record.clone()));
            Ok(())
        }

        async fn beacon_session(&self, record: &ViewSessionRecord) {
            self.calls
                .lock()
                .unwrap()
                .push(SinkCall::Beacon(record.clone()));
        }
    }

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().expect("valid RFC3339")
    }

    fn t0() -> DateTime<Utc> {
        ts("2026-03-01T10:00:00Z")
    }

    fn secs(n: i64) -> chrono::TimeDelta {
        chrono::TimeDelta::seconds(n)
    }

    fn tracker() -> (
        EngagementSessionTracker<RecordingSink, Arc<MemPrefStore>>,
        RecordingSink,
        Arc<MemPrefStore>,
    ) {
        let sink = RecordingSink::default();
        let prefs = Arc::new(MemPrefStore::new());
        (
            EngagementSessionTracker::new(sink.clone(), Arc::clone(&prefs)),
            sink,
            prefs,
        )
    }

    #[tokio::test]
    async fn start_opens_session_and_emits_opened() {
        let (mut tracker, sink, _prefs) = tracker();
        tracker.start_session("m1", t0()).await;

        let live = tracker.live_session().unwrap();
        assert_eq!(live.message_id, "m1");
        assert_eq!(live.link_click_count, 0);
        assert_eq!(
            sink.calls(),
            vec![SinkCall::Event(EngagementEventType::Opened, "m1".into())]
        );
    }

    #[tokio::test]
    async fn short_session_discarded_without_persistence() {
        let (mut tracker, sink, _prefs) = tracker();
        tracker.start_session("m1", t0()).await;
        tracker.end_session(t0() + secs(2)).await;

        assert!(tracker.live_session().is_none());
        assert_eq!(sink.persist_count(), 0);
        // No closed event either.
        assert!(
            !sink
                .calls()
                .iter()
                .any(|c| matches!(c, SinkCall::Event(EngagementEventType::Closed, _)))
        );
    }

    #[tokio::test]
    async fn session_at_floor_is_persisted_exactly_once() {
        let (mut tracker, sink, _prefs) = tracker();
        tracker.start_session("m1", t0()).await;
        tracker.end_session(t0() + secs(3)).await;

        assert_eq!(sink.persist_count(), 1);
        let persisted = sink
            .calls()
            .into_iter()
            .find_map(|c| match c {
                SinkCall::Persist(r) => Some(r),
                _ => None,
            })
            .unwrap();
        assert_eq!(persisted.duration_seconds, 3);
        assert_eq!(persisted.email_id, "m1");
    }

    #[tokio::test]
    async fn end_session_is_idempotent() {
        let (mut tracker, sink, _prefs) = tracker();
        tracker.start_session("m1", t0()).await;
        tracker.end_session(t0() + secs(5)).await;
        tracker.end_session(t0() + secs(6)).await;

        assert_eq!(sink.persist_count(), 1);
    }

    #[tokio::test]
    async fn end_without_live_session_is_noop() {
        let (mut tracker, sink, _prefs) = tracker();
        tracker.end_session(t0()).await;
        assert!(sink.calls().is_empty());
    }

    // Switch after 2.5s: the first session is below the floor, so it is
    // discarded before the second one opens.
    #[tokio::test]
    async fn switching_messages_ends_prior_session_first() {
        let (mut tracker, sink, _prefs) = tracker();
        tracker.start_session("m1", t0()).await;
        let t_switch = t0() + chrono::TimeDelta::milliseconds(2500);
        tracker.start_session("m2", t_switch).await;

        assert_eq!(tracker.live_session().unwrap().message_id, "m2");
        assert_eq!(tracker.live_session().unwrap().opened_at, t_switch);
        assert_eq!(sink.persist_count(), 0);
        assert_eq!(
            sink.calls(),
            vec![
                SinkCall::Event(EngagementEventType::Opened, "m1".into()),
                SinkCall::Event(EngagementEventType::Opened, "m2".into()),
            ]
        );
    }

    #[tokio::test]
    async fn switching_after_valid_duration_closes_before_opening() {
        let (mut tracker, sink, _prefs) = tracker();
        tracker.start_session("m1", t0()).await;
        tracker.start_session("m2", t0() + secs(10)).await;

        let calls = sink.calls();
        // closed for m1 precedes opened for m2.
        let closed_idx = calls
            .iter()
            .position(|c| matches!(c, SinkCall::Event(EngagementEventType::Closed, id) if id == "m1"))
            .unwrap();
        let opened_m2_idx = calls
            .iter()
            .position(|c| matches!(c, SinkCall::Event(EngagementEventType::Opened, id) if id == "m2"))
            .unwrap();
        assert!(closed_idx < opened_m2_idx);
        assert_eq!(sink.persist_count(), 1);
    }

    #[tokio::test]
    async fn link_clicks_counted_and_reported() {
        let (mut tracker, sink, _prefs) = tracker();
        tracker.start_session("m1", t0()).await;
        tracker
            .record_link_click(Some("https://example.com"), t0() + secs(1))
            .await;
        tracker.record_link_click(None, t0() + secs(2)).await;

        assert_eq!(tracker.live_session().unwrap().link_click_count, 2);
        let clicks = sink
            .calls()
            .iter()
            .filter(|c| matches!(c, SinkCall::Event(EngagementEventType::LinkClicked, _)))
            .count();
        assert_eq!(clicks, 2);
    }

    #[tokio::test]
    async fn link_click_without_session_is_noop() {
        let (mut tracker, sink, _prefs) = tracker();
        tracker.record_link_click(None, t0()).await;
        assert!(sink.calls().is_empty());
    }

    // Open at t=0, clicks at 1s and 4s, shutdown at t=6s: exactly one
    // beacon call with duration 6 and 2 clicks.
    #[tokio::test]
    async fn shutdown_flush_uses_beacon() {
        let (mut tracker, sink, _prefs) = tracker();
        tracker.start_session("m3", t0()).await;
        tracker.record_link_click(None, t0() + secs(1)).await;
        tracker.record_link_click(None, t0() + secs(4)).await;
        tracker.flush_on_shutdown(t0() + secs(6)).await;

        let beacons: Vec<_> = sink
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                SinkCall::Beacon(r) => Some(r),
                _ => None,
            })
            .collect();
        assert_eq!(beacons.len(), 1);
        assert_eq!(beacons[0].duration_seconds, 6);
        assert_eq!(beacons[0].link_clicks_count, 2);
        assert_eq!(sink.persist_count(), 0);
        assert!(tracker.live_session().is_none());
    }

    #[tokio::test]
    async fn shutdown_flush_respects_validity_floor() {
        let (mut tracker, sink, _prefs) = tracker();
        tracker.start_session("m1", t0()).await;
        tracker.flush_on_shutdown(t0() + secs(1)).await;

        assert!(
            !sink
                .calls()
                .iter()
                .any(|c| matches!(c, SinkCall::Beacon(_)))
        );
    }

    #[tokio::test]
    async fn disabled_tracking_prevents_new_sessions() {
        let (mut tracker, sink, prefs) = tracker();
        prefs.set(PREF_TRACKING_ENABLED, false).unwrap();

        tracker.start_session("m1", t0()).await;
        assert!(tracker.live_session().is_none());
        assert!(sink.calls().is_empty());
    }

    #[tokio::test]
    async fn mid_session_disable_does_not_discard_live_session() {
        let (mut tracker, sink, prefs) = tracker();
        tracker.start_session("m1", t0()).await;
        prefs.set(PREF_TRACKING_ENABLED, false).unwrap();

        // New starts refused...
        tracker.start_session("m2", t0() + secs(1)).await;
        assert_eq!(tracker.live_session().unwrap().message_id, "m1");

        // ...but the in-flight session still flushes normally.
        tracker.end_session(t0() + secs(5)).await;
        assert_eq!(sink.persist_count(), 1);
    }
}
