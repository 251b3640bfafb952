//! Polling synchronizer: on each tick, query the REST collaborator for
//! messages newer than the last observed baseline.
//!
//! The baseline advances to the tick's own "now" after every tick
//! regardless of outcome — not to the newest message timestamp — which
//! avoids unbounded catch-up storms but can skip messages arriving between
//! the query and the advance under slow networks (known gap, kept as-is).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use mailwatch_core::api::MailApi;
use mailwatch_core::types::ArrivalBatch;
use mailwatch_notify::NotificationGateway;

/// Default period between ticks.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(30);

/// Default page size for the message query.
pub const DEFAULT_QUERY_LIMIT: u32 = 50;

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub email_address: String,
    pub period: Duration,
    pub query_limit: u32,
}

impl PollConfig {
    pub fn new(email_address: impl Into<String>) -> Self {
        Self {
            email_address: email_address.into(),
            period: DEFAULT_PERIOD,
            query_limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

/// Durability backstop producing arrival batches from timed REST queries.
pub struct PollingSynchronizer<A: MailApi> {
    api: Arc<A>,
    config: PollConfig,
    /// Last observed timestamp. Mutated only synchronously at the start of
    /// a tick, before the query await.
    baseline: DateTime<Utc>,
    batch_tx: UnboundedSender<ArrivalBatch>,
    notifier: Arc<NotificationGateway>,
}

impl<A: MailApi> PollingSynchronizer<A> {
    /// The initial baseline is construction-time "now", so the first tick
    /// yields no results by construction.
    pub fn new(
        api: Arc<A>,
        config: PollConfig,
        batch_tx: UnboundedSender<ArrivalBatch>,
        notifier: Arc<NotificationGateway>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            api,
            config,
            baseline: now,
            batch_tx,
            notifier,
        }
    }

    pub fn baseline(&self) -> DateTime<Utc> {
        self.baseline
    }

    /// One poll cycle. Messages strictly newer than the stored baseline are
    /// reported as one arrival batch; errors complete the tick as a no-op.
    pub async fn tick(&mut self, now: DateTime<Utc>) {
        let baseline = self.baseline;
        // Advance before the query await so the mutation is synchronous
        // within this tick, and holds regardless of the query outcome.
        self.baseline = now;

        let messages = match self
            .api
            .messages_after(baseline, self.config.query_limit)
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(error = %e, "poll query failed, skipping cycle");
                return;
            }
        };

        let new: Vec<_> = messages
            .into_iter()
            .filter(|m| m.received_at > baseline)
            .collect();
        if new.is_empty() {
            return;
        }

        tracing::debug!(count = new.len(), "new mail via polling");
        let batch = ArrivalBatch {
            email_address: self.config.email_address.clone(),
            count: new.len() as u32,
            message_ids: new.iter().map(|m| m.id.clone()).collect(),
            emails: new,
        };
        self.notifier.notify_arrival(&batch);
        let _ = self.batch_tx.send(batch);
    }
}

/// Run the timer loop until cancellation. A tick that would start while the
/// previous one is still in flight is skipped, not queued.
pub async fn run_poll_loop<A: MailApi + 'static>(
    synchronizer: Arc<Mutex<PollingSynchronizer<A>>>,
    cancel: CancellationToken,
) {
    let period = synchronizer.lock().await.config.period;
    let mut interval = tokio::time::interval(period);
    // Skip, not Delay: a cycle missed while the previous one was in flight
    // must not fire back-to-back once it completes.
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // Consume the immediate first fire; the first real cycle happens one
    // period after start.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match synchronizer.try_lock() {
                    Ok(mut sync) => sync.tick(Utc::now()).await,
                    Err(_) => {
                        tracing::debug!("poll tick skipped, previous tick still in flight");
                    }
                }
            }
            _ = cancel.cancelled() => {
                tracing::debug!("poll loop cancelled");
                return;
            }
        }
    }
}
