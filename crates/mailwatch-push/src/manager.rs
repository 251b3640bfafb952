//! Push connection manager: one live event-delivery channel per active
//! mailbox identity.
//!
//! State machine: `Idle → Connecting → Open`, abnormal closure while
//! budget remains → `Reconnecting → Connecting`, explicit disconnect →
//! `Idle` (normal close, pending reconnect timer cancelled), budget
//! exhausted → `Failed` (terminal until `reset()`).

use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;

use mailwatch_core::backoff::{DEFAULT_MAX_ATTEMPTS, ReconnectBudget};
use mailwatch_core::frame::PushFrame;
use mailwatch_core::types::{ArrivalBatch, ConnectionState};
use mailwatch_notify::NotificationGateway;

/// Connection parameters for the push endpoint.
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Base WebSocket URL, e.g. `ws://mail.example.com/ws/inbox`.
    pub ws_url: String,
    /// Active mailbox identity; appended to the URL path.
    pub email_address: String,
    pub max_attempts: u32,
}

impl PushConfig {
    pub fn new(ws_url: impl Into<String>, email_address: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            email_address: email_address.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.ws_url.trim_end_matches('/'),
            self.email_address
        )
    }
}

/// Connection-level conditions surfaced to the caller. Per the error
/// taxonomy, only budget exhaustion and server `error` frames are
/// user-visible; everything else is recovered locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushStatus {
    Connected,
    /// Server-reported error frame; does not change connection state.
    ServerError(String),
    /// Reconnect budget exhausted; requires `reset()` + `connect()`.
    Failed,
}

enum DriveOutcome {
    /// Client-initiated normal closure (disconnect/teardown).
    ClosedNormally,
    /// Server close, stream end, or transport error.
    ClosedAbnormally,
}

/// Maintains one live push channel and recovers transparently from
/// transient network loss.
pub struct PushConnectionManager {
    config: PushConfig,
    state: Arc<Mutex<ConnectionState>>,
    batch_tx: UnboundedSender<ArrivalBatch>,
    status_tx: UnboundedSender<PushStatus>,
    notifier: Arc<NotificationGateway>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl PushConnectionManager {
    /// Returns the manager plus the receiver of surfaced status changes.
    pub fn new(
        config: PushConfig,
        batch_tx: UnboundedSender<ArrivalBatch>,
        notifier: Arc<NotificationGateway>,
    ) -> (Self, UnboundedReceiver<PushStatus>) {
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        (
            Self {
                config,
                state: Arc::new(Mutex::new(ConnectionState::Idle)),
                batch_tx,
                status_tx,
                notifier,
                cancel: Mutex::new(None),
            },
            status_rx,
        )
    }

    /// Current connection state snapshot.
    pub fn state(&self) -> ConnectionState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(ConnectionState::Idle)
    }

    fn set_state(&self, next: ConnectionState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }

    /// Start the connection task. No-op while an attempt is in flight or a
    /// channel is open, and while `Failed` (requires `reset()` first).
    pub fn connect(self: &Arc<Self>) {
        {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            if state.is_active() || *state == ConnectionState::Closing {
                tracing::debug!(state = %*state, "connect ignored, channel already active");
                return;
            }
            if *state == ConnectionState::Failed {
                tracing::info!("connect ignored, channel failed; reset required");
                return;
            }
            *state = ConnectionState::Connecting;
        }

        let cancel = CancellationToken::new();
        if let Ok(mut slot) = self.cancel.lock() {
            *slot = Some(cancel.clone());
        }
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.run(cancel).await;
        });
    }

    /// Explicit disconnect: cancels any pending reconnect timer and closes
    /// an open channel with a normal close code so reconnect logic never
    /// misreads teardown as failure.
    pub fn disconnect(&self) {
        let token = self.cancel.lock().ok().and_then(|mut slot| slot.take());
        if let Some(token) = token {
            if self.state().is_active() {
                self.set_state(ConnectionState::Closing);
            }
            token.cancel();
        }
    }

    /// External re-enable out of `Failed`.
    pub fn reset(&self) {
        if let Ok(mut state) = self.state.lock() {
            if *state == ConnectionState::Failed {
                *state = ConnectionState::Idle;
            }
        }
    }

    async fn run(&self, cancel: CancellationToken) {
        let mut budget = ReconnectBudget::new(self.config.max_attempts);
        let endpoint = self.config.endpoint();

        loop {
            let connected = tokio::select! {
                result = tokio_tungstenite::connect_async(endpoint.as_str()) => result,
                _ = cancel.cancelled() => {
                    self.set_state(ConnectionState::Idle);
                    return;
                }
            };

            match connected {
                Ok((ws, _resp)) => {
                    self.set_state(ConnectionState::Open);
                    budget.reset();
                    let _ = self.status_tx.send(PushStatus::Connected);
                    tracing::info!(endpoint = %endpoint, "push channel open");

                    match self.drive(ws, &cancel).await {
                        DriveOutcome::ClosedNormally => {
                            self.set_state(ConnectionState::Idle);
                            return;
                        }
                        DriveOutcome::ClosedAbnormally => {
                            tracing::warn!("push channel closed abnormally");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "push connect failed");
                }
            }

            // Failure path: increment before scheduling the next try.
            match budget.register_failure() {
                Some(delay) => {
                    self.set_state(ConnectionState::Reconnecting);
                    tracing::info!(
                        attempt = budget.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        "scheduling reconnect"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => {
                            self.set_state(ConnectionState::Idle);
                            return;
                        }
                    }
                    self.set_state(ConnectionState::Connecting);
                }
                None => {
                    self.set_state(ConnectionState::Failed);
                    let _ = self.status_tx.send(PushStatus::Failed);
                    tracing::error!(
                        attempts = budget.attempt(),
                        "reconnect budget exhausted, push channel failed"
                    );
                    return;
                }
            }
        }
    }

    /// Pump one open channel until closure. Frames are handled in arrival
    /// order; malformed frames are logged and dropped, never fatal.
    async fn drive<S>(
        &self,
        mut ws: tokio_tungstenite::WebSocketStream<S>,
        cancel: &CancellationToken,
    ) -> DriveOutcome
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        loop {
            tokio::select! {
                msg = ws.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => self.handle_text(&text),
                        Some(Ok(Message::Ping(data))) => {
                            if ws.send(Message::Pong(data)).await.is_err() {
                                return DriveOutcome::ClosedAbnormally;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            // Server-side close: not client-initiated, so
                            // abnormal for reconnect purposes whatever the code.
                            tracing::debug!(frame = ?frame, "server closed push channel");
                            return DriveOutcome::ClosedAbnormally;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::debug!(error = %e, "push channel read error");
                            return DriveOutcome::ClosedAbnormally;
                        }
                        None => return DriveOutcome::ClosedAbnormally,
                    }
                }
                _ = cancel.cancelled() => {
                    let _ = ws
                        .send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "client disconnect".into(),
                        })))
                        .await;
                    return DriveOutcome::ClosedNormally;
                }
            }
        }
    }

    fn handle_text(&self, text: &str) {
        match PushFrame::decode(text) {
            Ok(PushFrame::Connected) => {
                tracing::debug!("push handshake confirmed");
            }
            Ok(frame @ PushFrame::NewMessages { .. }) => {
                if let Some(batch) = frame.into_batch() {
                    tracing::debug!(
                        count = batch.count,
                        ids = batch.message_ids.len(),
                        "new mail via push"
                    );
                    self.notifier.notify_arrival(&batch);
                    let _ = self.batch_tx.send(batch);
                }
            }
            Ok(PushFrame::Error { message }) => {
                tracing::warn!(message = %message, "push server reported error");
                let _ = self.status_tx.send(PushStatus::ServerError(message));
            }
            Err(e) => {
                tracing::warn!(error = %e, "malformed push frame dropped");
            }
        }
    }
}
