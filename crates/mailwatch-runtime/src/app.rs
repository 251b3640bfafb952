//! Run loop: wires push channel + polling fallback + notifications +
//! engagement tracking, and tears everything down cleanly on shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_util::sync::CancellationToken;

use mailwatch_core::prefs::FilePrefStore;
use mailwatch_engage::EngagementSessionTracker;
use mailwatch_notify::{DesktopBackend, NotificationGateway, TerminalBell};
use mailwatch_poll::{PollConfig, PollingSynchronizer, run_poll_loop};
use mailwatch_push::{PushConfig, PushConnectionManager, PushStatus};

use crate::cli::RunOpts;
use crate::consumer::BatchConsumer;
use crate::http_api::HttpMailApi;
use crate::keys::{InboxCommand, route_key};

pub async fn run(opts: RunOpts) -> anyhow::Result<()> {
    let prefs = Arc::new(FilePrefStore::default_location());

    let (gateway, mut nav_rx) = NotificationGateway::new(
        Box::new(DesktopBackend::new()),
        Box::new(TerminalBell),
        prefs.clone(),
    );
    let granted = gateway.request_permission();
    tracing::info!(granted, "notification permission");
    let gateway = Arc::new(gateway);

    let api = Arc::new(HttpMailApi::new(&opts.server_url, opts.token.clone()));
    let (batch_tx, mut batch_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    // Push channel (unless polling-only).
    let mut push_status = None;
    let push_manager = if opts.no_push {
        None
    } else {
        let config = PushConfig::new(&opts.ws_url, &opts.email);
        let (manager, status_rx) =
            PushConnectionManager::new(config, batch_tx.clone(), Arc::clone(&gateway));
        let manager = Arc::new(manager);
        manager.connect();
        push_status = Some(status_rx);
        Some(manager)
    };
    // Keep a live sender when push is disabled so the status arm stays quiet
    // instead of spinning on a closed channel.
    let (mut status_rx, _status_keepalive) = match push_status {
        Some(rx) => (rx, None),
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (rx, Some(tx))
        }
    };

    // Polling fallback.
    let mut poll_config = PollConfig::new(&opts.email);
    poll_config.period = Duration::from_secs(opts.poll_interval_secs);
    poll_config.query_limit = opts.limit;
    let poller = Arc::new(tokio::sync::Mutex::new(PollingSynchronizer::new(
        Arc::clone(&api),
        poll_config,
        batch_tx.clone(),
        Arc::clone(&gateway),
        Utc::now(),
    )));
    let poll_handle = tokio::spawn(run_poll_loop(Arc::clone(&poller), cancel.clone()));

    // Engagement tracking, driven by selection changes below.
    let mut tracker = EngagementSessionTracker::new(Arc::clone(&api), prefs.clone());

    // Keyboard input off the async runtime.
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
    let input_cancel = cancel.clone();
    let input_handle = tokio::task::spawn_blocking(move || input_loop(cmd_tx, input_cancel));

    let mut consumer = BatchConsumer::new();
    let mut selected: usize = 0;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received ctrl-c, shutting down");
                break;
            }

            Some(batch) = batch_rx.recv() => {
                let fresh = consumer.ingest(&batch);
                tracing::info!(
                    count = batch.count,
                    new = fresh.len(),
                    from = %batch.email_address,
                    "new mail"
                );
                for message in &fresh {
                    tracing::info!(
                        subject = %message.subject,
                        sender = %message.from_address,
                        "arrived"
                    );
                }
            }

            Some(status) = status_rx.recv() => match status {
                PushStatus::Connected => tracing::info!("push channel connected"),
                PushStatus::ServerError(message) => {
                    tracing::warn!(message = %message, "push server error");
                }
                PushStatus::Failed => {
                    tracing::error!(
                        "push connection lost after exhausting retries; \
                         polling continues, restart to retry push"
                    );
                }
            },

            Some(intent) = nav_rx.recv() => {
                tracing::info!(message_id = %intent.message_id, "opened from notification");
                tracker.start_session(&intent.message_id, Utc::now()).await;
            }

            Some(cmd) = cmd_rx.recv() => {
                match cmd {
                    InboxCommand::Quit => break,
                    InboxCommand::NextMessage => {
                        let last = consumer.inbox().len().saturating_sub(1);
                        selected = (selected + 1).min(last);
                    }
                    InboxCommand::PrevMessage => {
                        selected = selected.saturating_sub(1);
                    }
                    InboxCommand::OpenSelected => {
                        let id = consumer.inbox().get(selected).map(|m| m.id.clone());
                        if let Some(id) = id {
                            tracing::info!(message_id = %id, "viewing message");
                            tracker.start_session(&id, Utc::now()).await;
                        }
                    }
                    InboxCommand::FollowLink => {
                        tracker.record_link_click(None, Utc::now()).await;
                    }
                    InboxCommand::Refresh => {
                        let mut poller = poller.lock().await;
                        poller.tick(Utc::now()).await;
                    }
                    InboxCommand::ToggleStar
                    | InboxCommand::ToggleRead
                    | InboxCommand::Delete => {
                        // Mailbox CRUD belongs to the REST service / UI
                        // layer, not the sync runtime.
                        tracing::debug!(?cmd, "command outside sync runtime, ignored");
                    }
                }
            }

            else => break,
        }
    }

    // Teardown: normal close on the channel, stop timers, flush the live
    // session through the beacon path.
    cancel.cancel();
    if let Some(manager) = &push_manager {
        manager.disconnect();
    }
    tracker.flush_on_shutdown(Utc::now()).await;
    let _ = poll_handle.await;
    let _ = input_handle.await;
    tracing::info!("mailwatch stopped");
    Ok(())
}

/// Blocking keyboard loop: raw mode on, poll with a short timeout so
/// cancellation is noticed promptly, route presses into commands.
fn input_loop(cmd_tx: UnboundedSender<InboxCommand>, cancel: CancellationToken) {
    if let Err(e) = crossterm::terminal::enable_raw_mode() {
        tracing::warn!(error = %e, "no interactive terminal, keyboard commands disabled");
        return;
    }
    while !cancel.is_cancelled() {
        match crossterm::event::poll(Duration::from_millis(200)) {
            Ok(true) => {
                if let Ok(crossterm::event::Event::Key(key)) = crossterm::event::read() {
                    if let Some(cmd) = route_key(&key) {
                        if cmd_tx.send(cmd).is_err() {
                            break;
                        }
                    }
                }
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, "keyboard poll failed");
                break;
            }
        }
    }
    let _ = crossterm::terminal::disable_raw_mode();
}
