//! Platform backends behind traits so tests can substitute fakes without
//! touching global state.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use mailwatch_core::types::{NavigationIntent, NotificationPermissionState};

use crate::gateway::InboxNotification;

/// Auto-dismiss timeout applied to every notification.
pub const AUTO_DISMISS: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification backend error: {0}")]
    Backend(String),

    #[error("notifications unsupported on this platform")]
    Unsupported,
}

/// Trait for showing platform notifications. Enables mock injection for
/// testing.
pub trait NotifyBackend: Send + Sync {
    /// Whether the platform capability exists at all.
    fn supported(&self) -> bool;

    /// Query/request permission from the platform.
    fn request_permission(&self) -> NotificationPermissionState;

    /// Display a notification with the standard auto-dismiss timeout.
    /// A click sends a navigation intent for the referenced message.
    fn show(
        &self,
        notification: &InboxNotification,
        nav_tx: &UnboundedSender<NavigationIntent>,
    ) -> Result<(), NotifyError>;
}

/// Short audible cue played on every parsed arrival, independent of the
/// desktop-notification enable state.
pub trait AudioCue: Send + Sync {
    fn play(&self);
}

// ─── Real backends ────────────────────────────────────────────────

/// Desktop notifications via the freedesktop/macOS notification service.
#[derive(Debug, Default)]
pub struct DesktopBackend;

impl DesktopBackend {
    pub fn new() -> Self {
        Self
    }
}

impl NotifyBackend for DesktopBackend {
    fn supported(&self) -> bool {
        cfg!(any(
            all(unix, not(target_os = "macos")),
            target_os = "macos",
            target_os = "windows"
        ))
    }

    fn request_permission(&self) -> NotificationPermissionState {
        // The freedesktop service has no permission prompt: present means
        // granted, absent means denied.
        if self.supported() {
            NotificationPermissionState::Granted
        } else {
            NotificationPermissionState::Denied
        }
    }

    fn show(
        &self,
        notification: &InboxNotification,
        nav_tx: &UnboundedSender<NavigationIntent>,
    ) -> Result<(), NotifyError> {
        let title = notification.title.clone();
        let body = notification.body.clone();
        let message_id = notification.message_id.clone();
        let tx = nav_tx.clone();

        // show() does blocking D-Bus I/O and wait_for_action blocks until
        // click or dismissal; both stay off the async runtime. Display is
        // fire-and-forget: backend failures are logged, not returned.
        tokio::task::spawn_blocking(move || {
            let mut builder = notify_rust::Notification::new();
            builder
                .appname("mailwatch")
                .summary(&title)
                .body(&body)
                .timeout(notify_rust::Timeout::Milliseconds(
                    AUTO_DISMISS.as_millis() as u32,
                ));

            #[cfg(all(unix, not(target_os = "macos")))]
            {
                builder.action("default", "Open");
                match builder.show() {
                    Ok(handle) => {
                        handle.wait_for_action(|action| {
                            if action == "default" {
                                let _ = tx.send(NavigationIntent { message_id });
                            }
                        });
                    }
                    Err(e) => tracing::warn!(error = %e, "notification show failed"),
                }
            }

            #[cfg(not(all(unix, not(target_os = "macos"))))]
            {
                let _ = (tx, message_id);
                if let Err(e) = builder.show() {
                    tracing::warn!(error = %e, "notification show failed");
                }
            }
        });

        Ok(())
    }
}

/// Terminal-bell rendition of the arrival cue.
#[derive(Debug, Default)]
pub struct TerminalBell;

impl AudioCue for TerminalBell {
    fn play(&self) {
        use std::io::Write;
        let mut out = std::io::stdout();
        let _ = out.write_all(b"\x07");
        let _ = out.flush();
    }
}
