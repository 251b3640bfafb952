//! mailwatch-notify: Single point of contact with the platform notification
//! capability. Normalizes capability absence, permission denial, and the
//! user-level disable preference into one `enabled` signal, and de-duplicates
//! alerts per message.

pub mod backend;
pub mod gateway;

pub use backend::{AudioCue, DesktopBackend, NotifyBackend, NotifyError, TerminalBell};
pub use gateway::{InboxNotification, NotificationGateway};
