//! Outbound notifications.
//!
//! Mails are handed to a [`NotificationQueue`] and delivered in the
//! background by a [`Mailer`]. Delivery is at-least-once with a bounded
//! number of retries; a failed delivery is logged and never reported back to
//! the request that queued it.

mod mailer;
mod queue;
pub mod templates;

pub use mailer::{LogMailer, Mail, Mailer, RecordingMailer};
pub use queue::{NotificationQueue, RetryPolicy};
