//! Fire-and-forget notification queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{Mail, Mailer};
use crate::config::NotificationsConfig;

/// Retry behaviour for a single mail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Fixed pause between attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Build the policy from the `[notifications]` section.
    pub fn from_config(config: &NotificationsConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: Duration::from_secs(config.retry_backoff_secs),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_secs(300),
        }
    }
}

/// Handle for queueing outbound mail.
///
/// Cloning is cheap; all clones feed the same worker.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    sender: Option<mpsc::UnboundedSender<Mail>>,
}

impl NotificationQueue {
    /// Spawn the delivery worker on the current runtime.
    ///
    /// Each mail gets its own delivery task so that one mail sitting in
    /// backoff does not hold up the rest.
    pub fn start(mailer: Arc<dyn Mailer>, policy: RetryPolicy, from: impl Into<String>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Mail>();
        let from: Arc<str> = Arc::from(from.into());

        tokio::spawn(async move {
            while let Some(mail) = receiver.recv().await {
                let mailer = Arc::clone(&mailer);
                let from = Arc::clone(&from);
                tokio::spawn(async move {
                    deliver(mailer.as_ref(), &from, &mail, policy).await;
                });
            }
            debug!("Notification queue closed");
        });

        Self {
            sender: Some(sender),
        }
    }

    /// Build the queue described by the `[notifications]` section.
    pub fn from_config(config: &NotificationsConfig, mailer: Arc<dyn Mailer>) -> Self {
        if !config.enabled {
            info!("Notifications disabled");
            return Self::disabled();
        }
        Self::start(
            mailer,
            RetryPolicy::from_config(config),
            config.from_address.clone(),
        )
    }

    /// A queue that drops every mail.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Whether mails are actually delivered.
    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Queue a mail for background delivery. Never blocks, never fails.
    pub fn enqueue(&self, mail: Mail) {
        let Some(sender) = &self.sender else {
            debug!(subject = %mail.subject, "Notifications disabled, dropping mail");
            return;
        };

        if mail.to.is_empty() {
            debug!(subject = %mail.subject, "Mail has no recipients, dropping");
            return;
        }

        if let Err(e) = sender.send(mail) {
            warn!(
                subject = %e.0.subject,
                to = ?e.0.to,
                "Notification worker is gone, mail dropped"
            );
        }
    }
}

async fn deliver(mailer: &dyn Mailer, from: &str, mail: &Mail, policy: RetryPolicy) {
    let attempts = policy.max_retries + 1;

    for attempt in 1..=attempts {
        match mailer.send(from, mail).await {
            Ok(()) => {
                debug!(subject = %mail.subject, attempt, "Mail delivered");
                return;
            }
            Err(e) if attempt < attempts => {
                warn!(
                    subject = %mail.subject,
                    to = ?mail.to,
                    attempt,
                    error = %e,
                    "Mail delivery failed, retrying in {:?}",
                    policy.backoff
                );
                tokio::time::sleep(policy.backoff).await;
            }
            Err(e) => {
                error!(
                    subject = %mail.subject,
                    to = ?mail.to,
                    attempts,
                    error = %e,
                    operation = "notify",
                    "Mail delivery failed permanently"
                );
            }
        }
    }
}
