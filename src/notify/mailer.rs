//! Mail sender abstraction.

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;

use crate::{Result, SharegateError};

/// A single outbound mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    /// Recipient addresses.
    pub to: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

/// Delivers mails. Implementations must be cheap to share across tasks.
pub trait Mailer: Send + Sync {
    /// Send `mail` from `from`.
    fn send<'a>(&'a self, from: &'a str, mail: &'a Mail) -> BoxFuture<'a, Result<()>>;
}

/// Writes every mail to the log instead of a mail server.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send<'a>(&'a self, from: &'a str, mail: &'a Mail) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            tracing::info!(
                from = %from,
                to = ?mail.to,
                subject = %mail.subject,
                "Mail dispatched:\n{}",
                mail.body
            );
            Ok(())
        })
    }
}

/// Keeps delivered mails in memory; optionally fails the first N attempts.
#[derive(Debug, Clone, Default)]
pub struct RecordingMailer {
    inner: Arc<Mutex<RecordingState>>,
}

#[derive(Debug, Default)]
struct RecordingState {
    sent: Vec<Mail>,
    attempts: usize,
    failures_left: usize,
}

impl RecordingMailer {
    /// A mailer that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose first `failures` attempts fail.
    pub fn failing(failures: usize) -> Self {
        let mailer = Self::default();
        mailer.lock().failures_left = failures;
        mailer
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecordingState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mails delivered so far.
    pub fn sent(&self) -> Vec<Mail> {
        self.lock().sent.clone()
    }

    /// Attempts made so far, including failed ones.
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }
}

impl Mailer for RecordingMailer {
    fn send<'a>(&'a self, _from: &'a str, mail: &'a Mail) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.lock();
            state.attempts += 1;
            if state.failures_left > 0 {
                state.failures_left -= 1;
                return Err(SharegateError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "mail server unavailable",
                )));
            }
            state.sent.push(mail.clone());
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_mail() -> Mail {
        Mail {
            to: vec!["ops@example.com".to_string()],
            subject: "Hello".to_string(),
            body: "Body".to_string(),
        }
    }

    #[tokio::test]
    async fn test_log_mailer_always_succeeds() {
        assert!(LogMailer.send("noreply@localhost", &sample_mail()).await.is_ok());
    }

    #[tokio::test]
    async fn test_recording_mailer_fails_then_records() {
        let mailer = RecordingMailer::failing(1);
        let mail = sample_mail();

        assert!(mailer.send("from", &mail).await.is_err());
        assert!(mailer.send("from", &mail).await.is_ok());

        assert_eq!(mailer.attempts(), 2);
        assert_eq!(mailer.sent(), vec![mail]);
    }
}
