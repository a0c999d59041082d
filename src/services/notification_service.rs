use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, MAX_MAIL_BATCH};
use crate::error::Result;
use crate::models::progress::Session;
use crate::utils::time::weekday_name;

pub const ABSENCE_SUBJECT: &str = "Absence Notification";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub bcc: Vec<String>,
    pub subject: String,
    pub text: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<()>;
}

/// Posts each message as JSON to an HTTP mail relay.
pub struct HttpMailRelay {
    client: Client,
    url: String,
    token: Option<String>,
}

impl HttpMailRelay {
    pub fn new(url: String, token: Option<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client, url, token })
    }
}

#[async_trait]
impl MailTransport for HttpMailRelay {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let mut req = self.client.post(&self.url).json(mail);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req.send().await?.error_for_status()?;
        Ok(())
    }
}

/// Used when no relay is configured: messages are only logged.
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        tracing::info!(
            subject = %mail.subject,
            recipients = mail.bcc.len(),
            "mail relay not configured, message not sent"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub batches: usize,
    pub failed_batches: usize,
    pub delivered_recipients: usize,
}

pub fn absence_mail_text(date: NaiveDate, session: Session) -> String {
    format!(
        "You have been marked absent for {}, {}, {} session. Please meet the HOD with your parents to get in for the next session.",
        date.format("%Y-%m-%d"),
        weekday_name(date),
        session
    )
}

/// Drops blanks and repeated addresses (case-insensitive), then splits the
/// rest into chunks of at most `batch_size`.
pub fn absence_mail_batches(emails: &[String], batch_size: usize) -> Vec<Vec<String>> {
    let mut seen = HashSet::new();
    let unique: Vec<String> = emails
        .iter()
        .map(|e| e.trim())
        .filter(|e| !e.is_empty() && seen.insert(e.to_ascii_lowercase()))
        .map(str::to_string)
        .collect();

    unique
        .chunks(batch_size.clamp(1, MAX_MAIL_BATCH))
        .map(|chunk| chunk.to_vec())
        .collect()
}

#[derive(Clone)]
pub struct NotificationService {
    transport: Arc<dyn MailTransport>,
    from: String,
    batch_size: usize,
}

impl NotificationService {
    pub fn new(config: &Config) -> Result<Self> {
        let transport: Arc<dyn MailTransport> = match &config.mail_relay_url {
            Some(url) => Arc::new(HttpMailRelay::new(url.clone(), config.mail_relay_token.clone())?),
            None => {
                tracing::warn!("MAIL_RELAY_URL not set; absence emails will only be logged");
                Arc::new(LogTransport)
            }
        };
        Ok(Self::with_transport(transport, config.mail_from.clone(), config.mail_batch_size))
    }

    pub fn with_transport(transport: Arc<dyn MailTransport>, from: String, batch_size: usize) -> Self {
        Self {
            transport,
            from,
            batch_size,
        }
    }

    /// Sends every batch, even after a failed one.
    pub async fn send_absence_notices(
        &self,
        emails: &[String],
        date: NaiveDate,
        session: Session,
    ) -> DispatchReport {
        let text = absence_mail_text(date, session);
        let mut report = DispatchReport::default();

        for bcc in absence_mail_batches(emails, self.batch_size) {
            report.batches += 1;
            let recipients = bcc.len();
            let mail = OutgoingMail {
                from: self.from.clone(),
                to: self.from.clone(),
                bcc,
                subject: ABSENCE_SUBJECT.to_string(),
                text: text.clone(),
            };
            match self.transport.send(&mail).await {
                Ok(()) => report.delivered_recipients += recipients,
                Err(err) => {
                    report.failed_batches += 1;
                    tracing::warn!(batch = report.batches, recipients, error = %err, "absence mail batch failed");
                }
            }
        }

        tracing::info!(
            date = %date,
            session = %session,
            batches = report.batches,
            failed = report.failed_batches,
            delivered = report.delivered_recipients,
            "absence notices dispatched"
        );
        report
    }

    /// Fire-and-forget delivery on a background task.
    pub fn dispatch_absence_notices(&self, emails: Vec<String>, date: NaiveDate, session: Session) {
        if emails.is_empty() {
            return;
        }
        let service = self.clone();
        tokio::spawn(async move {
            service.send_absence_notices(&emails, date, session).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn addresses(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("student{}@college.edu", i)).collect()
    }

    #[test]
    fn batches_are_capped_and_deduplicated() {
        let mut emails = addresses(170);
        emails.push("STUDENT0@college.edu".into());
        emails.push("  ".into());
        let sizes: Vec<usize> = absence_mail_batches(&emails, 80).iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![80, 80, 10]);

        let oversized: Vec<usize> = absence_mail_batches(&addresses(100), 500).iter().map(Vec::len).collect();
        assert_eq!(oversized, vec![80, 20]);
        assert!(absence_mail_batches(&[], 80).is_empty());
    }

    #[test]
    fn message_names_date_weekday_and_session() {
        let date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        assert_eq!(
            absence_mail_text(date, Session::Afternoon),
            "You have been marked absent for 2024-07-01, Monday, afternoon session. Please meet the HOD with your parents to get in for the next session."
        );
    }

    #[tokio::test]
    async fn failed_batch_does_not_stop_the_rest() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut transport = MockMailTransport::new();
        transport.expect_send().times(3).returning(move |mail| {
            assert!(mail.bcc.len() <= 80);
            assert_eq!(mail.subject, ABSENCE_SUBJECT);
            if counter.fetch_add(1, Ordering::SeqCst) == 1 {
                Err(Error::Internal("relay down".into()))
            } else {
                Ok(())
            }
        });

        let service = NotificationService::with_transport(Arc::new(transport), "office@college.edu".into(), 80);
        let date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let report = service
            .send_absence_notices(&addresses(170), date, Session::Forenoon)
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            report,
            DispatchReport {
                batches: 3,
                failed_batches: 1,
                delivered_recipients: 90,
            }
        );
    }
}
