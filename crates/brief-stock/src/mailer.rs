//! Delivery of the rendered report

use crate::config::MailSettings;
use crate::error::{Result, StockError};
use crate::render::{BodyFormat, RenderedReport};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::io::Write;
use tracing::{info, instrument};

/// Sends one finished report
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, report: &RenderedReport) -> Result<()>;
}

/// SMTP submission; implicit TLS on port 465, STARTTLS otherwise
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl SmtpMailer {
    pub fn from_settings(settings: &MailSettings) -> Result<Self> {
        let (Some(address), Some(password)) = (&settings.address, &settings.password) else {
            return Err(StockError::ConfigError(
                "EMAIL_ADDRESS and EMAIL_PASSWORD are required".to_string(),
            ));
        };

        let from: Mailbox = address.parse()?;
        let to = settings
            .effective_recipients()
            .iter()
            .map(|r| r.parse::<Mailbox>())
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let builder = if settings.smtp_port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_host)?
        };
        let transport = builder
            .port(settings.smtp_port)
            .credentials(Credentials::new(address.clone(), password.clone()))
            .build();

        Ok(Self { transport, from, to })
    }

    fn compose(&self, report: &RenderedReport) -> Result<Message> {
        compose_message(&self.from, &self.to, report)
    }
}

fn compose_message(from: &Mailbox, to: &[Mailbox], report: &RenderedReport) -> Result<Message> {
    let mut builder = Message::builder().from(from.clone()).subject(&report.subject);
    for recipient in to {
        builder = builder.to(recipient.clone());
    }
    let content_type = match report.format {
        BodyFormat::Html => ContentType::TEXT_HTML,
        BodyFormat::Text => ContentType::TEXT_PLAIN,
    };
    Ok(builder.header(content_type).body(report.body.clone())?)
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip(self, report), fields(subject = %report.subject))]
    async fn send(&self, report: &RenderedReport) -> Result<()> {
        let message = self.compose(report)?;
        self.transport.send(message).await?;
        info!("Report sent to {} recipient(s)", self.to.len());
        Ok(())
    }
}

/// Writes the report to stdout instead of sending it
#[derive(Debug, Default)]
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, report: &RenderedReport) -> Result<()> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "Subject: {}\n", report.subject)
            .and_then(|()| writeln!(out, "{}", report.body))
            .map_err(|e| StockError::MailError(format!("stdout: {e}")))?;
        info!("Dry run: report printed, not sent");
        Ok(())
    }
}
