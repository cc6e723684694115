use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use lettre::message::MultiPart;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, instrument};

use crate::config::MailConfig;
use crate::error::AppError;
use crate::models::CalendarEvent;

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Outbound relay abstraction. The SMTP backend is the production path;
/// the memory backend records messages for tests.
#[async_trait]
pub trait MailBackend: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), AppError>;
}

pub struct SmtpBackend {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpBackend {
    pub fn new(config: &MailConfig) -> Result<Self, AppError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .timeout(Some(Duration::from_secs(config.send_timeout_secs)));

        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl MailBackend for SmtpBackend {
    #[instrument(skip_all, fields(to = %email.to, subject = %email.subject))]
    async fn send(&self, email: OutgoingEmail) -> Result<(), AppError> {
        info!("Sending email via SMTP");

        let from: lettre::message::Mailbox = format!("Onboarding System <{}>", self.from_address)
            .parse()
            .map_err(|e| AppError::Internal(format!("Invalid sender address: {}", e)))?;
        let to: lettre::message::Mailbox = email
            .to
            .parse()
            .map_err(|e| AppError::Validation(format!("Invalid recipient address: {}", e)))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(&email.subject)
            .multipart(MultiPart::alternative_plain_html(
                html_to_text(&email.html_body),
                email.html_body.clone(),
            ))?;

        self.transport.send(message).await?;

        info!("Email sent");
        Ok(())
    }
}

/// Records messages instead of delivering them; can be told to fail for
/// specific recipients so fan-out isolation is testable.
#[derive(Default)]
pub struct MemoryBackend {
    sent: Mutex<Vec<OutgoingEmail>>,
    failing_recipients: Mutex<Vec<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, recipient: &str) {
        self.failing_recipients
            .lock()
            .unwrap()
            .push(recipient.to_string());
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailBackend for MemoryBackend {
    async fn send(&self, email: OutgoingEmail) -> Result<(), AppError> {
        if self
            .failing_recipients
            .lock()
            .unwrap()
            .iter()
            .any(|r| r == &email.to)
        {
            return Err(AppError::ExternalService(format!(
                "Simulated delivery failure for {}",
                email.to
            )));
        }

        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

static LINE_BREAK_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>|</p>|<p>").unwrap());
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Plain-text alternative for HTML bodies: structural tags become line
/// breaks, everything else is stripped, basic entities are decoded.
pub fn html_to_text(html: &str) -> String {
    let text = LINE_BREAK_TAGS.replace_all(html, "\n");
    let text = ANY_TAG.replace_all(&text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"");
    EXCESS_NEWLINES.replace_all(&text, "\n\n").trim().to_string()
}

pub fn new_event_alert_html(event: &CalendarEvent) -> String {
    let duration_days = (event.end_date - event.start_date).num_days() + 1;

    let description = event
        .description
        .as_deref()
        .map(|d| format!("<p><strong>Description:</strong> {}</p>", d))
        .unwrap_or_default();
    let location = event
        .location
        .as_deref()
        .map(|l| format!("<p><strong>Location:</strong> {}</p>", l))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>New Technical Event Created</title>
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .header {{ background: #3498db; color: white; padding: 20px; border-radius: 8px 8px 0 0; }}
        .content {{ background: #f8f9fa; padding: 20px; border-radius: 0 0 8px 8px; }}
        .event-details {{ background: white; padding: 15px; border-left: 4px solid #3498db; margin: 15px 0; }}
        .footer {{ margin-top: 20px; padding-top: 20px; border-top: 1px solid #eee; font-size: 12px; color: #666; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h2>New Technical Event Created</h2>
        </div>
        <div class="content">
            <p>A new technical event has been added to the onboarding calendar:</p>
            <div class="event-details">
                <h3>{title}</h3>
                <p><strong>Type:</strong> {event_type}</p>
                <p><strong>Start date:</strong> {start_date}</p>
                <p><strong>End date:</strong> {end_date}</p>
                <p><strong>Duration:</strong> {duration_days} days</p>
                <p><strong>Responsible:</strong> {responsible}</p>
                {description}
                {location}
                <p><strong>Max participants:</strong> {max_participants}</p>
            </div>
            <p>The event is scheduled in the system calendar and will appear on the alerts page.</p>
            <div class="footer">
                <p>This is an automatic alert from the Onboarding Management System.</p>
                <p>&copy; {year} Onboarding System</p>
            </div>
        </div>
    </div>
</body>
</html>"#,
        title = event.title,
        event_type = event.event_type.display_name(),
        start_date = event.start_date,
        end_date = event.end_date,
        duration_days = duration_days,
        responsible = event.responsible_email,
        description = description,
        location = location,
        max_participants = event.max_participants,
        year = Utc::now().year(),
    )
}

pub fn test_alert_html() -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Alert System Test</title>
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; padding: 20px; background-color: #f4f4f4; }}
        .container {{ max-width: 600px; margin: 0 auto; background: white; padding: 30px; border-radius: 10px; }}
        .footer {{ margin-top: 30px; padding-top: 20px; border-top: 1px solid #eee; color: #666; font-size: 12px; text-align: center; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>Alert System Test</h1>
        <p>This is a test email verifying that the alert system is working.</p>
        <p><strong>Sent at:</strong> {sent_at}</p>
        <p>Alerts are sent automatically when new events are added to the calendar.</p>
        <div class="footer">
            <p>Automatic test from the Onboarding Management System.</p>
            <p>&copy; {year} Onboarding System</p>
        </div>
    </div>
</body>
</html>"#,
        sent_at = Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        year = Utc::now().year(),
    )
}
