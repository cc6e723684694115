use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};

use crate::db::{self, EventWindowStats};
use crate::error::AppError;
use crate::mail::{MailBackend, OutgoingEmail, new_event_alert_html, test_alert_html};
use crate::models::CalendarEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientKind {
    Responsible,
    SystemMailbox,
    Staff,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub email: String,
    pub kind: RecipientKind,
}

/// Resolves the recipient set for a new-event alert: the responsible party
/// first, then the system mailbox, then every active admin/manager.
/// Later entries that duplicate an earlier address are dropped, so the set
/// never contains the same email twice.
pub fn resolve_recipients(
    responsible_email: &str,
    system_mailbox: Option<&str>,
    staff_emails: &[String],
) -> Vec<Recipient> {
    let mut recipients: Vec<Recipient> = Vec::new();

    let mut push_unique = |email: &str, kind: RecipientKind, out: &mut Vec<Recipient>| {
        let email = email.trim();
        if email.is_empty() {
            return;
        }
        if out.iter().any(|r| r.email.eq_ignore_ascii_case(email)) {
            return;
        }
        out.push(Recipient {
            email: email.to_string(),
            kind,
        });
    };

    push_unique(responsible_email, RecipientKind::Responsible, &mut recipients);

    if let Some(mailbox) = system_mailbox {
        push_unique(mailbox, RecipientKind::SystemMailbox, &mut recipients);
    }

    for email in staff_emails {
        push_unique(email, RecipientKind::Staff, &mut recipients);
    }

    recipients
}

fn subject_for(kind: RecipientKind, title: &str) -> String {
    match kind {
        RecipientKind::Responsible => format!("New Event Assigned: {}", title),
        RecipientKind::SystemMailbox => format!("Onboarding System: New Event - {}", title),
        RecipientKind::Staff => format!("New Technical Event: {}", title),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SendOutcome {
    pub recipient: String,
    pub kind: RecipientKind,
    pub success: bool,
    pub error: Option<String>,
}

/// Structured result of one fan-out run. Event creation never depends on
/// it; callers that care can surface partial failures.
#[derive(Debug, Clone, Serialize, Default)]
pub struct DispatchReport {
    pub event_id: i64,
    pub outcomes: Vec<SendOutcome>,
}

impl DispatchReport {
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.success).count()
    }
}

/// Fans the new-event alert out to every resolved recipient. Each send is
/// isolated: one bad address is recorded as a failed outcome and the rest
/// still go out. A database failure while loading staff emails degrades to
/// the responsible/system recipients only.
#[instrument(skip_all, fields(event_id = event.id, title = %event.title))]
pub async fn send_new_event_alert(
    pool: &Pool<Sqlite>,
    mailer: &Arc<dyn MailBackend>,
    system_mailbox: Option<&str>,
    event: &CalendarEvent,
) -> DispatchReport {
    info!("Dispatching new-event alerts");

    let staff_emails = match db::staff_alert_emails(pool).await {
        Ok(emails) => emails,
        Err(err) => {
            warn!(error = %err, "Could not load staff emails, notifying core recipients only");
            Vec::new()
        }
    };

    let recipients = resolve_recipients(&event.responsible_email, system_mailbox, &staff_emails);
    let html_body = new_event_alert_html(event);

    let mut report = DispatchReport {
        event_id: event.id,
        outcomes: Vec::with_capacity(recipients.len()),
    };

    for recipient in recipients {
        let outcome = mailer
            .send(OutgoingEmail {
                to: recipient.email.clone(),
                subject: subject_for(recipient.kind, &event.title),
                html_body: html_body.clone(),
            })
            .await;

        match outcome {
            Ok(()) => {
                info!(recipient = %recipient.email, "Alert delivered");
                report.outcomes.push(SendOutcome {
                    recipient: recipient.email,
                    kind: recipient.kind,
                    success: true,
                    error: None,
                });
            }
            Err(err) => {
                warn!(recipient = %recipient.email, error = %err, "Alert delivery failed");
                report.outcomes.push(SendOutcome {
                    recipient: recipient.email,
                    kind: recipient.kind,
                    success: false,
                    error: Some(err.to_string()),
                });
            }
        }
    }

    info!(
        sent = report.outcomes.len() - report.failed(),
        failed = report.failed(),
        "Alert dispatch finished"
    );

    report
}

/// Fire-and-forget diagnostic send, independent of any event.
#[instrument(skip(mailer))]
pub async fn send_test_alert(
    mailer: &Arc<dyn MailBackend>,
    email: &str,
) -> Result<(), AppError> {
    info!("Sending test alert");

    mailer
        .send(OutgoingEmail {
            to: email.to_string(),
            subject: "Alert System Test - Onboarding System".to_string(),
            html_body: test_alert_html(),
        })
        .await
}

/// How soon an upcoming event starts, for display grouping.
pub fn alert_priority(days_until: i64) -> &'static str {
    match days_until {
        0 => "today",
        1 => "tomorrow",
        2..=7 => "this_week",
        _ => "upcoming",
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct UpcomingEvent {
    #[serde(flatten)]
    pub event: CalendarEvent,
    pub days_until: i64,
    pub alert_priority: &'static str,
}

pub fn annotate_upcoming(events: Vec<CalendarEvent>, today: NaiveDate) -> Vec<UpcomingEvent> {
    events
        .into_iter()
        .map(|event| {
            let days_until = (event.start_date - today).num_days();
            UpcomingEvent {
                days_until,
                alert_priority: alert_priority(days_until),
                event,
            }
        })
        .collect()
}

/// The upcoming-alerts read path degrades to an empty list on database
/// errors instead of failing the request. Non-critical display data only;
/// write paths never do this.
#[instrument(skip(pool))]
pub async fn upcoming_alerts_or_empty(pool: &Pool<Sqlite>, days: i64) -> Vec<UpcomingEvent> {
    match db::upcoming_events(pool, days).await {
        Ok(events) => annotate_upcoming(events, Utc::now().date_naive()),
        Err(err) => {
            warn!(error = %err, "Upcoming-alerts lookup failed, returning empty list");
            Vec::new()
        }
    }
}

#[instrument(skip(pool))]
pub async fn alert_stats_or_zero(pool: &Pool<Sqlite>) -> EventWindowStats {
    match db::event_window_stats(pool).await {
        Ok(stats) => stats,
        Err(err) => {
            warn!(error = %err, "Alert stats lookup failed, returning zeros");
            EventWindowStats::default()
        }
    }
}

/// Display records for one event's alerts. Alerts are not persisted; the
/// creation notice and the weekly reminder are derived from the event row.
#[derive(Serialize, Debug, Clone)]
pub struct AlertRecord {
    pub kind: &'static str,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<chrono::DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<NaiveDate>,
}

pub fn derived_alert_records(event: &CalendarEvent) -> Vec<AlertRecord> {
    vec![
        AlertRecord {
            kind: "creation",
            status: "sent",
            sent_at: Some(event.created_at),
            scheduled_for: None,
        },
        AlertRecord {
            kind: "weekly_reminder",
            status: "scheduled",
            sent_at: None,
            scheduled_for: Some(event.start_date - Duration::days(7)),
        },
    ]
}
