#[cfg(test)]
mod tests {
    use crate::alerts::{
        RecipientKind, alert_priority, annotate_upcoming, derived_alert_records,
        resolve_recipients, send_new_event_alert,
    };
    use crate::mail::{MailBackend, MemoryBackend, html_to_text};
    use crate::models::{CalendarEvent, EventStatus, EventType};
    use crate::test::utils::test_utils::TestDbBuilder;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    fn sample_event(id: i64, responsible: &str) -> CalendarEvent {
        let start = Utc::now().date_naive() + Duration::days(14);
        CalendarEvent {
            id,
            title: "Sample Session".to_string(),
            description: Some("Hands-on onboarding session".to_string()),
            event_type: EventType::ChapterTechnical,
            start_date: start,
            end_date: start + Duration::days(4),
            location: Some("Room 4".to_string()),
            responsible_email: responsible.to_string(),
            max_participants: 20,
            status: EventStatus::Scheduled,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_recipients_never_duplicated() {
        // Responsible, system mailbox and one staff member are all the
        // same address: one send, attributed to the responsible party.
        let staff = vec!["lead@x.com".to_string(), "other@x.com".to_string()];
        let recipients = resolve_recipients("lead@x.com", Some("lead@x.com"), &staff);

        assert_eq!(recipients.len(), 2);
        assert_eq!(recipients[0].email, "lead@x.com");
        assert_eq!(recipients[0].kind, RecipientKind::Responsible);
        assert_eq!(recipients[1].email, "other@x.com");
        assert_eq!(recipients[1].kind, RecipientKind::Staff);
    }

    #[test]
    fn test_recipients_dedup_is_case_insensitive() {
        let staff = vec!["LEAD@X.COM".to_string()];
        let recipients = resolve_recipients("lead@x.com", None, &staff);
        assert_eq!(recipients.len(), 1);
    }

    #[test]
    fn test_recipients_skip_blank_addresses() {
        let staff = vec!["".to_string(), "admin@x.com".to_string()];
        let recipients = resolve_recipients("lead@x.com", Some(""), &staff);

        let emails: Vec<&str> = recipients.iter().map(|r| r.email.as_str()).collect();
        assert_eq!(emails, vec!["lead@x.com", "admin@x.com"]);
    }

    #[test]
    fn test_recipients_precedence_order() {
        let staff = vec!["admin@x.com".to_string()];
        let recipients = resolve_recipients("lead@x.com", Some("system@x.com"), &staff);

        assert_eq!(recipients[0].kind, RecipientKind::Responsible);
        assert_eq!(recipients[1].kind, RecipientKind::SystemMailbox);
        assert_eq!(recipients[2].kind, RecipientKind::Staff);
    }

    #[test]
    fn test_alert_priority_buckets() {
        assert_eq!(alert_priority(0), "today");
        assert_eq!(alert_priority(1), "tomorrow");
        assert_eq!(alert_priority(2), "this_week");
        assert_eq!(alert_priority(7), "this_week");
        assert_eq!(alert_priority(8), "upcoming");
    }

    #[test]
    fn test_annotate_upcoming_counts_days() {
        let today = Utc::now().date_naive();
        let mut event = sample_event(1, "lead@x.com");
        event.start_date = today + Duration::days(1);

        let annotated = annotate_upcoming(vec![event], today);
        assert_eq!(annotated[0].days_until, 1);
        assert_eq!(annotated[0].alert_priority, "tomorrow");
    }

    #[test]
    fn test_derived_alert_records() {
        let event = sample_event(7, "lead@x.com");
        let records = derived_alert_records(&event);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, "creation");
        assert_eq!(records[0].status, "sent");
        assert!(records[0].sent_at.is_some());
        assert_eq!(records[1].kind, "weekly_reminder");
        assert_eq!(
            records[1].scheduled_for,
            Some(event.start_date - Duration::days(7))
        );
    }

    #[rocket::async_test]
    async fn test_fan_out_isolates_per_recipient_failures() {
        let test_db = TestDbBuilder::new()
            .admin("admin_user")
            .manager("manager_user")
            .build()
            .await
            .unwrap();

        let memory = Arc::new(MemoryBackend::new());
        memory.fail_for("admin_user@onboarding.test");
        let mailer: Arc<dyn MailBackend> = memory.clone();

        let event = sample_event(1, "lead@x.com");
        let report =
            send_new_event_alert(&test_db.pool, &mailer, Some("system@x.com"), &event).await;

        // One failed outcome, everyone else still got their copy.
        assert_eq!(report.outcomes.len(), 4);
        assert_eq!(report.failed(), 1);

        let failed: Vec<&str> = report
            .outcomes
            .iter()
            .filter(|o| !o.success)
            .map(|o| o.recipient.as_str())
            .collect();
        assert_eq!(failed, vec!["admin_user@onboarding.test"]);

        let delivered: Vec<String> = memory.sent().iter().map(|m| m.to.clone()).collect();
        assert!(delivered.contains(&"lead@x.com".to_string()));
        assert!(delivered.contains(&"system@x.com".to_string()));
        assert!(delivered.contains(&"manager_user@onboarding.test".to_string()));
    }

    #[rocket::async_test]
    async fn test_fan_out_subjects_vary_by_recipient_kind() {
        let test_db = TestDbBuilder::new().build().await.unwrap();

        let memory = Arc::new(MemoryBackend::new());
        let mailer: Arc<dyn MailBackend> = memory.clone();

        let event = sample_event(1, "lead@x.com");
        send_new_event_alert(&test_db.pool, &mailer, Some("system@x.com"), &event).await;

        let sent = memory.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].subject.starts_with("New Event Assigned:"));
        assert!(sent[1].subject.starts_with("Onboarding System:"));
    }

    #[test]
    fn test_html_to_text_strips_markup() {
        let text = html_to_text("<p>Hello <strong>world</strong></p><br>Bye &amp; thanks");
        assert!(text.contains("Hello world"));
        assert!(text.contains("Bye & thanks"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn test_event_email_mentions_key_fields() {
        let event = sample_event(3, "lead@x.com");
        let html = crate::mail::new_event_alert_html(&event);

        assert!(html.contains("Sample Session"));
        assert!(html.contains("lead@x.com"));
        assert!(html.contains("Technical Chapter"));
        assert!(html.contains("5 days"));
    }
}
