use anyhow::Error;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Progress of one onboarding track. The welcome and technical tracks are
/// independent; nothing couples their transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStatus {
    Pending,
    InProgress,
    Completed,
}

impl OnboardingStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OnboardingStatus::Pending => "pending",
            OnboardingStatus::InProgress => "in_progress",
            OnboardingStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "pending" => Ok(OnboardingStatus::Pending),
            "in_progress" => Ok(OnboardingStatus::InProgress),
            "completed" => Ok(OnboardingStatus::Completed),
            _ => Err(Error::msg(format!("Unknown onboarding status: {}", s))),
        }
    }
}

impl fmt::Display for OnboardingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingTrack {
    Welcome,
    Technical,
}

impl OnboardingTrack {
    pub fn as_str(&self) -> &str {
        match self {
            OnboardingTrack::Welcome => "welcome",
            OnboardingTrack::Technical => "technical",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "welcome" => Ok(OnboardingTrack::Welcome),
            "technical" => Ok(OnboardingTrack::Technical),
            _ => Err(Error::msg(format!("Unknown onboarding type: {}", s))),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Collaborator {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub hire_date: NaiveDate,
    pub welcome_onboarding_status: OnboardingStatus,
    pub technical_onboarding_status: OnboardingStatus,
    pub technical_onboarding_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbCollaborator {
    pub id: Option<i64>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub hire_date: Option<NaiveDate>,
    pub welcome_onboarding_status: Option<String>,
    pub technical_onboarding_status: Option<String>,
    pub technical_onboarding_date: Option<NaiveDate>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbCollaborator> for Collaborator {
    fn from(db: DbCollaborator) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            full_name: db.full_name.unwrap_or_default(),
            email: db.email.unwrap_or_default(),
            hire_date: db.hire_date.unwrap_or_default(),
            welcome_onboarding_status: db
                .welcome_onboarding_status
                .as_deref()
                .and_then(|s| OnboardingStatus::from_str(s).ok())
                .unwrap_or(OnboardingStatus::Pending),
            technical_onboarding_status: db
                .technical_onboarding_status
                .as_deref()
                .and_then(|s| OnboardingStatus::from_str(s).ok())
                .unwrap_or(OnboardingStatus::Pending),
            technical_onboarding_date: db.technical_onboarding_date,
            created_at: db
                .created_at
                .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
                .unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    JourneyToCloud,
    ChapterTechnical,
    Workshop,
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::JourneyToCloud => "journey_to_cloud",
            EventType::ChapterTechnical => "chapter_technical",
            EventType::Workshop => "workshop",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "journey_to_cloud" => Ok(EventType::JourneyToCloud),
            "chapter_technical" => Ok(EventType::ChapterTechnical),
            "workshop" => Ok(EventType::Workshop),
            _ => Err(Error::msg(format!("Unknown event type: {}", s))),
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            EventType::JourneyToCloud => "Journey to Cloud",
            EventType::ChapterTechnical => "Technical Chapter",
            EventType::Workshop => "Workshop",
        }
    }
}

/// Stored as 'scheduled' at creation; the other variants exist for display
/// paths that derive a state from the event dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Scheduled,
    Active,
    Upcoming,
    Completed,
}

impl EventStatus {
    pub fn as_str(&self) -> &str {
        match self {
            EventStatus::Scheduled => "scheduled",
            EventStatus::Active => "active",
            EventStatus::Upcoming => "upcoming",
            EventStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "scheduled" => Ok(EventStatus::Scheduled),
            "active" => Ok(EventStatus::Active),
            "upcoming" => Ok(EventStatus::Upcoming),
            "completed" => Ok(EventStatus::Completed),
            _ => Err(Error::msg(format!("Unknown event status: {}", s))),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CalendarEvent {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub event_type: EventType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub location: Option<String>,
    pub responsible_email: String,
    pub max_participants: i64,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbCalendarEvent {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub event_type: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub responsible_email: Option<String>,
    pub max_participants: Option<i64>,
    pub status: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbCalendarEvent> for CalendarEvent {
    fn from(db: DbCalendarEvent) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            title: db.title.unwrap_or_default(),
            description: db.description,
            event_type: db
                .event_type
                .as_deref()
                .and_then(|s| EventType::from_str(s).ok())
                .unwrap_or(EventType::Workshop),
            start_date: db.start_date.unwrap_or_default(),
            end_date: db.end_date.unwrap_or_default(),
            location: db.location,
            responsible_email: db.responsible_email.unwrap_or_default(),
            max_participants: db.max_participants.unwrap_or(20),
            status: db
                .status
                .as_deref()
                .and_then(|s| EventStatus::from_str(s).ok())
                .unwrap_or(EventStatus::Scheduled),
            created_at: db
                .created_at
                .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
                .unwrap_or_else(Utc::now),
        }
    }
}
