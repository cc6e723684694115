use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::{Pool, QueryBuilder, Sqlite};
use tracing::{info, instrument};

use crate::auth::{DbUserAccount, Role, UserAccount};
use crate::config::InitialAdmin;
use crate::error::AppError;
use crate::models::{
    CalendarEvent, Collaborator, DbCalendarEvent, DbCollaborator, EventType, OnboardingStatus,
    OnboardingTrack,
};

fn map_unique(err: sqlx::Error, message: &str) -> AppError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return AppError::Conflict(message.to_string());
        }
    }
    AppError::Database(err)
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[instrument(skip(pool))]
pub async fn count_users(pool: &Pool<Sqlite>) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Registers a new account. The first account ever created becomes the
/// admin; everyone after that starts as a viewer. Runs in one transaction
/// so the role decision and the insert cannot interleave with a concurrent
/// registration; the UNIQUE constraints are the duplicate guarantee, the
/// pre-insert lookup only gives a friendlier message.
#[instrument(skip_all, fields(username, email))]
pub async fn register_user(
    pool: &Pool<Sqlite>,
    full_name: &str,
    email: &str,
    username: &str,
    password: &str,
) -> Result<UserAccount, AppError> {
    info!("Registering new user");

    let mut tx = pool.begin().await?;

    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM users WHERE username = ? OR email = ?")
            .bind(username)
            .bind(email)
            .fetch_optional(&mut *tx)
            .await?;

    if existing.is_some() {
        return Err(AppError::Conflict(
            "Username or email is already registered".to_string(),
        ));
    }

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&mut *tx)
        .await?;

    let role = if count == 0 { Role::Admin } else { Role::Viewer };

    let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    let res = sqlx::query(
        "INSERT INTO users (full_name, email, username, password_hash, role) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(full_name)
    .bind(email)
    .bind(username)
    .bind(password_hash.as_str())
    .bind(role.as_str())
    .execute(&mut *tx)
    .await
    .map_err(|e| map_unique(e, "Username or email is already registered"))?;

    tx.commit().await?;

    let id = res.last_insert_rowid();
    info!(user_id = id, role = %role, "User registered");

    Ok(UserAccount {
        id,
        full_name: full_name.to_string(),
        email: email.to_string(),
        username: username.to_string(),
        password_hash,
        role,
        is_active: true,
        last_login: None,
    })
}

/// Looks up an active account by username OR email, for login.
#[instrument(skip(pool))]
pub async fn find_active_user_by_login(
    pool: &Pool<Sqlite>,
    identifier: &str,
) -> Result<Option<UserAccount>, AppError> {
    info!("Looking up active user for login");

    let row = sqlx::query_as::<_, DbUserAccount>(
        "SELECT id, full_name, email, username, password_hash, role, is_active, last_login \
         FROM users WHERE (username = ? OR email = ?) AND is_active = 1",
    )
    .bind(identifier)
    .bind(identifier)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(UserAccount::from))
}

#[instrument(skip(pool))]
pub async fn get_active_user(
    pool: &Pool<Sqlite>,
    id: i64,
) -> Result<Option<UserAccount>, AppError> {
    let row = sqlx::query_as::<_, DbUserAccount>(
        "SELECT id, full_name, email, username, password_hash, role, is_active, last_login \
         FROM users WHERE id = ? AND is_active = 1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(UserAccount::from))
}

#[instrument(skip(pool))]
pub async fn touch_last_login(pool: &Pool<Sqlite>, user_id: i64) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET last_login = datetime('now') WHERE id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

#[instrument(skip(pool))]
pub async fn get_password_hash(pool: &Pool<Sqlite>, user_id: i64) -> Result<String, AppError> {
    let hash: Option<String> = sqlx::query_scalar("SELECT password_hash FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    hash.ok_or_else(|| AppError::NotFound(format!("User with id {} not found", user_id)))
}

#[instrument(skip_all, fields(user_id))]
pub async fn update_user_password(
    pool: &Pool<Sqlite>,
    user_id: i64,
    new_password: &str,
) -> Result<(), AppError> {
    info!("Updating user password");
    let hashed_password = bcrypt::hash(new_password, bcrypt::DEFAULT_COST)?;

    sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(hashed_password)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Emails of every active admin and manager, for alert fan-out.
#[instrument(skip(pool))]
pub async fn staff_alert_emails(pool: &Pool<Sqlite>) -> Result<Vec<String>, AppError> {
    let emails: Vec<String> = sqlx::query_scalar(
        "SELECT email FROM users WHERE role IN ('admin', 'manager') AND is_active = 1",
    )
    .fetch_all(pool)
    .await?;

    Ok(emails)
}

/// Creates the configured admin account when the user table is empty.
/// Replaces the hardcoded development login the original system carried.
#[instrument(skip_all)]
pub async fn seed_initial_admin(
    pool: &Pool<Sqlite>,
    admin: &InitialAdmin,
) -> Result<bool, AppError> {
    if count_users(pool).await? > 0 {
        return Ok(false);
    }

    register_user(
        pool,
        &admin.full_name,
        &admin.email,
        &admin.username,
        &admin.password,
    )
    .await?;

    info!(username = %admin.username, "Seeded initial admin account");
    Ok(true)
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

pub struct NewCollaborator {
    pub full_name: String,
    pub email: String,
    pub hire_date: NaiveDate,
    pub welcome_onboarding_status: OnboardingStatus,
    pub technical_onboarding_status: OnboardingStatus,
    pub technical_onboarding_date: Option<NaiveDate>,
}

/// Partial update. `technical_onboarding_date` is doubly optional: absent
/// means leave untouched, `Some(None)` clears the column.
#[derive(Default)]
pub struct CollaboratorChanges {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub hire_date: Option<NaiveDate>,
    pub welcome_onboarding_status: Option<OnboardingStatus>,
    pub technical_onboarding_status: Option<OnboardingStatus>,
    pub technical_onboarding_date: Option<Option<NaiveDate>>,
}

impl CollaboratorChanges {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.email.is_none()
            && self.hire_date.is_none()
            && self.welcome_onboarding_status.is_none()
            && self.technical_onboarding_status.is_none()
            && self.technical_onboarding_date.is_none()
    }
}

#[instrument(skip(pool))]
pub async fn list_collaborators(
    pool: &Pool<Sqlite>,
    search: Option<&str>,
    status: Option<OnboardingStatus>,
) -> Result<Vec<Collaborator>, AppError> {
    info!("Listing collaborators");

    let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM collaborators WHERE 1=1");

    if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        qb.push(" AND (full_name LIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR email LIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }

    if let Some(status) = status {
        // A match on either track qualifies the row.
        qb.push(" AND (welcome_onboarding_status = ");
        qb.push_bind(status.as_str().to_string());
        qb.push(" OR technical_onboarding_status = ");
        qb.push_bind(status.as_str().to_string());
        qb.push(")");
    }

    qb.push(" ORDER BY hire_date DESC");

    let rows = qb
        .build_query_as::<DbCollaborator>()
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(Collaborator::from).collect())
}

#[instrument(skip(pool))]
pub async fn get_collaborator(pool: &Pool<Sqlite>, id: i64) -> Result<Collaborator, AppError> {
    info!("Fetching collaborator by ID");

    let row = sqlx::query_as::<_, DbCollaborator>("SELECT * FROM collaborators WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(collaborator) => Ok(Collaborator::from(collaborator)),
        _ => Err(AppError::NotFound(format!(
            "Collaborator with id {} not found",
            id
        ))),
    }
}

#[instrument(skip_all, fields(email = %new.email))]
pub async fn create_collaborator(
    pool: &Pool<Sqlite>,
    new: &NewCollaborator,
) -> Result<Collaborator, AppError> {
    info!("Creating collaborator");

    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM collaborators WHERE email = ?")
        .bind(&new.email)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Err(AppError::Conflict(
            "Email is already registered".to_string(),
        ));
    }

    let res = sqlx::query(
        "INSERT INTO collaborators \
         (full_name, email, hire_date, welcome_onboarding_status, \
          technical_onboarding_status, technical_onboarding_date) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&new.full_name)
    .bind(&new.email)
    .bind(new.hire_date)
    .bind(new.welcome_onboarding_status.as_str())
    .bind(new.technical_onboarding_status.as_str())
    .bind(new.technical_onboarding_date)
    .execute(pool)
    .await
    .map_err(|e| map_unique(e, "Email is already registered"))?;

    get_collaborator(pool, res.last_insert_rowid()).await
}

#[instrument(skip(pool, changes))]
pub async fn update_collaborator(
    pool: &Pool<Sqlite>,
    id: i64,
    changes: &CollaboratorChanges,
) -> Result<(), AppError> {
    info!("Updating collaborator");

    if changes.is_empty() {
        return Err(AppError::Validation(
            "No recognized fields to update".to_string(),
        ));
    }

    // Completing the technical track without an explicit date stamps today.
    let technical_date = match (
        changes.technical_onboarding_status,
        &changes.technical_onboarding_date,
    ) {
        (_, Some(explicit)) => Some(*explicit),
        (Some(OnboardingStatus::Completed), None) => Some(Some(Utc::now().date_naive())),
        _ => None,
    };

    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE collaborators SET ");
    let mut fields = qb.separated(", ");

    if let Some(full_name) = &changes.full_name {
        fields.push("full_name = ");
        fields.push_bind_unseparated(full_name.clone());
    }
    if let Some(email) = &changes.email {
        fields.push("email = ");
        fields.push_bind_unseparated(email.clone());
    }
    if let Some(hire_date) = changes.hire_date {
        fields.push("hire_date = ");
        fields.push_bind_unseparated(hire_date);
    }
    if let Some(status) = changes.welcome_onboarding_status {
        fields.push("welcome_onboarding_status = ");
        fields.push_bind_unseparated(status.as_str().to_string());
    }
    if let Some(status) = changes.technical_onboarding_status {
        fields.push("technical_onboarding_status = ");
        fields.push_bind_unseparated(status.as_str().to_string());
    }
    if let Some(date) = technical_date {
        fields.push("technical_onboarding_date = ");
        fields.push_bind_unseparated(date);
    }

    qb.push(" WHERE id = ");
    qb.push_bind(id);

    let res = qb
        .build()
        .execute(pool)
        .await
        .map_err(|e| map_unique(e, "Email is already registered"))?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Collaborator with id {} not found",
            id
        )));
    }

    Ok(())
}

#[instrument(skip(pool))]
pub async fn delete_collaborator(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting collaborator");

    let res = sqlx::query("DELETE FROM collaborators WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Collaborator with id {} not found",
            id
        )));
    }

    Ok(())
}

/// Marks one track completed. Idempotent: completing an already-completed
/// track succeeds and leaves the row unchanged. The technical track also
/// stamps today's date.
#[instrument(skip(pool))]
pub async fn complete_onboarding(
    pool: &Pool<Sqlite>,
    id: i64,
    track: OnboardingTrack,
) -> Result<(), AppError> {
    info!(track = track.as_str(), "Completing onboarding track");

    let res = match track {
        OnboardingTrack::Welcome => {
            sqlx::query("UPDATE collaborators SET welcome_onboarding_status = ? WHERE id = ?")
                .bind(OnboardingStatus::Completed.as_str())
                .bind(id)
                .execute(pool)
                .await?
        }
        OnboardingTrack::Technical => sqlx::query(
            "UPDATE collaborators SET technical_onboarding_status = ?, \
             technical_onboarding_date = ? WHERE id = ?",
        )
        .bind(OnboardingStatus::Completed.as_str())
        .bind(Utc::now().date_naive())
        .bind(id)
        .execute(pool)
        .await?,
    };

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Collaborator with id {} not found",
            id
        )));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Calendar events
// ---------------------------------------------------------------------------

pub struct NewCalendarEvent {
    pub title: String,
    pub description: Option<String>,
    pub event_type: EventType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub location: Option<String>,
    pub responsible_email: String,
    pub max_participants: i64,
}

#[instrument(skip(pool))]
pub async fn list_events(
    pool: &Pool<Sqlite>,
    year: Option<i32>,
    event_type: Option<EventType>,
) -> Result<Vec<CalendarEvent>, AppError> {
    info!("Listing calendar events");

    let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM onboarding_events WHERE 1=1");

    if let Some(year) = year {
        qb.push(" AND strftime('%Y', start_date) = ");
        qb.push_bind(format!("{:04}", year));
    }

    if let Some(event_type) = event_type {
        qb.push(" AND event_type = ");
        qb.push_bind(event_type.as_str().to_string());
    }

    qb.push(" ORDER BY start_date ASC");

    let rows = qb
        .build_query_as::<DbCalendarEvent>()
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(CalendarEvent::from).collect())
}

#[instrument(skip(pool))]
pub async fn get_event(pool: &Pool<Sqlite>, id: i64) -> Result<CalendarEvent, AppError> {
    let row = sqlx::query_as::<_, DbCalendarEvent>("SELECT * FROM onboarding_events WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(event) => Ok(CalendarEvent::from(event)),
        _ => Err(AppError::NotFound(format!("Event with id {} not found", id))),
    }
}

#[instrument(skip_all, fields(title = %new.title))]
pub async fn create_event(
    pool: &Pool<Sqlite>,
    new: &NewCalendarEvent,
) -> Result<CalendarEvent, AppError> {
    info!("Creating calendar event");

    let res = sqlx::query(
        "INSERT INTO onboarding_events \
         (title, description, event_type, start_date, end_date, location, \
          responsible_email, max_participants, status) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'scheduled')",
    )
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.event_type.as_str())
    .bind(new.start_date)
    .bind(new.end_date)
    .bind(&new.location)
    .bind(&new.responsible_email)
    .bind(new.max_participants)
    .execute(pool)
    .await?;

    get_event(pool, res.last_insert_rowid()).await
}

/// Scheduled events starting between today and today + `days`, ascending.
#[instrument(skip(pool))]
pub async fn upcoming_events(
    pool: &Pool<Sqlite>,
    days: i64,
) -> Result<Vec<CalendarEvent>, AppError> {
    info!("Fetching upcoming events");

    let rows = sqlx::query_as::<_, DbCalendarEvent>(
        "SELECT * FROM onboarding_events \
         WHERE start_date BETWEEN date('now') AND date('now', '+' || ? || ' days') \
         AND status = 'scheduled' \
         ORDER BY start_date ASC",
    )
    .bind(days)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(CalendarEvent::from).collect())
}

#[derive(sqlx::FromRow, Serialize, serde::Deserialize, Debug, Default, PartialEq, Eq)]
pub struct EventWindowStats {
    pub total_events: i64,
    pub events_next_7_days: i64,
    pub events_today: i64,
}

#[instrument(skip(pool))]
pub async fn event_window_stats(pool: &Pool<Sqlite>) -> Result<EventWindowStats, AppError> {
    let stats = sqlx::query_as::<_, EventWindowStats>(
        "SELECT COUNT(*) AS total_events, \
         COALESCE(SUM(CASE WHEN start_date <= date('now', '+7 days') THEN 1 ELSE 0 END), 0) \
             AS events_next_7_days, \
         COALESCE(SUM(CASE WHEN start_date = date('now') THEN 1 ELSE 0 END), 0) AS events_today \
         FROM onboarding_events WHERE start_date >= date('now')",
    )
    .fetch_one(pool)
    .await?;

    Ok(stats)
}
