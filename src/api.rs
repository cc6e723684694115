use chrono::{NaiveDate, Utc};
use rocket::FromForm;
use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use validator::Validate;

use crate::alerts::{
    self, AlertRecord, UpcomingEvent, derived_alert_records, send_new_event_alert,
};
use crate::auth::{BearerToken, CurrentUser, Permission, UserProfile};
use crate::auth::token::{decode_token, issue_token};
use crate::config::AppConfig;
use crate::db::{
    self, CollaboratorChanges, NewCalendarEvent, NewCollaborator, complete_onboarding,
    create_collaborator, create_event, delete_collaborator, find_active_user_by_login,
    get_active_user, get_collaborator, get_event, get_password_hash, list_collaborators,
    list_events, register_user, touch_last_login, update_collaborator, update_user_password,
    verify_password,
};
use crate::error::AppError;
use crate::mail::MailBackend;
use crate::models::{
    CalendarEvent, Collaborator, EventType, OnboardingStatus, OnboardingTrack,
};
use crate::validation::{
    AppErrorExt, JsonValidateExt, PermissionCheckExt, ToValidationResponse, ValidationResponse,
};

type ApiError = Custom<Json<ValidationResponse>>;

fn missing(field: &str) -> ApiError {
    Custom(
        Status::BadRequest,
        Json(ValidationResponse::with_error(field, "This field is required")),
    )
}

fn required_text(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(v) => Ok(v),
        _ => Err(missing(field)),
    }
}

#[derive(Serialize, Deserialize)]
pub struct SimpleResponse {
    pub success: bool,
    pub message: String,
}

impl SimpleResponse {
    fn ok(message: &str) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Deserialize, Validate, Clone)]
pub struct RegisterRequest {
    full_name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    email: Option<String>,
    username: Option<String>,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    password: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub user: UserProfile,
}

#[post("/auth/register", data = "<registration>")]
pub async fn api_register(
    registration: Json<RegisterRequest>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Custom<Json<AuthResponse>>, ApiError> {
    let validated = registration.validate_custom()?;

    let full_name = required_text(validated.full_name, "full_name")?;
    let email = required_text(validated.email, "email")?;
    let username = required_text(validated.username, "username")?;
    let password = validated.password.filter(|p| !p.is_empty()).ok_or_else(|| missing("password"))?;

    let user = register_user(db, &full_name, &email, &username, &password)
        .await
        .validate_custom()?;

    let token = issue_token(&user, &config.jwt_secret, config.token_ttl_hours).validate_custom()?;

    Ok(Custom(
        Status::Created,
        Json(AuthResponse {
            success: true,
            message: "User registered successfully".to_string(),
            token,
            user: user.profile(),
        }),
    ))
}

#[derive(Deserialize, Validate, Clone)]
pub struct LoginRequest {
    /// Username or email; both identify an account.
    username: Option<String>,
    password: Option<String>,
}

#[post("/auth/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Json<AuthResponse>, ApiError> {
    let validated = login.validate_custom()?;

    let identifier = required_text(validated.username, "username")?;
    let password = validated.password.filter(|p| !p.is_empty()).ok_or_else(|| missing("password"))?;

    let user = find_active_user_by_login(db, &identifier)
        .await
        .validate_custom()?
        .ok_or_else(|| {
            AppError::Authentication("User not found or inactive".to_string())
                .to_validation_response()
        })?;

    if !verify_password(&password, &user.password_hash) {
        return Err(
            AppError::Authentication("Incorrect password".to_string()).to_validation_response()
        );
    }

    touch_last_login(db, user.id).await.validate_custom()?;

    let token = issue_token(&user, &config.jwt_secret, config.token_ttl_hours).validate_custom()?;

    Ok(Json(AuthResponse {
        success: true,
        message: "Login successful".to_string(),
        token,
        user: user.profile(),
    }))
}

#[derive(Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[post("/auth/verify")]
pub async fn api_verify(
    token: BearerToken,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Json<VerifyResponse>, Custom<Json<VerifyResponse>>> {
    let invalid = |message: &str| {
        Custom(
            Status::Unauthorized,
            Json(VerifyResponse {
                valid: false,
                user: None,
                error: Some(message.to_string()),
            }),
        )
    };

    let claims = decode_token(&token.0, &config.jwt_secret)
        .map_err(|_| invalid("Invalid or expired token"))?;

    // The token may outlive the account; re-check the row is still active.
    let user = get_active_user(db, claims.id)
        .await
        .map_err(|_| invalid("Could not verify user"))?
        .ok_or_else(|| invalid("User not found or inactive"))?;

    Ok(Json(VerifyResponse {
        valid: true,
        user: Some(user.profile()),
        error: None,
    }))
}

/// Stateless logout: the client discards its token. With no server-side
/// session table the token stays valid until natural expiry; this is a
/// documented limitation, not a revocation mechanism.
#[post("/auth/logout")]
pub async fn api_logout(_user: CurrentUser) -> Json<SimpleResponse> {
    SimpleResponse::ok("Session closed successfully")
}

#[derive(Deserialize, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    current_password: Option<String>,
    #[validate(length(min = 6, message = "New password must be at least 6 characters"))]
    new_password: Option<String>,
}

#[post("/auth/change-password", data = "<password>")]
pub async fn api_change_password(
    password: Json<ChangePasswordRequest>,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<SimpleResponse>, ApiError> {
    let validated = password.validate_custom()?;

    let current = required_text(validated.current_password, "currentPassword")?;
    let new_password = validated
        .new_password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| missing("newPassword"))?;

    let hash = get_password_hash(db, user.id).await.validate_custom()?;

    if !verify_password(&current, &hash) {
        return Err(AppError::Authentication("Current password is incorrect".to_string())
            .to_validation_response());
    }

    update_user_password(db, user.id, &new_password)
        .await
        .validate_custom()?;

    Ok(SimpleResponse::ok("Password updated successfully"))
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

fn parse_status_filter(status: Option<String>) -> Result<Option<OnboardingStatus>, AppError> {
    match status.as_deref().map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(value) => OnboardingStatus::from_str(value)
            .map(Some)
            .map_err(|e| AppError::Validation(e.to_string())),
    }
}

#[get("/collaborators?<search>&<status>")]
pub async fn api_get_collaborators(
    search: Option<String>,
    status: Option<String>,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Collaborator>>, ApiError> {
    user.require_permission(Permission::ViewCollaborators)
        .validate_custom()?;

    let status = parse_status_filter(status).validate_custom()?;

    let collaborators = list_collaborators(db, search.as_deref(), status)
        .await
        .validate_custom()?;

    Ok(Json(collaborators))
}

#[get("/collaborators/<id>")]
pub async fn api_get_collaborator(
    id: i64,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Collaborator>, Status> {
    user.require_permission(Permission::ViewCollaborators)?;

    let collaborator = get_collaborator(db, id).await?;

    Ok(Json(collaborator))
}

#[derive(Deserialize, Validate, Clone)]
pub struct CollaboratorCreateRequest {
    full_name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    email: Option<String>,
    hire_date: Option<NaiveDate>,
    welcome_onboarding_status: Option<String>,
    technical_onboarding_status: Option<String>,
    technical_onboarding_date: Option<NaiveDate>,
}

fn parse_status(value: Option<String>, field: &str) -> Result<Option<OnboardingStatus>, ApiError> {
    match value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(value) => OnboardingStatus::from_str(value).map(Some).map_err(|_| {
            Custom(
                Status::BadRequest,
                Json(ValidationResponse::with_error(field, "Unknown onboarding status")),
            )
        }),
    }
}

#[post("/collaborators", data = "<request>")]
pub async fn api_create_collaborator(
    request: Json<CollaboratorCreateRequest>,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<Collaborator>>, ApiError> {
    user.require_permission(Permission::ManageCollaborators)
        .validate_custom()?;

    let validated = request.validate_custom()?;

    let new = NewCollaborator {
        full_name: required_text(validated.full_name, "full_name")?,
        email: required_text(validated.email, "email")?,
        hire_date: validated.hire_date.ok_or_else(|| missing("hire_date"))?,
        welcome_onboarding_status: parse_status(
            validated.welcome_onboarding_status,
            "welcome_onboarding_status",
        )?
        .unwrap_or(OnboardingStatus::Pending),
        technical_onboarding_status: parse_status(
            validated.technical_onboarding_status,
            "technical_onboarding_status",
        )?
        .unwrap_or(OnboardingStatus::Pending),
        technical_onboarding_date: validated.technical_onboarding_date,
    };

    let collaborator = create_collaborator(db, &new).await.validate_custom()?;

    Ok(Custom(Status::Created, Json(collaborator)))
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: rocket::serde::Deserialize<'de>,
    D: rocket::serde::Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[derive(Deserialize, Validate, Clone)]
pub struct CollaboratorUpdateRequest {
    full_name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    email: Option<String>,
    hire_date: Option<NaiveDate>,
    welcome_onboarding_status: Option<String>,
    technical_onboarding_status: Option<String>,
    /// Absent leaves the date untouched; an explicit null clears it.
    #[serde(default, deserialize_with = "double_option")]
    technical_onboarding_date: Option<Option<NaiveDate>>,
}

#[put("/collaborators/<id>", data = "<request>")]
pub async fn api_update_collaborator(
    id: i64,
    request: Json<CollaboratorUpdateRequest>,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<SimpleResponse>, ApiError> {
    user.require_permission(Permission::ManageCollaborators)
        .validate_custom()?;

    let validated = request.validate_custom()?;

    let changes = CollaboratorChanges {
        full_name: validated.full_name,
        email: validated.email,
        hire_date: validated.hire_date,
        welcome_onboarding_status: parse_status(
            validated.welcome_onboarding_status,
            "welcome_onboarding_status",
        )?,
        technical_onboarding_status: parse_status(
            validated.technical_onboarding_status,
            "technical_onboarding_status",
        )?,
        technical_onboarding_date: validated.technical_onboarding_date,
    };

    update_collaborator(db, id, &changes).await.validate_custom()?;

    Ok(SimpleResponse::ok("Collaborator updated successfully"))
}

#[delete("/collaborators/<id>")]
pub async fn api_delete_collaborator(
    id: i64,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<SimpleResponse>, ApiError> {
    user.require_permission(Permission::DeleteCollaborators)
        .validate_custom()?;

    delete_collaborator(db, id).await.validate_custom()?;

    Ok(SimpleResponse::ok("Collaborator deleted successfully"))
}

#[derive(Deserialize, Clone)]
pub struct CompleteOnboardingRequest {
    #[serde(rename = "type")]
    track: Option<String>,
}

#[post("/collaborators/<id>/complete-onboarding", data = "<request>")]
pub async fn api_complete_onboarding(
    id: i64,
    request: Json<CompleteOnboardingRequest>,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<SimpleResponse>, ApiError> {
    user.require_permission(Permission::CompleteOnboarding)
        .validate_custom()?;

    let track = request
        .track
        .as_deref()
        .and_then(|t| OnboardingTrack::from_str(t).ok())
        .ok_or_else(|| {
            Custom(
                Status::BadRequest,
                Json(ValidationResponse::with_error(
                    "type",
                    "Invalid onboarding type. Use \"welcome\" or \"technical\"",
                )),
            )
        })?;

    complete_onboarding(db, id, track).await.validate_custom()?;

    Ok(SimpleResponse::ok(&format!(
        "Onboarding {} marked as completed",
        track.as_str()
    )))
}

// ---------------------------------------------------------------------------
// Calendar
// ---------------------------------------------------------------------------

#[derive(FromForm)]
pub struct CalendarQuery {
    pub year: Option<i32>,
    #[field(name = "type")]
    pub event_type: Option<String>,
}

#[get("/calendar?<params..>")]
pub async fn api_get_calendar(
    params: CalendarQuery,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<CalendarEvent>>, ApiError> {
    user.require_permission(Permission::ViewCalendar)
        .validate_custom()?;

    let event_type = match params.event_type.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(value) => Some(
            EventType::from_str(value)
                .map_err(|e| AppError::Validation(e.to_string()))
                .validate_custom()?,
        ),
    };

    let events = list_events(db, params.year, event_type)
        .await
        .validate_custom()?;

    Ok(Json(events))
}

#[derive(Deserialize, Validate, Clone)]
pub struct CreateEventRequest {
    title: Option<String>,
    description: Option<String>,
    #[serde(rename = "type")]
    event_type: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    location: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    responsible_email: Option<String>,
    max_participants: Option<i64>,
}

#[derive(Serialize, Deserialize)]
pub struct CreateEventResponse {
    pub success: bool,
    pub message: String,
    pub event: CalendarEvent,
}

#[post("/calendar", data = "<request>")]
pub async fn api_create_event(
    request: Json<CreateEventRequest>,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
    mailer: &State<Arc<dyn MailBackend>>,
) -> Result<Custom<Json<CreateEventResponse>>, ApiError> {
    user.require_permission(Permission::CreateEvents)
        .validate_custom()?;

    let validated = request.validate_custom()?;

    let title = required_text(validated.title, "title")?;
    let start_date = validated.start_date.ok_or_else(|| missing("start_date"))?;
    let responsible_email = required_text(validated.responsible_email, "responsible_email")?;
    let end_date = validated.end_date.unwrap_or(start_date);

    if end_date < start_date {
        return Err(Custom(
            Status::BadRequest,
            Json(ValidationResponse::with_error(
                "end_date",
                "End date must not be before start date",
            )),
        ));
    }

    let event_type = match validated.event_type.as_deref().map(str::trim) {
        None | Some("") => EventType::Workshop,
        Some(value) => EventType::from_str(value)
            .map_err(|e| AppError::Validation(e.to_string()))
            .validate_custom()?,
    };

    let new = NewCalendarEvent {
        title,
        description: validated.description,
        event_type,
        start_date,
        end_date,
        location: validated.location,
        responsible_email,
        max_participants: validated.max_participants.unwrap_or(20),
    };

    let event = create_event(db, &new).await.validate_custom()?;

    // Notification is decoupled from the write: whatever happens here, the
    // event is already persisted and the request succeeds.
    let report =
        send_new_event_alert(db, mailer, config.mail.system_mailbox.as_deref(), &event).await;
    if report.failed() > 0 {
        tracing::warn!(
            event_id = event.id,
            failed = report.failed(),
            "Some event alerts could not be delivered"
        );
    }

    Ok(Custom(
        Status::Created,
        Json(CreateEventResponse {
            success: true,
            message: "Event created and alerts dispatched".to_string(),
            event,
        }),
    ))
}

#[get("/calendar/upcoming?<days>")]
pub async fn api_get_upcoming_events(
    days: Option<i64>,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<UpcomingEvent>>, ApiError> {
    user.require_permission(Permission::ViewCalendar)
        .validate_custom()?;

    let events = db::upcoming_events(db, days.unwrap_or(7))
        .await
        .validate_custom()?;

    Ok(Json(alerts::annotate_upcoming(
        events,
        Utc::now().date_naive(),
    )))
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[get("/alerts/upcoming?<days>")]
pub async fn api_get_upcoming_alerts(
    days: Option<i64>,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<UpcomingEvent>>, ApiError> {
    user.require_permission(Permission::ViewAlerts)
        .validate_custom()?;

    // Degrades to [] on database errors; see alerts::upcoming_alerts_or_empty.
    let events = alerts::upcoming_alerts_or_empty(db, days.unwrap_or(7)).await;

    Ok(Json(events))
}

#[get("/alerts/stats")]
pub async fn api_get_alert_stats(
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<db::EventWindowStats>, ApiError> {
    user.require_permission(Permission::ViewAlerts)
        .validate_custom()?;

    Ok(Json(alerts::alert_stats_or_zero(db).await))
}

#[derive(Serialize)]
pub struct EventAlertsResponse {
    pub event: CalendarEvent,
    pub alerts: Vec<AlertRecord>,
}

#[get("/alerts/event/<id>")]
pub async fn api_get_event_alerts(
    id: i64,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<EventAlertsResponse>, Status> {
    user.require_permission(Permission::ViewAlerts)?;

    let event = get_event(db, id).await?;
    let alerts = derived_alert_records(&event);

    Ok(Json(EventAlertsResponse { event, alerts }))
}

#[derive(Deserialize, Validate, Clone)]
pub struct TestAlertRequest {
    #[validate(email(message = "Invalid email address"))]
    email: Option<String>,
}

#[post("/alerts/test", data = "<request>")]
pub async fn api_send_test_alert(
    request: Json<TestAlertRequest>,
    user: CurrentUser,
    mailer: &State<Arc<dyn MailBackend>>,
) -> Result<Json<SimpleResponse>, ApiError> {
    user.require_permission(Permission::SendTestAlerts)
        .validate_custom()?;

    let validated = request.validate_custom()?;
    let email = required_text(validated.email, "email")?;

    alerts::send_test_alert(mailer, &email)
        .await
        .validate_custom()?;

    Ok(SimpleResponse::ok("Test alert sent by email"))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub timestamp: String,
}

#[get("/health")]
pub async fn health(db: &State<Pool<Sqlite>>) -> Json<HealthResponse> {
    let database_ok = sqlx::query("SELECT 1").execute(&**db).await.is_ok();

    Json(HealthResponse {
        status: if database_ok { "OK" } else { "WARNING" }.to_string(),
        database: if database_ok {
            "connected"
        } else {
            "disconnected"
        }
        .to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}
