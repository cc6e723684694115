#[macro_use]
extern crate rocket;

pub mod alerts;
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod mail;
pub mod models;
pub mod session;
pub mod telemetry;
pub mod validation;
#[cfg(test)]
mod test;

use std::sync::Arc;

use api::{
    api_change_password, api_complete_onboarding, api_create_collaborator, api_create_event,
    api_delete_collaborator, api_get_alert_stats, api_get_calendar, api_get_collaborator,
    api_get_collaborators, api_get_event_alerts, api_get_upcoming_alerts,
    api_get_upcoming_events, api_login, api_logout, api_register, api_send_test_alert,
    api_update_collaborator, api_verify, health,
};
use auth::{forbidden_api, not_found_api, unauthorized_api, unprocessable_api};
use config::AppConfig;
use mail::MailBackend;
use rocket::{Build, Rocket};
use sqlx::SqlitePool;
use telemetry::TelemetryFairing;
use tracing::info;

pub async fn init_rocket(
    pool: SqlitePool,
    app_config: AppConfig,
    mailer: Arc<dyn MailBackend>,
) -> Rocket<Build> {
    info!("Starting onboarding tracker");

    rocket::build()
        .manage(pool)
        .manage(app_config)
        .manage(mailer)
        .mount(
            "/api",
            routes![
                api_register,
                api_login,
                api_verify,
                api_logout,
                api_change_password,
                api_get_collaborators,
                api_get_collaborator,
                api_create_collaborator,
                api_update_collaborator,
                api_delete_collaborator,
                api_complete_onboarding,
                api_get_calendar,
                api_create_event,
                api_get_upcoming_events,
                api_get_upcoming_alerts,
                api_get_alert_stats,
                api_get_event_alerts,
                api_send_test_alert,
                health,
            ],
        )
        .register(
            "/api",
            catchers![
                unauthorized_api,
                forbidden_api,
                not_found_api,
                unprocessable_api
            ],
        )
        .attach(TelemetryFairing)
}
