use std::sync::Arc;
use std::time::Duration;

use onboarding_tracker::config::{self, AppConfig};
use onboarding_tracker::db;
use onboarding_tracker::init_rocket;
use onboarding_tracker::mail::{MailBackend, SmtpBackend};
use onboarding_tracker::telemetry::init_tracing;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;

#[rocket::launch]
async fn rocket() -> _ {
    init_tracing();

    if let Err(e) = config::load_environment() {
        tracing::warn!("Could not load environment files: {}", e);
    }

    let app_config = AppConfig::from_env();

    let pool = SqlitePoolOptions::new()
        .acquire_timeout(Duration::from_secs(10))
        .connect(&app_config.database_url)
        .await
        .expect("Failed to connect to SQLite database");

    info!("Running database migrations...");
    match sqlx::migrate!("./migrations").run(&pool).await {
        Ok(_) => info!("Migrations completed successfully"),
        Err(e) => {
            tracing::error!("Failed to run migrations: {}", e);
            panic!("Database migration failed: {}", e);
        }
    }

    if let Some(admin) = &app_config.initial_admin {
        match db::seed_initial_admin(&pool, admin).await {
            Ok(true) => info!("Initial admin account created"),
            Ok(false) => info!("User table not empty, initial admin seeding skipped"),
            Err(e) => tracing::error!("Failed to seed initial admin: {}", e),
        }
    }

    let mailer: Arc<dyn MailBackend> =
        Arc::new(SmtpBackend::new(&app_config.mail).expect("Failed to configure SMTP transport"));

    init_rocket(pool, app_config, mailer).await
}
