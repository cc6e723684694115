use std::path::Path;

use tracing::{info, warn};

/// Runtime configuration, resolved once at startup from layered env files
/// plus the process environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub mail: MailConfig,
    pub initial_admin: Option<InitialAdmin>,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from_address: String,
    /// Copied on every event alert when set and distinct from the
    /// responsible party.
    pub system_mailbox: Option<String>,
    pub send_timeout_secs: u64,
}

/// Seed account created at startup when the user table is empty.
/// Replaces the hardcoded development login the original system shipped.
#[derive(Debug, Clone)]
pub struct InitialAdmin {
    pub full_name: String,
    pub email: String,
    pub username: String,
    pub password: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mail = MailConfig {
            smtp_host: var_or("SMTP_HOST", "localhost"),
            smtp_port: var_or("SMTP_PORT", "587").parse().unwrap_or(587),
            smtp_username: dotenvy::var("SMTP_USERNAME").ok(),
            smtp_password: dotenvy::var("SMTP_PASSWORD").ok(),
            from_address: var_or("MAIL_FROM", "onboarding@localhost"),
            system_mailbox: dotenvy::var("SYSTEM_MAILBOX").ok().filter(|s| !s.is_empty()),
            send_timeout_secs: var_or("SMTP_TIMEOUT_SECS", "10").parse().unwrap_or(10),
        };

        let initial_admin = match (
            dotenvy::var("INITIAL_ADMIN_USERNAME"),
            dotenvy::var("INITIAL_ADMIN_EMAIL"),
            dotenvy::var("INITIAL_ADMIN_PASSWORD"),
        ) {
            (Ok(username), Ok(email), Ok(password)) => Some(InitialAdmin {
                full_name: var_or("INITIAL_ADMIN_FULL_NAME", "System Administrator"),
                email,
                username,
                password,
            }),
            _ => None,
        };

        Self {
            database_url: var_or("DATABASE_URL", "sqlite:onboarding.db"),
            jwt_secret: dotenvy::var("JWT_SECRET").unwrap_or_else(|_| {
                warn!("JWT_SECRET not set, using an insecure development secret");
                "insecure-dev-secret".to_string()
            }),
            token_ttl_hours: var_or("TOKEN_TTL_HOURS", "24").parse().unwrap_or(24),
            mail,
            initial_admin,
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    match dotenvy::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => {
            info!("{} not set, using default: {}", key, default);
            default.to_string()
        }
    }
}

pub fn load_environment() -> Result<(), Box<dyn std::error::Error>> {
    let is_production =
        dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    for env_file in env_files {
        load_env_file(env_file)?;
    }

    Ok(())
}

fn load_env_file(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !Path::new(path).exists() {
        warn!("Warning: Environment file {} not found, skipping", path);
        return Ok(());
    }

    dotenvy::from_filename_override(path)?;
    info!("Loaded environment from: {}", path);
    Ok(())
}
