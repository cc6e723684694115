use chrono::NaiveDateTime;
use rocket::http::Status;
use serde::Serialize;

use super::{Permission, Role};
use super::token::Claims;

/// Authenticated caller, reconstructed from a verified bearer token.
#[derive(Debug, Serialize, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.id,
            username: claims.username,
            email: claims.email,
            full_name: claims.full_name,
            role: Role::from_str(&claims.role).unwrap_or(Role::Viewer),
        }
    }
}

impl CurrentUser {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    pub fn require_permission(&self, permission: Permission) -> Result<(), Status> {
        if self.role.has_permission(permission) {
            Ok(())
        } else {
            tracing::warn!(
                username = %self.username,
                role = %self.role.as_str(),
                permission = ?permission,
                "Permission denied"
            );
            Err(Status::Forbidden)
        }
    }

    pub fn require_all_permissions(&self, permissions: &[Permission]) -> Result<(), Status> {
        if permissions.iter().all(|p| self.role.has_permission(*p)) {
            Ok(())
        } else {
            tracing::warn!(
                username = %self.username,
                role = %self.role.as_str(),
                permissions = ?permissions,
                "Permission denied (require all)"
            );
            Err(Status::Forbidden)
        }
    }
}

/// Full account row, password hash included. Never serialized.
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub last_login: Option<NaiveDateTime>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUserAccount {
    pub id: Option<i64>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
    pub last_login: Option<NaiveDateTime>,
}

impl From<DbUserAccount> for UserAccount {
    fn from(db: DbUserAccount) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            full_name: db.full_name.unwrap_or_default(),
            email: db.email.unwrap_or_default(),
            username: db.username.unwrap_or_default(),
            password_hash: db.password_hash.unwrap_or_default(),
            role: db
                .role
                .as_deref()
                .and_then(|s| Role::from_str(s).ok())
                .unwrap_or(Role::Viewer),
            is_active: db.is_active.unwrap_or(false),
            last_login: db.last_login,
        }
    }
}

impl UserAccount {
    /// Trimmed profile for API responses.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            role: self.role.to_string(),
        }
    }
}

#[derive(Serialize, serde::Deserialize, Debug, Clone)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
}
