use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde_json::{Value, json};

use crate::config::AppConfig;

use super::CurrentUser;
use super::token::decode_token;

fn bearer_token<'r>(request: &'r Request<'_>) -> Option<&'r str> {
    request
        .headers()
        .get_one("Authorization")
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Raw bearer token, for endpoints that report verification outcomes in
/// the response body instead of rejecting at the guard.
pub struct BearerToken(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for BearerToken {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match bearer_token(request) {
            Some(token) => Outcome::Success(BearerToken(token.to_string())),
            _ => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CurrentUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let auth_span = tracing::info_span!("bearer_auth_guard");
        let _guard = auth_span.enter();

        let config = match request.rocket().state::<AppConfig>() {
            Some(config) => config,
            _ => {
                tracing::error!("AppConfig not found in managed state");
                return Outcome::Error((Status::Unauthorized, ()));
            }
        };

        let token = match bearer_token(request) {
            Some(token) => token,
            _ => {
                tracing::warn!("Missing bearer token");
                return Outcome::Error((Status::Unauthorized, ()));
            }
        };

        match decode_token(token, &config.jwt_secret) {
            Ok(claims) => {
                let user = CurrentUser::from(claims);
                tracing::info!(
                    username = %user.username,
                    role = %user.role.as_str(),
                    "User authenticated via bearer token"
                );
                Outcome::Success(user)
            }
            Err(err) => {
                tracing::warn!(error = ?err, "Rejected bearer token");
                Outcome::Error((Status::Unauthorized, ()))
            }
        }
    }
}

#[catch(401)]
pub fn unauthorized_api(_req: &Request) -> Custom<Json<Value>> {
    let error_json = json!({
        "error": "Unauthorized",
        "message": "Authentication required"
    });

    Custom(Status::Unauthorized, Json(error_json))
}

#[catch(403)]
pub fn forbidden_api(_req: &Request) -> Custom<Json<Value>> {
    let error_json = json!({
        "error": "Forbidden",
        "message": "Insufficient permissions"
    });

    Custom(Status::Forbidden, Json(error_json))
}

#[catch(404)]
pub fn not_found_api(req: &Request) -> Custom<Json<Value>> {
    let error_json = json!({
        "error": "Not found",
        "path": req.uri().path().to_string()
    });

    Custom(Status::NotFound, Json(error_json))
}

#[catch(422)]
pub fn unprocessable_api(_req: &Request) -> Custom<Json<Value>> {
    let error_json = json!({
        "error": "Malformed request body"
    });

    Custom(Status::UnprocessableEntity, Json(error_json))
}
