#[cfg(test)]
mod tests {
    use crate::api::{AuthResponse, VerifyResponse};
    use crate::auth::token::decode_token;
    use crate::test::utils::test_utils::{
        STANDARD_PASSWORD, TestDbBuilder, bearer, login_test_user, setup_test_client,
    };
    use rocket::http::{ContentType, Status};
    use serde_json::json;

    #[rocket::async_test]
    async fn test_first_registration_is_admin_then_viewer() {
        let test_db = TestDbBuilder::new().build().await.unwrap();
        let (client, _, _) = setup_test_client(test_db).await;

        let response = client
            .post("/api/auth/register")
            .header(ContentType::JSON)
            .body(
                json!({
                    "full_name": "Ana",
                    "email": "ana@x.com",
                    "username": "ana",
                    "password": "secret1"
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Created);
        let body = response.into_string().await.unwrap();
        let registered: AuthResponse = serde_json::from_str(&body).unwrap();
        assert!(registered.success);
        assert_eq!(registered.user.role, "admin");

        // The token itself carries the admin role.
        let claims = decode_token(&registered.token, "test-secret").unwrap();
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.username, "ana");

        let response = client
            .post("/api/auth/register")
            .header(ContentType::JSON)
            .body(
                json!({
                    "full_name": "Bob",
                    "email": "bob@x.com",
                    "username": "bob",
                    "password": "secret2"
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Created);
        let body = response.into_string().await.unwrap();
        let registered: AuthResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(registered.user.role, "viewer");
    }

    #[rocket::async_test]
    async fn test_register_validation() {
        let test_db = TestDbBuilder::new().build().await.unwrap();
        let (client, _, _) = setup_test_client(test_db).await;

        // Missing username
        let response = client
            .post("/api/auth/register")
            .header(ContentType::JSON)
            .body(
                json!({
                    "full_name": "Ana",
                    "email": "ana@x.com",
                    "password": "secret1"
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        // Password too short
        let response = client
            .post("/api/auth/register")
            .header(ContentType::JSON)
            .body(
                json!({
                    "full_name": "Ana",
                    "email": "ana@x.com",
                    "username": "ana",
                    "password": "abc"
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn test_register_duplicate_conflict() {
        let test_db = TestDbBuilder::new().admin("admin_user").build().await.unwrap();
        let (client, _, _) = setup_test_client(test_db).await;

        let response = client
            .post("/api/auth/register")
            .header(ContentType::JSON)
            .body(
                json!({
                    "full_name": "Imposter",
                    "email": "admin_user@onboarding.test",
                    "username": "someone_else",
                    "password": "secret1"
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Conflict);
    }

    #[rocket::async_test]
    async fn test_login_with_username_or_email() {
        let test_db = TestDbBuilder::new().admin("admin_user").build().await.unwrap();
        let (client, _, _) = setup_test_client(test_db).await;

        let token = login_test_user(&client, "admin_user", STANDARD_PASSWORD).await;
        assert!(!token.is_empty());

        // Email works as the identifier too.
        let token = login_test_user(&client, "admin_user@onboarding.test", STANDARD_PASSWORD).await;
        assert!(!token.is_empty());
    }

    #[rocket::async_test]
    async fn test_login_failures_never_yield_a_token() {
        let test_db = TestDbBuilder::new().admin("admin_user").build().await.unwrap();
        let (client, _, _) = setup_test_client(test_db).await;

        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(
                json!({
                    "username": "admin_user",
                    "password": "wrong_password"
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);

        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(
                json!({
                    "username": "no_such_user",
                    "password": STANDARD_PASSWORD
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);

        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(json!({ "username": "admin_user" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn test_login_updates_last_login() {
        let test_db = TestDbBuilder::new().admin("admin_user").build().await.unwrap();
        let (client, test_db, _) = setup_test_client(test_db).await;

        let before: Option<String> =
            sqlx::query_scalar("SELECT last_login FROM users WHERE username = 'admin_user'")
                .fetch_one(&test_db.pool)
                .await
                .unwrap();
        assert!(before.is_none());

        login_test_user(&client, "admin_user", STANDARD_PASSWORD).await;

        let after: Option<String> =
            sqlx::query_scalar("SELECT last_login FROM users WHERE username = 'admin_user'")
                .fetch_one(&test_db.pool)
                .await
                .unwrap();
        assert!(after.is_some());
    }

    #[rocket::async_test]
    async fn test_verify_token() {
        let test_db = TestDbBuilder::new().admin("admin_user").build().await.unwrap();
        let (client, _, _) = setup_test_client(test_db).await;

        let token = login_test_user(&client, "admin_user", STANDARD_PASSWORD).await;

        let response = client
            .post("/api/auth/verify")
            .header(bearer(&token))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let body = response.into_string().await.unwrap();
        let verified: VerifyResponse = serde_json::from_str(&body).unwrap();
        assert!(verified.valid);
        let user = verified.user.unwrap();
        assert_eq!(user.username, "admin_user");
        assert_eq!(user.role, "admin");

        // A forged token is rejected with a structured body.
        let response = client
            .post("/api/auth/verify")
            .header(bearer("not-a-real-token"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);

        let body = response.into_string().await.unwrap();
        let verified: VerifyResponse = serde_json::from_str(&body).unwrap();
        assert!(!verified.valid);
        assert!(verified.error.is_some());

        // Missing token entirely.
        let response = client.post("/api/auth/verify").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn test_verify_rejects_deactivated_user() {
        let test_db = TestDbBuilder::new().admin("admin_user").build().await.unwrap();
        let (client, test_db, _) = setup_test_client(test_db).await;

        let token = login_test_user(&client, "admin_user", STANDARD_PASSWORD).await;

        sqlx::query("UPDATE users SET is_active = 0 WHERE username = 'admin_user'")
            .execute(&test_db.pool)
            .await
            .unwrap();

        let response = client
            .post("/api/auth/verify")
            .header(bearer(&token))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn test_logout_is_stateless() {
        let test_db = TestDbBuilder::new().admin("admin_user").build().await.unwrap();
        let (client, _, _) = setup_test_client(test_db).await;

        let token = login_test_user(&client, "admin_user", STANDARD_PASSWORD).await;

        let response = client
            .post("/api/auth/logout")
            .header(bearer(&token))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        // No revocation list: the token remains usable until expiry.
        let response = client
            .post("/api/auth/verify")
            .header(bearer(&token))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
    }

    #[rocket::async_test]
    async fn test_change_password() {
        let test_db = TestDbBuilder::new().admin("admin_user").build().await.unwrap();
        let (client, _, _) = setup_test_client(test_db).await;

        let token = login_test_user(&client, "admin_user", STANDARD_PASSWORD).await;

        // Wrong current password
        let response = client
            .post("/api/auth/change-password")
            .header(bearer(&token))
            .header(ContentType::JSON)
            .body(
                json!({
                    "currentPassword": "wrong",
                    "newPassword": "new-password"
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);

        // New password too short
        let response = client
            .post("/api/auth/change-password")
            .header(bearer(&token))
            .header(ContentType::JSON)
            .body(
                json!({
                    "currentPassword": STANDARD_PASSWORD,
                    "newPassword": "abc"
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        // Success, then the new password logs in
        let response = client
            .post("/api/auth/change-password")
            .header(bearer(&token))
            .header(ContentType::JSON)
            .body(
                json!({
                    "currentPassword": STANDARD_PASSWORD,
                    "newPassword": "new-password"
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        login_test_user(&client, "admin_user", "new-password").await;
    }

    #[rocket::async_test]
    async fn test_auth_required_endpoints() {
        let test_db = TestDbBuilder::new().admin("admin_user").build().await.unwrap();
        let (client, _, _) = setup_test_client(test_db).await;

        let endpoints = vec![
            "/api/collaborators",
            "/api/collaborators/1",
            "/api/calendar",
            "/api/alerts/upcoming",
            "/api/alerts/stats",
        ];

        for endpoint in endpoints {
            let response = client.get(endpoint).dispatch().await;
            assert_eq!(
                response.status(),
                Status::Unauthorized,
                "Endpoint {} did not require authentication",
                endpoint
            );
        }
    }

    #[rocket::async_test]
    async fn test_role_gating() {
        let test_db = TestDbBuilder::new()
            .admin("admin_user")
            .manager("manager_user")
            .viewer("viewer_user")
            .collaborator("Jo", "jo@x.com", "2024-01-10")
            .build()
            .await
            .unwrap();
        let (client, test_db, _) = setup_test_client(test_db).await;

        let viewer_token = login_test_user(&client, "viewer_user", STANDARD_PASSWORD).await;
        let manager_token = login_test_user(&client, "manager_user", STANDARD_PASSWORD).await;
        let admin_token = login_test_user(&client, "admin_user", STANDARD_PASSWORD).await;

        // Viewers read but do not write.
        let response = client
            .get("/api/collaborators")
            .header(bearer(&viewer_token))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let create_body = json!({
            "full_name": "New Hire",
            "email": "new.hire@x.com",
            "hire_date": "2024-03-01"
        })
        .to_string();

        let response = client
            .post("/api/collaborators")
            .header(bearer(&viewer_token))
            .header(ContentType::JSON)
            .body(create_body.clone())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = client
            .post("/api/collaborators")
            .header(bearer(&manager_token))
            .header(ContentType::JSON)
            .body(create_body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);

        // Deletion is admin-only.
        let jo = test_db.collaborator_id("jo@x.com").unwrap();

        let response = client
            .delete(format!("/api/collaborators/{}", jo))
            .header(bearer(&manager_token))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = client
            .delete(format!("/api/collaborators/{}", jo))
            .header(bearer(&admin_token))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
    }
}
