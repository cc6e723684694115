#[cfg(test)]
pub mod test_utils {
    use crate::api::AuthResponse;
    use crate::auth::Role;
    use crate::config::{AppConfig, MailConfig};
    use crate::db::{NewCalendarEvent, NewCollaborator, create_collaborator, create_event,
        register_user};
    use crate::error::AppError;
    use crate::init_rocket;
    use crate::mail::{MailBackend, MemoryBackend};
    use crate::models::{EventType, OnboardingStatus};
    use chrono::{Duration, NaiveDate, Utc};
    use rocket::http::{ContentType, Header, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::Once;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        collaborators: Vec<TestCollaborator>,
        events: Vec<TestEvent>,
    }

    pub struct TestUser {
        pub username: String,
        pub full_name: String,
        pub role: Role,
        pub password: String,
    }

    pub struct TestCollaborator {
        pub full_name: String,
        pub email: String,
        pub hire_date: NaiveDate,
    }

    pub struct TestEvent {
        pub title: String,
        pub start_offset_days: i64,
        pub end_offset_days: i64,
        pub responsible_email: String,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        fn user(mut self, username: &str, role: Role) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                full_name: format!("{} Test", username),
                role,
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        pub fn admin(self, username: &str) -> Self {
            self.user(username, Role::Admin)
        }

        pub fn manager(self, username: &str) -> Self {
            self.user(username, Role::Manager)
        }

        pub fn viewer(self, username: &str) -> Self {
            self.user(username, Role::Viewer)
        }

        pub fn collaborator(mut self, full_name: &str, email: &str, hire_date: &str) -> Self {
            self.collaborators.push(TestCollaborator {
                full_name: full_name.to_string(),
                email: email.to_string(),
                hire_date: hire_date.parse().expect("valid hire date"),
            });
            self
        }

        /// Event starting `start_offset_days` from today.
        pub fn event(mut self, title: &str, start_offset_days: i64, responsible: &str) -> Self {
            self.events.push(TestEvent {
                title: title.to_string(),
                start_offset_days,
                end_offset_days: start_offset_days + 4,
                responsible_email: responsible.to_string(),
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::builder().is_test(true).try_init();
            });

            // One connection: every in-memory SQLite connection is its
            // own database.
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            let mut user_id_map: HashMap<String, i64> = HashMap::new();
            let mut collaborator_id_map: HashMap<String, i64> = HashMap::new();
            let mut event_id_map: HashMap<String, i64> = HashMap::new();

            for user in &self.users {
                let email = format!("{}@onboarding.test", user.username);
                let account =
                    register_user(&pool, &user.full_name, &email, &user.username, &user.password)
                        .await?;

                // register_user decides admin-or-viewer itself; pin the
                // role the fixture asked for.
                if account.role != user.role {
                    sqlx::query("UPDATE users SET role = ? WHERE id = ?")
                        .bind(user.role.as_str())
                        .bind(account.id)
                        .execute(&pool)
                        .await?;
                }

                user_id_map.insert(user.username.clone(), account.id);
            }

            for collaborator in &self.collaborators {
                let created = create_collaborator(
                    &pool,
                    &NewCollaborator {
                        full_name: collaborator.full_name.clone(),
                        email: collaborator.email.clone(),
                        hire_date: collaborator.hire_date,
                        welcome_onboarding_status: OnboardingStatus::Pending,
                        technical_onboarding_status: OnboardingStatus::Pending,
                        technical_onboarding_date: None,
                    },
                )
                .await?;

                collaborator_id_map.insert(collaborator.email.clone(), created.id);
            }

            let today = Utc::now().date_naive();
            for event in &self.events {
                let created = create_event(
                    &pool,
                    &NewCalendarEvent {
                        title: event.title.clone(),
                        description: None,
                        event_type: EventType::ChapterTechnical,
                        start_date: today + Duration::days(event.start_offset_days),
                        end_date: today + Duration::days(event.end_offset_days),
                        location: None,
                        responsible_email: event.responsible_email.clone(),
                        max_participants: 20,
                    },
                )
                .await?;

                event_id_map.insert(event.title.clone(), created.id);
            }

            Ok(TestDb {
                pool,
                user_id_map,
                collaborator_id_map,
                event_id_map,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
        pub collaborator_id_map: HashMap<String, i64>,
        pub event_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn user_id(&self, username: &str) -> Option<i64> {
            self.user_id_map.get(username).copied()
        }

        pub fn collaborator_id(&self, email: &str) -> Option<i64> {
            self.collaborator_id_map.get(email).copied()
        }

        pub fn event_id(&self, title: &str) -> Option<i64> {
            self.event_id_map.get(title).copied()
        }
    }

    pub fn test_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "test-secret".to_string(),
            token_ttl_hours: 24,
            mail: MailConfig {
                smtp_host: "localhost".to_string(),
                smtp_port: 2525,
                smtp_username: None,
                smtp_password: None,
                from_address: "noreply@onboarding.test".to_string(),
                system_mailbox: Some("system@onboarding.test".to_string()),
                send_timeout_secs: 10,
            },
            initial_admin: None,
        }
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb, Arc<MemoryBackend>) {
        let memory = Arc::new(MemoryBackend::new());
        let mailer: Arc<dyn MailBackend> = memory.clone();

        let rocket = init_rocket(test_db.pool.clone(), test_config(), mailer).await;
        let client = Client::tracked(rocket)
            .await
            .expect("valid rocket instance");

        (client, test_db, memory)
    }

    pub async fn login_test_user(client: &Client, username: &str, password: &str) -> String {
        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(
                json!({
                    "username": username,
                    "password": password
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok, "login failed for {}", username);

        let body = response.into_string().await.unwrap();
        let login_response: AuthResponse = serde_json::from_str(&body).unwrap();

        login_response.token
    }

    pub fn bearer(token: &str) -> Header<'static> {
        Header::new("Authorization", format!("Bearer {}", token))
    }
}
