//! Integration test harness for Belgrano Tickets.
//!
//! Each [`TestApp`] is the full router from [`build_app`] over throwaway
//! `SQLite` files and an upload directory under the system temp dir.
//! Requests go through `tower::ServiceExt::oneshot`; no socket is bound.
//!
//! [`TestClient`] carries the session cookie between requests, so a test
//! reads like a browser session:
//!
//! ```rust,ignore
//! let app = TestApp::spawn().await;
//! app.create_user("admin", "admin@belgranoahorro.com", Role::Admin, "admin123").await;
//!
//! let mut client = app.client();
//! client.login("admin@belgranoahorro.com", "admin123").await;
//! let panel = client.get("/panel").await;
//! assert_eq!(panel.status, StatusCode::OK);
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::Router;
use axum::body::{Body, Bytes, to_bytes};
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode, header};
use serde_json::Value;
use sqlx::SqlitePool;
use tower::ServiceExt;
use uuid::Uuid;

use belgrano_tickets::app::build_app;
use belgrano_tickets::config::AppConfig;
use belgrano_tickets::db::users::NewUser;
use belgrano_tickets::db::{self, UserRepository, init_catalog_schema, init_ticket_schema};
use belgrano_tickets::middleware::{SESSION_COOKIE_NAME, create_session_store};
use belgrano_tickets::models::User;
use belgrano_tickets::services::auth::hash_password;
use belgrano_tickets::state::AppState;
use belgrano_tickets_core::{Email, Role};

/// Ingestion key configured for every test app.
pub const API_KEY: &str = "integration-test-key";
/// `DevOps` credentials configured for every test app.
pub const DEVOPS_USER: &str = "devops";
pub const DEVOPS_PASSWORD: &str = "devops-test-pass";

/// A running application over private databases.
pub struct TestApp {
    router: Router,
    pub pool: SqlitePool,
    pub catalog_pool: SqlitePool,
    pub upload_root: PathBuf,
    root: PathBuf,
}

impl TestApp {
    /// Build the app with empty databases and no users.
    pub async fn spawn() -> Self {
        let root = std::env::temp_dir().join(format!("belgrano-it-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&root).unwrap();
        let upload_root = root.join("uploads");

        let vars: HashMap<&str, String> = HashMap::from([
            ("DATABASE_URL", sqlite_url(&root.join("tickets.db"))),
            ("CATALOG_DATABASE_URL", sqlite_url(&root.join("catalog.db"))),
            ("UPLOAD_FOLDER", upload_root.display().to_string()),
            ("BELGRANO_AHORRO_URL", "http://127.0.0.1:9".to_string()),
            ("BELGRANO_AHORRO_API_KEY", API_KEY.to_string()),
            ("BELGRANO_AHORRO_TIMEOUT", "1".to_string()),
            ("DEVOPS_USERNAME", DEVOPS_USER.to_string()),
            ("DEVOPS_PASSWORD", DEVOPS_PASSWORD.to_string()),
        ]);
        let config = AppConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();

        let pool = db::create_pool(&config.database_url).await.unwrap();
        init_ticket_schema(&pool).await.unwrap();
        let catalog_pool = db::create_pool(&config.catalog_database_url).await.unwrap();
        init_catalog_schema(&catalog_pool).await.unwrap();

        let store = create_session_store(&pool).await.unwrap();
        let state = AppState::new(config, pool.clone(), catalog_pool.clone()).unwrap();

        Self {
            router: build_app(state, store),
            pool,
            catalog_pool,
            upload_root,
            root,
        }
    }

    /// A client with no session.
    #[must_use]
    pub const fn client(&self) -> TestClient<'_> {
        TestClient {
            app: self,
            cookie: None,
        }
    }

    /// Insert an active user with an Argon2 hash of `password`.
    pub async fn create_user(&self, username: &str, email: &str, role: Role, password: &str) -> User {
        self.insert_user(username, email, role, &hash_password(password).unwrap(), true)
            .await
    }

    /// Insert a user with an arbitrary stored hash.
    pub async fn insert_user(
        &self,
        username: &str,
        email: &str,
        role: Role,
        password_hash: &str,
        activo: bool,
    ) -> User {
        UserRepository::new(&self.pool)
            .create(&NewUser {
                username: username.to_string(),
                email: Email::parse(email).unwrap(),
                password_hash: password_hash.to_string(),
                role,
                nombre: username.to_string(),
                activo,
            })
            .await
            .unwrap()
    }

    /// Files currently stored under the upload root, recursively.
    #[must_use]
    pub fn stored_files(&self) -> Vec<PathBuf> {
        fn walk(dir: &Path, out: &mut Vec<PathBuf>) {
            let Ok(entries) = std::fs::read_dir(dir) else {
                return;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    walk(&path, out);
                } else {
                    out.push(path);
                }
            }
        }
        let mut files = Vec::new();
        walk(&self.upload_root, &mut files);
        files
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}", path.display())
}

/// Status, headers and body of one response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    /// Body parsed as JSON.
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    /// `Location` header of a redirect.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }
}

/// Sends requests to a [`TestApp`], keeping the session cookie.
pub struct TestClient<'a> {
    app: &'a TestApp,
    cookie: Option<String>,
}

impl TestClient<'_> {
    /// Send a request, attaching and then updating the session cookie.
    pub async fn send(&mut self, mut request: Request<Body>) -> TestResponse {
        if let Some(cookie) = &self.cookie {
            request
                .headers_mut()
                .insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        }

        let response = self.app.router.clone().oneshot(request).await.unwrap();

        let prefix = format!("{SESSION_COOKIE_NAME}=");
        for value in response.headers().get_all(header::SET_COOKIE) {
            let pair = value.to_str().unwrap().split(';').next().unwrap_or_default();
            if let Some(id) = pair.strip_prefix(&prefix) {
                self.cookie = (!id.is_empty()).then(|| pair.to_string());
            }
        }

        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&mut self, uri: &str, body: &Value) -> TestResponse {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn put_json(&mut self, uri: &str, body: &Value) -> TestResponse {
        self.send(
            Request::put(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// POST a ticket to the ingestion endpoint with `key` as `X-API-Key`.
    pub async fn ingest(&mut self, key: &str, body: &Value) -> TestResponse {
        self.send(
            Request::post("/api/tickets")
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-api-key", key)
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Panel login; returns the login response.
    pub async fn login(&mut self, email: &str, password: &str) -> TestResponse {
        self.post_json(
            "/login",
            &serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    /// `DevOps` login with the configured credentials.
    pub async fn devops_login(&mut self) -> TestResponse {
        self.post_json(
            "/devops/login",
            &serde_json::json!({ "username": DEVOPS_USER, "password": DEVOPS_PASSWORD }),
        )
        .await
    }

    /// POST a multipart body built by [`multipart_body`].
    pub async fn post_multipart(&mut self, uri: &str, body: Vec<u8>) -> TestResponse {
        self.send(
            Request::post(uri)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }
}

/// Boundary used by [`multipart_body`].
pub const MULTIPART_BOUNDARY: &str = "belgrano-test-boundary";

/// Encode text fields plus one file part as `multipart/form-data`.
#[must_use]
pub fn multipart_body(fields: &[(&str, &str)], filename: &str, file: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(file);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}

/// A legacy `scrypt:N:r:p$salt$digest` hash with cheap cost parameters.
#[must_use]
pub fn legacy_scrypt_hash(password: &str) -> String {
    let params = scrypt::Params::new(4, 8, 1, scrypt::Params::RECOMMENDED_LEN).unwrap();
    let salt = b"legacy-salt";
    let mut digest = [0u8; 32];
    scrypt::scrypt(password.as_bytes(), salt, &params, &mut digest).unwrap();
    format!("scrypt:16:8:1${}${}", hex::encode(salt), hex::encode(digest))
}
