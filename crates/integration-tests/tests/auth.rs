//! Panel login, session handling and route protection.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use belgrano_tickets::db::UserRepository;
use belgrano_tickets_core::Role;
use belgrano_tickets_integration_tests::{TestApp, legacy_scrypt_hash};

#[tokio::test]
async fn test_browser_paths_redirect_and_api_paths_get_401() {
    let app = TestApp::spawn().await;
    let mut client = app.client();

    let panel = client.get("/panel").await;
    assert_eq!(panel.status, StatusCode::SEE_OTHER);
    assert_eq!(panel.location(), Some("/login"));

    let events = client.get("/api/events").await;
    assert_eq!(events.status, StatusCode::UNAUTHORIZED);

    // Nested under /api/ahorro; the prefix must still count as an API path.
    let ahorro = client.get("/api/ahorro/test").await;
    assert_eq!(ahorro.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_reaches_panel_and_logout_ends_session() {
    let app = TestApp::spawn().await;
    app.create_user("admin", "admin@belgranoahorro.com", Role::Admin, "admin123")
        .await;
    let mut client = app.client();

    let login = client.login("admin@belgranoahorro.com", "admin123").await;
    assert_eq!(login.status, StatusCode::OK);
    let body = login.json();
    assert_eq!(body["exito"], true);
    assert_eq!(body["redirect"], "/panel");

    let panel = client.get("/panel").await;
    assert_eq!(panel.status, StatusCode::OK);
    assert_eq!(panel.json()["total"], 0);

    // Already logged in: the login page bounces to the panel.
    let page = client.get("/login").await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);
    assert_eq!(page.location(), Some("/panel"));

    let logout = client.get("/logout").await;
    assert_eq!(logout.location(), Some("/login"));
    let panel = client.get("/panel").await;
    assert_eq!(panel.status, StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_wrong_password_and_inactive_account_are_refused() {
    let app = TestApp::spawn().await;
    app.create_user("repartidor1", "r1@belgranoahorro.com", Role::Flota, "flota123")
        .await;
    let hash = belgrano_tickets::services::auth::hash_password("flota123").unwrap();
    app.insert_user("repartidor2", "r2@belgranoahorro.com", Role::Flota, &hash, false)
        .await;
    let mut client = app.client();

    let wrong = client.login("r1@belgranoahorro.com", "nope").await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.json()["error"], "Email o contraseña incorrectos");

    let unknown = client.login("nadie@belgranoahorro.com", "flota123").await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);

    let inactive = client.login("r2@belgranoahorro.com", "flota123").await;
    assert_eq!(inactive.status, StatusCode::FORBIDDEN);
    assert_eq!(inactive.json()["error"], "Usuario inactivo");

    let empty = client.login("", "").await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    // None of the failures left a usable session behind.
    assert_eq!(client.get("/panel").await.status, StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_legacy_hash_is_replaced_on_first_login_only() {
    let app = TestApp::spawn().await;
    let user = app
        .insert_user(
            "admin",
            "admin@belgranoahorro.com",
            Role::Admin,
            &legacy_scrypt_hash("admin123"),
            true,
        )
        .await;
    let users = UserRepository::new(&app.pool);

    let mut client = app.client();
    let first = client.login("admin@belgranoahorro.com", "admin123").await;
    assert_eq!(first.status, StatusCode::OK);

    let migrated = users.get_password_hash(user.id).await.unwrap();
    assert!(migrated.starts_with("$argon2"));

    let mut again = app.client();
    let second = again.login("admin@belgranoahorro.com", "admin123").await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(users.get_password_hash(user.id).await.unwrap(), migrated);
}

// Written by Werkzeug's generate_password_hash("admin123", "pbkdf2:sha256:1000").
const WERKZEUG_HASH: &str = "pbkdf2:sha256:1000$kQj0iJuTnxaw4V5j$\
    5a0dddf9259d7f4926a2e0163b96e9caf54582f41b2740e96ef81da28de86e69";

#[tokio::test]
async fn test_werkzeug_hash_logs_in_and_is_replaced() {
    let app = TestApp::spawn().await;
    let user = app
        .insert_user(
            "admin",
            "admin@belgranoahorro.com",
            Role::Admin,
            WERKZEUG_HASH,
            true,
        )
        .await;
    let mut client = app.client();

    let login = client.login("admin@belgranoahorro.com", "admin123").await;
    assert_eq!(login.status, StatusCode::OK);
    let migrated = UserRepository::new(&app.pool)
        .get_password_hash(user.id)
        .await
        .unwrap();
    assert!(migrated.starts_with("$argon2"));
}

#[tokio::test]
async fn test_couriers_cannot_reach_admin_pages() {
    let app = TestApp::spawn().await;
    app.create_user("repartidor1", "r1@belgranoahorro.com", Role::Flota, "flota123")
        .await;
    let mut client = app.client();
    client.login("r1@belgranoahorro.com", "flota123").await;

    assert_eq!(client.get("/reportes").await.status, StatusCode::FORBIDDEN);
    assert_eq!(client.get("/usuarios").await.status, StatusCode::FORBIDDEN);
    assert_eq!(client.get("/panel").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_change_password_checks_current_password() {
    let app = TestApp::spawn().await;
    app.create_user("repartidor1", "r1@belgranoahorro.com", Role::Flota, "flota123")
        .await;
    let mut client = app.client();
    client.login("r1@belgranoahorro.com", "flota123").await;

    let wrong = client
        .post_json(
            "/cambiar_password",
            &serde_json::json!({
                "password_actual": "otra",
                "password_nuevo": "nueva-clave",
                "password_confirmar": "nueva-clave",
            }),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::BAD_REQUEST);

    let ok = client
        .post_json(
            "/cambiar_password",
            &serde_json::json!({
                "password_actual": "flota123",
                "password_nuevo": "nueva-clave",
                "password_confirmar": "nueva-clave",
            }),
        )
        .await;
    assert_eq!(ok.status, StatusCode::OK);

    let mut fresh = app.client();
    assert_eq!(
        fresh.login("r1@belgranoahorro.com", "flota123").await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        fresh.login("r1@belgranoahorro.com", "nueva-clave").await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_admin_manages_settings() {
    let app = TestApp::spawn().await;
    app.create_user("admin", "admin@belgranoahorro.com", Role::Admin, "admin123")
        .await;
    let mut client = app.client();
    client.login("admin@belgranoahorro.com", "admin123").await;

    let blank = client
        .post_json("/configuracion", &serde_json::json!({"clave": " ", "valor": "x"}))
        .await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);

    let saved = client
        .post_json(
            "/configuracion",
            &serde_json::json!({"clave": "zona_reparto", "valor": "Belgrano", "descripcion": "Zona"}),
        )
        .await;
    assert_eq!(saved.status, StatusCode::OK);

    let listing = client.get("/configuracion").await.json();
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["configuraciones"][0]["valor"], "Belgrano");
}
