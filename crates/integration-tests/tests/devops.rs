//! `DevOps` panel, catalog API and image uploads.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use belgrano_tickets::db::CatalogRepository;
use belgrano_tickets_core::ProductId;
use belgrano_tickets_integration_tests::{TestApp, TestClient, multipart_body};
use serde_json::json;

async fn create_business(client: &mut TestClient<'_>) -> i64 {
    let created = client
        .post_json(
            "/api/devops/negocios",
            &json!({"nombre": "Almacén Belgrano", "direccion": "Juramento 2000"}),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    created.json()["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_catalog_api_requires_devops_session() {
    let app = TestApp::spawn().await;
    let mut client = app.client();

    let listing = client.get("/api/devops/negocios").await;
    assert_eq!(listing.status, StatusCode::UNAUTHORIZED);

    let wrong = client
        .post_json(
            "/devops/login",
            &json!({"username": "devops", "password": "nope"}),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    // Public even without a session.
    assert_eq!(client.get("/api/devops/health").await.status, StatusCode::OK);

    assert_eq!(client.devops_login().await.status, StatusCode::OK);
    let listing = client.get("/api/devops/negocios").await;
    assert_eq!(listing.status, StatusCode::OK);
    assert_eq!(listing.json()["total"], 0);

    client.get("/devops/logout").await;
    assert_eq!(
        client.get("/api/devops/negocios").await.status,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_unsupported_verbs_and_missing_fields() {
    let app = TestApp::spawn().await;
    let mut client = app.client();
    client.devops_login().await;

    let put = client
        .put_json("/api/devops/productos", &json!({"id": 1}))
        .await;
    assert_eq!(put.status, StatusCode::NOT_IMPLEMENTED);

    let missing = client
        .post_json("/api/devops/productos", &json!({"nombre": "Yerba"}))
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.json()["error"], "precio es requerido");

    let no_business = client
        .post_json("/api/devops/sucursales", &json!({"nombre": "Centro"}))
        .await;
    assert_eq!(no_business.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_price_update_appends_history() {
    let app = TestApp::spawn().await;
    let mut client = app.client();
    client.devops_login().await;

    let product = client
        .post_json(
            "/api/devops/productos",
            &json!({"nombre": "Yerba 1kg", "precio": 1000, "stock": 10}),
        )
        .await;
    assert_eq!(product.status, StatusCode::CREATED);
    let product = product.json();
    assert_eq!(product["data"]["categoria"], "General");
    let id = product["data"]["id"].as_i64().unwrap();

    let update = client
        .post_json(
            "/api/devops/precios",
            &json!({"producto_id": id, "nuevo_precio": 1200, "motivo": "Aumento proveedor"}),
        )
        .await;
    assert_eq!(update.status, StatusCode::CREATED);
    let change = update.json();
    assert_eq!(change["data"]["precio_anterior"].as_f64(), Some(1000.0));
    assert_eq!(change["data"]["precio_nuevo"].as_f64(), Some(1200.0));

    let history = CatalogRepository::new(&app.catalog_pool)
        .price_history(ProductId::new(id))
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history.first().unwrap().motivo, "Aumento proveedor");

    let unknown = client
        .post_json(
            "/api/devops/precios",
            &json!({"producto_id": 9999, "nuevo_precio": 10}),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let negative = client
        .post_json(
            "/api/devops/precios",
            &json!({"producto_id": id, "nuevo_precio": -5}),
        )
        .await;
    assert_eq!(negative.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        CatalogRepository::new(&app.catalog_pool)
            .price_history(ProductId::new(id))
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_upload_rejects_bad_extension_without_writing() {
    let app = TestApp::spawn().await;
    let mut client = app.client();
    client.devops_login().await;
    let business = create_business(&mut client).await.to_string();

    let rejected = client
        .post_multipart(
            "/upload-image",
            multipart_body(
                &[("entity_type", "business"), ("entity_id", &business)],
                "payload.exe",
                b"MZ",
            ),
        )
        .await;
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
    assert_eq!(rejected.json()["error"], "Invalid file type");

    let bad_type = client
        .post_multipart(
            "/upload-image",
            multipart_body(
                &[("entity_type", "usuario"), ("entity_id", &business)],
                "logo.png",
                b"\x89PNG",
            ),
        )
        .await;
    assert_eq!(bad_type.status, StatusCode::BAD_REQUEST);

    assert!(app.stored_files().is_empty());
}

#[tokio::test]
async fn test_upload_stores_image_and_serves_it() {
    let app = TestApp::spawn().await;
    let mut client = app.client();
    client.devops_login().await;
    let business = create_business(&mut client).await.to_string();

    let uploaded = client
        .post_multipart(
            "/upload-image",
            multipart_body(
                &[("entity_type", "business"), ("entity_id", &business)],
                "Logo.PNG",
                b"\x89PNG-bytes",
            ),
        )
        .await;
    assert_eq!(uploaded.status, StatusCode::OK);
    let url = uploaded.json()["image_url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/media/business/"));
    assert!(url.ends_with(".png"));
    assert_eq!(app.stored_files().len(), 1);

    let served = client.get(&url).await;
    assert_eq!(served.status, StatusCode::OK);
    assert_eq!(&served.body[..], b"\x89PNG-bytes");

    let listing = client.get("/api/devops/negocios").await.json();
    assert_eq!(listing["data"][0]["image_url"], url.as_str());
}

#[tokio::test]
async fn test_upload_for_missing_entity_is_cleaned_up() {
    let app = TestApp::spawn().await;
    let mut client = app.client();
    client.devops_login().await;

    let orphan = client
        .post_multipart(
            "/upload-image",
            multipart_body(
                &[("entity_type", "product"), ("entity_id", "4242")],
                "foto.jpg",
                b"\xff\xd8\xff",
            ),
        )
        .await;
    assert_eq!(orphan.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(orphan.json()["error"], "Failed to update entity with image");
    assert!(app.stored_files().is_empty());
}

#[tokio::test]
async fn test_upload_requires_devops_login() {
    let app = TestApp::spawn().await;
    let mut client = app.client();

    let denied = client
        .post_multipart(
            "/upload-image",
            multipart_body(
                &[("entity_type", "business"), ("entity_id", "1")],
                "logo.png",
                b"\x89PNG",
            ),
        )
        .await;
    assert_eq!(denied.status, StatusCode::UNAUTHORIZED);
    assert!(app.stored_files().is_empty());
}
