//! `DevOps` catalog REST API under `/api/devops`.
//!
//! Bodies are loose JSON. A required field that is missing or falsy
//! (`null`, `""`, `0`, `false`) is reported as `"<campo> es requerido"`.

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use belgrano_tickets_core::{BusinessId, Money, ProductId};

use crate::db::{CatalogRepository, RepositoryError};
use crate::error::AppError;
use crate::middleware::RequireDevops;
use crate::models::catalog::{NewBranch, NewBusiness, NewOffer, NewProduct};
use crate::state::AppState;

/// Default reason recorded for price changes.
pub const DEFAULT_PRICE_REASON: &str = "Actualización desde DevOps";

type Created = (StatusCode, Json<Value>);

fn body_json(body: &Bytes) -> Result<Value, AppError> {
    if body.is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_slice(body).map_err(|_| AppError::BadRequest("JSON inválido".to_string()))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn require(data: &Value, fields: &[&str]) -> Result<(), AppError> {
    for field in fields {
        if !data.get(*field).is_some_and(is_truthy) {
            return Err(AppError::BadRequest(format!("{field} es requerido")));
        }
    }
    Ok(())
}

fn text(data: &Value, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn integer(data: &Value, key: &str) -> Result<Option<i64>, AppError> {
    match data.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| AppError::BadRequest(format!("{key} inválido"))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("{key} inválido"))),
        Some(_) => Err(AppError::BadRequest(format!("{key} inválido"))),
    }
}

fn money(data: &Value, key: &str) -> Result<Money, AppError> {
    let raw = match data.get(key) {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        _ => return Err(AppError::BadRequest(format!("{key} es requerido"))),
    };
    raw.parse::<Money>()
        .ok()
        .filter(|m| !m.is_negative())
        .ok_or_else(|| AppError::BadRequest(format!("{key} inválido")))
}

fn listed<T: Serialize>(items: &[T]) -> Json<Value> {
    Json(json!({
        "status": "success",
        "data": items,
        "total": items.len(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

fn created<T: Serialize>(message: &str, item: &T) -> Created {
    (
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": message,
            "data": item,
        })),
    )
}

fn missing_business(e: RepositoryError) -> AppError {
    match e {
        RepositoryError::NotFound => AppError::NotFound("Negocio no encontrado".to_string()),
        other => other.into(),
    }
}

// =============================================================================
// Negocios
// =============================================================================

/// GET /api/devops/negocios
pub async fn list_businesses(
    State(state): State<AppState>,
    _devops: RequireDevops,
) -> Result<Json<Value>, AppError> {
    let items = CatalogRepository::new(state.catalog_pool())
        .list_businesses()
        .await?;
    Ok(listed(&items))
}

/// POST /api/devops/negocios
pub async fn create_business(
    State(state): State<AppState>,
    _devops: RequireDevops,
    body: Bytes,
) -> Result<Created, AppError> {
    let data = body_json(&body)?;
    require(&data, &["nombre"])?;

    let business = CatalogRepository::new(state.catalog_pool())
        .create_business(&NewBusiness {
            nombre: text(&data, "nombre").unwrap_or_default(),
            descripcion: text(&data, "descripcion"),
            direccion: text(&data, "direccion"),
            telefono: text(&data, "telefono"),
            email: text(&data, "email"),
        })
        .await?;

    info!(negocio_id = %business.id, "Business created");
    Ok(created("Negocio creado exitosamente", &business))
}

// =============================================================================
// Productos
// =============================================================================

/// GET /api/devops/productos
pub async fn list_products(
    State(state): State<AppState>,
    _devops: RequireDevops,
) -> Result<Json<Value>, AppError> {
    let items = CatalogRepository::new(state.catalog_pool())
        .list_products()
        .await?;
    Ok(listed(&items))
}

/// POST /api/devops/productos
pub async fn create_product(
    State(state): State<AppState>,
    _devops: RequireDevops,
    body: Bytes,
) -> Result<Created, AppError> {
    let data = body_json(&body)?;
    require(&data, &["nombre", "precio"])?;

    let product = CatalogRepository::new(state.catalog_pool())
        .create_product(&NewProduct {
            nombre: text(&data, "nombre").unwrap_or_default(),
            descripcion: text(&data, "descripcion"),
            precio: money(&data, "precio")?,
            categoria: text(&data, "categoria").or_else(|| Some("General".to_string())),
            stock: integer(&data, "stock")?.unwrap_or(0),
            stock_minimo: integer(&data, "stock_minimo")?.unwrap_or(0),
            negocio_id: integer(&data, "negocio_id")?.map(BusinessId::new),
        })
        .await
        .map_err(missing_business)?;

    info!(producto_id = %product.id, "Product created");
    Ok(created("Producto creado exitosamente", &product))
}

// =============================================================================
// Ofertas
// =============================================================================

/// GET /api/devops/ofertas
pub async fn list_offers(
    State(state): State<AppState>,
    _devops: RequireDevops,
) -> Result<Json<Value>, AppError> {
    let items = CatalogRepository::new(state.catalog_pool())
        .list_offers()
        .await?;
    Ok(listed(&items))
}

/// POST /api/devops/ofertas
pub async fn create_offer(
    State(state): State<AppState>,
    _devops: RequireDevops,
    body: Bytes,
) -> Result<Created, AppError> {
    let data = body_json(&body)?;
    require(&data, &["titulo"])?;

    let productos = match data.get("productos") {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    let offer = CatalogRepository::new(state.catalog_pool())
        .create_offer(&NewOffer {
            titulo: text(&data, "titulo").unwrap_or_default(),
            descripcion: text(&data, "descripcion"),
            productos,
            hasta_agotar_stock: data.get("hasta_agotar_stock").is_some_and(is_truthy),
        })
        .await?;

    info!(oferta_id = %offer.id, "Offer created");
    Ok(created("Oferta creada exitosamente", &offer))
}

// =============================================================================
// Sucursales
// =============================================================================

/// Branch listing filter.
#[derive(Debug, Deserialize)]
pub struct BranchQuery {
    pub negocio_id: Option<i64>,
}

/// GET /api/devops/sucursales
pub async fn list_branches(
    State(state): State<AppState>,
    _devops: RequireDevops,
    Query(query): Query<BranchQuery>,
) -> Result<Json<Value>, AppError> {
    let items = CatalogRepository::new(state.catalog_pool())
        .list_branches(query.negocio_id.map(BusinessId::new))
        .await?;
    Ok(listed(&items))
}

/// POST /api/devops/sucursales
pub async fn create_branch(
    State(state): State<AppState>,
    _devops: RequireDevops,
    body: Bytes,
) -> Result<Created, AppError> {
    let data = body_json(&body)?;
    require(&data, &["nombre", "negocio_id"])?;
    let negocio_id = integer(&data, "negocio_id")?
        .ok_or_else(|| AppError::BadRequest("negocio_id es requerido".to_string()))?;

    let branch = CatalogRepository::new(state.catalog_pool())
        .create_branch(&NewBranch {
            nombre: text(&data, "nombre").unwrap_or_default(),
            direccion: text(&data, "direccion"),
            telefono: text(&data, "telefono"),
            email: text(&data, "email"),
            negocio_id: BusinessId::new(negocio_id),
        })
        .await
        .map_err(missing_business)?;

    info!(sucursal_id = %branch.id, negocio_id, "Branch created");
    Ok(created("Sucursal creada exitosamente", &branch))
}

// =============================================================================
// Categorías y precios
// =============================================================================

/// GET /api/devops/categorias
pub async fn list_categories(
    State(state): State<AppState>,
    _devops: RequireDevops,
) -> Result<Json<Value>, AppError> {
    let items = CatalogRepository::new(state.catalog_pool())
        .list_categories()
        .await?;
    Ok(listed(&items))
}

/// GET /api/devops/precios
pub async fn list_prices(
    State(state): State<AppState>,
    _devops: RequireDevops,
) -> Result<Json<Value>, AppError> {
    let items = CatalogRepository::new(state.catalog_pool())
        .list_prices()
        .await?;
    Ok(listed(&items))
}

/// POST|PUT /api/devops/precios
///
/// Updates the product price and appends one history row atomically.
pub async fn update_price(
    State(state): State<AppState>,
    _devops: RequireDevops,
    body: Bytes,
) -> Result<Created, AppError> {
    let data = body_json(&body)?;
    require(&data, &["producto_id", "nuevo_precio"])?;
    let producto_id = integer(&data, "producto_id")?
        .ok_or_else(|| AppError::BadRequest("producto_id es requerido".to_string()))?;
    let nuevo = money(&data, "nuevo_precio")?;
    let motivo = text(&data, "motivo").unwrap_or_else(|| DEFAULT_PRICE_REASON.to_string());

    let change = CatalogRepository::new(state.catalog_pool())
        .update_price(ProductId::new(producto_id), nuevo, &motivo)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("Producto no encontrado".to_string()),
            other => other.into(),
        })?;

    info!(
        producto_id,
        anterior = %change.precio_anterior,
        nuevo = %change.precio_nuevo,
        "Price updated"
    );
    Ok(created("Precio actualizado exitosamente", &change))
}

// =============================================================================
// Unsupported verbs
// =============================================================================

/// PUT on collection endpoints.
pub async fn put_not_implemented(_devops: RequireDevops) -> AppError {
    AppError::NotImplemented("PUT no implementado aún".to_string())
}

/// DELETE on collection endpoints.
pub async fn delete_not_implemented(_devops: RequireDevops) -> AppError {
    AppError::NotImplemented("DELETE no implementado aún".to_string())
}
