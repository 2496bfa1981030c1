//! Catalog domain types (businesses, products, branches, offers, prices).

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use belgrano_tickets_core::{
    BranchId, BusinessId, CategoryId, Money, OfferId, PriceChangeId, ProductId,
};

/// A business (`negocio`) selling through Belgrano Ahorro.
#[derive(Debug, Clone, Serialize)]
pub struct Business {
    pub id: BusinessId,
    pub nombre: String,
    pub descripcion: Option<String>,
    pub direccion: Option<String>,
    pub telefono: Option<String>,
    pub email: Option<String>,
    pub image_url: Option<String>,
    pub activo: bool,
    pub fecha_creacion: DateTime<Utc>,
    pub fecha_actualizacion: DateTime<Utc>,
}

/// A product, optionally owned by a business.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub nombre: String,
    pub descripcion: Option<String>,
    pub precio: Money,
    pub categoria: Option<String>,
    pub stock: i64,
    pub stock_minimo: i64,
    pub negocio_id: Option<BusinessId>,
    pub image_url: Option<String>,
    pub activo: bool,
    pub fecha_creacion: DateTime<Utc>,
    pub fecha_actualizacion: DateTime<Utc>,
}

/// A physical branch (`sucursal`) of a business.
#[derive(Debug, Clone, Serialize)]
pub struct Branch {
    pub id: BranchId,
    pub nombre: String,
    pub direccion: Option<String>,
    pub telefono: Option<String>,
    pub email: Option<String>,
    pub negocio_id: BusinessId,
    pub image_url: Option<String>,
    pub activo: bool,
    pub fecha_creacion: DateTime<Utc>,
    pub fecha_actualizacion: DateTime<Utc>,
}

/// A promotional offer over a set of products.
#[derive(Debug, Clone, Serialize)]
pub struct Offer {
    pub id: OfferId,
    pub titulo: String,
    pub descripcion: Option<String>,
    /// Free-form product references as sent by the panel.
    pub productos: Vec<Value>,
    pub hasta_agotar_stock: bool,
    pub activa: bool,
    pub fecha_creacion: DateTime<Utc>,
    pub fecha_actualizacion: DateTime<Utc>,
}

/// A product category.
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub nombre: String,
    pub descripcion: Option<String>,
    pub activa: bool,
    pub fecha_creacion: DateTime<Utc>,
}

/// One recorded price change.
#[derive(Debug, Clone, Serialize)]
pub struct PriceChange {
    pub id: PriceChangeId,
    pub producto_id: ProductId,
    pub precio_anterior: Money,
    pub precio_nuevo: Money,
    pub motivo: String,
    pub fecha_cambio: DateTime<Utc>,
}

/// Current price of a product together with its latest change.
#[derive(Debug, Clone, Serialize)]
pub struct ProductPrice {
    pub producto_id: ProductId,
    pub nombre: String,
    pub precio: Money,
    pub negocio_id: Option<BusinessId>,
    /// Price set by the most recent change, or the current price if the
    /// product was never repriced.
    pub ultimo_precio: Money,
    /// When the most recent change happened.
    pub fecha_ultimo: Option<DateTime<Utc>>,
}

// =============================================================================
// Inputs
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct NewBusiness {
    pub nombre: String,
    pub descripcion: Option<String>,
    pub direccion: Option<String>,
    pub telefono: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewProduct {
    pub nombre: String,
    pub descripcion: Option<String>,
    pub precio: Money,
    pub categoria: Option<String>,
    pub stock: i64,
    pub stock_minimo: i64,
    pub negocio_id: Option<BusinessId>,
}

#[derive(Debug, Clone)]
pub struct NewBranch {
    pub nombre: String,
    pub direccion: Option<String>,
    pub telefono: Option<String>,
    pub email: Option<String>,
    pub negocio_id: BusinessId,
}

#[derive(Debug, Clone, Default)]
pub struct NewOffer {
    pub titulo: String,
    pub descripcion: Option<String>,
    pub productos: Vec<Value>,
    pub hasta_agotar_stock: bool,
}
