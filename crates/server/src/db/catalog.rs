//! Catalog repository (businesses, products, branches, offers, prices).

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use belgrano_tickets_core::{
    BranchId, BusinessId, CategoryId, EntityType, Money, OfferId, PriceChangeId, ProductId,
};

use super::RepositoryError;
use crate::models::catalog::{
    Branch, Business, Category, NewBranch, NewBusiness, NewOffer, NewProduct, Offer, PriceChange,
    Product, ProductPrice,
};

const BUSINESS_COLUMNS: &str = "id, nombre, descripcion, direccion, telefono, email, image_url, \
     activo, fecha_creacion, fecha_actualizacion";
const PRODUCT_COLUMNS: &str = "id, nombre, descripcion, precio, categoria, stock, stock_minimo, \
     negocio_id, image_url, activo, fecha_creacion, fecha_actualizacion";
const BRANCH_COLUMNS: &str = "id, nombre, direccion, telefono, email, negocio_id, image_url, \
     activo, fecha_creacion, fecha_actualizacion";
const OFFER_COLUMNS: &str =
    "id, titulo, descripcion, productos, hasta_agotar_stock, activa, fecha_creacion, fecha_actualizacion";
const PRICE_CHANGE_COLUMNS: &str =
    "id, producto_id, precio_anterior, precio_nuevo, motivo, fecha_cambio";

fn parse_money(raw: &str, what: &str) -> Result<Money, RepositoryError> {
    raw.parse()
        .map_err(|e| RepositoryError::DataCorruption(format!("{what}: {e}")))
}

fn fk_or_database(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_foreign_key_violation()
    {
        return RepositoryError::NotFound;
    }
    RepositoryError::Database(e)
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct BusinessRow {
    id: BusinessId,
    nombre: String,
    descripcion: Option<String>,
    direccion: Option<String>,
    telefono: Option<String>,
    email: Option<String>,
    image_url: Option<String>,
    activo: bool,
    fecha_creacion: DateTime<Utc>,
    fecha_actualizacion: DateTime<Utc>,
}

impl From<BusinessRow> for Business {
    fn from(row: BusinessRow) -> Self {
        Self {
            id: row.id,
            nombre: row.nombre,
            descripcion: row.descripcion,
            direccion: row.direccion,
            telefono: row.telefono,
            email: row.email,
            image_url: row.image_url,
            activo: row.activo,
            fecha_creacion: row.fecha_creacion,
            fecha_actualizacion: row.fecha_actualizacion,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    nombre: String,
    descripcion: Option<String>,
    precio: String,
    categoria: Option<String>,
    stock: i64,
    stock_minimo: i64,
    negocio_id: Option<BusinessId>,
    image_url: Option<String>,
    activo: bool,
    fecha_creacion: DateTime<Utc>,
    fecha_actualizacion: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            precio: parse_money(&row.precio, "producto precio")?,
            id: row.id,
            nombre: row.nombre,
            descripcion: row.descripcion,
            categoria: row.categoria,
            stock: row.stock,
            stock_minimo: row.stock_minimo,
            negocio_id: row.negocio_id,
            image_url: row.image_url,
            activo: row.activo,
            fecha_creacion: row.fecha_creacion,
            fecha_actualizacion: row.fecha_actualizacion,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BranchRow {
    id: BranchId,
    nombre: String,
    direccion: Option<String>,
    telefono: Option<String>,
    email: Option<String>,
    negocio_id: BusinessId,
    image_url: Option<String>,
    activo: bool,
    fecha_creacion: DateTime<Utc>,
    fecha_actualizacion: DateTime<Utc>,
}

impl From<BranchRow> for Branch {
    fn from(row: BranchRow) -> Self {
        Self {
            id: row.id,
            nombre: row.nombre,
            direccion: row.direccion,
            telefono: row.telefono,
            email: row.email,
            negocio_id: row.negocio_id,
            image_url: row.image_url,
            activo: row.activo,
            fecha_creacion: row.fecha_creacion,
            fecha_actualizacion: row.fecha_actualizacion,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OfferRow {
    id: OfferId,
    titulo: String,
    descripcion: Option<String>,
    productos: String,
    hasta_agotar_stock: bool,
    activa: bool,
    fecha_creacion: DateTime<Utc>,
    fecha_actualizacion: DateTime<Utc>,
}

impl TryFrom<OfferRow> for Offer {
    type Error = RepositoryError;

    fn try_from(row: OfferRow) -> Result<Self, Self::Error> {
        let productos = serde_json::from_str(&row.productos).map_err(|e| {
            RepositoryError::DataCorruption(format!("oferta {} productos: {e}", row.id))
        })?;
        Ok(Self {
            id: row.id,
            titulo: row.titulo,
            descripcion: row.descripcion,
            productos,
            hasta_agotar_stock: row.hasta_agotar_stock,
            activa: row.activa,
            fecha_creacion: row.fecha_creacion,
            fecha_actualizacion: row.fecha_actualizacion,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    nombre: String,
    descripcion: Option<String>,
    activa: bool,
    fecha_creacion: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            nombre: row.nombre,
            descripcion: row.descripcion,
            activa: row.activa,
            fecha_creacion: row.fecha_creacion,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PriceChangeRow {
    id: PriceChangeId,
    producto_id: ProductId,
    precio_anterior: String,
    precio_nuevo: String,
    motivo: String,
    fecha_cambio: DateTime<Utc>,
}

impl TryFrom<PriceChangeRow> for PriceChange {
    type Error = RepositoryError;

    fn try_from(row: PriceChangeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            producto_id: row.producto_id,
            precio_anterior: parse_money(&row.precio_anterior, "precio_anterior")?,
            precio_nuevo: parse_money(&row.precio_nuevo, "precio_nuevo")?,
            motivo: row.motivo,
            fecha_cambio: row.fecha_cambio,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductPriceRow {
    id: ProductId,
    nombre: String,
    precio: String,
    negocio_id: Option<BusinessId>,
    ultimo_precio: String,
    fecha_ultimo: Option<DateTime<Utc>>,
}

impl TryFrom<ProductPriceRow> for ProductPrice {
    type Error = RepositoryError;

    fn try_from(row: ProductPriceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            producto_id: row.id,
            nombre: row.nombre,
            precio: parse_money(&row.precio, "producto precio")?,
            negocio_id: row.negocio_id,
            ultimo_precio: parse_money(&row.ultimo_precio, "ultimo_precio")?,
            fecha_ultimo: row.fecha_ultimo,
        })
    }
}

// =============================================================================
// Outputs
// =============================================================================

/// Row counts shown on the `DevOps` status page.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct CatalogCounts {
    pub negocios: i64,
    pub productos: i64,
    pub sucursales: i64,
    pub ofertas: i64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository over the catalog database.
pub struct CatalogRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CatalogRepository<'a> {
    /// Create a new catalog repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    // -------------------------------------------------------------------------
    // Businesses
    // -------------------------------------------------------------------------

    /// List businesses by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_businesses(&self) -> Result<Vec<Business>, RepositoryError> {
        let rows = sqlx::query_as::<_, BusinessRow>(&format!(
            "SELECT {BUSINESS_COLUMNS} FROM negocios ORDER BY nombre"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Create a business.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_business(&self, new: &NewBusiness) -> Result<Business, RepositoryError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, BusinessRow>(&format!(
            r"
            INSERT INTO negocios (nombre, descripcion, direccion, telefono, email, fecha_creacion, fecha_actualizacion)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING {BUSINESS_COLUMNS}
            "
        ))
        .bind(&new.nombre)
        .bind(&new.descripcion)
        .bind(&new.direccion)
        .bind(&new.telefono)
        .bind(&new.email)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await?;
        Ok(row.into())
    }

    // -------------------------------------------------------------------------
    // Products
    // -------------------------------------------------------------------------

    /// List products by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM productos ORDER BY nombre"
        ))
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM productos WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if `negocio_id` references no business.
    pub async fn create_product(&self, new: &NewProduct) -> Result<Product, RepositoryError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO productos (
                nombre, descripcion, precio, categoria, stock, stock_minimo, negocio_id,
                fecha_creacion, fecha_actualizacion
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&new.nombre)
        .bind(&new.descripcion)
        .bind(new.precio.to_storage())
        .bind(&new.categoria)
        .bind(new.stock)
        .bind(new.stock_minimo)
        .bind(new.negocio_id)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await
        .map_err(fk_or_database)?;
        row.try_into()
    }

    // -------------------------------------------------------------------------
    // Branches
    // -------------------------------------------------------------------------

    /// List branches, optionally only those of one business.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_branches(
        &self,
        negocio: Option<BusinessId>,
    ) -> Result<Vec<Branch>, RepositoryError> {
        let rows = sqlx::query_as::<_, BranchRow>(&format!(
            "SELECT {BRANCH_COLUMNS} FROM sucursales \
             WHERE (? IS NULL OR negocio_id = ?) ORDER BY nombre"
        ))
        .bind(negocio)
        .bind(negocio)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Create a branch.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the business does not exist.
    pub async fn create_branch(&self, new: &NewBranch) -> Result<Branch, RepositoryError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, BranchRow>(&format!(
            r"
            INSERT INTO sucursales (nombre, direccion, telefono, email, negocio_id, fecha_creacion, fecha_actualizacion)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING {BRANCH_COLUMNS}
            "
        ))
        .bind(&new.nombre)
        .bind(&new.direccion)
        .bind(&new.telefono)
        .bind(&new.email)
        .bind(new.negocio_id)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await
        .map_err(fk_or_database)?;
        Ok(row.into())
    }

    // -------------------------------------------------------------------------
    // Offers & categories
    // -------------------------------------------------------------------------

    /// List offers, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_offers(&self) -> Result<Vec<Offer>, RepositoryError> {
        let rows = sqlx::query_as::<_, OfferRow>(&format!(
            "SELECT {OFFER_COLUMNS} FROM ofertas ORDER BY fecha_creacion DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Create an offer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_offer(&self, new: &NewOffer) -> Result<Offer, RepositoryError> {
        let productos = serde_json::to_string(&new.productos)
            .map_err(|e| RepositoryError::DataCorruption(format!("productos: {e}")))?;
        let now = Utc::now();
        let row = sqlx::query_as::<_, OfferRow>(&format!(
            r"
            INSERT INTO ofertas (titulo, descripcion, productos, hasta_agotar_stock, fecha_creacion, fecha_actualizacion)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING {OFFER_COLUMNS}
            "
        ))
        .bind(&new.titulo)
        .bind(&new.descripcion)
        .bind(productos)
        .bind(new.hasta_agotar_stock)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await?;
        row.try_into()
    }

    /// List categories by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, nombre, descripcion, activa, fecha_creacion FROM categorias ORDER BY nombre",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    // -------------------------------------------------------------------------
    // Prices
    // -------------------------------------------------------------------------

    /// Change a product's price and record the change.
    ///
    /// The product update and the history insert share one transaction, so
    /// each call leaves exactly one new history row or none.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn update_price(
        &self,
        producto: ProductId,
        nuevo: Money,
        motivo: &str,
    ) -> Result<PriceChange, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let anterior = sqlx::query_scalar::<_, String>("SELECT precio FROM productos WHERE id = ?")
            .bind(producto)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        let anterior = parse_money(&anterior, "producto precio")?;

        let now = Utc::now();
        sqlx::query("UPDATE productos SET precio = ?, fecha_actualizacion = ? WHERE id = ?")
            .bind(nuevo.to_storage())
            .bind(now)
            .bind(producto)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, PriceChangeRow>(&format!(
            r"
            INSERT INTO precios_historial (producto_id, precio_anterior, precio_nuevo, motivo, fecha_cambio)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {PRICE_CHANGE_COLUMNS}
            "
        ))
        .bind(producto)
        .bind(anterior.to_storage())
        .bind(nuevo.to_storage())
        .bind(motivo)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    /// Every product with the price set by its latest change.
    ///
    /// Products that were never repriced report their current price.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_prices(&self) -> Result<Vec<ProductPrice>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductPriceRow>(
            r"
            SELECT p.id, p.nombre, p.precio, p.negocio_id,
                   COALESCE(h.precio_nuevo, p.precio) AS ultimo_precio,
                   h.fecha_cambio AS fecha_ultimo
            FROM productos p
            LEFT JOIN precios_historial h ON h.id = (
                SELECT MAX(id) FROM precios_historial WHERE producto_id = p.id
            )
            ORDER BY p.nombre
            ",
        )
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Price history for one product, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn price_history(
        &self,
        producto: ProductId,
    ) -> Result<Vec<PriceChange>, RepositoryError> {
        let rows = sqlx::query_as::<_, PriceChangeRow>(&format!(
            "SELECT {PRICE_CHANGE_COLUMNS} FROM precios_historial WHERE producto_id = ? ORDER BY id"
        ))
        .bind(producto)
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    // -------------------------------------------------------------------------
    // Images & counts
    // -------------------------------------------------------------------------

    /// Point an entity's `image_url` at an uploaded file.
    ///
    /// Returns whether a row was updated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_image_url(
        &self,
        entity: EntityType,
        id: i64,
        url: &str,
    ) -> Result<bool, RepositoryError> {
        let table = match entity {
            EntityType::Business => "negocios",
            EntityType::Branch => "sucursales",
            EntityType::Product => "productos",
        };
        let result = sqlx::query(&format!(
            "UPDATE {table} SET image_url = ?, fecha_actualizacion = ? WHERE id = ?"
        ))
        .bind(url)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Row counts per catalog table.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn counts(&self) -> Result<CatalogCounts, RepositoryError> {
        let (negocios, productos, sucursales, ofertas) =
            sqlx::query_as::<_, (i64, i64, i64, i64)>(
                r"
                SELECT
                    (SELECT COUNT(*) FROM negocios),
                    (SELECT COUNT(*) FROM productos),
                    (SELECT COUNT(*) FROM sucursales),
                    (SELECT COUNT(*) FROM ofertas)
                ",
            )
            .fetch_one(self.pool)
            .await?;
        Ok(CatalogCounts {
            negocios,
            productos,
            sucursales,
            ofertas,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::{create_pool, init_catalog_schema};
    use secrecy::SecretString;

    async fn pool() -> SqlitePool {
        let pool = create_pool(&SecretString::from("sqlite::memory:"))
            .await
            .unwrap();
        init_catalog_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_update_price_appends_one_history_row() {
        let pool = pool().await;
        let repo = CatalogRepository::new(&pool);
        let product = repo
            .create_product(&NewProduct {
                nombre: "Aceite".to_string(),
                precio: "1500".parse().unwrap(),
                ..NewProduct::default()
            })
            .await
            .unwrap();

        let change = repo
            .update_price(product.id, "1750.5".parse().unwrap(), "Inflación")
            .await
            .unwrap();
        assert_eq!(change.precio_anterior, "1500".parse().unwrap());
        assert_eq!(change.precio_nuevo, "1750.5".parse().unwrap());

        let history = repo.price_history(product.id).await.unwrap();
        assert_eq!(history.len(), 1);
        let reloaded = repo.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(reloaded.precio, "1750.5".parse().unwrap());

        let prices = repo.list_prices().await.unwrap();
        assert_eq!(prices[0].ultimo_precio, "1750.5".parse().unwrap());
        assert!(prices[0].fecha_ultimo.is_some());
    }

    #[tokio::test]
    async fn test_unpriced_product_reports_current_price() {
        let pool = pool().await;
        let repo = CatalogRepository::new(&pool);
        repo.create_product(&NewProduct {
            nombre: "Harina".to_string(),
            precio: "980".parse().unwrap(),
            ..NewProduct::default()
        })
        .await
        .unwrap();

        let prices = repo.list_prices().await.unwrap();
        assert_eq!(prices[0].ultimo_precio, "980".parse().unwrap());
        assert!(prices[0].fecha_ultimo.is_none());
    }

    #[tokio::test]
    async fn test_update_price_unknown_product() {
        let pool = pool().await;
        let repo = CatalogRepository::new(&pool);
        let result = repo
            .update_price(ProductId::new(42), Money::ZERO, "x")
            .await;
        assert!(matches!(result, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_branches_filter_and_missing_business() {
        let pool = pool().await;
        let repo = CatalogRepository::new(&pool);
        let a = repo
            .create_business(&NewBusiness {
                nombre: "Almacén".to_string(),
                ..NewBusiness::default()
            })
            .await
            .unwrap();
        let b = repo
            .create_business(&NewBusiness {
                nombre: "Verdulería".to_string(),
                ..NewBusiness::default()
            })
            .await
            .unwrap();
        for (nombre, negocio_id) in [("Centro", a.id), ("Norte", a.id), ("Sur", b.id)] {
            repo.create_branch(&NewBranch {
                nombre: nombre.to_string(),
                direccion: None,
                telefono: None,
                email: None,
                negocio_id,
            })
            .await
            .unwrap();
        }

        assert_eq!(repo.list_branches(None).await.unwrap().len(), 3);
        assert_eq!(repo.list_branches(Some(a.id)).await.unwrap().len(), 2);

        let orphan = repo
            .create_branch(&NewBranch {
                nombre: "Huérfana".to_string(),
                direccion: None,
                telefono: None,
                email: None,
                negocio_id: BusinessId::new(999),
            })
            .await;
        assert!(matches!(orphan, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_set_image_url_reports_missing_row() {
        let pool = pool().await;
        let repo = CatalogRepository::new(&pool);
        let business = repo
            .create_business(&NewBusiness {
                nombre: "Almacén".to_string(),
                ..NewBusiness::default()
            })
            .await
            .unwrap();

        assert!(
            repo.set_image_url(EntityType::Business, business.id.as_i64(), "/media/business/a.png")
                .await
                .unwrap()
        );
        assert!(
            !repo
                .set_image_url(EntityType::Product, 77, "/media/product/b.png")
                .await
                .unwrap()
        );
        assert_eq!(repo.counts().await.unwrap().negocios, 1);
    }
}
