//! Idempotent schema setup.
//!
//! Money columns are TEXT holding exact decimals (see `Money::to_storage`).
//! Timestamps are RFC 3339 TEXT written by sqlx's chrono support.

use sqlx::SqlitePool;

/// Tickets database: users, tickets, key/value settings.
const TICKET_SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL CHECK (role IN ('admin', 'flota')),
        nombre TEXT NOT NULL,
        activo INTEGER NOT NULL DEFAULT 1,
        fecha_creacion TEXT NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS tickets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        numero TEXT NOT NULL UNIQUE,
        cliente_nombre TEXT NOT NULL,
        cliente_direccion TEXT NOT NULL,
        cliente_telefono TEXT NOT NULL,
        cliente_email TEXT NOT NULL,
        productos TEXT NOT NULL DEFAULT '[]',
        total TEXT NOT NULL DEFAULT '0',
        estado TEXT NOT NULL DEFAULT 'pendiente'
            CHECK (estado IN ('pendiente', 'en_proceso', 'entregado', 'cancelado')),
        prioridad TEXT NOT NULL DEFAULT 'normal'
            CHECK (prioridad IN ('baja', 'normal', 'alta', 'urgente')),
        indicaciones TEXT NOT NULL DEFAULT '',
        asignado_a INTEGER REFERENCES users(id) ON DELETE SET NULL,
        repartidor_nombre TEXT,
        fecha_creacion TEXT NOT NULL,
        fecha_asignacion TEXT,
        fecha_entrega TEXT,
        notas_repartidor TEXT NOT NULL DEFAULT ''
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_tickets_asignado_a ON tickets (asignado_a)",
    "CREATE INDEX IF NOT EXISTS idx_tickets_estado ON tickets (estado)",
    r"
    CREATE TABLE IF NOT EXISTS configuracion (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        clave TEXT NOT NULL UNIQUE,
        valor TEXT NOT NULL,
        descripcion TEXT,
        fecha_actualizacion TEXT NOT NULL
    )
    ",
];

/// Catalog database managed from the `DevOps` panel.
const CATALOG_SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS negocios (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        nombre TEXT NOT NULL,
        descripcion TEXT,
        direccion TEXT,
        telefono TEXT,
        email TEXT,
        image_url TEXT,
        activo INTEGER NOT NULL DEFAULT 1,
        fecha_creacion TEXT NOT NULL,
        fecha_actualizacion TEXT NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS productos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        nombre TEXT NOT NULL,
        descripcion TEXT,
        precio TEXT NOT NULL,
        categoria TEXT,
        stock INTEGER NOT NULL DEFAULT 0,
        stock_minimo INTEGER NOT NULL DEFAULT 0,
        negocio_id INTEGER REFERENCES negocios(id),
        image_url TEXT,
        activo INTEGER NOT NULL DEFAULT 1,
        fecha_creacion TEXT NOT NULL,
        fecha_actualizacion TEXT NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS sucursales (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        nombre TEXT NOT NULL,
        direccion TEXT,
        telefono TEXT,
        email TEXT,
        negocio_id INTEGER NOT NULL REFERENCES negocios(id),
        image_url TEXT,
        activo INTEGER NOT NULL DEFAULT 1,
        fecha_creacion TEXT NOT NULL,
        fecha_actualizacion TEXT NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS ofertas (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        titulo TEXT NOT NULL,
        descripcion TEXT,
        productos TEXT NOT NULL DEFAULT '[]',
        hasta_agotar_stock INTEGER NOT NULL DEFAULT 0,
        activa INTEGER NOT NULL DEFAULT 1,
        fecha_creacion TEXT NOT NULL,
        fecha_actualizacion TEXT NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS precios_historial (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        producto_id INTEGER NOT NULL REFERENCES productos(id),
        precio_anterior TEXT NOT NULL,
        precio_nuevo TEXT NOT NULL,
        motivo TEXT NOT NULL,
        fecha_cambio TEXT NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_precios_historial_producto ON precios_historial (producto_id)",
    r"
    CREATE TABLE IF NOT EXISTS categorias (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        nombre TEXT NOT NULL UNIQUE,
        descripcion TEXT,
        activa INTEGER NOT NULL DEFAULT 1,
        fecha_creacion TEXT NOT NULL
    )
    ",
];

async fn apply(pool: &SqlitePool, statements: &[&str]) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for statement in statements {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await
}

/// Create the tickets/users/settings tables if they do not exist.
///
/// # Errors
///
/// Returns `sqlx::Error` if any statement fails.
pub async fn init_ticket_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    apply(pool, TICKET_SCHEMA).await
}

/// Create the catalog tables if they do not exist.
///
/// # Errors
///
/// Returns `sqlx::Error` if any statement fails.
pub async fn init_catalog_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    apply(pool, CATALOG_SCHEMA).await
}
