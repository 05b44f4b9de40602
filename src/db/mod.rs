//! # Database Module
//!
//! Owns the SQLite pool and the schema. Every repository submodule takes a
//! `&SqlitePool` and exposes plain async functions for one table.
//!
//! The pool is capped at a single connection and runs with
//! `journal_mode = DELETE` and `synchronous = FULL`, so each mutating
//! statement is on disk before it returns and statements never interleave.

use anyhow::{Context, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;
use tracing::info;

use crate::errors::StoreResult;
use crate::models::ShopStats;

pub mod categories;
pub mod news;
pub mod orders;
pub mod products;
pub mod promocodes;
pub mod settings;
pub mod users;

/// Categories created on first start so the product form has a valid set
pub const DEFAULT_CATEGORIES: [(&str, &str, &str); 4] = [
    ("💧 Liquids", "E-liquids", "💧"),
    ("🔥 Pods", "Pod systems", "🔥"),
    ("🔧 Consumables", "Coils and cartridges", "🔧"),
    ("🎁 Kits", "Bundles", "🎁"),
];

const SCHEMA: &[(&str, &str)] = &[
    (
        "users",
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            telegram_id INTEGER UNIQUE NOT NULL,
            username TEXT,
            first_name TEXT,
            last_name TEXT,
            is_admin INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    ),
    (
        "categories",
        "CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            icon TEXT,
            sort_order INTEGER NOT NULL DEFAULT 0
        )",
    ),
    (
        "products",
        "CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category_id INTEGER,
            name TEXT NOT NULL,
            description TEXT,
            price INTEGER NOT NULL,
            image_ref TEXT,
            stock INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE SET NULL
        )",
    ),
    (
        "orders",
        "CREATE TABLE IF NOT EXISTS orders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_uuid TEXT UNIQUE NOT NULL,
            user_id INTEGER NOT NULL,
            total_amount INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'confirmed', 'shipping', 'completed', 'cancelled')),
            delivery_address TEXT,
            contact_info TEXT,
            comment TEXT,
            promocode TEXT,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (user_id) REFERENCES users(id)
        )",
    ),
    (
        "order_items",
        "CREATE TABLE IF NOT EXISTS order_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id INTEGER NOT NULL,
            product_id INTEGER NOT NULL,
            product_name TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            price INTEGER NOT NULL,
            FOREIGN KEY (order_id) REFERENCES orders(id) ON DELETE CASCADE
        )",
    ),
    (
        "promocodes",
        "CREATE TABLE IF NOT EXISTS promocodes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT UNIQUE NOT NULL,
            discount INTEGER NOT NULL CHECK (discount BETWEEN 1 AND 100),
            uses_count INTEGER NOT NULL DEFAULT 0,
            max_uses INTEGER,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    ),
    (
        "news",
        "CREATE TABLE IF NOT EXISTS news (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            image_ref TEXT,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    ),
    (
        "settings",
        "CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
    ),
    ("idx_users_telegram", "CREATE INDEX IF NOT EXISTS idx_users_telegram ON users(telegram_id)"),
    ("idx_products_category", "CREATE INDEX IF NOT EXISTS idx_products_category ON products(category_id)"),
    ("idx_products_active", "CREATE INDEX IF NOT EXISTS idx_products_active ON products(is_active)"),
    ("idx_orders_user", "CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id)"),
    ("idx_orders_status", "CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status)"),
    ("idx_order_items_order", "CREATE INDEX IF NOT EXISTS idx_order_items_order ON order_items(order_id)"),
];

/// Open (creating if missing) the shop database at `database_url`
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    info!(database_url = %database_url, "Opening database");

    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("Invalid database URL: {database_url}"))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete)
        .synchronous(SqliteSynchronous::Full)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    Ok(pool)
}

/// Fresh private in-memory database with the schema applied
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    // One connection that never expires, otherwise the in-memory data would vanish
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .context("Failed to open in-memory database")?;

    init_database_schema(&pool).await?;
    Ok(pool)
}

/// Initialize the database schema
pub async fn init_database_schema(pool: &SqlitePool) -> Result<()> {
    info!("Initializing database schema...");

    for (name, statement) in SCHEMA {
        sqlx::query(*statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to create {name}"))?;
    }

    info!("Database schema initialized successfully");
    Ok(())
}

/// Insert the default categories when the table is empty
pub async fn seed_default_categories(pool: &SqlitePool) -> Result<usize> {
    if !categories::list_categories(pool).await?.is_empty() {
        return Ok(0);
    }

    for (position, (name, description, icon)) in DEFAULT_CATEGORIES.iter().enumerate() {
        categories::create_category(pool, name, Some(*description), Some(*icon), position as i64 + 1)
            .await
            .context("Failed to seed categories")?;
    }

    info!(count = DEFAULT_CATEGORIES.len(), "Seeded default categories");
    Ok(DEFAULT_CATEGORIES.len())
}

/// Headline numbers for the admin statistics screen
pub async fn shop_stats(pool: &SqlitePool) -> StoreResult<ShopStats> {
    Ok(ShopStats {
        users: users::count_users(pool).await?,
        active_products: products::count_active_products(pool).await?,
        orders: orders::count_orders(pool).await?,
        revenue: orders::total_revenue(pool).await?,
    })
}
