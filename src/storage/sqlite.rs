//! SQLite catalog store
//!
//! rusqlite behind a deadpool-sqlite connection pool. List-valued document
//! fields (conditions, seasons, tags) are stored as JSON text columns, and a
//! `catalog_meta` revision counter is bumped in the same transaction as every
//! write so trained models can tell when the catalog moved.

use crate::error::{RecommendError, Result};
use crate::storage::CatalogStore;
use crate::types::{CatalogStats, Event, EventContext, EventType, ObjectId, Product, User, UserId};
use async_trait::async_trait;
use deadpool_sqlite::{Config, Pool, PoolConfig, Runtime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default connection pool size
const DEFAULT_POOL_SIZE: usize = 8;

/// Tables the schema creates
pub const REQUIRED_TABLES: [&str; 4] = ["users", "products", "events", "catalog_meta"];

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    email TEXT,
    age REAL,
    gender TEXT,
    weight REAL,
    height REAL,
    bmi REAL,
    medical_conditions TEXT NOT NULL DEFAULT '[]',
    skin_type TEXT NOT NULL DEFAULT '[]',
    occupation TEXT NOT NULL DEFAULT '[]',
    diet_type TEXT,
    last_visit TEXT
);

CREATE TABLE IF NOT EXISTS products (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    description TEXT,
    price REAL NOT NULL DEFAULT 0,
    category TEXT,
    health_conditions TEXT NOT NULL DEFAULT '[]',
    seasonal TEXT NOT NULL DEFAULT '[]',
    occupation_tags TEXT NOT NULL DEFAULT '[]',
    complementary_products TEXT NOT NULL DEFAULT '[]',
    created_at TEXT
);

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    product_id TEXT NOT NULL,
    event_type TEXT NOT NULL CHECK(event_type IN (
        'view', 'search', 'favourite', 'add_to_cart', 'purchase'
    )),
    weight REAL NOT NULL,
    timestamp TEXT NOT NULL,
    session_id TEXT,
    rating INTEGER CHECK(rating IS NULL OR rating BETWEEN 1 AND 5),
    context TEXT
);

CREATE INDEX IF NOT EXISTS idx_events_user ON events(user_id);

CREATE TABLE IF NOT EXISTS catalog_meta (
    key TEXT PRIMARY KEY NOT NULL,
    value INTEGER NOT NULL
);

INSERT OR IGNORE INTO catalog_meta (key, value) VALUES ('revision', 0);
"#;

const USER_COLUMNS: &str = "id, email, age, gender, weight, height, bmi, medical_conditions, \
     skin_type, occupation, diet_type, last_visit";

const PRODUCT_COLUMNS: &str = "id, title, description, price, category, health_conditions, \
     seasonal, occupation_tags, complementary_products, created_at";

const EVENT_COLUMNS: &str =
    "id, user_id, product_id, event_type, weight, timestamp, session_id, rating, context";

/// SQLite-backed catalog with connection pooling
pub struct SqliteCatalog {
    pool: Pool,
    db_path: PathBuf,
}

impl SqliteCatalog {
    /// Open (creating if needed) a catalog database and apply the schema
    pub async fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        Self::open_with_pool_size(db_path, DEFAULT_POOL_SIZE).await
    }

    /// Open with a custom pool size
    pub async fn open_with_pool_size<P: AsRef<Path>>(db_path: P, pool_size: usize) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let catalog = Self::connect(db_path, pool_size)?;
        catalog.migrate().await?;
        Ok(catalog)
    }

    /// Open an existing database without touching its schema
    ///
    /// Used by diagnostics, which must report missing tables rather than
    /// create them.
    pub fn open_existing<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if !db_path.exists() {
            return Err(RecommendError::Database(format!(
                "Database file not found: {}",
                db_path.display()
            )));
        }
        Self::connect(db_path, 1)
    }

    fn connect(db_path: PathBuf, pool_size: usize) -> Result<Self> {
        info!(
            "Opening catalog database at: {} (pool_size: {})",
            db_path.display(),
            pool_size
        );

        let mut config = Config::new(db_path.clone());
        config.pool = Some(PoolConfig::new(pool_size.max(1)));
        let pool = config.create_pool(Runtime::Tokio1).map_err(|e| {
            RecommendError::Database(format!("Failed to create connection pool: {}", e))
        })?;
        Ok(Self { pool, db_path })
    }

    /// Path of the underlying database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Create tables and indexes (idempotent)
    pub async fn migrate(&self) -> Result<()> {
        debug!("Applying catalog schema");
        self.with_conn(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
    }

    /// Run `PRAGMA integrity_check`
    pub async fn check_integrity(&self) -> Result<bool> {
        self.with_conn(|conn| {
            let status: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
            Ok(status == "ok")
        })
        .await
    }

    /// Whether a table exists in the schema
    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        let table = table.to_string();
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
                params![table],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.pool.get().await.map_err(|e| {
            RecommendError::Database(format!("Failed to get connection from pool: {}", e))
        })?;

        conn.interact(f)
            .await
            .map_err(|e| RecommendError::Database(format!("Pool interaction failed: {}", e)))?
    }
}

fn bump_revision(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE catalog_meta SET value = value + 1 WHERE key = 'revision'",
        [],
    )?;
    Ok(())
}

fn to_json(values: &[String]) -> Result<String> {
    Ok(serde_json::to_string(values)?)
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn json_list(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn object_id(row: &Row<'_>, idx: usize) -> rusqlite::Result<ObjectId> {
    let raw: String = row.get(idx)?;
    ObjectId::parse(&raw).map_err(|e| conversion_error(idx, e))
}

fn user_id(row: &Row<'_>, idx: usize) -> rusqlite::Result<UserId> {
    let raw: String = row.get(idx)?;
    UserId::parse(&raw).map_err(|e| conversion_error(idx, e))
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: user_id(row, 0)?,
        email: row.get(1)?,
        age: row.get(2)?,
        gender: row.get(3)?,
        weight: row.get(4)?,
        height: row.get(5)?,
        bmi: row.get(6)?,
        medical_conditions: json_list(row, 7)?,
        skin_type: json_list(row, 8)?,
        occupation: json_list(row, 9)?,
        diet_type: row.get(10)?,
        last_visit: row.get(11)?,
    })
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: object_id(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        price: row.get(3)?,
        category: row.get(4)?,
        health_conditions: json_list(row, 5)?,
        seasonal: json_list(row, 6)?,
        occupation_tags: json_list(row, 7)?,
        complementary_products: json_list(row, 8)?,
        created_at: row.get(9)?,
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    let event_type: String = row.get(3)?;
    let context: Option<String> = row.get(8)?;
    let context = match context {
        Some(raw) => Some(
            serde_json::from_str::<EventContext>(&raw).map_err(|e| conversion_error(8, e))?,
        ),
        None => None,
    };

    Ok(Event {
        id: Some(row.get(0)?),
        user_id: user_id(row, 1)?,
        product_id: object_id(row, 2)?,
        event_type: event_type
            .parse::<EventType>()
            .map_err(|e| conversion_error(3, e))?,
        weight: row.get(4)?,
        timestamp: row.get(5)?,
        session_id: row.get(6)?,
        rating: row.get(7)?,
        context,
    })
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    async fn upsert_user(&self, user: &User) -> Result<()> {
        let user = user.clone();
        let medical = to_json(&user.medical_conditions)?;
        let skin = to_json(&user.skin_type)?;
        let occupation = to_json(&user.occupation)?;

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO users (id, email, age, gender, weight, height, bmi,
                     medical_conditions, skin_type, occupation, diet_type, last_visit)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(id) DO UPDATE SET
                     email = excluded.email, age = excluded.age, gender = excluded.gender,
                     weight = excluded.weight, height = excluded.height, bmi = excluded.bmi,
                     medical_conditions = excluded.medical_conditions,
                     skin_type = excluded.skin_type, occupation = excluded.occupation,
                     diet_type = excluded.diet_type, last_visit = excluded.last_visit",
                params![
                    user.id.as_str(),
                    user.email,
                    user.age,
                    user.gender,
                    user.weight,
                    user.height,
                    user.bmi,
                    medical,
                    skin,
                    occupation,
                    user.diet_type,
                    user.last_visit,
                ],
            )?;
            bump_revision(&tx)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        let id = id.as_str().to_string();
        self.with_conn(move |conn| {
            let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
            Ok(conn
                .query_row(&sql, params![id], user_from_row)
                .optional()?)
        })
        .await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM users ORDER BY seq", USER_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let users = stmt
                .query_map([], user_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
        .await
    }

    async fn upsert_product(&self, product: &Product) -> Result<()> {
        let product = product.clone();
        let health = to_json(&product.health_conditions)?;
        let seasonal = to_json(&product.seasonal)?;
        let tags = to_json(&product.occupation_tags)?;
        let complementary = to_json(&product.complementary_products)?;

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO products (id, title, description, price, category,
                     health_conditions, seasonal, occupation_tags, complementary_products, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(id) DO UPDATE SET
                     title = excluded.title, description = excluded.description,
                     price = excluded.price, category = excluded.category,
                     health_conditions = excluded.health_conditions,
                     seasonal = excluded.seasonal, occupation_tags = excluded.occupation_tags,
                     complementary_products = excluded.complementary_products,
                     created_at = excluded.created_at",
                params![
                    product.id.as_str(),
                    product.title,
                    product.description,
                    product.price,
                    product.category,
                    health,
                    seasonal,
                    tags,
                    complementary,
                    product.created_at,
                ],
            )?;
            bump_revision(&tx)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_product(&self, id: &ObjectId) -> Result<Option<Product>> {
        let id = id.as_str().to_string();
        self.with_conn(move |conn| {
            let sql = format!("SELECT {} FROM products WHERE id = ?", PRODUCT_COLUMNS);
            Ok(conn
                .query_row(&sql, params![id], product_from_row)
                .optional()?)
        })
        .await
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM products ORDER BY seq", PRODUCT_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let products = stmt
                .query_map([], product_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(products)
        })
        .await
    }

    /// Case-insensitive substring match on titles
    ///
    /// SQLite's `lower()` only folds ASCII, so titles are folded in Rust.
    async fn search_products(&self, query: &str) -> Result<Vec<Product>> {
        let needle = query.to_lowercase();
        let products = self.list_products().await?;
        Ok(products
            .into_iter()
            .filter(|p| p.title.to_lowercase().contains(&needle))
            .collect())
    }

    async fn insert_event(&self, event: &Event) -> Result<i64> {
        let event = event.clone();
        let context = match &event.context {
            Some(ctx) => Some(serde_json::to_string(ctx)?),
            None => None,
        };

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO events (user_id, product_id, event_type, weight, timestamp,
                     session_id, rating, context)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    event.user_id.as_str(),
                    event.product_id.as_str(),
                    event.event_type.as_str(),
                    event.weight,
                    event.timestamp,
                    event.session_id,
                    event.rating,
                    context,
                ],
            )?;
            let id = tx.last_insert_rowid();
            bump_revision(&tx)?;
            tx.commit()?;
            Ok(id)
        })
        .await
    }

    async fn remove_event(
        &self,
        user: &UserId,
        product: &ObjectId,
        event_type: EventType,
    ) -> Result<()> {
        let user = user.as_str().to_string();
        let product = product.as_str().to_string();

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute(
                "DELETE FROM events WHERE id = (
                     SELECT id FROM events
                     WHERE user_id = ?1 AND product_id = ?2 AND event_type = ?3
                     ORDER BY id LIMIT 1
                 )",
                params![user, product, event_type.as_str()],
            )?;
            if removed == 0 {
                return Err(RecommendError::EventNotFound);
            }
            bump_revision(&tx)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn list_events(&self) -> Result<Vec<Event>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM events ORDER BY id", EVENT_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let events = stmt
                .query_map([], event_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(events)
        })
        .await
    }

    async fn events_for_user(&self, user: &UserId) -> Result<Vec<Event>> {
        let user = user.as_str().to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM events WHERE user_id = ? ORDER BY id",
                EVENT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let events = stmt
                .query_map(params![user], event_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(events)
        })
        .await
    }

    async fn revision(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let value: i64 = conn.query_row(
                "SELECT value FROM catalog_meta WHERE key = 'revision'",
                [],
                |row| row.get(0),
            )?;
            Ok(value as u64)
        })
        .await
    }

    async fn stats(&self) -> Result<CatalogStats> {
        self.with_conn(|conn| {
            let count = |table: &str| -> rusqlite::Result<usize> {
                let n: i64 =
                    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                        row.get(0)
                    })?;
                Ok(n as usize)
            };
            Ok(CatalogStats {
                users: count("users")?,
                products: count("products")?,
                events: count("events")?,
            })
        })
        .await
    }
}
