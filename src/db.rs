use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use anyhow::Result;

use crate::config::DatabaseConfig;

/// Open the catalog pool (WAL mode) / 打开目录数据库连接池
pub async fn connect(cfg: &DatabaseConfig) -> Result<SqlitePool> {
    // 连接级参数，池中每个连接都会应用
    let options = SqliteConnectOptions::from_str(&cfg.url)?
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .synchronous(SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .max_connections(cfg.max_connections.max(1))
        .connect_with(options)
        .await?;

    tracing::info!("Catalog database connected: {} (WAL mode)", cfg.url);
    Ok(pool)
}

/// Run database migrations / 运行数据库迁移
///
/// Only creates what is missing; existing rows are never touched.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS catalog_families (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS catalog_sets (
            id INTEGER PRIMARY KEY,
            family_id INTEGER REFERENCES catalog_families(id),
            name TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS catalog_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            name_lower TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL,
            popularity INTEGER NOT NULL DEFAULT 0,
            price REAL NOT NULL DEFAULT 0,
            set_id INTEGER REFERENCES catalog_sets(id),
            style_id INTEGER,
            user_id INTEGER,
            is_active INTEGER NOT NULL DEFAULT 1,
            is_deleted INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS catalog_item_tags (
            item_id INTEGER NOT NULL REFERENCES catalog_items(id),
            tag_id INTEGER NOT NULL,
            PRIMARY KEY (item_id, tag_id)
        ) WITHOUT ROWID
        "#,
    )
    .execute(pool)
    .await?;

    // 键集分页索引：(排序字段, id)
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_items_created ON catalog_items(created_at, id)",
        "CREATE INDEX IF NOT EXISTS idx_items_popularity ON catalog_items(popularity, id)",
        "CREATE INDEX IF NOT EXISTS idx_items_set ON catalog_items(set_id)",
        "CREATE INDEX IF NOT EXISTS idx_items_style ON catalog_items(style_id)",
        "CREATE INDEX IF NOT EXISTS idx_items_user ON catalog_items(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_sets_family ON catalog_sets(family_id)",
        "CREATE INDEX IF NOT EXISTS idx_item_tags_tag ON catalog_item_tags(tag_id, item_id)",
    ];
    for ddl in indexes {
        sqlx::query(ddl).execute(pool).await?;
    }

    tracing::info!("Catalog migrations applied");
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Row to seed in tests / 测试数据
    #[derive(Debug, Clone)]
    pub struct NewItem {
        pub name: String,
        pub created_at: i64,
        pub popularity: i64,
        pub price: f64,
        pub set_id: Option<i64>,
        pub style_id: Option<i64>,
        pub user_id: Option<i64>,
        pub is_active: bool,
        pub is_deleted: bool,
        pub tag_ids: Vec<i64>,
    }

    impl NewItem {
        pub fn named(name: &str, created_at: i64) -> Self {
            Self {
                name: name.to_string(),
                created_at,
                popularity: 0,
                price: 0.0,
                set_id: None,
                style_id: None,
                user_id: None,
                is_active: true,
                is_deleted: false,
                tag_ids: Vec::new(),
            }
        }
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "catalog_pager=debug".into()),
            )
            .with_test_writer()
            .try_init();
    }

    /// Single-connection in-memory pool with schema applied
    pub async fn memory_pool() -> SqlitePool {
        init_tracing();
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    pub async fn insert_set(pool: &SqlitePool, set_id: i64, family_id: i64) {
        sqlx::query("INSERT OR IGNORE INTO catalog_families (id) VALUES (?)")
            .bind(family_id)
            .execute(pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO catalog_sets (id, family_id) VALUES (?, ?)")
            .bind(set_id)
            .bind(family_id)
            .execute(pool)
            .await
            .unwrap();
    }

    pub async fn insert_item(pool: &SqlitePool, item: &NewItem) -> i64 {
        let result = sqlx::query(
            "INSERT INTO catalog_items (name, name_lower, created_at, popularity, price, set_id, style_id, user_id, is_active, is_deleted) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&item.name)
        .bind(item.name.to_lowercase())
        .bind(item.created_at)
        .bind(item.popularity)
        .bind(item.price)
        .bind(item.set_id)
        .bind(item.style_id)
        .bind(item.user_id)
        .bind(item.is_active)
        .bind(item.is_deleted)
        .execute(pool)
        .await
        .unwrap();

        let id = result.last_insert_rowid();
        for tag_id in &item.tag_ids {
            sqlx::query("INSERT INTO catalog_item_tags (item_id, tag_id) VALUES (?, ?)")
                .bind(id)
                .bind(tag_id)
                .execute(pool)
                .await
                .unwrap();
        }
        id
    }

    /// Seed `count` rows named "{prefix} {i}" with increasing created_at
    pub async fn seed_sequence(pool: &SqlitePool, prefix: &str, count: usize) -> Vec<i64> {
        let mut ids = Vec::with_capacity(count);
        for i in 0..count {
            let item = NewItem::named(&format!("{} {}", prefix, i), 1_700_000_000_000 + i as i64 * 1000);
            ids.push(insert_item(pool, &item).await);
        }
        ids
    }
}
