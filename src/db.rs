use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::storage::{KvStore, StoreError};

/// Key-value slots kept in the `kv` table.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        use anyhow::Context;

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;

        // Run migrations if present
        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        Ok(Self { db })
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl KvStore for PgStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query_as::<_, (String,)>(
            r#"
            SELECT value
              FROM kv
             WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.db)
        .await
        .map_err(backend)?;
        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO kv (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.db)
        .await
        .map_err(backend)?;
        Ok(())
    }
}
