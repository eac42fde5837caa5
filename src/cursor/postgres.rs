//! Postgres cursor store
//!
//! One row per pair in `relay_cursors`; a save is a single upsert statement,
//! so it commits entirely or not at all.

use async_trait::async_trait;
use eyre::{Result, WrapErr};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::debug;

use super::{CursorStore, PairId};
use crate::error::CursorError;
use crate::types::Cursor;

pub struct PgCursorStore {
    pool: PgPool,
    pair: PairId,
}

impl PgCursorStore {
    /// Connect and bring the schema up to date
    pub async fn connect(database_url: &str, pair: PairId) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .wrap_err("Failed to connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .wrap_err("Failed to run database migrations")?;

        Ok(Self { pool, pair })
    }
}

#[async_trait]
impl CursorStore for PgCursorStore {
    async fn load(&self) -> Result<Option<Cursor>, CursorError> {
        let row: Option<(i64,)> =
            sqlx::query_as(r#"SELECT last_scanned_block FROM relay_cursors WHERE pair_id = $1"#)
                .bind(self.pair.as_str())
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.and_then(|(block,)| u64::try_from(block).ok().map(Cursor::new)))
    }

    async fn save(&self, cursor: Cursor) -> Result<(), CursorError> {
        let block = i64::try_from(cursor.last_scanned_block)
            .map_err(|_| CursorError::OutOfRange(cursor.last_scanned_block))?;

        sqlx::query(
            r#"
            INSERT INTO relay_cursors (pair_id, last_scanned_block)
            VALUES ($1, $2)
            ON CONFLICT (pair_id) DO UPDATE SET last_scanned_block = $2, updated_at = NOW()
            "#,
        )
        .bind(self.pair.as_str())
        .bind(block)
        .execute(&self.pool)
        .await?;

        debug!(pair = %self.pair, last_scanned_block = cursor.last_scanned_block, "Cursor saved");
        Ok(())
    }
}
