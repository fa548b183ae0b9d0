use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use tether_core::config::DatabaseConfig;
use tether_core::directory::{
    DirectoryFuture, DirectoryRecord, DirectoryStore, NewRecord, RecordId, RecordUpdate,
};
use tether_core::{Result, TetherError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tether_services (
    id BIGSERIAL PRIMARY KEY,
    host TEXT NOT NULL,
    binary_name TEXT NOT NULL,
    topic TEXT NOT NULL,
    report_count BIGINT NOT NULL DEFAULT 0,
    availability_zone TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (host, binary_name)
)
"#;

const COLUMNS: &str =
    "id, host, binary_name, topic, report_count, availability_zone, created_at, updated_at";

/// Directory backed by a PostgreSQL table.
#[derive(Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect using the database configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = config.url.as_deref().ok_or_else(|| {
            TetherError::InvalidConfiguration("database.url is not set".to_string())
        })?;

        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(config.pool_timeout_secs))
            .connect(url)
            .await
            .map_err(|e| {
                TetherError::DirectoryUnavailable(format!("Failed to connect to directory: {}", e))
            })?;

        Ok(Self::new(pool))
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the services table if it does not exist.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;

        tracing::debug!("Directory schema ready");
        Ok(())
    }
}

impl DirectoryStore for PgDirectory {
    fn get(&self, id: RecordId) -> DirectoryFuture<'_, Option<DirectoryRecord>> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "SELECT {} FROM tether_services WHERE id = $1",
                COLUMNS
            ))
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

            row.as_ref().map(record_from_row).transpose()
        })
    }

    fn get_by_args<'a>(
        &'a self,
        host: &'a str,
        binary: &'a str,
    ) -> DirectoryFuture<'a, Option<DirectoryRecord>> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "SELECT {} FROM tether_services WHERE host = $1 AND binary_name = $2",
                COLUMNS
            ))
            .bind(host)
            .bind(binary)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

            row.as_ref().map(record_from_row).transpose()
        })
    }

    fn create(&self, record: NewRecord) -> DirectoryFuture<'_, DirectoryRecord> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                r#"
                INSERT INTO tether_services (host, binary_name, topic, report_count, availability_zone)
                VALUES ($1, $2, $3, 0, $4)
                RETURNING {}
                "#,
                COLUMNS
            ))
            .bind(&record.host)
            .bind(&record.binary)
            .bind(&record.topic)
            .bind(&record.availability_zone)
            .fetch_one(&self.pool)
            .await
            .map_err(unavailable)?;

            record_from_row(&row)
        })
    }

    fn update(
        &self,
        id: RecordId,
        update: RecordUpdate,
    ) -> DirectoryFuture<'_, Option<DirectoryRecord>> {
        Box::pin(async move {
            let report_count = i64::try_from(update.report_count).map_err(|_| {
                TetherError::InvalidArgument(format!(
                    "report count {} out of range",
                    update.report_count
                ))
            })?;

            let row = sqlx::query(&format!(
                r#"
                UPDATE tether_services
                SET report_count = $2,
                    availability_zone = COALESCE($3, availability_zone),
                    updated_at = NOW()
                WHERE id = $1
                RETURNING {}
                "#,
                COLUMNS
            ))
            .bind(id.as_i64())
            .bind(report_count)
            .bind(update.availability_zone.as_deref())
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

            row.as_ref().map(record_from_row).transpose()
        })
    }

    fn destroy(&self, id: RecordId) -> DirectoryFuture<'_, bool> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM tether_services WHERE id = $1")
                .bind(id.as_i64())
                .execute(&self.pool)
                .await
                .map_err(unavailable)?;

            Ok(result.rows_affected() > 0)
        })
    }
}

fn unavailable(e: sqlx::Error) -> TetherError {
    TetherError::DirectoryUnavailable(e.to_string())
}

fn record_from_row(row: &PgRow) -> Result<DirectoryRecord> {
    let report_count: i64 = row.try_get("report_count").map_err(unavailable)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(unavailable)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(unavailable)?;

    Ok(DirectoryRecord {
        id: RecordId(row.try_get("id").map_err(unavailable)?),
        host: row.try_get("host").map_err(unavailable)?,
        binary: row.try_get("binary_name").map_err(unavailable)?,
        topic: row.try_get("topic").map_err(unavailable)?,
        report_count: report_count.max(0) as u64,
        availability_zone: row.try_get("availability_zone").map_err(unavailable)?,
        created_at,
        updated_at,
    })
}
