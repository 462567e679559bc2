// src/store/postgres.rs
//! PostgreSQL backend. One row per sighting; expiry is evaluated in SQL
//! against `last_active_at`, so refresh and sweep are single statements.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::SightingBackend;
use crate::error::{Result, SightingError};
use crate::sighting::{Location, Sighting};

const COLUMNS: &str = "id, animal, is_baby, lat, lng, image_url, created_at, last_active_at";

#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    /// Opens a pool and applies pending migrations.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await
            .map_err(map_sqlx_error)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| SightingError::store(format!("running migrations: {e}")))?;

        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl SightingBackend for PgBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn insert(&self, sighting: Sighting) -> Result<Sighting> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO sightings ({COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(sighting.id)
        .bind(sighting.animal.as_str())
        .bind(sighting.is_baby)
        .bind(sighting.location.lat)
        .bind(sighting.location.lng)
        .bind(sighting.image_url.as_deref())
        .bind(sighting.created_at)
        .bind(sighting.last_active_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row_to_sighting(&row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Sighting>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM sightings WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.as_ref().map(row_to_sighting).transpose()
    }

    async fn find_active(&self, cutoff: DateTime<Utc>, limit: Option<usize>) -> Result<Vec<Sighting>> {
        // LIMIT NULL is LIMIT ALL.
        let limit = limit.map(|n| i64::try_from(n).unwrap_or(i64::MAX));
        let rows = sqlx::query(&format!(
            r#"
            SELECT {COLUMNS}
            FROM sightings
            WHERE last_active_at > $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#
        ))
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(row_to_sighting).collect()
    }

    async fn touch(&self, id: Uuid, cutoff: DateTime<Utc>, at: DateTime<Utc>) -> Result<Option<Sighting>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE sightings
            SET last_active_at = GREATEST($3, last_active_at + INTERVAL '1 millisecond')
            WHERE id = $1 AND last_active_at > $2
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(cutoff)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(row_to_sighting).transpose()
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let done = sqlx::query("DELETE FROM sightings WHERE last_active_at <= $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(done.rows_affected())
    }

    async fn counts(&self, cutoff: DateTime<Utc>) -> Result<(usize, usize)> {
        let (total, active): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*)::BIGINT,
                   COUNT(*) FILTER (WHERE last_active_at > $1)::BIGINT
            FROM sightings
            "#,
        )
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok((
            usize::try_from(total).unwrap_or(0),
            usize::try_from(active).unwrap_or(0),
        ))
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

fn row_to_sighting(row: &PgRow) -> Result<Sighting> {
    let animal: String = row.try_get("animal").map_err(map_sqlx_error)?;
    let id: Uuid = row.try_get("id").map_err(map_sqlx_error)?;
    Ok(Sighting {
        id,
        animal: animal
            .parse()
            .map_err(|_| SightingError::store(format!("row {id}: unknown animal '{animal}'")))?,
        is_baby: row.try_get("is_baby").map_err(map_sqlx_error)?,
        location: Location {
            lat: row.try_get("lat").map_err(map_sqlx_error)?,
            lng: row.try_get("lng").map_err(map_sqlx_error)?,
        },
        image_url: row.try_get("image_url").map_err(map_sqlx_error)?,
        created_at: row.try_get("created_at").map_err(map_sqlx_error)?,
        last_active_at: row.try_get("last_active_at").map_err(map_sqlx_error)?,
    })
}

fn map_sqlx_error(error: sqlx::Error) -> SightingError {
    match error {
        sqlx::Error::Database(db) => SightingError::store(db.to_string()),
        sqlx::Error::PoolTimedOut => SightingError::store("database pool timed out"),
        other => SightingError::store(other.to_string()),
    }
}
