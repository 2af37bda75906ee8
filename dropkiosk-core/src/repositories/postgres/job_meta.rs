// File: dropkiosk-core/src/repositories/postgres/job_meta.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use dropkiosk_common::error::Error;
use dropkiosk_common::models::JobMarker;
use dropkiosk_common::traits::repository_traits::JobMetaRepository;

pub struct PostgresJobMetaRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresJobMetaRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobMetaRepository for PostgresJobMetaRepository {
    async fn get_marker(&self, job_key: &str) -> Result<Option<JobMarker>, Error> {
        let row_opt = sqlx::query(
            "SELECT job_key, started_at, ended_at, updated_at FROM job_markers WHERE job_key = $1",
        )
            .bind(job_key)
            .fetch_optional(&self.pool)
            .await?;

        match row_opt {
            Some(r) => Ok(Some(JobMarker {
                job_key: r.try_get("job_key")?,
                started_at: r.try_get("started_at")?,
                ended_at: r.try_get("ended_at")?,
                updated_at: r.try_get("updated_at")?,
            })),
            None => Ok(None),
        }
    }

    async fn mark_started(&self, job_key: &str, now: DateTime<Utc>) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO job_markers (job_key, started_at, updated_at)
            VALUES ($1, $2, $2)
            ON CONFLICT (job_key) DO UPDATE
            SET started_at = EXCLUDED.started_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
            .bind(job_key)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_ended(&self, job_key: &str, now: DateTime<Utc>) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE job_markers
            SET started_at = NULL,
                ended_at = $2,
                updated_at = $2
            WHERE job_key = $1
            "#,
        )
            .bind(job_key)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_code_error(
        &self,
        code_id: &str,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO code_error_stats (code_id, error, strikes, updated_at)
            VALUES ($1, $2, 1, $3)
            ON CONFLICT (code_id) DO UPDATE
            SET error = EXCLUDED.error,
                strikes = code_error_stats.strikes + 1,
                updated_at = EXCLUDED.updated_at
            "#,
        )
            .bind(code_id)
            .bind(error)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_ledger_error(
        &self,
        error: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO ledger_error_stats (error, message, strikes, updated_at)
            VALUES ($1, $2, 1, $3)
            ON CONFLICT (error) DO UPDATE
            SET message = EXCLUDED.message,
                strikes = ledger_error_stats.strikes + 1,
                updated_at = EXCLUDED.updated_at
            "#,
        )
            .bind(error)
            .bind(message)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
