// File: dropkiosk-core/src/repositories/postgres/codes.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use sqlx::postgres::PgRow;
use uuid::Uuid;
use dropkiosk_common::error::Error;
use dropkiosk_common::models::{ClaimStatus, Code};
use dropkiosk_common::traits::repository_traits::CodeRepository;

pub struct PostgresCodeRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresCodeRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

const CODE_COLUMNS: &str = r#"
    code_id,
    drop_id,
    claimed,
    scanned,
    remote_check_count,
    last_remote_check_at,
    error,
    expires_at,
    created_at,
    updated_at
"#;

fn row_to_code(r: &PgRow) -> Result<Code, Error> {
    Ok(Code {
        code_id: r.try_get("code_id")?,
        drop_id: r.try_get("drop_id")?,
        claimed: r.try_get("claimed")?,
        scanned: r.try_get("scanned")?,
        remote_check_count: r.try_get("remote_check_count")?,
        last_remote_check_at: r.try_get("last_remote_check_at")?,
        error: r.try_get("error")?,
        expires_at: r.try_get("expires_at")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

#[async_trait]
impl CodeRepository for PostgresCodeRepository {
    async fn insert_code(&self, code: &Code) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO codes (
                code_id,
                drop_id,
                claimed,
                scanned,
                remote_check_count,
                last_remote_check_at,
                error,
                expires_at,
                created_at,
                updated_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
            "#,
        )
            .bind(&code.code_id)
            .bind(code.drop_id)
            .bind(code.claimed)
            .bind(code.scanned)
            .bind(code.remote_check_count)
            .bind(code.last_remote_check_at)
            .bind(&code.error)
            .bind(code.expires_at)
            .bind(code.created_at)
            .bind(code.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_code(&self, code_id: &str) -> Result<Option<Code>, Error> {
        let row_opt = sqlx::query(&format!(
            "SELECT {CODE_COLUMNS} FROM codes WHERE code_id = $1"
        ))
            .bind(code_id)
            .fetch_optional(&self.pool)
            .await?;

        match row_opt {
            Some(r) => Ok(Some(row_to_code(&r)?)),
            None => Ok(None),
        }
    }

    async fn oldest_unclaimed(&self, drop_id: Uuid) -> Result<Option<Code>, Error> {
        let row_opt = sqlx::query(&format!(
            r#"
            SELECT {CODE_COLUMNS} FROM codes
            WHERE drop_id = $1 AND claimed = 'unclaimed'
            ORDER BY updated_at ASC
            LIMIT 1
            "#
        ))
            .bind(drop_id)
            .fetch_optional(&self.pool)
            .await?;

        match row_opt {
            Some(r) => Ok(Some(row_to_code(&r)?)),
            None => Ok(None),
        }
    }

    async fn try_reserve(&self, code_id: &str, now: DateTime<Utc>) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            UPDATE codes
            SET claimed = 'unknown',
                scanned = TRUE,
                updated_at = $2
            WHERE code_id = $1 AND claimed = 'unclaimed'
            "#,
        )
            .bind(code_id)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_unknown(
        &self,
        code_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ClaimStatus>, Error> {
        let row_opt = sqlx::query(
            r#"
            WITH prev AS (
                SELECT claimed FROM codes WHERE code_id = $1
            )
            UPDATE codes
            SET claimed = 'unknown',
                scanned = TRUE,
                updated_at = $2
            WHERE code_id = $1
            RETURNING (SELECT claimed FROM prev) AS old_claimed
            "#,
        )
            .bind(code_id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        match row_opt {
            Some(r) => Ok(Some(r.try_get("old_claimed")?)),
            None => Ok(None),
        }
    }

    async fn record_check_result(
        &self,
        code_id: &str,
        claimed: ClaimStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<(ClaimStatus, ClaimStatus)>, Error> {
        // A locally confirmed claim is sticky; the CASE guard refuses the
        // downgrade even when the ledger flip-flops.
        let row_opt = sqlx::query(
            r#"
            WITH prev AS (
                SELECT claimed FROM codes WHERE code_id = $1
            )
            UPDATE codes
            SET claimed = CASE WHEN codes.claimed = 'claimed' THEN codes.claimed ELSE $2 END,
                remote_check_count = remote_check_count + 1,
                last_remote_check_at = $3,
                updated_at = $3
            WHERE code_id = $1
            RETURNING (SELECT claimed FROM prev) AS old_claimed, claimed AS new_claimed
            "#,
        )
            .bind(code_id)
            .bind(claimed)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        match row_opt {
            Some(r) => Ok(Some((r.try_get("old_claimed")?, r.try_get("new_claimed")?))),
            None => Ok(None),
        }
    }

    async fn record_check_error(
        &self,
        code_id: &str,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE codes
            SET error = $2,
                updated_at = $3
            WHERE code_id = $1
            "#,
        )
            .bind(code_id)
            .bind(error)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reset_scanned(&self, code_id: &str, now: DateTime<Utc>) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE codes
            SET scanned = FALSE,
                remote_check_count = 0,
                updated_at = $2
            WHERE code_id = $1
            "#,
        )
            .bind(code_id)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn unknown_older_than(
        &self,
        drop_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Code>, Error> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {CODE_COLUMNS} FROM codes
            WHERE drop_id = $1 AND claimed = 'unknown' AND updated_at < $2
            ORDER BY updated_at ASC
            "#
        ))
            .bind(drop_id)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;

        let mut list = Vec::new();
        for r in rows {
            list.push(row_to_code(&r)?);
        }
        Ok(list)
    }

    async fn never_checked(&self, drop_id: Uuid) -> Result<Vec<Code>, Error> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {CODE_COLUMNS} FROM codes
            WHERE drop_id = $1 AND remote_check_count = 0
            ORDER BY updated_at ASC
            "#
        ))
            .bind(drop_id)
            .fetch_all(&self.pool)
            .await?;

        let mut list = Vec::new();
        for r in rows {
            list.push(row_to_code(&r)?);
        }
        Ok(list)
    }

    async fn scanned_unclaimed(&self, drop_id: Uuid) -> Result<Vec<Code>, Error> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {CODE_COLUMNS} FROM codes
            WHERE drop_id = $1 AND scanned = TRUE AND claimed = 'unclaimed'
            ORDER BY updated_at ASC
            "#
        ))
            .bind(drop_id)
            .fetch_all(&self.pool)
            .await?;

        let mut list = Vec::new();
        for r in rows {
            list.push(row_to_code(&r)?);
        }
        Ok(list)
    }

    async fn list_codes_for_drop(&self, drop_id: Uuid) -> Result<Vec<Code>, Error> {
        let rows = sqlx::query(&format!(
            "SELECT {CODE_COLUMNS} FROM codes WHERE drop_id = $1"
        ))
            .bind(drop_id)
            .fetch_all(&self.pool)
            .await?;

        let mut list = Vec::new();
        for r in rows {
            list.push(row_to_code(&r)?);
        }
        Ok(list)
    }

    async fn delete_code(&self, code_id: &str) -> Result<(), Error> {
        sqlx::query("DELETE FROM codes WHERE code_id = $1")
            .bind(code_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
