// File: dropkiosk-core/src/repositories/postgres/drops.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use sqlx::postgres::PgRow;
use uuid::Uuid;
use dropkiosk_common::error::Error;
use dropkiosk_common::models::{AccessToken, ChallengeKind, CodeDrop, GameConfig};
use dropkiosk_common::traits::repository_traits::DropRepository;

pub struct PostgresDropRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresDropRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

const DROP_COLUMNS: &str = r#"
    drop_id,
    name,
    organiser_email,
    admin_token,
    code_count,
    available_count,
    challenge_kinds,
    game_duration_secs,
    game_target_score,
    claim_base_url,
    current_token,
    current_created_at,
    current_expires_at,
    current_validity_minutes,
    previous_token,
    previous_created_at,
    previous_expires_at,
    previous_validity_minutes,
    expires_at,
    created_at,
    updated_at
"#;

fn row_to_drop(r: &PgRow) -> Result<CodeDrop, Error> {
    let kinds_json: serde_json::Value = r.try_get("challenge_kinds")?;
    let challenge_kinds: Vec<ChallengeKind> = serde_json::from_value(kinds_json)?;

    let previous_access = match r.try_get::<Option<String>, _>("previous_token")? {
        Some(token) => Some(AccessToken {
            token,
            created_at: r.try_get("previous_created_at")?,
            expires_at: r.try_get("previous_expires_at")?,
            validity_minutes: r.try_get("previous_validity_minutes")?,
        }),
        None => None,
    };

    Ok(CodeDrop {
        drop_id: r.try_get("drop_id")?,
        name: r.try_get("name")?,
        organiser_email: r.try_get("organiser_email")?,
        admin_token: r.try_get("admin_token")?,
        code_count: r.try_get("code_count")?,
        available_count: r.try_get("available_count")?,
        challenge_kinds,
        game_config: GameConfig {
            duration_secs: r.try_get("game_duration_secs")?,
            target_score: r.try_get("game_target_score")?,
        },
        claim_base_url: r.try_get("claim_base_url")?,
        current_access: AccessToken {
            token: r.try_get("current_token")?,
            created_at: r.try_get("current_created_at")?,
            expires_at: r.try_get("current_expires_at")?,
            validity_minutes: r.try_get("current_validity_minutes")?,
        },
        previous_access,
        expires_at: r.try_get("expires_at")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

#[async_trait]
impl DropRepository for PostgresDropRepository {
    async fn create_drop(&self, drop: &CodeDrop) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO drops (
                drop_id,
                name,
                organiser_email,
                admin_token,
                code_count,
                available_count,
                challenge_kinds,
                game_duration_secs,
                game_target_score,
                claim_base_url,
                current_token,
                current_created_at,
                current_expires_at,
                current_validity_minutes,
                previous_token,
                previous_created_at,
                previous_expires_at,
                previous_validity_minutes,
                expires_at,
                created_at,
                updated_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21)
            "#,
        )
            .bind(drop.drop_id)
            .bind(&drop.name)
            .bind(&drop.organiser_email)
            .bind(&drop.admin_token)
            .bind(drop.code_count)
            .bind(drop.available_count)
            .bind(serde_json::to_value(&drop.challenge_kinds)?)
            .bind(drop.game_config.duration_secs)
            .bind(drop.game_config.target_score)
            .bind(&drop.claim_base_url)
            .bind(&drop.current_access.token)
            .bind(drop.current_access.created_at)
            .bind(drop.current_access.expires_at)
            .bind(drop.current_access.validity_minutes)
            .bind(drop.previous_access.as_ref().map(|a| a.token.clone()))
            .bind(drop.previous_access.as_ref().map(|a| a.created_at))
            .bind(drop.previous_access.as_ref().map(|a| a.expires_at))
            .bind(drop.previous_access.as_ref().map(|a| a.validity_minutes))
            .bind(drop.expires_at)
            .bind(drop.created_at)
            .bind(drop.updated_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_drop(&self, drop_id: Uuid) -> Result<Option<CodeDrop>, Error> {
        let row_opt = sqlx::query(&format!(
            "SELECT {DROP_COLUMNS} FROM drops WHERE drop_id = $1"
        ))
            .bind(drop_id)
            .fetch_optional(&self.pool)
            .await?;

        match row_opt {
            Some(r) => Ok(Some(row_to_drop(&r)?)),
            None => Ok(None),
        }
    }

    async fn list_drops(&self) -> Result<Vec<CodeDrop>, Error> {
        let rows = sqlx::query(&format!(
            "SELECT {DROP_COLUMNS} FROM drops ORDER BY created_at ASC"
        ))
            .fetch_all(&self.pool)
            .await?;

        let mut list = Vec::new();
        for r in rows {
            list.push(row_to_drop(&r)?);
        }
        Ok(list)
    }

    async fn rotate_access(
        &self,
        drop_id: Uuid,
        new_current: &AccessToken,
        new_previous: &AccessToken,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE drops
            SET
              current_token = $1,
              current_created_at = $2,
              current_expires_at = $3,
              current_validity_minutes = $4,
              previous_token = $5,
              previous_created_at = $6,
              previous_expires_at = $7,
              previous_validity_minutes = $8,
              updated_at = $2
            WHERE drop_id = $9
            "#,
        )
            .bind(&new_current.token)
            .bind(new_current.created_at)
            .bind(new_current.expires_at)
            .bind(new_current.validity_minutes)
            .bind(&new_previous.token)
            .bind(new_previous.created_at)
            .bind(new_previous.expires_at)
            .bind(new_previous.validity_minutes)
            .bind(drop_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn increment_available(&self, drop_id: Uuid, delta: i64) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE drops
            SET available_count = available_count + $1,
                updated_at = NOW()
            WHERE drop_id = $2
            "#,
        )
            .bind(delta)
            .bind(drop_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_drop(&self, drop_id: Uuid) -> Result<(), Error> {
        sqlx::query("DELETE FROM drops WHERE drop_id = $1")
            .bind(drop_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
