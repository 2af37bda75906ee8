// File: dropkiosk-core/src/repositories/postgres/challenges.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use sqlx::postgres::PgRow;
use uuid::Uuid;
use dropkiosk_common::error::Error;
use dropkiosk_common::models::{Challenge, ChallengeKind, GameConfig};
use dropkiosk_common::traits::repository_traits::ChallengeRepository;

pub struct PostgresChallengeRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresChallengeRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn row_to_challenge(r: &PgRow) -> Result<Challenge, Error> {
    let kinds_json: serde_json::Value = r.try_get("challenge_kinds")?;
    let challenge_kinds: Vec<ChallengeKind> = serde_json::from_value(kinds_json)?;

    Ok(Challenge {
        token: r.try_get("token")?,
        drop_id: r.try_get("drop_id")?,
        challenge_kinds,
        game_config: GameConfig {
            duration_secs: r.try_get("game_duration_secs")?,
            target_score: r.try_get("game_target_score")?,
        },
        validity_minutes: r.try_get("validity_minutes")?,
        expires_at: r.try_get("expires_at")?,
        created_at: r.try_get("created_at")?,
    })
}

#[async_trait]
impl ChallengeRepository for PostgresChallengeRepository {
    async fn create_challenge(&self, challenge: &Challenge) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO challenges (
                token,
                drop_id,
                challenge_kinds,
                game_duration_secs,
                game_target_score,
                validity_minutes,
                expires_at,
                created_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
            "#,
        )
            .bind(&challenge.token)
            .bind(challenge.drop_id)
            .bind(serde_json::to_value(&challenge.challenge_kinds)?)
            .bind(challenge.game_config.duration_secs)
            .bind(challenge.game_config.target_score)
            .bind(challenge.validity_minutes)
            .bind(challenge.expires_at)
            .bind(challenge.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_challenge(&self, token: &str) -> Result<Option<Challenge>, Error> {
        let row_opt = sqlx::query(
            r#"
            SELECT
                token,
                drop_id,
                challenge_kinds,
                game_duration_secs,
                game_target_score,
                validity_minutes,
                expires_at,
                created_at
            FROM challenges
            WHERE token = $1
            "#,
        )
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        match row_opt {
            Some(r) => Ok(Some(row_to_challenge(&r)?)),
            None => Ok(None),
        }
    }

    async fn delete_challenge(&self, token: &str) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM challenges WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_challenges_for_drop(&self, drop_id: Uuid) -> Result<Vec<Challenge>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT
                token,
                drop_id,
                challenge_kinds,
                game_duration_secs,
                game_target_score,
                validity_minutes,
                expires_at,
                created_at
            FROM challenges
            WHERE drop_id = $1
            "#,
        )
            .bind(drop_id)
            .fetch_all(&self.pool)
            .await?;

        let mut list = Vec::new();
        for r in rows {
            list.push(row_to_challenge(&r)?);
        }
        Ok(list)
    }
}
