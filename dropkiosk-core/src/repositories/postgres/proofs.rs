// File: dropkiosk-core/src/repositories/postgres/proofs.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use dropkiosk_common::error::Error;
use dropkiosk_common::models::VerificationProof;
use dropkiosk_common::traits::repository_traits::ProofRepository;

pub struct PostgresProofRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresProofRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProofRepository for PostgresProofRepository {
    async fn put_proof(&self, proof: &VerificationProof) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO verification_proofs (token, valid, expires_at, created_at)
            VALUES ($1,$2,$3,$4)
            ON CONFLICT (token) DO UPDATE
            SET valid = EXCLUDED.valid,
                expires_at = EXCLUDED.expires_at
            "#,
        )
            .bind(&proof.token)
            .bind(proof.valid)
            .bind(proof.expires_at)
            .bind(proof.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_proof(&self, token: &str) -> Result<Option<VerificationProof>, Error> {
        let row_opt = sqlx::query(
            "SELECT token, valid, expires_at, created_at FROM verification_proofs WHERE token = $1",
        )
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        match row_opt {
            Some(r) => Ok(Some(VerificationProof {
                token: r.try_get("token")?,
                valid: r.try_get("valid")?,
                expires_at: r.try_get("expires_at")?,
                created_at: r.try_get("created_at")?,
            })),
            None => Ok(None),
        }
    }

    async fn delete_proof(&self, token: &str) -> Result<(), Error> {
        sqlx::query("DELETE FROM verification_proofs WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
