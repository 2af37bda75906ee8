// dropkiosk-common/src/traits/repository_traits.rs
//
// The persistent document store is consumed through these traits, never
// reached for directly. Postgres implementations live in dropkiosk-core;
// tests substitute in-memory fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Error;
use crate::models::{AccessToken, Challenge, ClaimStatus, Code, CodeDrop, JobMarker, VerificationProof};

#[async_trait]
pub trait DropRepository: Send + Sync {
    async fn create_drop(&self, drop: &CodeDrop) -> Result<(), Error>;
    async fn get_drop(&self, drop_id: Uuid) -> Result<Option<CodeDrop>, Error>;
    async fn list_drops(&self) -> Result<Vec<CodeDrop>, Error>;

    /// Atomically promote `new_current` and demote the old current token to
    /// `previous_access` in one write.
    async fn rotate_access(
        &self,
        drop_id: Uuid,
        new_current: &AccessToken,
        new_previous: &AccessToken,
    ) -> Result<(), Error>;

    /// Incremental availability maintenance; `delta` comes from the
    /// claim-status transition table.
    async fn increment_available(&self, drop_id: Uuid, delta: i64) -> Result<(), Error>;

    async fn delete_drop(&self, drop_id: Uuid) -> Result<(), Error>;
}

#[async_trait]
pub trait CodeRepository: Send + Sync {
    async fn insert_code(&self, code: &Code) -> Result<(), Error>;
    async fn get_code(&self, code_id: &str) -> Result<Option<Code>, Error>;

    /// The allocator's candidate query: unclaimed codes of a drop, oldest
    /// `updated_at` first, limit 1.
    async fn oldest_unclaimed(&self, drop_id: Uuid) -> Result<Option<Code>, Error>;

    /// Compare-and-swap reservation: flip `Unclaimed -> Unknown` and set
    /// `scanned` only if the row is still unclaimed. Returns whether the
    /// reservation won.
    async fn try_reserve(&self, code_id: &str, now: DateTime<Utc>) -> Result<bool, Error>;

    /// Unguarded reservation write: mark the code
    /// `scanned=true, claimed=Unknown` regardless of its current status.
    /// Returns the previous status so the caller can fold the counter delta.
    async fn mark_unknown(&self, code_id: &str, now: DateTime<Utc>)
        -> Result<Option<ClaimStatus>, Error>;

    /// Apply a ledger-confirmed status: set `claimed`, bump the check
    /// counter, stamp `last_remote_check_at`. A locally `Claimed` code is
    /// never downgraded. Returns `(old, new_as_written)`.
    async fn record_check_result(
        &self,
        code_id: &str,
        claimed: ClaimStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<(ClaimStatus, ClaimStatus)>, Error>;

    /// Record a ledger failure on the code without touching claim status or
    /// the check counter.
    async fn record_check_error(&self, code_id: &str, error: &str, now: DateTime<Utc>)
        -> Result<(), Error>;

    /// Return an abandoned code to the allocatable pool:
    /// `scanned=false, remote_check_count=0`.
    async fn reset_scanned(&self, code_id: &str, now: DateTime<Utc>) -> Result<(), Error>;

    async fn unknown_older_than(
        &self,
        drop_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Code>, Error>;

    async fn never_checked(&self, drop_id: Uuid) -> Result<Vec<Code>, Error>;

    async fn scanned_unclaimed(&self, drop_id: Uuid) -> Result<Vec<Code>, Error>;

    async fn list_codes_for_drop(&self, drop_id: Uuid) -> Result<Vec<Code>, Error>;

    async fn delete_code(&self, code_id: &str) -> Result<(), Error>;
}

#[async_trait]
pub trait ChallengeRepository: Send + Sync {
    async fn create_challenge(&self, challenge: &Challenge) -> Result<(), Error>;
    async fn get_challenge(&self, token: &str) -> Result<Option<Challenge>, Error>;

    /// Consume a challenge. Returns whether a row was actually removed.
    async fn delete_challenge(&self, token: &str) -> Result<bool, Error>;

    async fn list_challenges_for_drop(&self, drop_id: Uuid) -> Result<Vec<Challenge>, Error>;
}

#[async_trait]
pub trait ProofRepository: Send + Sync {
    async fn put_proof(&self, proof: &VerificationProof) -> Result<(), Error>;
    async fn get_proof(&self, token: &str) -> Result<Option<VerificationProof>, Error>;
    async fn delete_proof(&self, token: &str) -> Result<(), Error>;
}

#[async_trait]
pub trait JobMetaRepository: Send + Sync {
    async fn get_marker(&self, job_key: &str) -> Result<Option<JobMarker>, Error>;
    async fn mark_started(&self, job_key: &str, now: DateTime<Utc>) -> Result<(), Error>;

    /// Clear `started_at` and stamp `ended_at`.
    async fn mark_ended(&self, job_key: &str, now: DateTime<Utc>) -> Result<(), Error>;

    async fn record_code_error(&self, code_id: &str, error: &str, now: DateTime<Utc>)
        -> Result<(), Error>;

    async fn record_ledger_error(
        &self,
        error: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Error>;
}
