// File: dropkiosk-core/src/services/allocation_service.rs

use std::sync::Arc;
use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use dropkiosk_common::error::{AllocationError, Error};
use dropkiosk_common::models::ClaimStatus;
use dropkiosk_common::traits::repository_traits::{
    ChallengeRepository, CodeRepository, DropRepository, ProofRepository,
};

use crate::ledger::LedgerApi;
use crate::services::availability::AvailabilityService;

#[derive(Debug, Clone, Copy)]
pub struct AllocationConfig {
    /// Completion grace added on top of the challenge's own validity.
    pub base_grace: Duration,
    /// Extra grace when a human-verification proof accompanies the request.
    pub proof_grace_bonus: Duration,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            base_grace: Duration::seconds(30),
            proof_grace_bonus: Duration::minutes(3),
        }
    }
}

/// Exchanges a still-valid challenge for a ledger-verified available code.
pub struct AllocationService {
    drops: Arc<dyn DropRepository>,
    codes: Arc<dyn CodeRepository>,
    challenges: Arc<dyn ChallengeRepository>,
    proofs: Arc<dyn ProofRepository>,
    ledger: Arc<dyn LedgerApi>,
    availability: Arc<AvailabilityService>,
    config: AllocationConfig,
}

impl AllocationService {
    pub fn new(
        drops: Arc<dyn DropRepository>,
        codes: Arc<dyn CodeRepository>,
        challenges: Arc<dyn ChallengeRepository>,
        proofs: Arc<dyn ProofRepository>,
        ledger: Arc<dyn LedgerApi>,
        availability: Arc<AvailabilityService>,
        config: AllocationConfig,
    ) -> Self {
        Self { drops, codes, challenges, proofs, ledger, availability, config }
    }

    /// Allocate a code against a challenge token, optionally vouched for by
    /// a verification proof.
    ///
    /// Candidates are taken oldest-touched first and provisionally reserved
    /// (`Unclaimed -> Unknown`) before the ledger confirms them, so
    /// concurrent requests stop seeing them as soon as possible. A
    /// candidate the ledger rejects stays `Unknown`; the reconciliation
    /// sweeps settle it later.
    pub async fn allocate(
        &self,
        challenge_token: &str,
        proof_token: Option<&str>,
    ) -> Result<String, Error> {
        let now = Utc::now();
        info!("Allocation requested for challenge '{}'", challenge_token);

        let mut grace = self.config.base_grace;
        if let Some(token) = proof_token {
            let proof = self
                .proofs
                .get_proof(token)
                .await?
                .ok_or(AllocationError::ProofInvalid)?;
            if !proof.valid {
                return Err(AllocationError::ProofInvalid.into());
            }
            if proof.expires_at < now {
                return Err(AllocationError::ProofExpired.into());
            }
            grace = grace + self.config.proof_grace_bonus;
        }

        let challenge = self
            .challenges
            .get_challenge(challenge_token)
            .await?
            .ok_or(AllocationError::ChallengeNotFound)?;

        if challenge.is_expired(now - grace) {
            info!(
                "Challenge '{}' expired at {} ({}s past grace)",
                challenge_token,
                challenge.expires_at,
                (now - grace - challenge.expires_at).num_seconds()
            );
            return Err(AllocationError::ChallengeExpired.into());
        }

        // The drop may have been deleted since the challenge was minted; its
        // challenges are on their way out with it.
        let drop = self
            .drops
            .get_drop(challenge.drop_id)
            .await?
            .ok_or(AllocationError::ChallengeNotFound)?;

        let winner = loop {
            let Some(candidate) = self.codes.oldest_unclaimed(drop.drop_id).await? else {
                return Err(AllocationError::PoolExhausted(drop.drop_id).into());
            };

            // Reserve before verifying so other requests stop selecting this
            // candidate; the guard loses gracefully when a concurrent
            // allocation got here first.
            if !self.codes.try_reserve(&candidate.code_id, Utc::now()).await? {
                debug!("Lost reservation race for code '{}'", candidate.code_id);
                continue;
            }
            self.availability
                .on_claim_transition(drop.drop_id, ClaimStatus::Unclaimed, ClaimStatus::Unknown)
                .await?;

            match self.ledger.check_status(&candidate.code_id).await {
                Ok(status) => {
                    if let Some(readable) = status.readable_error() {
                        // Soft failure: exclude the candidate from this
                        // attempt, leave it to the reconciler.
                        warn!(
                            "Ledger error while verifying code '{}': {}",
                            candidate.code_id, readable
                        );
                        self.codes
                            .record_check_error(&candidate.code_id, &readable, Utc::now())
                            .await?;
                        continue;
                    }
                    if status.claimed == Some(false) {
                        break candidate;
                    }
                    debug!(
                        "Code '{}' already claimed at the ledger, trying next",
                        candidate.code_id
                    );
                }
                Err(e) => {
                    warn!(
                        "Ledger unreachable while verifying code '{}': {:?}",
                        candidate.code_id, e
                    );
                    self.codes
                        .record_check_error(&candidate.code_id, &e.to_string(), Utc::now())
                        .await?;
                }
            }
        };

        // Consume the challenge; a second attempt with the same token now
        // fails the lookup above.
        if !self.challenges.delete_challenge(challenge_token).await? {
            warn!(
                "Challenge '{}' was already consumed while allocating",
                challenge_token
            );
        }
        if let Some(token) = proof_token {
            self.proofs.delete_proof(token).await?;
        }

        info!(
            "Allocated code '{}' for drop {}",
            winner.code_id, drop.drop_id
        );
        Ok(winner.code_id)
    }
}
