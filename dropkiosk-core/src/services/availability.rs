// File: dropkiosk-core/src/services/availability.rs

use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use dropkiosk_common::error::Error;
use dropkiosk_common::models::ClaimStatus;
use dropkiosk_common::traits::repository_traits::DropRepository;

/// Delta the drop's `available_count` receives for a claim-status write.
///
/// A code that is claimed or possibly claimed (unknown) leaves the
/// advertised pool immediately; only a ledger-confirmed unclaimed result
/// restores it.
///
/// old → new : delta
///   Unclaimed → Unknown  : -1
///   Unclaimed → Claimed  : -1
///   Unknown   → Claimed  :  0
///   Claimed   → Unclaimed : +1
///   Unknown   → Unclaimed : +1
/// everything else: 0
pub fn claim_transition_delta(old: ClaimStatus, new: ClaimStatus) -> i64 {
    use ClaimStatus::*;
    match (old, new) {
        (Unclaimed, Unknown) | (Unclaimed, Claimed) => -1,
        (Claimed, Unclaimed) | (Unknown, Unclaimed) => 1,
        _ => 0,
    }
}

/// Folds claim-status transitions into the per-drop availability counter.
/// Every code writer reports its before/after pair here instead of anyone
/// ever recounting the pool.
pub struct AvailabilityService {
    drops: Arc<dyn DropRepository>,
}

impl AvailabilityService {
    pub fn new(drops: Arc<dyn DropRepository>) -> Self {
        Self { drops }
    }

    /// Apply the transition's delta; returns the delta that was applied.
    pub async fn on_claim_transition(
        &self,
        drop_id: Uuid,
        old: ClaimStatus,
        new: ClaimStatus,
    ) -> Result<i64, Error> {
        let delta = claim_transition_delta(old, new);
        if delta != 0 {
            debug!(
                "Code transition {} -> {} for drop {}: available {:+}",
                old, new, drop_id, delta
            );
            self.drops.increment_available(drop_id, delta).await?;
        }
        Ok(delta)
    }
}
