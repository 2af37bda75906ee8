// dropkiosk-common/src/models/challenge.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::drop::{ChallengeKind, GameConfig};

/// A single-use, time-boxed token binding one verified requester to one
/// allocation attempt. Keyed by its own token; consumed (deleted) exactly
/// once by a successful allocation, or left to expire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub token: String,
    pub drop_id: Uuid,
    pub challenge_kinds: Vec<ChallengeKind>,
    pub game_config: GameConfig,
    pub validity_minutes: f64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Challenge {
    /// Expiry check with the caller-supplied grace already subtracted from
    /// `now`: a challenge is still usable for `grace` past its nominal
    /// expiry.
    pub fn is_expired(&self, now_minus_grace: DateTime<Utc>) -> bool {
        self.expires_at < now_minus_grace
    }
}
