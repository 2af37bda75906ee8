// File: dropkiosk-core/src/services/challenge_service.rs

use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use dropkiosk_common::error::Error;
use dropkiosk_common::models::{Challenge, ChallengeKind, CodeDrop};
use dropkiosk_common::traits::repository_traits::ChallengeRepository;

/// Mints single-use claim challenges for verified access requests.
pub struct ChallengeService {
    challenges: Arc<dyn ChallengeRepository>,
}

impl ChallengeService {
    pub fn new(challenges: Arc<dyn ChallengeRepository>) -> Self {
        Self { challenges }
    }

    /// Create and persist a challenge for the drop. Validity is the fixed
    /// base window plus the verification-game duration; the challenge
    /// inherits the drop's challenge kinds and game config so the client
    /// needs no second lookup.
    pub async fn issue(&self, drop: &CodeDrop, now: DateTime<Utc>) -> Result<Challenge, Error> {
        let validity_minutes = drop.challenge_validity_minutes();

        let token = if drop.is_test() {
            format!("testing-{}", Uuid::new_v4())
        } else {
            Uuid::new_v4().to_string()
        };

        let challenge_kinds = if drop.challenge_kinds.is_empty() {
            vec![ChallengeKind::Game]
        } else {
            drop.challenge_kinds.clone()
        };

        let challenge = Challenge {
            token,
            drop_id: drop.drop_id,
            challenge_kinds,
            game_config: drop.game_config,
            validity_minutes,
            expires_at: now + Duration::milliseconds((validity_minutes * 60_000.0) as i64),
            created_at: now,
        };

        self.challenges.create_challenge(&challenge).await?;
        debug!(
            "Issued challenge for drop {} valid {} min",
            drop.drop_id, validity_minutes
        );
        Ok(challenge)
    }
}
