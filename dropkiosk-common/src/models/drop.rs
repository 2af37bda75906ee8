// dropkiosk-common/src/models/drop.rs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A rotating drop-level credential. `current_access` gates inbound claim
/// requests; on rotation it is demoted to `previous_access` and stays
/// acceptable for a short grace window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// The token's own validity in minutes; carried across rotation so a
    /// demoted token keeps its creator-specified lifetime.
    pub validity_minutes: f64,
}

impl AccessToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Test/CI drops carry a `testing-` token prefix and run on shorter
    /// timings throughout the engine.
    pub fn is_test(&self) -> bool {
        self.token.starts_with("testing-")
    }
}

/// Which verification gates a drop has enabled for its claimers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeKind {
    /// The anti-farming minigame; the engine only gates around it.
    Game,
    /// Server-side bypass: the challenge is consumed immediately without any
    /// client-side verification. Must never be reachable by normal callers.
    Naive,
}

/// Human-verification configuration, inherited by every challenge the drop
/// issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    pub duration_secs: i64,
    pub target_score: i64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self { duration_secs: 30, target_score: 5 }
    }
}

/// One collectible-distribution event owning a pool of claim codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeDrop {
    pub drop_id: Uuid,
    pub name: String,
    pub organiser_email: String,
    /// Admin credential for destructive operations (drop deletion).
    pub admin_token: String,
    pub code_count: i64,
    /// Maintained incrementally from claim-status transitions, never by a
    /// full rescan.
    pub available_count: i64,
    pub challenge_kinds: Vec<ChallengeKind>,
    pub game_config: GameConfig,
    /// Bypass drops may redirect straight to an external claim page; this
    /// overrides the deployment-wide default claim base URL.
    pub claim_base_url: Option<String>,
    pub current_access: AccessToken,
    pub previous_access: Option<AccessToken>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CodeDrop {
    pub fn has_challenge_kind(&self, kind: ChallengeKind) -> bool {
        self.challenge_kinds.contains(&kind)
    }

    pub fn is_test(&self) -> bool {
        self.current_access.is_test()
            || self.previous_access.as_ref().is_some_and(|a| a.is_test())
    }

    /// Challenge validity: a fixed one-minute base window, extended by the
    /// game duration when the drop runs the verification game.
    pub fn challenge_validity_minutes(&self) -> f64 {
        let mut minutes = 1.0;
        if self.has_challenge_kind(ChallengeKind::Game) {
            minutes += self.game_config.duration_secs as f64 / 60.0;
        }
        minutes
    }
}

/// Generate a fresh access token. Test drops get a recognizable prefix so
/// downstream timing shortcuts can key off it.
pub fn generate_access_token(validity_minutes: f64, is_test: bool, now: DateTime<Utc>) -> AccessToken {
    let token = if is_test {
        format!("testing-{}", Uuid::new_v4())
    } else {
        Uuid::new_v4().to_string()
    };
    AccessToken {
        token,
        created_at: now,
        expires_at: now + Duration::milliseconds((validity_minutes * 60_000.0) as i64),
        validity_minutes,
    }
}
