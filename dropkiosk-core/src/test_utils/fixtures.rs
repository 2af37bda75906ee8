// File: dropkiosk-core/src/test_utils/fixtures.rs

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use dropkiosk_common::models::{
    AccessToken, ChallengeKind, ClaimStatus, Code, CodeDrop, GameConfig,
};

/// A drop with a freshly issued current access token and no previous one.
pub fn make_drop(name: &str, code_count: i64, now: DateTime<Utc>) -> CodeDrop {
    CodeDrop {
        drop_id: Uuid::new_v4(),
        name: name.to_string(),
        organiser_email: "organiser@example.org".to_string(),
        admin_token: Uuid::new_v4().to_string(),
        code_count,
        available_count: code_count,
        challenge_kinds: vec![ChallengeKind::Game],
        game_config: GameConfig::default(),
        claim_base_url: None,
        current_access: AccessToken {
            token: format!("current-{}", Uuid::new_v4()),
            created_at: now,
            expires_at: now + Duration::minutes(2),
            validity_minutes: 2.0,
        },
        previous_access: None,
        expires_at: now + Duration::weeks(1),
        created_at: now,
        updated_at: now,
    }
}

pub fn make_code(code_id: &str, drop_id: Uuid, claimed: ClaimStatus, now: DateTime<Utc>) -> Code {
    Code {
        code_id: code_id.to_string(),
        drop_id,
        claimed,
        scanned: false,
        remote_check_count: 0,
        last_remote_check_at: None,
        error: None,
        expires_at: Some(now + Duration::weeks(1)),
        created_at: now,
        updated_at: now,
    }
}
