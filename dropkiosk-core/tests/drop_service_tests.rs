// tests/drop_service_tests.rs

use std::sync::Arc;
use chrono::{NaiveDate, Utc};

use dropkiosk_common::error::Error;
use dropkiosk_common::models::{ChallengeKind, ClaimStatus};
use dropkiosk_common::traits::repository_traits::{
    ChallengeRepository, CodeRepository, DropRepository,
};
use dropkiosk_core::services::challenge_service::ChallengeService;
use dropkiosk_core::services::drop_service::{DropService, RegisterDropRequest};
use dropkiosk_core::test_utils::{
    MemoryChallengeRepository, MemoryCodeRepository, MemoryDropRepository,
};

struct Stack {
    drops: Arc<MemoryDropRepository>,
    codes: Arc<MemoryCodeRepository>,
    challenges: Arc<MemoryChallengeRepository>,
    service: DropService,
}

fn stack() -> Stack {
    let drops = Arc::new(MemoryDropRepository::new());
    let codes = Arc::new(MemoryCodeRepository::new());
    let challenges = Arc::new(MemoryChallengeRepository::new());
    let service = DropService::new(drops.clone(), codes.clone(), challenges.clone());
    Stack { drops, codes, challenges, service }
}

fn request(codes: &[&str]) -> RegisterDropRequest {
    RegisterDropRequest {
        name: "Launch party".to_string(),
        organiser_email: "host@example.org".to_string(),
        expiry_date: NaiveDate::from_ymd_opt(2026, 9, 1).expect("valid date"),
        codes: codes.iter().map(|c| c.to_string()).collect(),
        challenge_kinds: vec![ChallengeKind::Game],
        game_config: None,
        claim_base_url: None,
    }
}

#[tokio::test]
async fn test_register_creates_drop_and_codes() -> Result<(), Error> {
    let stack = stack();

    let registered = stack
        .service
        .register_drop(request(&["alpha1", "bravo2", "charlie3"]))
        .await?;

    let drop = stack
        .drops
        .get_drop(registered.drop_id)
        .await?
        .expect("drop exists");
    assert_eq!(drop.code_count, 3);
    assert_eq!(drop.available_count, 3);
    assert_eq!(drop.admin_token, registered.admin_token);
    assert_eq!(drop.current_access.validity_minutes, 2.0);

    let codes = stack.codes.list_codes_for_drop(registered.drop_id).await?;
    assert_eq!(codes.len(), 3);
    assert!(codes.iter().all(|c| c.claimed == ClaimStatus::Unclaimed));
    assert!(codes.iter().all(|c| c.remote_check_count == 0));
    Ok(())
}

#[tokio::test]
async fn test_register_strips_url_prefixes() -> Result<(), Error> {
    let stack = stack();

    let registered = stack
        .service
        .register_drop(request(&["https://ledger.example.org/claim/zulu99"]))
        .await?;

    let codes = stack.codes.list_codes_for_drop(registered.drop_id).await?;
    assert_eq!(codes.len(), 1);
    assert_eq!(codes[0].code_id, "zulu99");
    Ok(())
}

#[tokio::test]
async fn test_register_rejects_malformed_codes() {
    let stack = stack();

    let err = stack
        .service
        .register_drop(request(&["not a code!"]))
        .await
        .expect_err("malformed code must be rejected");
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_register_rejects_codes_owned_by_another_drop() -> Result<(), Error> {
    let stack = stack();

    stack.service.register_drop(request(&["shared1"])).await?;
    let err = stack
        .service
        .register_drop(request(&["shared1", "fresh2"]))
        .await
        .expect_err("cross-drop code ownership must be rejected");
    assert!(matches!(err, Error::Validation(_)));

    // The half-registered drop was cleaned up again.
    assert_eq!(stack.drops.list_drops().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_register_detects_test_drops() -> Result<(), Error> {
    let stack = stack();

    let registered = stack
        .service
        .register_drop(request(&["testing_abc", "testing_def"]))
        .await?;

    let drop = stack
        .drops
        .get_drop(registered.drop_id)
        .await?
        .expect("drop exists");
    assert!(drop.current_access.token.starts_with("testing-"));
    assert_eq!(drop.current_access.validity_minutes, 0.5);
    Ok(())
}

#[tokio::test]
async fn test_delete_requires_admin_token_and_cascades() -> Result<(), Error> {
    let stack = stack();

    let registered = stack
        .service
        .register_drop(request(&["alpha1", "bravo2"]))
        .await?;
    let drop = stack
        .drops
        .get_drop(registered.drop_id)
        .await?
        .expect("drop exists");

    // An unconsumed challenge goes down with the drop.
    let challenge_service = ChallengeService::new(stack.challenges.clone());
    challenge_service.issue(&drop, Utc::now()).await?;
    assert_eq!(stack.challenges.count(), 1);

    let err = stack
        .service
        .delete_drop(registered.drop_id, "wrong-token")
        .await
        .expect_err("wrong admin token must be rejected");
    assert!(matches!(err, Error::Auth(_)));

    stack
        .service
        .delete_drop(registered.drop_id, &registered.admin_token)
        .await?;
    assert!(stack.drops.get_drop(registered.drop_id).await?.is_none());
    assert!(stack
        .codes
        .list_codes_for_drop(registered.drop_id)
        .await?
        .is_empty());
    assert_eq!(stack.challenges.count(), 0);
    Ok(())
}
