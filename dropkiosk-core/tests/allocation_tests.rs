// tests/allocation_tests.rs

use std::collections::HashSet;
use std::sync::Arc;
use chrono::{Duration, Utc};
use futures_util::future::join_all;

use dropkiosk_common::error::{AllocationError, Error};
use dropkiosk_common::models::{Challenge, ChallengeKind, ClaimStatus, GameConfig, VerificationProof};
use dropkiosk_common::traits::repository_traits::{
    ChallengeRepository, CodeRepository, DropRepository, ProofRepository,
};
use dropkiosk_core::services::allocation_service::{AllocationConfig, AllocationService};
use dropkiosk_core::services::availability::AvailabilityService;
use dropkiosk_core::services::challenge_service::ChallengeService;
use dropkiosk_core::test_utils::{
    make_code, make_drop, MemoryChallengeRepository, MemoryCodeRepository, MemoryDropRepository,
    MemoryProofRepository, MockLedger, ScriptedStatus,
};

struct Stack {
    drops: Arc<MemoryDropRepository>,
    codes: Arc<MemoryCodeRepository>,
    challenges: Arc<MemoryChallengeRepository>,
    proofs: Arc<MemoryProofRepository>,
    ledger: Arc<MockLedger>,
    allocator: Arc<AllocationService>,
    challenge_service: ChallengeService,
}

fn stack() -> Stack {
    let drops = Arc::new(MemoryDropRepository::new());
    let codes = Arc::new(MemoryCodeRepository::new());
    let challenges = Arc::new(MemoryChallengeRepository::new());
    let proofs = Arc::new(MemoryProofRepository::new());
    let ledger = Arc::new(MockLedger::new());

    let availability = Arc::new(AvailabilityService::new(drops.clone()));
    let allocator = Arc::new(AllocationService::new(
        drops.clone(),
        codes.clone(),
        challenges.clone(),
        proofs.clone(),
        ledger.clone(),
        availability,
        AllocationConfig::default(),
    ));
    let challenge_service = ChallengeService::new(challenges.clone());

    Stack { drops, codes, challenges, proofs, ledger, allocator, challenge_service }
}

#[tokio::test]
async fn test_allocate_happy_path() -> Result<(), Error> {
    let stack = stack();
    let now = Utc::now();

    let drop = make_drop("happy", 1, now);
    stack.drops.create_drop(&drop).await?;
    stack
        .codes
        .insert_code(&make_code("code-1", drop.drop_id, ClaimStatus::Unclaimed, now))
        .await?;

    let challenge = stack.challenge_service.issue(&drop, now).await?;
    let code = stack.allocator.allocate(&challenge.token, None).await?;

    assert_eq!(code, "code-1");
    // Reserved, not yet ledger-confirmed claimed.
    assert_eq!(stack.codes.claim_status("code-1"), Some(ClaimStatus::Unknown));
    // Challenge was consumed, counter went down with the reservation.
    assert_eq!(stack.challenges.count(), 0);
    assert_eq!(stack.drops.available_count(drop.drop_id), 0);
    Ok(())
}

#[tokio::test]
async fn test_challenge_is_single_use() -> Result<(), Error> {
    let stack = stack();
    let now = Utc::now();

    let drop = make_drop("single-use", 2, now);
    stack.drops.create_drop(&drop).await?;
    for id in ["code-1", "code-2"] {
        stack
            .codes
            .insert_code(&make_code(id, drop.drop_id, ClaimStatus::Unclaimed, now))
            .await?;
    }

    let challenge = stack.challenge_service.issue(&drop, now).await?;
    stack.allocator.allocate(&challenge.token, None).await?;

    let err = stack
        .allocator
        .allocate(&challenge.token, None)
        .await
        .expect_err("consumed challenge must not be reusable");
    assert!(matches!(
        err,
        Error::Allocation(AllocationError::ChallengeNotFound)
    ));
    Ok(())
}

#[tokio::test]
async fn test_pool_exhausted_when_only_code_is_claimed_remotely() -> Result<(), Error> {
    let stack = stack();
    let now = Utc::now();

    let drop = make_drop("exhausted", 1, now);
    stack.drops.create_drop(&drop).await?;
    stack
        .codes
        .insert_code(&make_code("code-1", drop.drop_id, ClaimStatus::Unclaimed, now))
        .await?;
    stack.ledger.set_claimed("code-1", true);

    let challenge = stack.challenge_service.issue(&drop, now).await?;
    let err = stack
        .allocator
        .allocate(&challenge.token, None)
        .await
        .expect_err("ledger-claimed pool must exhaust");
    assert!(matches!(
        err,
        Error::Allocation(AllocationError::PoolExhausted(id)) if id == drop.drop_id
    ));
    // The discarded candidate stays provisional for the reconciler.
    assert_eq!(stack.codes.claim_status("code-1"), Some(ClaimStatus::Unknown));
    Ok(())
}

#[tokio::test]
async fn test_challenge_expiry_honors_grace() -> Result<(), Error> {
    let stack = stack();
    let now = Utc::now();

    let drop = make_drop("expiry", 1, now);
    stack.drops.create_drop(&drop).await?;
    stack
        .codes
        .insert_code(&make_code("code-1", drop.drop_id, ClaimStatus::Unclaimed, now))
        .await?;

    // Nominally expired, but still inside the 30s completion grace.
    let mut challenge = Challenge {
        token: "within-grace".to_string(),
        drop_id: drop.drop_id,
        challenge_kinds: vec![ChallengeKind::Game],
        game_config: GameConfig::default(),
        validity_minutes: 1.0,
        expires_at: now - Duration::seconds(20),
        created_at: now - Duration::minutes(2),
    };
    stack.challenges.create_challenge(&challenge).await?;
    stack.allocator.allocate("within-grace", None).await?;

    // Past the grace: rejected.
    challenge.token = "past-grace".to_string();
    challenge.expires_at = now - Duration::seconds(40);
    stack.challenges.create_challenge(&challenge).await?;
    let err = stack
        .allocator
        .allocate("past-grace", None)
        .await
        .expect_err("expired challenge must be rejected");
    assert!(matches!(
        err,
        Error::Allocation(AllocationError::ChallengeExpired)
    ));
    Ok(())
}

#[tokio::test]
async fn test_proof_validation_and_grace_bonus() -> Result<(), Error> {
    let stack = stack();
    let now = Utc::now();

    let drop = make_drop("proof", 1, now);
    stack.drops.create_drop(&drop).await?;
    stack
        .codes
        .insert_code(&make_code("code-1", drop.drop_id, ClaimStatus::Unclaimed, now))
        .await?;

    // Expired 2 minutes ago: outside the base grace, inside base + bonus.
    let challenge = Challenge {
        token: "chal".to_string(),
        drop_id: drop.drop_id,
        challenge_kinds: vec![ChallengeKind::Game],
        game_config: GameConfig::default(),
        validity_minutes: 1.0,
        expires_at: now - Duration::minutes(2),
        created_at: now - Duration::minutes(3),
    };
    stack.challenges.create_challenge(&challenge).await?;

    let err = stack
        .allocator
        .allocate("chal", Some("no-such-proof"))
        .await
        .expect_err("missing proof record");
    assert!(matches!(err, Error::Allocation(AllocationError::ProofInvalid)));

    stack
        .proofs
        .put_proof(&VerificationProof {
            token: "bad-proof".to_string(),
            valid: false,
            expires_at: now + Duration::minutes(5),
            created_at: now,
        })
        .await?;
    let err = stack
        .allocator
        .allocate("chal", Some("bad-proof"))
        .await
        .expect_err("invalid proof");
    assert!(matches!(err, Error::Allocation(AllocationError::ProofInvalid)));

    stack
        .proofs
        .put_proof(&VerificationProof {
            token: "stale-proof".to_string(),
            valid: true,
            expires_at: now - Duration::seconds(1),
            created_at: now - Duration::minutes(10),
        })
        .await?;
    let err = stack
        .allocator
        .allocate("chal", Some("stale-proof"))
        .await
        .expect_err("expired proof");
    assert!(matches!(err, Error::Allocation(AllocationError::ProofExpired)));

    stack
        .proofs
        .put_proof(&VerificationProof {
            token: "good-proof".to_string(),
            valid: true,
            expires_at: now + Duration::minutes(5),
            created_at: now,
        })
        .await?;
    let code = stack.allocator.allocate("chal", Some("good-proof")).await?;
    assert_eq!(code, "code-1");
    // The proof record was consumed with the challenge.
    assert_eq!(stack.proofs.count(), 2);
    assert!(stack.proofs.get_proof("good-proof").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_ledger_error_excludes_candidate() -> Result<(), Error> {
    let stack = stack();
    let t0 = Utc::now() - Duration::minutes(1);
    let now = Utc::now();

    let drop = make_drop("soft-failure", 2, now);
    stack.drops.create_drop(&drop).await?;
    // code-1 is older, so it is selected first.
    stack
        .codes
        .insert_code(&make_code("code-1", drop.drop_id, ClaimStatus::Unclaimed, t0))
        .await?;
    stack
        .codes
        .insert_code(&make_code("code-2", drop.drop_id, ClaimStatus::Unclaimed, now))
        .await?;
    stack
        .ledger
        .script("code-1", ScriptedStatus::ApiError("server_error".to_string()));

    let challenge = stack.challenge_service.issue(&drop, now).await?;
    let code = stack.allocator.allocate(&challenge.token, None).await?;

    // The erroring candidate was skipped, marked, and left provisional.
    assert_eq!(code, "code-2");
    let marked = stack.codes.get_code("code-1").await?.expect("code exists");
    assert_eq!(marked.claimed, ClaimStatus::Unknown);
    assert!(marked.error.as_deref().unwrap_or_default().contains("server_error"));
    Ok(())
}

#[tokio::test]
async fn test_no_double_allocation_under_load() -> Result<(), Error> {
    let stack = stack();
    let now = Utc::now();

    let available = 5;
    let attempts = 12;

    let drop = make_drop("load", available, now);
    stack.drops.create_drop(&drop).await?;
    for i in 0..available {
        stack
            .codes
            .insert_code(&make_code(
                &format!("code-{}", i),
                drop.drop_id,
                ClaimStatus::Unclaimed,
                now,
            ))
            .await?;
    }

    let mut tokens = Vec::new();
    for _ in 0..attempts {
        tokens.push(stack.challenge_service.issue(&drop, now).await?.token);
    }

    let handles = tokens.into_iter().map(|token| {
        let allocator = stack.allocator.clone();
        tokio::spawn(async move { allocator.allocate(&token, None).await })
    });
    let outcomes: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("allocation task panicked"))
        .collect();

    let mut winners = HashSet::new();
    let mut exhausted = 0;
    for outcome in outcomes {
        match outcome {
            Ok(code) => {
                assert!(winners.insert(code), "a code was allocated twice");
            }
            Err(Error::Allocation(AllocationError::PoolExhausted(_))) => exhausted += 1,
            Err(e) => panic!("unexpected allocation failure: {:?}", e),
        }
    }
    assert_eq!(winners.len(), available as usize);
    assert_eq!(exhausted, attempts - available as usize);
    assert_eq!(stack.drops.available_count(drop.drop_id), 0);
    Ok(())
}
