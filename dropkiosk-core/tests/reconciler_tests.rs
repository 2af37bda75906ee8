// tests/reconciler_tests.rs

use std::sync::Arc;
use chrono::{Duration, Utc};
use uuid::Uuid;

use dropkiosk_common::models::ClaimStatus;
use dropkiosk_common::traits::repository_traits::{
    CodeRepository, DropRepository, JobMetaRepository,
};
use dropkiosk_core::services::availability::AvailabilityService;
use dropkiosk_core::services::code_status_service::CodeStatusService;
use dropkiosk_core::tasks::scanned_sweep::{refresh_scanned_code_statuses, ScannedSweepConfig};
use dropkiosk_core::tasks::unknown_sweep::{refresh_unknown_and_unchecked_codes, UnknownSweepConfig};
use dropkiosk_core::test_utils::{
    make_code, make_drop, MemoryCodeRepository, MemoryDropRepository, MemoryJobMetaRepository,
    MockLedger, ScriptedStatus,
};
use dropkiosk_core::Error;

struct Stack {
    drops: Arc<MemoryDropRepository>,
    codes: Arc<MemoryCodeRepository>,
    job_meta: Arc<MemoryJobMetaRepository>,
    ledger: Arc<MockLedger>,
    status: Arc<CodeStatusService>,
    codes_dyn: Arc<dyn CodeRepository>,
    drops_dyn: Arc<dyn DropRepository>,
    job_meta_dyn: Arc<dyn JobMetaRepository>,
}

fn stack() -> Stack {
    let drops = Arc::new(MemoryDropRepository::new());
    let codes = Arc::new(MemoryCodeRepository::new());
    let job_meta = Arc::new(MemoryJobMetaRepository::new());
    let ledger = Arc::new(MockLedger::new());
    let availability = Arc::new(AvailabilityService::new(drops.clone()));
    let status = Arc::new(CodeStatusService::new(
        codes.clone(),
        job_meta.clone(),
        ledger.clone(),
        availability,
    ));
    Stack {
        codes_dyn: codes.clone(),
        drops_dyn: drops.clone(),
        job_meta_dyn: job_meta.clone(),
        drops,
        codes,
        job_meta,
        ledger,
        status,
    }
}

/// Configs with a fast retry policy are not needed here; the mock ledger
/// never forces retries.
fn unknown_config() -> UnknownSweepConfig {
    UnknownSweepConfig::default()
}

async fn insert_unknown(
    stack: &Stack,
    drop_id: Uuid,
    code_id: &str,
    age: Duration,
    error: Option<&str>,
) -> Result<(), Error> {
    let mut code = make_code(code_id, drop_id, ClaimStatus::Unknown, Utc::now() - age);
    // Aged unknowns have been checked before; only genuinely new codes
    // should land in the never-checked bucket.
    code.remote_check_count = 1;
    code.error = error.map(|e| e.to_string());
    stack.codes.insert_code(&code).await
}

#[tokio::test]
async fn test_unknown_sweep_is_debounced() -> Result<(), Error> {
    let stack = stack();
    let now = Utc::now();
    let drop = make_drop("debounce", 1, now);
    stack.drops.create_drop(&drop).await?;
    insert_unknown(&stack, drop.drop_id, "code-1", Duration::minutes(10), None).await?;

    // Simulate a run that is still in flight.
    stack
        .job_meta
        .mark_started(&format!("unknown_sweep_{}", drop.drop_id), now)
        .await?;

    let report = refresh_unknown_and_unchecked_codes(
        stack.codes_dyn.clone(),
        stack.job_meta_dyn.clone(),
        stack.status.clone(),
        drop.drop_id,
        unknown_config(),
    )
    .await?;

    assert!(report.debounced);
    assert_eq!(stack.ledger.status_call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_unknown_sweep_checks_aged_and_unchecked_codes() -> Result<(), Error> {
    let stack = stack();
    let now = Utc::now();
    let drop = make_drop("filters", 4, now);
    stack.drops.create_drop(&drop).await?;

    // Old enough to re-check.
    insert_unknown(&stack, drop.drop_id, "old-unknown", Duration::minutes(10), None).await?;
    // Too fresh.
    insert_unknown(&stack, drop.drop_id, "fresh-unknown", Duration::minutes(1), None).await?;
    // Erroring codes back off by the slowdown factor (50 min at defaults).
    insert_unknown(&stack, drop.drop_id, "recent-error", Duration::minutes(20), Some("boom")).await?;
    insert_unknown(&stack, drop.drop_id, "old-error", Duration::minutes(60), Some("boom")).await?;
    // Never checked: swept regardless of age.
    stack
        .codes
        .insert_code(&make_code("unchecked", drop.drop_id, ClaimStatus::Unclaimed, now))
        .await?;

    let report = refresh_unknown_and_unchecked_codes(
        stack.codes_dyn.clone(),
        stack.job_meta_dyn.clone(),
        stack.status.clone(),
        drop.drop_id,
        unknown_config(),
    )
    .await?;

    assert!(!report.debounced);
    assert_eq!(report.checked, 3);
    assert_eq!(stack.ledger.status_calls_for("old-unknown"), 1);
    assert_eq!(stack.ledger.status_calls_for("old-error"), 1);
    assert_eq!(stack.ledger.status_calls_for("unchecked"), 1);
    assert_eq!(stack.ledger.status_calls_for("fresh-unknown"), 0);
    assert_eq!(stack.ledger.status_calls_for("recent-error"), 0);
    Ok(())
}

#[tokio::test]
async fn test_unknown_sweep_settles_statuses_and_counter() -> Result<(), Error> {
    let stack = stack();
    let now = Utc::now();
    let drop = make_drop("settle", 2, now);
    stack.drops.create_drop(&drop).await?;

    insert_unknown(&stack, drop.drop_id, "actually-free", Duration::minutes(10), None).await?;
    insert_unknown(&stack, drop.drop_id, "actually-claimed", Duration::minutes(10), None).await?;
    stack.ledger.set_claimed("actually-claimed", true);

    refresh_unknown_and_unchecked_codes(
        stack.codes_dyn.clone(),
        stack.job_meta_dyn.clone(),
        stack.status.clone(),
        drop.drop_id,
        unknown_config(),
    )
    .await?;

    assert_eq!(
        stack.codes.claim_status("actually-free"),
        Some(ClaimStatus::Unclaimed)
    );
    assert_eq!(
        stack.codes.claim_status("actually-claimed"),
        Some(ClaimStatus::Claimed)
    );
    // unknown -> unclaimed is +1, unknown -> claimed is 0.
    assert_eq!(stack.drops.available_count(drop.drop_id), 3);
    Ok(())
}

#[tokio::test]
async fn test_unknown_sweep_second_run_has_nothing_to_do() -> Result<(), Error> {
    let stack = stack();
    let now = Utc::now();
    let drop = make_drop("idempotent", 1, now);
    stack.drops.create_drop(&drop).await?;
    insert_unknown(&stack, drop.drop_id, "code-1", Duration::minutes(10), None).await?;

    let first = refresh_unknown_and_unchecked_codes(
        stack.codes_dyn.clone(),
        stack.job_meta_dyn.clone(),
        stack.status.clone(),
        drop.drop_id,
        unknown_config(),
    )
    .await?;
    assert_eq!(first.checked, 1);

    // The marker was cleared, so the run is allowed; the settled code no
    // longer matches any filter.
    let second = refresh_unknown_and_unchecked_codes(
        stack.codes_dyn.clone(),
        stack.job_meta_dyn.clone(),
        stack.status.clone(),
        drop.drop_id,
        unknown_config(),
    )
    .await?;
    assert!(!second.debounced);
    assert_eq!(second.checked, 0);
    assert_eq!(stack.ledger.status_call_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_ledger_error_records_strikes_without_touching_status() -> Result<(), Error> {
    let stack = stack();
    let now = Utc::now();
    let drop = make_drop("strikes", 1, now);
    stack.drops.create_drop(&drop).await?;
    insert_unknown(&stack, drop.drop_id, "flaky", Duration::minutes(10), None).await?;
    stack
        .ledger
        .script("flaky", ScriptedStatus::ApiError("rate_limited".to_string()));

    stack.status.update_code_status("flaky").await?;

    let code = stack.codes.get_code("flaky").await?.expect("code exists");
    assert_eq!(code.claimed, ClaimStatus::Unknown);
    assert_eq!(code.remote_check_count, 1, "failed checks do not count");
    assert!(code.error.as_deref().unwrap_or_default().contains("rate_limited"));
    assert_eq!(stack.job_meta.code_error_strikes("flaky"), 1);
    assert_eq!(stack.job_meta.ledger_error_strikes("rate_limited"), 1);
    Ok(())
}

#[tokio::test]
async fn test_confirmed_claim_is_sticky() -> Result<(), Error> {
    let stack = stack();
    let now = Utc::now();
    let drop = make_drop("sticky", 1, now);
    stack.drops.create_drop(&drop).await?;
    stack
        .codes
        .insert_code(&make_code("code-1", drop.drop_id, ClaimStatus::Claimed, now))
        .await?;

    // Ledger flip-flops back to unclaimed; the engine refuses the downgrade.
    stack.ledger.set_claimed("code-1", false);
    stack.status.update_code_status("code-1").await?;

    assert_eq!(stack.codes.claim_status("code-1"), Some(ClaimStatus::Claimed));
    assert_eq!(stack.drops.available_count(drop.drop_id), 1);
    Ok(())
}

#[tokio::test]
async fn test_scanned_sweep_resets_abandoned_codes() -> Result<(), Error> {
    let stack = stack();
    let now = Utc::now();
    let drop = make_drop("abandoned", 2, now);
    stack.drops.create_drop(&drop).await?;

    // Checked plenty, quiet long past the reset timeout: presumed abandoned.
    let mut abandoned = make_code(
        "abandoned",
        drop.drop_id,
        ClaimStatus::Unclaimed,
        now - Duration::minutes(10),
    );
    abandoned.scanned = true;
    abandoned.remote_check_count = 3;
    abandoned.last_remote_check_at = Some(now - Duration::minutes(10));
    stack.codes.insert_code(&abandoned).await?;

    // Not checked often enough yet.
    let mut pending = make_code(
        "pending",
        drop.drop_id,
        ClaimStatus::Unclaimed,
        now - Duration::minutes(10),
    );
    pending.scanned = true;
    pending.remote_check_count = 1;
    pending.last_remote_check_at = Some(now - Duration::minutes(10));
    stack.codes.insert_code(&pending).await?;

    let report = refresh_scanned_code_statuses(
        stack.drops_dyn.clone(),
        stack.codes_dyn.clone(),
        stack.job_meta_dyn.clone(),
        stack.status.clone(),
        drop.drop_id,
        ScannedSweepConfig::default(),
    )
    .await?;

    assert_eq!(report.reset, 1);
    let reset = stack.codes.get_code("abandoned").await?.expect("code exists");
    assert!(!reset.scanned, "abandoned code rejoins the allocatable pool");
    // The counter went back to zero on reset; the same sweep then re-checked
    // the code once.
    assert_eq!(reset.remote_check_count, 1);
    let kept = stack.codes.get_code("pending").await?.expect("code exists");
    assert!(kept.scanned);
    Ok(())
}

#[tokio::test]
async fn test_scanned_sweep_skips_recently_touched_codes() -> Result<(), Error> {
    let stack = stack();
    let now = Utc::now();
    let drop = make_drop("cooldown", 2, now);
    stack.drops.create_drop(&drop).await?;

    let mut quiet = make_code(
        "quiet",
        drop.drop_id,
        ClaimStatus::Unclaimed,
        now - Duration::minutes(5),
    );
    quiet.scanned = true;
    quiet.remote_check_count = 1;
    quiet.last_remote_check_at = Some(now - Duration::minutes(5));
    stack.codes.insert_code(&quiet).await?;

    // Touched seconds ago, within the check cooldown.
    let mut hot = make_code("hot", drop.drop_id, ClaimStatus::Unclaimed, now);
    hot.scanned = true;
    hot.remote_check_count = 1;
    hot.last_remote_check_at = Some(now);
    stack.codes.insert_code(&hot).await?;

    let report = refresh_scanned_code_statuses(
        stack.drops_dyn.clone(),
        stack.codes_dyn.clone(),
        stack.job_meta_dyn.clone(),
        stack.status.clone(),
        drop.drop_id,
        ScannedSweepConfig::default(),
    )
    .await?;

    assert_eq!(report.checked, 1);
    assert_eq!(stack.ledger.status_calls_for("quiet"), 1);
    assert_eq!(stack.ledger.status_calls_for("hot"), 0);
    Ok(())
}
