// tests/availability_tests.rs

use std::sync::Arc;
use chrono::Utc;

use dropkiosk_common::models::ClaimStatus::{self, Claimed, Unclaimed, Unknown};
use dropkiosk_common::traits::repository_traits::DropRepository;
use dropkiosk_core::services::availability::{claim_transition_delta, AvailabilityService};
use dropkiosk_core::test_utils::{make_drop, MemoryDropRepository};
use dropkiosk_core::Error;

#[test]
fn test_transition_table() {
    // The five non-zero rows.
    assert_eq!(claim_transition_delta(Unclaimed, Unknown), -1);
    assert_eq!(claim_transition_delta(Unclaimed, Claimed), -1);
    assert_eq!(claim_transition_delta(Unknown, Claimed), 0);
    assert_eq!(claim_transition_delta(Claimed, Unclaimed), 1);
    assert_eq!(claim_transition_delta(Unknown, Unclaimed), 1);

    // Everything else leaves the counter alone.
    assert_eq!(claim_transition_delta(Unclaimed, Unclaimed), 0);
    assert_eq!(claim_transition_delta(Claimed, Claimed), 0);
    assert_eq!(claim_transition_delta(Unknown, Unknown), 0);
    assert_eq!(claim_transition_delta(Claimed, Unknown), 0);
}

#[tokio::test]
async fn test_counter_application() -> Result<(), Error> {
    let drops = Arc::new(MemoryDropRepository::new());
    let service = AvailabilityService::new(drops.clone());

    let now = Utc::now();
    let drop = make_drop("counter", 5, now);
    drops.create_drop(&drop).await?;

    let transitions: [(ClaimStatus, ClaimStatus, i64); 5] = [
        (Unclaimed, Unknown, 4),
        (Unknown, Claimed, 4),
        (Claimed, Unclaimed, 5),
        (Unclaimed, Claimed, 4),
        (Unknown, Unclaimed, 5),
    ];
    for (old, new, expected) in transitions {
        service.on_claim_transition(drop.drop_id, old, new).await?;
        assert_eq!(
            drops.available_count(drop.drop_id),
            expected,
            "after {} -> {}",
            old,
            new
        );
    }

    Ok(())
}
