// tests/throttle_tests.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dropkiosk_core::utils::throttle::{AsyncTask, RetryPolicy, Throttle};
use dropkiosk_core::Error;

fn fast_policy(retry_times: u32) -> RetryPolicy {
    RetryPolicy {
        retry_times,
        cooldown: Duration::from_millis(1),
        cooldown_entropy: false,
    }
}

#[tokio::test]
async fn test_retry_bound_and_item_isolation() {
    let throttle = Throttle::new(4, fast_policy(3), "retry test");

    let failing_attempts = Arc::new(AtomicUsize::new(0));
    let succeeding_attempts = Arc::new(AtomicUsize::new(0));

    let failing = failing_attempts.clone();
    let succeeding = succeeding_attempts.clone();
    let tasks: Vec<AsyncTask<&'static str>> = vec![
        Box::new(move || {
            let attempts = failing.clone();
            Box::pin(async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(Error::Ledger("always down".to_string()))
            })
        }),
        Box::new(move || {
            let attempts = succeeding.clone();
            Box::pin(async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Ok("done")
            })
        }),
    ];

    let results = throttle.run_all(tasks).await;

    // retry_times + 1 attempts, then the failure surfaces for that item only.
    assert_eq!(failing_attempts.load(Ordering::SeqCst), 4);
    assert!(results[0].is_err());
    assert_eq!(succeeding_attempts.load(Ordering::SeqCst), 1);
    assert_eq!(results[1].as_deref().ok(), Some("done"));
}

#[tokio::test]
async fn test_eventual_success_stops_retrying() {
    let throttle = Throttle::new(1, fast_policy(5), "eventual success");

    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let tasks: Vec<AsyncTask<usize>> = vec![Box::new(move || {
        let counter = counter.clone();
        Box::pin(async move {
            let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt < 3 {
                Err(Error::Ledger("not yet".to_string()))
            } else {
                Ok(attempt)
            }
        })
    })];

    let results = throttle.run_all(tasks).await;
    assert_eq!(results[0].as_ref().ok(), Some(&3));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_concurrency_stays_under_cap() {
    let max_in_progress = 3;
    let throttle = Throttle::new(max_in_progress, RetryPolicy::none(), "cap test");

    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<AsyncTask<()>> = (0..10)
        .map(|_| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            let task: AsyncTask<()> = Box::new(move || {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                Box::pin(async move {
                    let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(current, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
            });
            task
        })
        .collect();

    let results = throttle.run_all(tasks).await;
    assert_eq!(results.len(), 10);
    assert!(results.iter().all(|r| r.is_ok()));
    assert!(
        peak.load(Ordering::SeqCst) <= max_in_progress,
        "peak concurrency {} exceeded cap {}",
        peak.load(Ordering::SeqCst),
        max_in_progress
    );
}
