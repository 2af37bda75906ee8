// File: dropkiosk-core/src/tasks/unknown_sweep.rs

use std::collections::HashSet;
use std::sync::Arc;
use chrono::{Duration, Utc};
use tracing::{error, info};
use uuid::Uuid;

use dropkiosk_common::error::Error;
use dropkiosk_common::traits::repository_traits::{CodeRepository, JobMetaRepository};

use crate::services::code_status_service::CodeStatusService;
use crate::utils::throttle::{AsyncTask, RetryPolicy, Throttle};

use super::SweepReport;

#[derive(Debug, Clone, Copy)]
pub struct UnknownSweepConfig {
    /// Leave freshly touched unknowns alone for this long.
    pub min_age: Duration,
    /// Codes whose last remote check errored are re-checked this many times
    /// slower.
    pub error_slowdown_factor: i32,
    pub max_in_progress: usize,
    pub debounce: Duration,
}

impl Default for UnknownSweepConfig {
    fn default() -> Self {
        Self {
            min_age: Duration::minutes(5),
            error_slowdown_factor: 10,
            max_in_progress: 500,
            debounce: Duration::seconds(60),
        }
    }
}

/// Re-derive status for a drop's aged `unknown` codes and its codes that
/// were never checked against the ledger.
pub async fn refresh_unknown_and_unchecked_codes(
    codes: Arc<dyn CodeRepository>,
    job_meta: Arc<dyn JobMetaRepository>,
    status: Arc<CodeStatusService>,
    drop_id: Uuid,
    config: UnknownSweepConfig,
) -> Result<SweepReport, Error> {
    let now = Utc::now();
    let job_key = format!("unknown_sweep_{}", drop_id);

    // Refuse to start while a run that began within the debounce window has
    // not finished; an older marker is a crashed run and gets overwritten.
    if let Some(marker) = job_meta.get_marker(&job_key).await? {
        if let Some(started) = marker.started_at {
            if started > now - config.debounce {
                info!("Unknown-code sweep already running for drop {}", drop_id);
                return Ok(SweepReport { debounced: true, ..Default::default() });
            }
        }
    }
    job_meta.mark_started(&job_key, now).await?;

    let old_unknowns = codes
        .unknown_older_than(drop_id, now - config.min_age)
        .await?;

    // Codes that keep failing remote checks get re-checked less frequently.
    let (clean, with_errors): (Vec<_>, Vec<_>) =
        old_unknowns.into_iter().partition(|c| c.error.is_none());
    let error_cutoff = now - config.min_age * config.error_slowdown_factor;
    let older_with_errors = with_errors
        .into_iter()
        .filter(|c| c.updated_at < error_cutoff);

    let unchecked = codes.never_checked(drop_id).await?;

    let mut seen = HashSet::new();
    let mut queue: Vec<AsyncTask<()>> = Vec::new();
    for code in clean.into_iter().chain(older_with_errors).chain(unchecked) {
        if !seen.insert(code.code_id.clone()) {
            continue;
        }
        let status = status.clone();
        let code_id = code.code_id;
        queue.push(Box::new(move || {
            let status = status.clone();
            let code_id = code_id.clone();
            Box::pin(async move { status.update_code_status(&code_id).await.map(|_| ()) })
        }));
    }

    let checked = queue.len();
    info!(
        "Unknown-code sweep for drop {}: checking {} code(s)",
        drop_id, checked
    );

    let throttle = Throttle::new(
        config.max_in_progress,
        RetryPolicy::default(),
        "unknown-code sweep",
    );
    for result in throttle.run_all(queue).await {
        if let Err(e) = result {
            error!("Status re-derivation failed during sweep: {:?}", e);
        }
    }

    job_meta.mark_ended(&job_key, Utc::now()).await?;
    Ok(SweepReport { checked, reset: 0, debounced: false })
}
