// File: dropkiosk-core/src/tasks/scanned_sweep.rs

use std::sync::Arc;
use chrono::{Duration, Utc};
use tracing::{error, info};
use uuid::Uuid;

use dropkiosk_common::error::Error;
use dropkiosk_common::traits::repository_traits::{
    CodeRepository, DropRepository, JobMetaRepository,
};

use crate::services::code_status_service::CodeStatusService;
use crate::utils::throttle::{AsyncTask, RetryPolicy, Throttle};

use super::SweepReport;

#[derive(Debug, Clone, Copy)]
pub struct ScannedSweepConfig {
    /// A code must have been checked more often than this before it can be
    /// presumed abandoned.
    pub check_codes_at_least: i64,
    /// Skip codes whose record was touched within this window; useful when
    /// many kiosk devices trigger rechecks at once.
    pub check_cooldown: Duration,
    pub max_in_progress: usize,
    pub debounce: Duration,
    /// How long after finishing the verification game a claimer is still
    /// expected to complete the redemption.
    pub expected_max_claim_duration: Duration,
}

impl Default for ScannedSweepConfig {
    fn default() -> Self {
        Self {
            check_codes_at_least: 2,
            check_cooldown: Duration::seconds(30),
            max_in_progress: 500,
            debounce: Duration::seconds(60),
            expected_max_claim_duration: Duration::minutes(2),
        }
    }
}

/// Re-check codes a human was routed to but which never got claimed, and
/// return the abandoned ones to the allocatable pool.
pub async fn refresh_scanned_code_statuses(
    drops: Arc<dyn DropRepository>,
    codes: Arc<dyn CodeRepository>,
    job_meta: Arc<dyn JobMetaRepository>,
    status: Arc<CodeStatusService>,
    drop_id: Uuid,
    config: ScannedSweepConfig,
) -> Result<SweepReport, Error> {
    let now = Utc::now();
    let job_key = format!("scanned_sweep_{}", drop_id);

    if let Some(marker) = job_meta.get_marker(&job_key).await? {
        if let Some(started) = marker.started_at {
            if started > now - config.debounce {
                info!("Scanned-code sweep already running for drop {}", drop_id);
                return Ok(SweepReport { debounced: true, ..Default::default() });
            }
        }
    }
    job_meta.mark_started(&job_key, now).await?;

    // Reset timeout covers the game plus a slow claimer, so codes are not
    // pulled out from under someone still redeeming.
    let game_duration_secs = drops
        .get_drop(drop_id)
        .await?
        .map(|d| d.game_config.duration_secs)
        .unwrap_or(60);
    let reset_timeout = config.expected_max_claim_duration + Duration::seconds(game_duration_secs);

    let scanned = codes.scanned_unclaimed(drop_id).await?;

    // Checked often enough and quiet past the timeout: presumed abandoned.
    let to_reset: Vec<_> = scanned
        .iter()
        .filter(|c| {
            c.remote_check_count > config.check_codes_at_least
                && c.last_remote_check_at
                    .is_some_and(|t| t < now - reset_timeout)
        })
        .collect();

    let throttle = Throttle::new(
        config.max_in_progress,
        RetryPolicy::default(),
        "scanned-code sweep",
    );

    let reset_queue: Vec<AsyncTask<()>> = to_reset
        .iter()
        .map(|code| {
            let codes = codes.clone();
            let code_id = code.code_id.clone();
            let task: AsyncTask<()> = Box::new(move || {
                let codes = codes.clone();
                let code_id = code_id.clone();
                Box::pin(async move { codes.reset_scanned(&code_id, Utc::now()).await })
            });
            task
        })
        .collect();
    let reset = reset_queue.len();
    for result in throttle.run_all(reset_queue).await {
        if let Err(e) = result {
            error!("Scanned-code reset failed: {:?}", e);
        }
    }

    let to_check: Vec<_> = scanned
        .iter()
        .filter(|c| c.updated_at < now - config.check_cooldown)
        .collect();
    let checked = to_check.len();
    info!(
        "Scanned-code sweep for drop {}: checking {} code(s), reset {}",
        drop_id, checked, reset
    );

    let check_queue: Vec<AsyncTask<()>> = to_check
        .iter()
        .map(|code| {
            let status = status.clone();
            let code_id = code.code_id.clone();
            let task: AsyncTask<()> = Box::new(move || {
                let status = status.clone();
                let code_id = code_id.clone();
                Box::pin(async move { status.update_code_status(&code_id).await.map(|_| ()) })
            });
            task
        })
        .collect();
    for result in throttle.run_all(check_queue).await {
        if let Err(e) = result {
            error!("Status re-derivation failed during sweep: {:?}", e);
        }
    }

    job_meta.mark_ended(&job_key, Utc::now()).await?;
    Ok(SweepReport { checked, reset, debounced: false })
}
