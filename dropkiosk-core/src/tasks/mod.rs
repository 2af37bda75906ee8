pub mod scanned_sweep;
pub mod unknown_sweep;

use std::sync::Arc;
use tracing::{error, info};

use dropkiosk_common::traits::repository_traits::{
    CodeRepository, DropRepository, JobMetaRepository,
};

use crate::services::code_status_service::CodeStatusService;
use scanned_sweep::{refresh_scanned_code_statuses, ScannedSweepConfig};
use unknown_sweep::{refresh_unknown_and_unchecked_codes, UnknownSweepConfig};

/// What a sweep did; `debounced` means another run was already in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    pub reset: usize,
    pub debounced: bool,
}

/// Everything the periodic reconciliation loop needs.
#[derive(Clone)]
pub struct ReconcilerDeps {
    pub drops: Arc<dyn DropRepository>,
    pub codes: Arc<dyn CodeRepository>,
    pub job_meta: Arc<dyn JobMetaRepository>,
    pub status: Arc<CodeStatusService>,
}

/// Spawns the background loop that runs both sweeps for every drop on a
/// fixed interval. Per-drop failures are logged and never end the loop.
pub fn spawn_reconciliation_task(
    deps: ReconcilerDeps,
    unknown_config: UnknownSweepConfig,
    scanned_config: ScannedSweepConfig,
    every: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let ReconcilerDeps {
            drops: drops_repo,
            codes,
            job_meta,
            status,
        } = deps;
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;

            let drops = match drops_repo.list_drops().await {
                Ok(drops) => drops,
                Err(e) => {
                    error!("Reconciliation could not list drops: {:?}", e);
                    continue;
                }
            };
            info!("Reconciling {} drop(s)", drops.len());

            for drop in drops {
                if let Err(e) = refresh_unknown_and_unchecked_codes(
                    codes.clone(),
                    job_meta.clone(),
                    status.clone(),
                    drop.drop_id,
                    unknown_config,
                )
                .await
                {
                    error!("Unknown-code sweep failed for drop {}: {:?}", drop.drop_id, e);
                }

                if let Err(e) = refresh_scanned_code_statuses(
                    drops_repo.clone(),
                    codes.clone(),
                    job_meta.clone(),
                    status.clone(),
                    drop.drop_id,
                    scanned_config,
                )
                .await
                {
                    error!("Scanned-code sweep failed for drop {}: {:?}", drop.drop_id, e);
                }
            }
        }
    })
}
