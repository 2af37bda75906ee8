// File: dropkiosk-core/src/services/code_status_service.rs

use std::sync::Arc;
use chrono::Utc;
use tracing::{error, warn};

use dropkiosk_common::error::Error;
use dropkiosk_common::models::ClaimStatus;
use dropkiosk_common::traits::repository_traits::{CodeRepository, JobMetaRepository};

use crate::ledger::LedgerApi;
use crate::services::availability::AvailabilityService;

/// Re-derives a single code's local claim status from the ledger. Shared by
/// both reconciliation sweeps.
pub struct CodeStatusService {
    codes: Arc<dyn CodeRepository>,
    job_meta: Arc<dyn JobMetaRepository>,
    ledger: Arc<dyn LedgerApi>,
    availability: Arc<AvailabilityService>,
}

impl CodeStatusService {
    pub fn new(
        codes: Arc<dyn CodeRepository>,
        job_meta: Arc<dyn JobMetaRepository>,
        ledger: Arc<dyn LedgerApi>,
        availability: Arc<AvailabilityService>,
    ) -> Self {
        Self { codes, job_meta, ledger, availability }
    }

    /// Check one code against the ledger and fold the result into the local
    /// cache and the availability counter.
    ///
    /// On a ledger error the error string lands on the code, the per-code
    /// and per-error strike counters are bumped best-effort, and the claim
    /// status plus check counter stay untouched. Returns the status as
    /// written, or `None` when no status could be derived.
    pub async fn update_code_status(&self, code_id: &str) -> Result<Option<ClaimStatus>, Error> {
        let Some(code) = self.codes.get_code(code_id).await? else {
            warn!("Status update requested for unknown code '{}'", code_id);
            return Ok(None);
        };
        let now = Utc::now();

        let status = match self.ledger.check_status(code_id).await {
            Ok(status) => status,
            Err(e) => {
                let readable = e.to_string();
                self.codes.record_check_error(code_id, &readable, now).await?;
                self.record_strikes(code_id, &readable, "").await;
                return Ok(None);
            }
        };

        if let Some(readable) = status.readable_error() {
            self.codes.record_check_error(code_id, &readable, now).await?;
            if let Some(error) = &status.error {
                let message = status.message.clone().unwrap_or_default();
                self.record_strikes(code_id, error, &message).await;
            }
            return Ok(None);
        }

        let remote = if status.claimed == Some(true) {
            ClaimStatus::Claimed
        } else {
            ClaimStatus::Unclaimed
        };

        let Some((old, new)) = self.codes.record_check_result(code_id, remote, now).await? else {
            return Ok(None);
        };
        if old == ClaimStatus::Claimed && remote == ClaimStatus::Unclaimed {
            // Confirmed claims are sticky; the write above kept Claimed.
            warn!(
                "Ledger reverted code '{}' to unclaimed after a confirmed claim; keeping claimed",
                code_id
            );
        }
        self.availability
            .on_claim_transition(code.drop_id, old, new)
            .await?;

        Ok(Some(new))
    }

    /// Failure accounting for operational triage; never blocks the caller.
    async fn record_strikes(&self, code_id: &str, error: &str, message: &str) {
        let now = Utc::now();
        if let Err(e) = self.job_meta.record_code_error(code_id, error, now).await {
            error!("Unable to record code error strike: {:?}", e);
        }
        if let Err(e) = self.job_meta.record_ledger_error(error, message, now).await {
            // This might happen if the remote error code has weird characters.
            error!("Unable to record ledger error strike: {:?}", e);
        }
    }
}
