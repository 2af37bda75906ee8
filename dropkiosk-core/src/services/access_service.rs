// File: dropkiosk-core/src/services/access_service.rs

use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use dropkiosk_common::error::Error;
use dropkiosk_common::models::{generate_access_token, CodeDrop};
use dropkiosk_common::traits::repository_traits::DropRepository;

#[derive(Debug, Clone, Copy)]
pub struct AccessConfig {
    /// How long a superseded token stays acceptable, measured from the
    /// creation of the token that replaced it.
    pub grace: Duration,
    /// Shorter window for test/CI drops.
    pub test_grace: Duration,
    /// Validity of a rotated token when the demoted one carries no interval.
    pub default_validity_minutes: f64,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            grace: Duration::seconds(30),
            test_grace: Duration::seconds(5),
            default_validity_minutes: 2.0,
        }
    }
}

/// How a non-rejected access request qualified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessCheck {
    CurrentValid,
    PreviousValidWithinGrace,
}

/// The four sub-checks of token classification plus the derived verdicts.
/// Appended to every bot-detection redirect for operational debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessFlags {
    pub current_valid: bool,
    pub previous_valid: bool,
    pub previous_within_grace: bool,
    pub completely_invalid: bool,
    pub outside_grace_period: bool,
}

impl AccessFlags {
    /// Fixed-order diagnostic trail, e.g. `ncompinv_noutgr_valpub_nvalprev_previngr_`.
    pub fn trail(&self) -> String {
        let mut trail = String::new();
        trail.push_str(if self.completely_invalid { "compinv_" } else { "ncompinv_" });
        trail.push_str(if self.outside_grace_period { "outgr_" } else { "noutgr_" });
        trail.push_str(if self.current_valid { "valpub_" } else { "nvalpub_" });
        trail.push_str(if self.previous_valid { "valprev_" } else { "nvalprev_" });
        trail.push_str(if self.previous_within_grace { "previngr_" } else { "nprevingr_" });
        trail
    }
}

/// A granted access classification.
#[derive(Debug, Clone, Copy)]
pub struct AccessGrant {
    pub check: AccessCheck,
    pub flags: AccessFlags,
    /// The grace interval that applied to this request.
    pub grace: Duration,
}

pub struct AccessService {
    drops: Arc<dyn DropRepository>,
    config: AccessConfig,
}

impl AccessService {
    pub fn new(drops: Arc<dyn DropRepository>, config: AccessConfig) -> Self {
        Self { drops, config }
    }

    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    fn grace_for(&self, drop: &CodeDrop, ci: bool) -> Duration {
        if ci || drop.is_test() {
            self.config.test_grace
        } else {
            self.config.grace
        }
    }

    /// Classify a presented token against the drop's current/previous pair.
    /// The previous token is acceptable only while the current one is
    /// younger than the grace interval.
    pub fn classify(
        &self,
        drop: &CodeDrop,
        presented: &str,
        ci: bool,
        now: DateTime<Utc>,
    ) -> Result<AccessGrant, AccessFlags> {
        let grace = self.grace_for(drop, ci);

        let current_valid = drop.current_access.token == presented;
        let previous_valid = drop
            .previous_access
            .as_ref()
            .is_some_and(|a| a.token == presented);
        let previous_within_grace = drop.current_access.created_at > now - grace;

        let completely_invalid = !current_valid && !previous_valid;
        let outside_grace_period = previous_valid && !previous_within_grace;

        let flags = AccessFlags {
            current_valid,
            previous_valid,
            previous_within_grace,
            completely_invalid,
            outside_grace_period,
        };

        if completely_invalid || outside_grace_period {
            debug!(
                "Rejected access token for drop {}: {}",
                drop.drop_id,
                flags.trail()
            );
            return Err(flags);
        }

        let check = if current_valid {
            AccessCheck::CurrentValid
        } else {
            AccessCheck::PreviousValidWithinGrace
        };
        Ok(AccessGrant { check, flags, grace })
    }

    /// Rotate the drop's access pair when the current token has expired:
    /// promote a freshly generated token, demote the old current one. The
    /// demoted token keeps its own `validity_minutes`; the fresh token
    /// inherits the interval of the token falling out of the pair.
    ///
    /// Called after the requester has been let through, so the scanner that
    /// triggered the rotation is not itself rejected.
    pub async fn rotate_if_expired(
        &self,
        drop: &CodeDrop,
        now: DateTime<Utc>,
    ) -> Result<bool, Error> {
        if !drop.current_access.is_expired(now) {
            return Ok(false);
        }

        let validity_minutes = drop
            .previous_access
            .as_ref()
            .map(|a| a.validity_minutes)
            .unwrap_or(self.config.default_validity_minutes);

        let new_current = generate_access_token(validity_minutes, drop.is_test(), now);
        info!(
            "Rotating access token for drop {}: new token valid {} min",
            drop.drop_id, validity_minutes
        );
        self.drops
            .rotate_access(drop.drop_id, &new_current, &drop.current_access)
            .await?;
        Ok(true)
    }
}
