// dropkiosk-common/src/models/proof.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Evidence that a client completed the human-verification step, stored by
/// the (out-of-scope) verification frontend and consumed here. A valid,
/// unexpired proof extends the challenge grace window; the record is deleted
/// once the allocation it vouched for succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationProof {
    pub token: String,
    pub valid: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
