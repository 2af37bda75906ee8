// dropkiosk-common/src/models/code.rs

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tri-state claim status of a code. `Unknown` means provisionally reserved
/// or otherwise unverified against the ledger; only a ledger-confirmed
/// result moves a code back to `Unclaimed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Unclaimed,
    Claimed,
    Unknown,
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimStatus::Unclaimed => write!(f, "unclaimed"),
            ClaimStatus::Claimed => write!(f, "claimed"),
            ClaimStatus::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for ClaimStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unclaimed" | "false" => Ok(ClaimStatus::Unclaimed),
            "claimed" | "true" => Ok(ClaimStatus::Claimed),
            "unknown" => Ok(ClaimStatus::Unknown),
            _ => Err(format!("Invalid claim status: {}", s)),
        }
    }
}

/// A single-use redemption code. `code_id` is the redemption string itself
/// and is globally unique across drops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Code {
    pub code_id: String,
    pub drop_id: Uuid,
    pub claimed: ClaimStatus,
    /// A human has been routed toward this code.
    pub scanned: bool,
    pub remote_check_count: i64,
    pub last_remote_check_at: Option<DateTime<Utc>>,
    /// Last remote-ledger error for this code, if any.
    pub error: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Code {
    /// A fresh, never-checked code as created at drop registration.
    pub fn new_unclaimed(code_id: &str, drop_id: Uuid, expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        Self {
            code_id: code_id.to_string(),
            drop_id,
            claimed: ClaimStatus::Unclaimed,
            scanned: false,
            remote_check_count: 0,
            last_remote_check_at: None,
            error: None,
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }
}
