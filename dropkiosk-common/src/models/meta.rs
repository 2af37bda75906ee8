// dropkiosk-common/src/models/meta.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-job, per-drop debounce marker. A job records `started_at` when it
/// begins and clears it on completion; another run of the same job for the
/// same drop refuses to start while a recent marker exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMarker {
    pub job_key: String,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Per-code remote-failure counter, written best-effort for operational
/// triage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeErrorStat {
    pub code_id: String,
    pub error: String,
    pub strikes: i64,
    pub updated_at: DateTime<Utc>,
}

/// Per-error-message counter across all codes, written best-effort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerErrorStat {
    pub error: String,
    pub message: String,
    pub strikes: i64,
    pub updated_at: DateTime<Utc>,
}
