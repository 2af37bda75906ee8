// File: dropkiosk-core/src/ledger/types.rs

use serde::{Deserialize, Serialize};

/// Event metadata attached to a ledger status response.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LedgerEventMeta {
    /// The ledger reports numeric ids for real events and strings for mocks.
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<String>,
}

impl LedgerEventMeta {
    pub fn id_string(&self) -> Option<String> {
        match &self.id {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Status response of the ledger's code lookup. The API is unpredictable
/// with its error/message keys, so both are optional and `message` may
/// arrive capitalized.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodeStatus {
    #[serde(default)]
    pub claimed: Option<bool>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub event: Option<LedgerEventMeta>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, alias = "Message")]
    pub message: Option<String>,
    #[serde(default, rename = "statusCode")]
    pub status_code: Option<i64>,
}

impl CodeStatus {
    /// Collapse the response's error/message permutations into one readable
    /// string; `None` means the response is a usable status.
    pub fn readable_error(&self) -> Option<String> {
        match (&self.error, &self.message) {
            (Some(error), message) => Some(format!(
                "{} - {}",
                error,
                message.clone().unwrap_or_default()
            )),
            (None, Some(message)) => Some(message.clone()),
            (None, None) => None,
        }
    }
}

/// Body of the ledger's claim call.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimRequest {
    pub address: String,
    pub qr_hash: String,
    pub secret: String,
    #[serde(rename = "sendEmail")]
    pub send_email: bool,
}

/// Response of the ledger's claim call; only interesting when it failed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClaimResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, alias = "Message")]
    pub message: Option<String>,
    #[serde(default, rename = "statusCode")]
    pub status_code: Option<i64>,
}
