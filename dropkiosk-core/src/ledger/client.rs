// File: dropkiosk-core/src/ledger/client.rs

use std::sync::Arc;
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use tracing::debug;

use dropkiosk_common::error::Error;

use super::types::{ClaimRequest, ClaimResponse, CodeStatus};
use super::LedgerApi;

/// A small wrapper client for the external claim-ledger API.
///
/// We keep this struct as a general reusable entry point for all ledger
/// calls; per-endpoint request/response types live in `types.rs`.
pub struct LedgerClient {
    http: Arc<ReqwestClient>,
    base_url: String,
    api_key: Option<String>,
}

impl LedgerClient {
    /// - `base_url`: ledger API root, no trailing slash
    /// - `api_key`: optional key sent as `X-API-Key`
    pub fn new(base_url: &str, api_key: Option<&str>) -> Self {
        Self {
            http: Arc::new(ReqwestClient::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(|k| k.to_string()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("X-API-Key", key),
            None => builder,
        }
    }
}

#[async_trait]
impl LedgerApi for LedgerClient {
    async fn check_status(&self, code: &str) -> Result<CodeStatus, Error> {
        let url = format!("{}/actions/claim-qr", self.base_url);
        debug!("Checking ledger status for code '{}'", code);

        let response = self
            .request(self.http.get(&url).query(&[("qr_hash", code)]))
            .send()
            .await?;

        let status: CodeStatus = response.json().await?;
        Ok(status)
    }

    async fn claim(&self, request: &ClaimRequest) -> Result<(), Error> {
        let url = format!("{}/actions/claim-qr", self.base_url);
        debug!("Claiming code '{}' to '{}'", request.qr_hash, request.address);

        let response = self
            .request(self.http.post(&url).json(request))
            .send()
            .await?;

        let outcome: ClaimResponse = response.json().await?;
        if let Some(error) = outcome.error {
            let details = outcome
                .message
                .or_else(|| outcome.status_code.map(|c| c.to_string()))
                .unwrap_or_else(|| "unknown details".to_string());
            return Err(Error::Ledger(format!("{}: {}", error, details)));
        }
        Ok(())
    }
}
