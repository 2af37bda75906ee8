// File: dropkiosk-core/src/services/claim_service.rs

use std::sync::Arc;
use regex::Regex;
use tracing::info;

use dropkiosk_common::error::Error;

use crate::ledger::{ClaimRequest, LedgerApi};

/// Relays a redemption to the ledger on behalf of a recipient address.
/// The ledger remains the serialization point; this service only refuses
/// obviously dead requests early.
pub struct ClaimRelayService {
    ledger: Arc<dyn LedgerApi>,
}

impl ClaimRelayService {
    pub fn new(ledger: Arc<dyn LedgerApi>) -> Self {
        Self { ledger }
    }

    /// Claim `code_id` to an email or wallet address.
    pub async fn claim_to_address(
        &self,
        code_id: &str,
        address: &str,
        send_default_email: bool,
    ) -> Result<(), Error> {
        if !is_email(address) && !is_wallet_or_ens(address) {
            return Err(Error::Validation("Invalid email/wallet format".to_string()));
        }

        // Remove +tag hacks so the ledger sees the canonical mailbox.
        let address = if is_wallet(address) {
            address.to_string()
        } else {
            strip_plus_tag(address)
        };

        let status = self.ledger.check_status(code_id).await?;
        if let Some(readable) = status.readable_error() {
            return Err(Error::Ledger(readable));
        }
        if status.claimed == Some(true) {
            return Err(Error::Validation(
                "This QR was already used and is no longer valid.".to_string(),
            ));
        }
        let secret = status
            .secret
            .ok_or_else(|| Error::Ledger("Status response carried no claim secret".to_string()))?;

        info!("Claiming '{}' to '{}'", code_id, address);
        self.ledger
            .claim(&ClaimRequest {
                address,
                qr_hash: code_id.to_string(),
                secret,
                send_email: send_default_email,
            })
            .await
    }
}

fn is_email(s: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
        .expect("static regex")
        .is_match(s)
}

fn is_wallet(s: &str) -> bool {
    Regex::new(r"^(?i)0x[a-z0-9]{40}$")
        .expect("static regex")
        .is_match(s)
}

fn is_wallet_or_ens(s: &str) -> bool {
    is_wallet(s) || s.ends_with(".eth")
}

fn strip_plus_tag(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let local = local.split('+').next().unwrap_or(local);
            format!("{}@{}", local, domain)
        }
        None => email.to_string(),
    }
}
