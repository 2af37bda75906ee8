//! External claim-ledger integration.
//!
//! The ledger is the authoritative record of whether a code has been
//! redeemed. It is rate-limited, occasionally erroring, and never assumed
//! idempotent; everything in this crate talks to it through the [`LedgerApi`]
//! trait so tests can substitute a scripted fake.

pub mod client;
pub mod types;

use async_trait::async_trait;
use dropkiosk_common::error::Error;

pub use client::LedgerClient;
pub use types::{ClaimRequest, CodeStatus, LedgerEventMeta};

#[async_trait]
pub trait LedgerApi: Send + Sync {
    /// Look up the remote claim status of a code. Transport failures surface
    /// as `Err`; API-level failures come back inside [`CodeStatus`].
    async fn check_status(&self, code: &str) -> Result<CodeStatus, Error>;

    /// Redeem a code to an address. The ledger's claim endpoint is the true
    /// serialization point for double-allocation.
    async fn claim(&self, request: &ClaimRequest) -> Result<(), Error>;
}
