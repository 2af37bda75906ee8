use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use dropkiosk_common::traits::repository_traits::{
    ChallengeRepository, CodeRepository, DropRepository, JobMetaRepository, ProofRepository,
};
use dropkiosk_core::db::Database;
use dropkiosk_core::http::{claim_router, AppState, PublicUrls};
use dropkiosk_core::ledger::{LedgerApi, LedgerClient};
use dropkiosk_core::repositories::postgres::{
    PostgresChallengeRepository, PostgresCodeRepository, PostgresDropRepository,
    PostgresJobMetaRepository, PostgresProofRepository,
};
use dropkiosk_core::services::{
    AccessConfig, AccessService, AllocationConfig, AllocationService, AvailabilityService,
    ChallengeService, ClaimRelayService, CodeStatusService,
};
use dropkiosk_core::tasks::scanned_sweep::ScannedSweepConfig;
use dropkiosk_core::tasks::unknown_sweep::UnknownSweepConfig;
use dropkiosk_core::tasks::{spawn_reconciliation_task, ReconcilerDeps};

#[derive(Parser, Debug, Clone)]
#[command(name = "dropkiosk")]
#[command(author, version, about = "Claim-code dispenser backed by an external ledger")]
struct Args {
    /// Postgres connection string; falls back to $DATABASE_URL.
    #[arg(long)]
    database_url: Option<String>,

    #[arg(long, default_value = "127.0.0.1:8080")]
    bind_addr: String,

    /// Base URL of the claimer frontend.
    #[arg(long, default_value = "http://localhost:3000")]
    public_base_url: String,

    /// Default external claim page for bypass drops.
    #[arg(long, default_value = "https://claim.example.org/claim")]
    claim_base_url: String,

    /// Root of the external claim-ledger API; falls back to $LEDGER_BASE_URL.
    #[arg(long)]
    ledger_base_url: Option<String>,

    #[arg(long, default_value_t = 300)]
    reconcile_interval_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let database_url = args
        .database_url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .ok_or_else(|| anyhow::anyhow!("set --database-url or DATABASE_URL"))?;
    let ledger_base_url = args
        .ledger_base_url
        .clone()
        .or_else(|| std::env::var("LEDGER_BASE_URL").ok())
        .ok_or_else(|| anyhow::anyhow!("set --ledger-base-url or LEDGER_BASE_URL"))?;
    let ledger_api_key = std::env::var("LEDGER_API_KEY").ok();

    let db = Database::new(&database_url).await?;
    db.migrate().await?;
    let pool = db.pool().clone();

    let drops: Arc<dyn DropRepository> = Arc::new(PostgresDropRepository::new(pool.clone()));
    let codes: Arc<dyn CodeRepository> = Arc::new(PostgresCodeRepository::new(pool.clone()));
    let challenges: Arc<dyn ChallengeRepository> =
        Arc::new(PostgresChallengeRepository::new(pool.clone()));
    let proofs: Arc<dyn ProofRepository> = Arc::new(PostgresProofRepository::new(pool.clone()));
    let job_meta: Arc<dyn JobMetaRepository> =
        Arc::new(PostgresJobMetaRepository::new(pool.clone()));

    let ledger: Arc<dyn LedgerApi> = Arc::new(LedgerClient::new(
        &ledger_base_url,
        ledger_api_key.as_deref(),
    ));

    let availability = Arc::new(AvailabilityService::new(drops.clone()));
    let status = Arc::new(CodeStatusService::new(
        codes.clone(),
        job_meta.clone(),
        ledger.clone(),
        availability.clone(),
    ));
    let access = Arc::new(AccessService::new(drops.clone(), AccessConfig::default()));
    let challenge_service = Arc::new(ChallengeService::new(challenges.clone()));
    let allocator = Arc::new(AllocationService::new(
        drops.clone(),
        codes.clone(),
        challenges.clone(),
        proofs.clone(),
        ledger.clone(),
        availability.clone(),
        AllocationConfig::default(),
    ));
    let claim_relay = Arc::new(ClaimRelayService::new(ledger.clone()));

    spawn_reconciliation_task(
        ReconcilerDeps {
            drops: drops.clone(),
            codes: codes.clone(),
            job_meta: job_meta.clone(),
            status: status.clone(),
        },
        UnknownSweepConfig::default(),
        ScannedSweepConfig::default(),
        Duration::from_secs(args.reconcile_interval_secs),
    );

    let state = AppState {
        drops,
        access,
        challenges: challenge_service,
        allocator,
        claim_relay,
        urls: Arc::new(PublicUrls {
            app_base_url: args.public_base_url.trim_end_matches('/').to_string(),
            default_claim_base_url: args.claim_base_url.clone(),
        }),
    };

    let listener = tokio::net::TcpListener::bind(&args.bind_addr).await?;
    info!("dropkiosk listening on {}", args.bind_addr);
    axum::serve(listener, claim_router(state)).await?;
    Ok(())
}
