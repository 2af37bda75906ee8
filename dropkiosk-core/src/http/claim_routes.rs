// File: dropkiosk-core/src/http/claim_routes.rs
//
// The inbound claim surface: the QR link handler that classifies access
// tokens and hands out challenge links, and the JSON endpoints that exchange
// a challenge for a code or relay a redemption.

use std::sync::Arc;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use dropkiosk_common::error::Error;
use dropkiosk_common::models::ChallengeKind;
use dropkiosk_common::traits::repository_traits::DropRepository;

use crate::services::{
    AccessService, AllocationService, ChallengeService, ClaimRelayService,
};

/// Where redirects send claimers.
#[derive(Debug, Clone)]
pub struct PublicUrls {
    /// The claimer frontend, e.g. `https://kiosk.example.org`.
    pub app_base_url: String,
    /// External claim page used by bypass drops without their own override.
    pub default_claim_base_url: String,
}

#[derive(Clone)]
pub struct AppState {
    pub drops: Arc<dyn DropRepository>,
    pub access: Arc<AccessService>,
    pub challenges: Arc<ChallengeService>,
    pub allocator: Arc<AllocationService>,
    pub claim_relay: Arc<ClaimRelayService>,
    pub urls: Arc<PublicUrls>,
}

pub fn claim_router(state: AppState) -> Router {
    Router::new()
        .route("/claim/{drop_id}/{token}", get(handle_claim_link))
        .route("/api/code", post(handle_code_by_challenge))
        .route("/api/claim", post(handle_claim_relay))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

#[derive(Debug, Deserialize)]
struct ClaimLinkQuery {
    /// Set by CI runs to shorten grace timings and surface debug info.
    #[serde(rename = "CI")]
    ci: Option<String>,
}

/// GET /claim/{drop_id}/{token}
///
/// Classify the presented access token and redirect: to a challenge link on
/// success, to the bot-detection page with the diagnostic flag trail on
/// failure.
async fn handle_claim_link(
    State(state): State<AppState>,
    Path((drop_id, token)): Path<(String, String)>,
    Query(query): Query<ClaimLinkQuery>,
) -> Response {
    let base = &state.urls.app_base_url;
    let ci = query.ci.is_some();
    info!("Claim request for {}/{}", drop_id, token);

    let Ok(drop_id) = Uuid::parse_str(&drop_id) else {
        return Redirect::temporary(&format!("{base}/#/claim/robot/syntax_error")).into_response();
    };

    let drop = match state.drops.get_drop(drop_id).await {
        Ok(Some(drop)) => drop,
        Ok(None) => {
            error!("Claim request for nonexistent drop {}", drop_id);
            return plain_error();
        }
        Err(e) => {
            error!("Drop lookup failed for {}: {:?}", drop_id, e);
            return plain_error();
        }
    };

    let now = Utc::now();
    let grant = match state.access.classify(&drop, &token, ci, now) {
        Ok(grant) => grant,
        Err(flags) => {
            let url = format!(
                "{base}/#/claim/robot/{}_miss_{}",
                urlencoding::encode(&token),
                flags.trail()
            );
            return Redirect::temporary(&url).into_response();
        }
    };

    let challenge = match state.challenges.issue(&drop, now).await {
        Ok(challenge) => challenge,
        Err(e) => {
            error!("Challenge creation failed for drop {}: {:?}", drop_id, e);
            return plain_error();
        }
    };

    // Rotate only after the current scanner was let through.
    if let Err(e) = state.access.rotate_if_expired(&drop, now).await {
        error!("Access rotation failed for drop {}: {:?}", drop_id, e);
    }

    // Bypass drops skip client-side verification entirely: allocate here and
    // send the claimer straight to the external claim page.
    if drop.has_challenge_kind(ChallengeKind::Naive) {
        let code = match state.allocator.allocate(&challenge.token, None).await {
            Ok(code) => code,
            Err(e) => {
                error!("Bypass allocation failed for drop {}: {:?}", drop_id, e);
                return plain_error();
            }
        };
        let claim_base = drop
            .claim_base_url
            .clone()
            .unwrap_or_else(|| state.urls.default_claim_base_url.clone());
        let url = format!("{}/{}", claim_base.trim_end_matches('/'), code);
        info!("Bypass drop, redirecting to {}", url);
        return Redirect::temporary(&url).into_response();
    }

    let mut url = format!("{base}/#/claim/{}", challenge.token);
    if drop.is_test() || ci {
        let rotation_validity_secs = drop
            .previous_access
            .as_ref()
            .map(|a| a.validity_minutes)
            .unwrap_or(state.access.config().default_validity_minutes)
            * 60.0;
        url.push_str(&format!(
            "?event_expires={}s&chal_expires={}s&grace={}s&trail={}",
            rotation_validity_secs as i64,
            (challenge.validity_minutes * 60.0) as i64,
            grant.grace.num_seconds(),
            grant.flags.trail()
        ));
    }
    Redirect::temporary(&url).into_response()
}

#[derive(Debug, Deserialize)]
struct CodeByChallengeRequest {
    challenge_token: String,
    proof: Option<String>,
}

#[derive(Debug, Serialize)]
struct CodeResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// POST /api/code — exchange a challenge (plus optional verification proof)
/// for a code id.
async fn handle_code_by_challenge(
    State(state): State<AppState>,
    Json(request): Json<CodeByChallengeRequest>,
) -> Response {
    match state
        .allocator
        .allocate(&request.challenge_token, request.proof.as_deref())
        .await
    {
        Ok(code) => Json(CodeResponse { code: Some(code), error: None }).into_response(),
        Err(Error::Allocation(e)) => {
            // Allocation outcomes are contract, not faults; the client keys
            // off the stable message strings.
            Json(CodeResponse { code: None, error: Some(e.to_string()) }).into_response()
        }
        Err(e) => {
            error!("Allocation failed: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CodeResponse { code: None, error: Some("Internal error".to_string()) }),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClaimRelayRequest {
    code: String,
    address: String,
    #[serde(default = "default_send_email")]
    send_email: bool,
}

fn default_send_email() -> bool {
    true
}

#[derive(Debug, Serialize)]
struct ClaimRelayResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// POST /api/claim — relay a redemption to the ledger.
async fn handle_claim_relay(
    State(state): State<AppState>,
    Json(request): Json<ClaimRelayRequest>,
) -> Response {
    match state
        .claim_relay
        .claim_to_address(&request.code, &request.address, request.send_email)
        .await
    {
        Ok(()) => Json(ClaimRelayResponse { success: Some(true), error: None }).into_response(),
        Err(e @ (Error::Validation(_) | Error::Ledger(_))) => {
            Json(ClaimRelayResponse { success: None, error: Some(e.to_string()) }).into_response()
        }
        Err(e) => {
            error!("Claim relay failed: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ClaimRelayResponse { success: None, error: Some("Internal error".to_string()) }),
            )
                .into_response()
        }
    }
}

fn plain_error() -> Response {
    "Error validating your QR".into_response()
}
