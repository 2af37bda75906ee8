// File: dropkiosk-core/src/services/drop_service.rs

use std::sync::Arc;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::Regex;
use tracing::{error, info};
use uuid::Uuid;

use dropkiosk_common::error::Error;
use dropkiosk_common::models::{
    generate_access_token, ChallengeKind, Code, CodeDrop, GameConfig,
};
use dropkiosk_common::traits::repository_traits::{
    ChallengeRepository, CodeRepository, DropRepository,
};

use crate::utils::throttle::{AsyncTask, RetryPolicy, Throttle};

const MAX_IN_PROGRESS: usize = 500;

/// Registration input. CSV parsing happens upstream; this service receives
/// the already-split code strings.
#[derive(Debug, Clone)]
pub struct RegisterDropRequest {
    pub name: String,
    pub organiser_email: String,
    pub expiry_date: NaiveDate,
    pub codes: Vec<String>,
    pub challenge_kinds: Vec<ChallengeKind>,
    pub game_config: Option<GameConfig>,
    pub claim_base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RegisteredDrop {
    pub drop_id: Uuid,
    pub name: String,
    pub admin_token: String,
}

/// Drop lifecycle: registration with code ingestion, and admin deletion
/// with the code/challenge cascade.
pub struct DropService {
    drops: Arc<dyn DropRepository>,
    codes: Arc<dyn CodeRepository>,
    challenges: Arc<dyn ChallengeRepository>,
}

impl DropService {
    pub fn new(
        drops: Arc<dyn DropRepository>,
        codes: Arc<dyn CodeRepository>,
        challenges: Arc<dyn ChallengeRepository>,
    ) -> Self {
        Self { drops, codes, challenges }
    }

    pub async fn register_drop(&self, request: RegisterDropRequest) -> Result<RegisteredDrop, Error> {
        if request.codes.is_empty() {
            return Err(Error::Validation("Code list has 0 entries".to_string()));
        }
        if request.name.is_empty() {
            return Err(Error::Validation("Please specify a drop name".to_string()));
        }
        if !request.organiser_email.contains('@') {
            return Err(Error::Validation(
                "Please specify a valid email address".to_string(),
            ));
        }

        let codes = sanitise_codes(&request.codes)?;
        let is_test = codes.iter().any(|c| c.contains("testing"));

        let now = Utc::now();
        // A week of grace past the nominal expiry, in case anything needs
        // debugging after the event.
        let expires_at = expiry_with_grace(request.expiry_date);

        let validity_minutes = if is_test { 0.5 } else { 2.0 };
        let drop = CodeDrop {
            drop_id: Uuid::new_v4(),
            name: request.name.clone(),
            organiser_email: request.organiser_email.clone(),
            admin_token: Uuid::new_v4().to_string(),
            code_count: codes.len() as i64,
            // Updated incrementally from here on; the initial unchecked
            // codes count as available until the first sweep says otherwise.
            available_count: codes.len() as i64,
            challenge_kinds: if request.challenge_kinds.is_empty() {
                vec![ChallengeKind::Game]
            } else {
                request.challenge_kinds.clone()
            },
            game_config: request.game_config.unwrap_or_default(),
            claim_base_url: request.claim_base_url.clone(),
            current_access: generate_access_token(validity_minutes, is_test, now),
            previous_access: None,
            expires_at,
            created_at: now,
            updated_at: now,
        };
        self.drops.create_drop(&drop).await?;

        let throttle = Throttle::new(MAX_IN_PROGRESS, RetryPolicy::none(), "register drop");

        // A code owned by a different drop anywhere in the store rejects the
        // whole registration.
        let clash_queue: Vec<AsyncTask<()>> = codes
            .iter()
            .map(|code| {
                let codes_repo = self.codes.clone();
                let code = code.clone();
                let drop_id = drop.drop_id;
                let task: AsyncTask<()> = Box::new(move || {
                    let codes_repo = codes_repo.clone();
                    let code = code.clone();
                    Box::pin(async move {
                        if let Some(existing) = codes_repo.get_code(&code).await? {
                            if existing.drop_id != drop_id {
                                return Err(Error::Validation(format!(
                                    "A drop with these codes has already been created! \
                                     Duplicate entry is {}",
                                    code
                                )));
                            }
                        }
                        Ok(())
                    })
                });
                task
            })
            .collect();
        if let Some(clash) = first_error(throttle.run_all(clash_queue).await) {
            self.drops.delete_drop(drop.drop_id).await?;
            return Err(clash);
        }

        let write_queue: Vec<AsyncTask<()>> = codes
            .iter()
            .map(|code| {
                let codes_repo = self.codes.clone();
                let entry = Code::new_unclaimed(code, drop.drop_id, Some(expires_at), now);
                let task: AsyncTask<()> = Box::new(move || {
                    let codes_repo = codes_repo.clone();
                    let entry = entry.clone();
                    Box::pin(async move { codes_repo.insert_code(&entry).await })
                });
                task
            })
            .collect();
        if let Some(failure) = first_error(throttle.run_all(write_queue).await) {
            return Err(failure);
        }

        info!(
            "Registered drop {} ('{}') with {} codes",
            drop.drop_id,
            drop.name,
            codes.len()
        );
        Ok(RegisteredDrop {
            drop_id: drop.drop_id,
            name: drop.name,
            admin_token: drop.admin_token,
        })
    }

    /// Admin deletion; cascades to the drop's codes and challenges.
    /// Per-item cascade failures are logged and skipped, never fatal.
    pub async fn delete_drop(&self, drop_id: Uuid, admin_token: &str) -> Result<Uuid, Error> {
        let drop = self
            .drops
            .get_drop(drop_id)
            .await?
            .ok_or_else(|| Error::Auth("Invalid admin code".to_string()))?;
        if drop.admin_token != admin_token {
            return Err(Error::Auth("Invalid admin code".to_string()));
        }

        self.drops.delete_drop(drop_id).await?;

        let codes = self.codes.list_codes_for_drop(drop_id).await?;
        let challenges = self.challenges.list_challenges_for_drop(drop_id).await?;

        let throttle = Throttle::new(
            MAX_IN_PROGRESS,
            RetryPolicy {
                retry_times: 5,
                cooldown: std::time::Duration::from_secs(5),
                cooldown_entropy: true,
            },
            "delete data of deleted drop",
        );

        let mut queue: Vec<AsyncTask<()>> = Vec::new();
        for code in codes {
            let codes_repo = self.codes.clone();
            queue.push(Box::new(move || {
                let codes_repo = codes_repo.clone();
                let code_id = code.code_id.clone();
                Box::pin(async move { codes_repo.delete_code(&code_id).await })
            }));
        }
        for challenge in challenges {
            let challenges_repo = self.challenges.clone();
            queue.push(Box::new(move || {
                let challenges_repo = challenges_repo.clone();
                let token = challenge.token.clone();
                Box::pin(async move { challenges_repo.delete_challenge(&token).await.map(|_| ()) })
            }));
        }

        for result in throttle.run_all(queue).await {
            if let Err(e) = result {
                error!("Cascade deletion item failed for drop {}: {:?}", drop_id, e);
            }
        }

        info!("Deleted drop {}", drop_id);
        Ok(drop_id)
    }
}

fn expiry_with_grace(date: NaiveDate) -> DateTime<Utc> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc();
    midnight + Duration::weeks(1)
}

/// Strip URL prefixes off pasted codes and reject anything that is not a
/// plain 1-42 character code string.
fn sanitise_codes(raw: &[String]) -> Result<Vec<String>, Error> {
    let url_prefix = Regex::new(r"(?i)https?://.*/").expect("static regex");
    let valid_code = Regex::new(r"^\w{1,42}$").expect("static regex");

    let mut sane = Vec::new();
    for code in raw {
        let code = url_prefix.replace(code, "").to_string();
        if code.is_empty() {
            continue;
        }
        if !valid_code.is_match(&code) {
            return Err(Error::Validation(format!("Invalid code: {}", code)));
        }
        sane.push(code);
    }
    Ok(sane)
}

fn first_error<T>(results: Vec<Result<T, Error>>) -> Option<Error> {
    results.into_iter().find_map(|r| r.err())
}
