// File: dropkiosk-core/src/test_utils/fakes.rs

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use dropkiosk_common::error::Error;
use dropkiosk_common::models::{
    AccessToken, Challenge, ClaimStatus, Code, CodeDrop, JobMarker, VerificationProof,
};
use dropkiosk_common::traits::repository_traits::{
    ChallengeRepository, CodeRepository, DropRepository, JobMetaRepository, ProofRepository,
};

use crate::ledger::{ClaimRequest, CodeStatus, LedgerApi};

#[derive(Default)]
pub struct MemoryDropRepository {
    drops: Mutex<HashMap<Uuid, CodeDrop>>,
}

impl MemoryDropRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn available_count(&self, drop_id: Uuid) -> i64 {
        self.drops
            .lock()
            .unwrap()
            .get(&drop_id)
            .map(|d| d.available_count)
            .unwrap_or(0)
    }
}

#[async_trait]
impl DropRepository for MemoryDropRepository {
    async fn create_drop(&self, drop: &CodeDrop) -> Result<(), Error> {
        self.drops.lock().unwrap().insert(drop.drop_id, drop.clone());
        Ok(())
    }

    async fn get_drop(&self, drop_id: Uuid) -> Result<Option<CodeDrop>, Error> {
        Ok(self.drops.lock().unwrap().get(&drop_id).cloned())
    }

    async fn list_drops(&self) -> Result<Vec<CodeDrop>, Error> {
        let mut drops: Vec<_> = self.drops.lock().unwrap().values().cloned().collect();
        drops.sort_by_key(|d| d.created_at);
        Ok(drops)
    }

    async fn rotate_access(
        &self,
        drop_id: Uuid,
        new_current: &AccessToken,
        new_previous: &AccessToken,
    ) -> Result<(), Error> {
        let mut drops = self.drops.lock().unwrap();
        if let Some(drop) = drops.get_mut(&drop_id) {
            drop.current_access = new_current.clone();
            drop.previous_access = Some(new_previous.clone());
            drop.updated_at = new_current.created_at;
        }
        Ok(())
    }

    async fn increment_available(&self, drop_id: Uuid, delta: i64) -> Result<(), Error> {
        let mut drops = self.drops.lock().unwrap();
        if let Some(drop) = drops.get_mut(&drop_id) {
            drop.available_count += delta;
        }
        Ok(())
    }

    async fn delete_drop(&self, drop_id: Uuid) -> Result<(), Error> {
        self.drops.lock().unwrap().remove(&drop_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCodeRepository {
    codes: Mutex<HashMap<String, Code>>,
}

impl MemoryCodeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim_status(&self, code_id: &str) -> Option<ClaimStatus> {
        self.codes.lock().unwrap().get(code_id).map(|c| c.claimed)
    }
}

#[async_trait]
impl CodeRepository for MemoryCodeRepository {
    async fn insert_code(&self, code: &Code) -> Result<(), Error> {
        self.codes
            .lock()
            .unwrap()
            .insert(code.code_id.clone(), code.clone());
        Ok(())
    }

    async fn get_code(&self, code_id: &str) -> Result<Option<Code>, Error> {
        Ok(self.codes.lock().unwrap().get(code_id).cloned())
    }

    async fn oldest_unclaimed(&self, drop_id: Uuid) -> Result<Option<Code>, Error> {
        let codes = self.codes.lock().unwrap();
        Ok(codes
            .values()
            .filter(|c| c.drop_id == drop_id && c.claimed == ClaimStatus::Unclaimed)
            .min_by_key(|c| (c.updated_at, c.code_id.clone()))
            .cloned())
    }

    async fn try_reserve(&self, code_id: &str, now: DateTime<Utc>) -> Result<bool, Error> {
        let mut codes = self.codes.lock().unwrap();
        match codes.get_mut(code_id) {
            Some(code) if code.claimed == ClaimStatus::Unclaimed => {
                code.claimed = ClaimStatus::Unknown;
                code.scanned = true;
                code.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_unknown(
        &self,
        code_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ClaimStatus>, Error> {
        let mut codes = self.codes.lock().unwrap();
        match codes.get_mut(code_id) {
            Some(code) => {
                let old = code.claimed;
                code.claimed = ClaimStatus::Unknown;
                code.scanned = true;
                code.updated_at = now;
                Ok(Some(old))
            }
            None => Ok(None),
        }
    }

    async fn record_check_result(
        &self,
        code_id: &str,
        claimed: ClaimStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<(ClaimStatus, ClaimStatus)>, Error> {
        let mut codes = self.codes.lock().unwrap();
        match codes.get_mut(code_id) {
            Some(code) => {
                let old = code.claimed;
                // Confirmed claims stay claimed, mirroring the SQL guard.
                let new = if old == ClaimStatus::Claimed { old } else { claimed };
                code.claimed = new;
                code.remote_check_count += 1;
                code.last_remote_check_at = Some(now);
                code.updated_at = now;
                Ok(Some((old, new)))
            }
            None => Ok(None),
        }
    }

    async fn record_check_error(
        &self,
        code_id: &str,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        let mut codes = self.codes.lock().unwrap();
        if let Some(code) = codes.get_mut(code_id) {
            code.error = Some(error.to_string());
            code.updated_at = now;
        }
        Ok(())
    }

    async fn reset_scanned(&self, code_id: &str, now: DateTime<Utc>) -> Result<(), Error> {
        let mut codes = self.codes.lock().unwrap();
        if let Some(code) = codes.get_mut(code_id) {
            code.scanned = false;
            code.remote_check_count = 0;
            code.updated_at = now;
        }
        Ok(())
    }

    async fn unknown_older_than(
        &self,
        drop_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Code>, Error> {
        let codes = self.codes.lock().unwrap();
        let mut list: Vec<_> = codes
            .values()
            .filter(|c| {
                c.drop_id == drop_id
                    && c.claimed == ClaimStatus::Unknown
                    && c.updated_at < cutoff
            })
            .cloned()
            .collect();
        list.sort_by_key(|c| c.updated_at);
        Ok(list)
    }

    async fn never_checked(&self, drop_id: Uuid) -> Result<Vec<Code>, Error> {
        let codes = self.codes.lock().unwrap();
        let mut list: Vec<_> = codes
            .values()
            .filter(|c| c.drop_id == drop_id && c.remote_check_count == 0)
            .cloned()
            .collect();
        list.sort_by_key(|c| c.updated_at);
        Ok(list)
    }

    async fn scanned_unclaimed(&self, drop_id: Uuid) -> Result<Vec<Code>, Error> {
        let codes = self.codes.lock().unwrap();
        let mut list: Vec<_> = codes
            .values()
            .filter(|c| {
                c.drop_id == drop_id && c.scanned && c.claimed == ClaimStatus::Unclaimed
            })
            .cloned()
            .collect();
        list.sort_by_key(|c| c.updated_at);
        Ok(list)
    }

    async fn list_codes_for_drop(&self, drop_id: Uuid) -> Result<Vec<Code>, Error> {
        let codes = self.codes.lock().unwrap();
        Ok(codes
            .values()
            .filter(|c| c.drop_id == drop_id)
            .cloned()
            .collect())
    }

    async fn delete_code(&self, code_id: &str) -> Result<(), Error> {
        self.codes.lock().unwrap().remove(code_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryChallengeRepository {
    challenges: Mutex<HashMap<String, Challenge>>,
}

impl MemoryChallengeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.challenges.lock().unwrap().len()
    }
}

#[async_trait]
impl ChallengeRepository for MemoryChallengeRepository {
    async fn create_challenge(&self, challenge: &Challenge) -> Result<(), Error> {
        self.challenges
            .lock()
            .unwrap()
            .insert(challenge.token.clone(), challenge.clone());
        Ok(())
    }

    async fn get_challenge(&self, token: &str) -> Result<Option<Challenge>, Error> {
        Ok(self.challenges.lock().unwrap().get(token).cloned())
    }

    async fn delete_challenge(&self, token: &str) -> Result<bool, Error> {
        Ok(self.challenges.lock().unwrap().remove(token).is_some())
    }

    async fn list_challenges_for_drop(&self, drop_id: Uuid) -> Result<Vec<Challenge>, Error> {
        Ok(self
            .challenges
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.drop_id == drop_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryProofRepository {
    proofs: Mutex<HashMap<String, VerificationProof>>,
}

impl MemoryProofRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.proofs.lock().unwrap().len()
    }
}

#[async_trait]
impl ProofRepository for MemoryProofRepository {
    async fn put_proof(&self, proof: &VerificationProof) -> Result<(), Error> {
        self.proofs
            .lock()
            .unwrap()
            .insert(proof.token.clone(), proof.clone());
        Ok(())
    }

    async fn get_proof(&self, token: &str) -> Result<Option<VerificationProof>, Error> {
        Ok(self.proofs.lock().unwrap().get(token).cloned())
    }

    async fn delete_proof(&self, token: &str) -> Result<(), Error> {
        self.proofs.lock().unwrap().remove(token);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryJobMetaRepository {
    markers: Mutex<HashMap<String, JobMarker>>,
    code_errors: Mutex<HashMap<String, i64>>,
    ledger_errors: Mutex<HashMap<String, i64>>,
}

impl MemoryJobMetaRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn code_error_strikes(&self, code_id: &str) -> i64 {
        *self.code_errors.lock().unwrap().get(code_id).unwrap_or(&0)
    }

    pub fn ledger_error_strikes(&self, error: &str) -> i64 {
        *self.ledger_errors.lock().unwrap().get(error).unwrap_or(&0)
    }
}

#[async_trait]
impl JobMetaRepository for MemoryJobMetaRepository {
    async fn get_marker(&self, job_key: &str) -> Result<Option<JobMarker>, Error> {
        Ok(self.markers.lock().unwrap().get(job_key).cloned())
    }

    async fn mark_started(&self, job_key: &str, now: DateTime<Utc>) -> Result<(), Error> {
        self.markers.lock().unwrap().insert(
            job_key.to_string(),
            JobMarker {
                job_key: job_key.to_string(),
                started_at: Some(now),
                ended_at: None,
                updated_at: now,
            },
        );
        Ok(())
    }

    async fn mark_ended(&self, job_key: &str, now: DateTime<Utc>) -> Result<(), Error> {
        let mut markers = self.markers.lock().unwrap();
        if let Some(marker) = markers.get_mut(job_key) {
            marker.started_at = None;
            marker.ended_at = Some(now);
            marker.updated_at = now;
        }
        Ok(())
    }

    async fn record_code_error(
        &self,
        code_id: &str,
        _error: &str,
        _now: DateTime<Utc>,
    ) -> Result<(), Error> {
        *self
            .code_errors
            .lock()
            .unwrap()
            .entry(code_id.to_string())
            .or_insert(0) += 1;
        Ok(())
    }

    async fn record_ledger_error(
        &self,
        error: &str,
        _message: &str,
        _now: DateTime<Utc>,
    ) -> Result<(), Error> {
        *self
            .ledger_errors
            .lock()
            .unwrap()
            .entry(error.to_string())
            .or_insert(0) += 1;
        Ok(())
    }
}

/// One scripted response for a code's next status check.
#[derive(Debug, Clone)]
pub enum ScriptedStatus {
    Claimed(bool),
    ApiError(String),
    NetworkError(String),
}

/// A ledger whose answers are scripted per code. Unscripted codes answer
/// from the `claimed` set, defaulting to unclaimed.
#[derive(Default)]
pub struct MockLedger {
    scripts: Mutex<HashMap<String, VecDeque<ScriptedStatus>>>,
    claimed: Mutex<HashSet<String>>,
    status_calls: Mutex<Vec<String>>,
    claim_calls: Mutex<Vec<ClaimRequest>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a one-shot response for the code's next status check.
    pub fn script(&self, code_id: &str, response: ScriptedStatus) {
        self.scripts
            .lock()
            .unwrap()
            .entry(code_id.to_string())
            .or_default()
            .push_back(response);
    }

    /// Persistently mark a code claimed/unclaimed at the ledger.
    pub fn set_claimed(&self, code_id: &str, claimed: bool) {
        let mut set = self.claimed.lock().unwrap();
        if claimed {
            set.insert(code_id.to_string());
        } else {
            set.remove(code_id);
        }
    }

    pub fn status_call_count(&self) -> usize {
        self.status_calls.lock().unwrap().len()
    }

    pub fn status_calls_for(&self, code_id: &str) -> usize {
        self.status_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == code_id)
            .count()
    }

    pub fn claim_calls(&self) -> Vec<ClaimRequest> {
        self.claim_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerApi for MockLedger {
    async fn check_status(&self, code: &str) -> Result<CodeStatus, Error> {
        self.status_calls.lock().unwrap().push(code.to_string());

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(code)
            .and_then(|queue| queue.pop_front());

        match scripted {
            Some(ScriptedStatus::Claimed(claimed)) => Ok(CodeStatus {
                claimed: Some(claimed),
                secret: Some("mock_secret".to_string()),
                ..Default::default()
            }),
            Some(ScriptedStatus::ApiError(error)) => Ok(CodeStatus {
                error: Some(error),
                ..Default::default()
            }),
            Some(ScriptedStatus::NetworkError(message)) => Err(Error::Ledger(message)),
            None => {
                let claimed = self.claimed.lock().unwrap().contains(code);
                Ok(CodeStatus {
                    claimed: Some(claimed),
                    secret: Some("mock_secret".to_string()),
                    ..Default::default()
                })
            }
        }
    }

    async fn claim(&self, request: &ClaimRequest) -> Result<(), Error> {
        let mut claimed = self.claimed.lock().unwrap();
        if claimed.contains(&request.qr_hash) {
            return Err(Error::Ledger(
                "already claimed: this code was redeemed before".to_string(),
            ));
        }
        claimed.insert(request.qr_hash.clone());
        self.claim_calls.lock().unwrap().push(request.clone());
        Ok(())
    }
}
