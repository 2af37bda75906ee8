//! In-memory fakes for the repository traits and a scripted ledger, used by
//! the integration tests in `tests/`.

pub mod fakes;
pub mod fixtures;

pub use fakes::{
    MemoryChallengeRepository, MemoryCodeRepository, MemoryDropRepository,
    MemoryJobMetaRepository, MemoryProofRepository, MockLedger, ScriptedStatus,
};
pub use fixtures::{make_code, make_drop};
