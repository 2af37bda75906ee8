pub mod postgres;

pub use dropkiosk_common::traits::repository_traits::{
    ChallengeRepository, CodeRepository, DropRepository, JobMetaRepository, ProofRepository,
};
