pub mod challenges;
pub mod codes;
pub mod drops;
pub mod job_meta;
pub mod proofs;

pub use challenges::PostgresChallengeRepository;
pub use codes::PostgresCodeRepository;
pub use drops::PostgresDropRepository;
pub use job_meta::PostgresJobMetaRepository;
pub use proofs::PostgresProofRepository;
