pub mod challenge;
pub mod code;
pub mod drop;
pub mod meta;
pub mod proof;

pub use challenge::Challenge;
pub use code::{ClaimStatus, Code};
pub use drop::{generate_access_token, AccessToken, ChallengeKind, CodeDrop, GameConfig};
pub use meta::{CodeErrorStat, JobMarker, LedgerErrorStat};
pub use proof::VerificationProof;
