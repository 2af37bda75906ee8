pub mod access_service;
pub mod allocation_service;
pub mod availability;
pub mod challenge_service;
pub mod claim_service;
pub mod code_status_service;
pub mod drop_service;

pub use access_service::{AccessCheck, AccessConfig, AccessFlags, AccessGrant, AccessService};
pub use allocation_service::{AllocationConfig, AllocationService};
pub use availability::{claim_transition_delta, AvailabilityService};
pub use challenge_service::ChallengeService;
pub use claim_service::ClaimRelayService;
pub use code_status_service::CodeStatusService;
pub use drop_service::{DropService, RegisterDropRequest, RegisteredDrop};
