pub mod claim_routes;

pub use claim_routes::{claim_router, AppState, PublicUrls};
