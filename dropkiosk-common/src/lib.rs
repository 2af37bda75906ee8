pub mod error;
pub mod models;
pub mod traits;

pub use error::{AllocationError, Error};
