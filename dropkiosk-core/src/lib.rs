// src/lib.rs

pub mod db;
pub mod http;
pub mod ledger;
pub mod repositories;
pub mod services;
pub mod tasks;
pub mod test_utils;
pub mod utils;

pub use db::Database;
pub use dropkiosk_common::error::{AllocationError, Error};
