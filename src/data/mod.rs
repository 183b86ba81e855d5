//! Data layer module
//!
//! Handles all data persistence:
//! - Storage contracts (`AccountStore`, `FollowStore`)
//! - SQLite implementation of both

mod database;
mod models;
mod store;

pub use database::Database;
pub use models::*;
pub use store::{AccountStore, FollowStore};

#[cfg(test)]
mod database_test;
