//! post-form - validated form submissions with file attachments
//!
//! This crate turns one inbound form submission into one persisted record:
//! - Rule-string validation with per-field message overrides
//! - Upload intake with server-side size limits and generated attachment names
//! - Create/update workflow that can persist through an owning parent record
//! - redb embedded record store and a REST API with multipart support

pub mod api;
pub mod catalog;
pub mod config;
pub mod file_works;
pub mod form;
pub mod model;
pub mod request;
pub mod storage;
#[cfg(test)]
pub mod testutil;
pub mod validation;

use config::Config;
use storage::Database;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
}
