pub mod db;
pub mod models;
mod records;
mod tables;

pub use db::{Database, DatabaseError, PurgeStats};
pub use tables::*;
