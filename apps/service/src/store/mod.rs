//! Record store: flat-file JSON persistence for users, tokens and checks.
//!
//! One directory per collection, one `<id>.json` file per record. This is
//! the only mutable resource shared between the worker loops and the API
//! operations; concurrent writers to the same record are last-write-wins.

pub mod filestore;
pub mod records;

pub use filestore::{FileStore, RecordStore};

pub const USERS: &str = "users";
pub const TOKENS: &str = "tokens";
pub const CHECKS: &str = "checks";
