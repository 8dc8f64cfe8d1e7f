//! Uptime-monitoring service: users register HTTP(S) checks, a background
//! worker probes them on an interval, persists per-check audit logs, and
//! alerts on up/down transitions. Authentication is via short-lived bearer
//! tokens.
//!
//! The binary wires the components together; this library exposes them to
//! the (external) HTTP layer and to integration tests.

pub mod alerts;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logs;
pub mod monitoring;
pub mod store;
