//! Collaborators and command-line runtime for analysis job dispatch.
//!
//! This crate owns catalog lookups, storage listing, descriptor persistence
//! and process wiring around the pure engine in `analysis_dispatch_core`.

pub mod adapters;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod sources;

pub use error::RuntimeError;
