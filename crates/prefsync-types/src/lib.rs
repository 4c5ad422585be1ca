//! Shared types, adapter traits, and error types for prefsync.
//!
//! This crate contains the boundary between the synchronization engine and
//! its two collaborators: the native preference store
//! ([`preferences_adapter`]) and the configuration tree ([`config_adapter`]).
//! Adapter crates depend only on this crate.

#![forbid(unsafe_code)]

pub mod config_adapter;
pub mod config_tree;
pub mod error;
pub mod preferences_adapter;
pub mod prelude;
pub mod types;

pub use serde_json::Value;

// vim: ts=4
