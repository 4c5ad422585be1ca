//! prefsync keeps a native hierarchical preference store and an in-memory
//! configuration tree consistent.
//!
//! # Overview
//!
//! - Bulk transfer: [`PreferencesHandler::load`], [`PreferencesHandler::refresh`]
//!   and [`PreferencesHandler::save`] walk one side and rebuild the other
//! - Incremental transfer: with `auto_load` / `auto_save` enabled, change
//!   events of one side are applied to the other as they happen
//! - Two layouts of the store data in the tree, see [`Mapper`]
//! - Changes applied by the handler are never echoed back to their origin,
//!   see [`coordination`]
//!
//! The preference store and the configuration tree are reached through the
//! adapter traits in [`preferences_adapter`] and [`config_adapter`].

#![forbid(unsafe_code)]

// Re-export shared types and adapter traits from prefsync-types
pub use prefsync_types::Value;
pub use prefsync_types::config_adapter;
pub use prefsync_types::config_tree;
pub use prefsync_types::error;
pub use prefsync_types::preferences_adapter;
pub use prefsync_types::types;

pub mod coordination;
pub mod handler;
pub mod listener;
pub mod mapper;
pub mod prelude;
pub mod settings;

pub use coordination::EventCoordinationStrategy;
pub use handler::{PreferencesHandler, PreferencesHandlerBuilder};
pub use mapper::{Mapper, NodeRefs, PropertyData};
pub use settings::{MapperKind, SyncConfig};

// vim: ts=4
