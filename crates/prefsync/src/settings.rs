//! Synchronization settings

use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// How preference store data is laid out in the configuration tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapperKind {
	/// Raw keys become attributes of the node; nodes carry no value
	#[serde(rename = "attributeBased")]
	AttributeBased,
	/// Raw keys become leaf child nodes; a node's value lives in its parent
	#[default]
	#[serde(rename = "nodeBased")]
	NodeBased,
}

/// Handler settings, e.g. loaded from an application's JSON configuration:
///
/// ```json
/// { "mapper": "attributeBased", "autoLoad": true, "autoSave": false }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
	pub mapper: MapperKind,
	/// Mirror preference store changes into the configuration as they happen
	pub auto_load: bool,
	/// Write configuration changes into the preference store as they happen
	pub auto_save: bool,
}

impl SyncConfig {
	pub fn from_json(json: &str) -> PsResult<Self> {
		serde_json::from_str(json).map_err(|e| Error::runtime_with("invalid sync configuration", e))
	}
}


// vim: ts=4
