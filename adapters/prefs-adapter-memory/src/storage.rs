//! JSON backing file for the in-memory preference store.
//!
//! The whole store is written as one nested document:
//! `{"keys": {...}, "children": {"name": {...}}}`. Empty maps are omitted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use prefsync::preferences_adapter::{PrefsError, PrefsResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredNode {
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub keys: BTreeMap<String, String>,

	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub children: BTreeMap<String, StoredNode>,
}

impl StoredNode {
	/// Descend along the names of an absolute path
	pub fn find(&self, path: &str) -> Option<&StoredNode> {
		let mut node = self;
		for name in path.split('/').filter(|s| !s.is_empty()) {
			node = node.children.get(name)?;
		}
		Some(node)
	}
}

/// Helper to convert serde_json errors
pub fn from_json_error(err: serde_json::Error) -> PrefsError {
	PrefsError::BackingStore(io::Error::new(io::ErrorKind::InvalidData, err))
}

/// Read the backing file. A missing file reads as an empty store.
pub fn read_file(path: &Path) -> PrefsResult<StoredNode> {
	match fs::read(path) {
		Ok(data) => serde_json::from_slice(&data).map_err(from_json_error),
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(StoredNode::default()),
		Err(e) => Err(e.into()),
	}
}

/// Write the backing file through a temporary sibling and a rename
pub fn write_file(path: &Path, root: &StoredNode) -> PrefsResult<()> {
	let json = serde_json::to_vec_pretty(root).map_err(from_json_error)?;
	if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
		fs::create_dir_all(dir)?;
	}
	let mut tmp = path.as_os_str().to_owned();
	tmp.push(".tmp");
	fs::write(&tmp, json)?;
	fs::rename(&tmp, path)?;
	Ok(())
}


// vim: ts=4
