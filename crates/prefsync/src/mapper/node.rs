//! Node-based layout: raw keys are leaf nodes.
//!
//! A node's own value is the raw key of the same name in its parent. A raw key
//! is therefore a leaf unless a child node of the same name exists, in which
//! case it is that child's value.

use crate::preferences_adapter::check_node_name;
use crate::prelude::*;

pub(super) fn node_value(node: &PrefNode) -> PsResult<Option<String>> {
	match node.parent()? {
		Some(parent) => leaf_value(&parent, node.name()),
		None => Ok(None),
	}
}

pub(super) fn set_node_value(node: &PrefNode, value: Option<&str>) -> PsResult<()> {
	match node.parent()? {
		Some(parent) => set_leaf_value(&parent, node.name(), value),
		None if value.is_none() => Ok(()),
		None => Err(Error::runtime("the root preference node cannot carry a value")),
	}
}

pub(super) fn leaf_value(parent: &PrefNode, name: &str) -> PsResult<Option<String>> {
	Ok(parent.get(name)?.map(String::from))
}

pub(super) fn set_leaf_value(parent: &PrefNode, name: &str, value: Option<&str>) -> PsResult<()> {
	match value {
		Some(value) => parent.put(name, value)?,
		None => parent.remove(name)?,
	}
	Ok(())
}

/// One existence check per key. Keys that cannot name a node are leaves.
pub(super) fn is_attribute(node: &PrefNode, key: &str) -> PsResult<bool> {
	if check_node_name(key).is_err() {
		return Ok(true);
	}
	Ok(!node.child_exists(key)?)
}

// vim: ts=4
