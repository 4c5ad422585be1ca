//! Attribute-based layout: raw keys are attributes, nodes carry no value.

use crate::prelude::*;

fn unsupported(what: &str, name: &str) -> Error {
	Error::runtime(format!("attribute-based mapping cannot store a {} value: {}", what, name))
}

pub(super) fn node_value(_node: &PrefNode) -> PsResult<Option<String>> {
	Ok(None)
}

pub(super) fn set_node_value(node: &PrefNode, value: Option<&str>) -> PsResult<()> {
	match value {
		Some(_) => Err(unsupported("node", node.path())),
		None => Ok(()),
	}
}

pub(super) fn leaf_value(_parent: &PrefNode, _name: &str) -> PsResult<Option<String>> {
	Ok(None)
}

pub(super) fn set_leaf_value(parent: &PrefNode, name: &str, value: Option<&str>) -> PsResult<()> {
	match value {
		Some(_) => Err(unsupported("leaf", &format!("{}/{}", parent.path(), name))),
		None => Ok(()),
	}
}

pub(super) fn is_attribute(_node: &PrefNode, _key: &str) -> PsResult<bool> {
	Ok(true)
}

// vim: ts=4
