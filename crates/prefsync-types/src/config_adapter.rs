//! Configuration Tree Adapter
//!
//! Trait and types for the in-memory hierarchical configuration that mirrors a
//! preference store. The tree is an immutable snapshot ([`ConfigNode`]); every
//! mutation publishes a new root and is announced twice to registered
//! listeners: once before the change (data still present) and once after it
//! (value already final).
//!
//! Key resolution ([`ExpressionEngine`]) and value conversion
//! ([`ConversionHandler`]) are services the tree exposes to its users.

use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

use crate::config_tree::ConfigNode;
use crate::prelude::*;
use crate::types::ListenerId;

/// When a configuration event is delivered relative to the change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
	/// The tree still holds the old data
	Before,
	/// The change has been applied
	After,
}

/// What changed in the configuration tree
#[derive(Debug, Clone)]
pub enum ConfigurationChange {
	AddProperty { key: Box<str>, value: Value },
	SetProperty { key: Box<str>, value: Value },
	ClearProperty { key: Box<str> },
	/// The whole configuration was emptied
	Clear,
	AddNodes { key: Box<str>, nodes: Vec<ConfigNode> },
	ClearTree { key: Box<str> },
	/// A node was replaced wholesale (e.g. by `load`)
	SubnodeChanged { key: Option<Box<str>> },
}

#[derive(Debug, Clone)]
pub struct ConfigurationEvent {
	pub change: ConfigurationChange,
	pub phase: EventPhase,
}

impl ConfigurationEvent {
	pub fn before(change: ConfigurationChange) -> Self {
		Self { change, phase: EventPhase::Before }
	}

	pub fn after(change: ConfigurationChange) -> Self {
		Self { change, phase: EventPhase::After }
	}

	pub fn is_before_update(&self) -> bool {
		self.phase == EventPhase::Before
	}

	/// Key the change refers to, if any
	pub fn key(&self) -> Option<&str> {
		match &self.change {
			ConfigurationChange::AddProperty { key, .. }
			| ConfigurationChange::SetProperty { key, .. }
			| ConfigurationChange::ClearProperty { key }
			| ConfigurationChange::AddNodes { key, .. }
			| ConfigurationChange::ClearTree { key } => Some(key),
			ConfigurationChange::SubnodeChanged { key } => key.as_deref(),
			ConfigurationChange::Clear => None,
		}
	}
}

pub trait ConfigurationListener: Send + Sync {
	fn configuration_changed(&self, event: &ConfigurationEvent);
}

/// A position in the tree a key resolved to
#[derive(Debug, Clone)]
pub enum QueryResult {
	Node(ConfigNode),
	Attribute { parent: ConfigNode, name: Box<str> },
}

impl QueryResult {
	pub fn is_attribute(&self) -> bool {
		matches!(self, QueryResult::Attribute { .. })
	}

	/// Value stored at this position
	pub fn value(&self) -> Option<&str> {
		match self {
			QueryResult::Node(node) => node.value(),
			QueryResult::Attribute { parent, name } => parent.attribute(name),
		}
	}
}

/// Insertion plan for a key: where a new node or attribute has to go.
#[derive(Debug, Clone)]
pub struct NodeAddData {
	/// Deepest existing node on the key's path
	pub parent: ConfigNode,
	/// Names of the nodes missing between `parent` and the new element
	pub path_nodes: Vec<String>,
	/// Name of the new node or attribute
	pub new_name: String,
	pub is_attribute: bool,
}

/// Key-resolution service of a configuration tree
pub trait ExpressionEngine: Debug + Send + Sync {
	/// All positions matching `key` below `root`
	fn query(&self, root: &ConfigNode, key: &str) -> PsResult<Vec<QueryResult>>;

	/// Key of `node` given the key of its parent (`""` for the root)
	fn node_key(&self, node: &ConfigNode, parent_key: &str) -> String;

	/// Key of the attribute `name` of the node addressed by `parent_key`
	fn attribute_key(&self, parent_key: &str, name: &str) -> String;

	/// Plan the insertion of `key` below `root`
	fn prepare_add(&self, root: &ConfigNode, key: &str) -> PsResult<NodeAddData>;
}

/// Value-conversion service of a configuration tree
pub trait ConversionHandler: Debug + Send + Sync {
	/// Convert a typed value into the string form stored in the tree
	fn convert_to_string(&self, value: &Value) -> PsResult<String>;
}

/// Configuration tree adapter trait.
pub trait ConfigurationTree: Debug + Send + Sync {
	/// Current snapshot
	fn root(&self) -> ConfigNode;

	/// Value of the first position matching `key`
	fn get_property(&self, key: &str) -> Option<String>;

	/// Merge a tree into the configuration: children of `tree`'s root replace
	/// same-named top-level nodes, other top-level nodes are kept.
	fn load(&self, tree: ConfigNode) -> PsResult<()>;

	/// Add nodes below the node addressed by `key` (created if missing)
	fn add_nodes(&self, key: &str, nodes: Vec<ConfigNode>) -> PsResult<()>;

	/// Set the value of `key`, creating the node or attribute if missing
	fn set_property(&self, key: &str, value: Value) -> PsResult<()>;

	/// Add a value for `key` as a new node (or set the attribute)
	fn add_property(&self, key: &str, value: Value) -> PsResult<()>;

	/// Remove the value of all positions matching `key`
	fn clear_property(&self, key: &str) -> PsResult<()>;

	/// Remove all nodes matching `key` with their subtrees
	fn clear_tree(&self, key: &str) -> PsResult<()>;

	/// Remove everything
	fn clear(&self);

	fn expression_engine(&self) -> Arc<dyn ExpressionEngine>;

	fn conversion_handler(&self) -> Arc<dyn ConversionHandler>;

	fn add_event_listener(&self, listener: Arc<dyn ConfigurationListener>) -> ListenerId;

	fn remove_event_listener(&self, id: ListenerId) -> bool;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_event_key() {
		let event = ConfigurationEvent::after(ConfigurationChange::SetProperty {
			key: "a.b".into(),
			value: Value::from("v"),
		});
		assert_eq!(event.key(), Some("a.b"));
		assert!(!event.is_before_update());
		assert_eq!(ConfigurationEvent::before(ConfigurationChange::Clear).key(), None);
	}

	#[test]
	fn test_query_result_value() {
		let node = ConfigNode::builder("window").attribute("visible", "true").value("main").build();
		assert_eq!(QueryResult::Node(node.clone()).value(), Some("main"));
		let attr = QueryResult::Attribute { parent: node, name: "visible".into() };
		assert!(attr.is_attribute());
		assert_eq!(attr.value(), Some("true"));
	}
}

// vim: ts=4
