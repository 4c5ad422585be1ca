//! Translation between preference store nodes and configuration nodes.
//!
//! | | attribute-based | node-based |
//! |---|---|---|
//! | raw key | attribute of the node | leaf child node |
//! | node value | not stored | raw key of the same name in the parent |
//! | config attribute | raw key | raw key (loads back as a leaf) |
//!
//! The base node's own value is never mirrored: in the node-based layout it
//! would live in a node outside the mirrored subtree.

mod attribute;
mod node;

use std::collections::HashSet;

use crate::Value;
use crate::config_tree::TreeView;
use crate::preferences_adapter::{PrefsError, PrefsResult};
use crate::prelude::*;
use crate::settings::MapperKind;

/// Configuration nodes paired with the preference nodes they were loaded from
pub type NodeRefs = Vec<(ConfigNode, PrefNode)>;

/// Where a configuration key lives relative to the base node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyData {
	/// Node names from the base node down to the owner of the property
	pub path: Vec<String>,
	/// Name of the property (leaf, child node or attribute) in its owner
	pub leaf_name: String,
	pub is_attribute: bool,
}

impl PropertyData {
	/// Path of the node the key addresses, when it addresses a node
	pub fn node_path(&self) -> Vec<String> {
		let mut path = self.path.clone();
		path.push(self.leaf_name.clone());
		path
	}
}

/// Storage layout of configuration data in the preference store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mapper {
	AttributeBased,
	NodeBased,
}

impl From<MapperKind> for Mapper {
	fn from(kind: MapperKind) -> Self {
		match kind {
			MapperKind::AttributeBased => Mapper::AttributeBased,
			MapperKind::NodeBased => Mapper::NodeBased,
		}
	}
}

/// Existing descendant of `node`, without creating anything
pub(crate) fn existing_descendant<S: AsRef<str>>(
	node: &PrefNode,
	names: &[S],
) -> PsResult<Option<PrefNode>> {
	let mut current = node.clone();
	for name in names {
		current = current.child_handle(name.as_ref())?;
		if !current.exists()? {
			return Ok(None);
		}
	}
	Ok(Some(current))
}

fn ignore_removed(result: PrefsResult<()>) -> PrefsResult<()> {
	match result {
		Err(PrefsError::NodeRemoved(_)) => Ok(()),
		other => other,
	}
}

impl Mapper {
	pub fn kind(self) -> MapperKind {
		match self {
			Mapper::AttributeBased => MapperKind::AttributeBased,
			Mapper::NodeBased => MapperKind::NodeBased,
		}
	}

	/// Value of a node itself
	pub fn node_value(self, node: &PrefNode) -> PsResult<Option<String>> {
		match self {
			Mapper::AttributeBased => attribute::node_value(node),
			Mapper::NodeBased => node::node_value(node),
		}
	}

	pub fn set_node_value(self, node: &PrefNode, value: Option<&str>) -> PsResult<()> {
		match self {
			Mapper::AttributeBased => attribute::set_node_value(node, value),
			Mapper::NodeBased => node::set_node_value(node, value),
		}
	}

	/// Value of the leaf `name` below `parent`
	pub fn leaf_value(self, parent: &PrefNode, name: &str) -> PsResult<Option<String>> {
		match self {
			Mapper::AttributeBased => attribute::leaf_value(parent, name),
			Mapper::NodeBased => node::leaf_value(parent, name),
		}
	}

	pub fn set_leaf_value(self, parent: &PrefNode, name: &str, value: Option<&str>) -> PsResult<()> {
		match self {
			Mapper::AttributeBased => attribute::set_leaf_value(parent, name, value),
			Mapper::NodeBased => node::set_leaf_value(parent, name, value),
		}
	}

	/// Whether the raw key `key` of `node` is a standalone property (as
	/// opposed to the value of a child node)
	pub fn is_attribute(self, node: &PrefNode, key: &str) -> PsResult<bool> {
		match self {
			Mapper::AttributeBased => attribute::is_attribute(node, key),
			Mapper::NodeBased => node::is_attribute(node, key),
		}
	}

	/// Empty placeholder node
	pub fn create_node_for_name(self, name: &str) -> ConfigNode {
		ConfigNode::new(name)
	}

	/// Build the configuration subtree of `root`, including the value of
	/// `root` itself. Any failure aborts the whole build.
	pub fn load_node_hierarchy(
		self,
		root: &PrefNode,
		mut refs: Option<&mut NodeRefs>,
	) -> PsResult<ConfigNode> {
		let value = self.node_value(root)?;
		let node = self.load_subtree(root, &mut refs)?;
		Ok(match value {
			Some(value) => node.with_value(Some(&value)),
			None => node,
		})
	}

	fn load_subtree(self, node: &PrefNode, refs: &mut Option<&mut NodeRefs>) -> PsResult<ConfigNode> {
		let mut builder = self.create_node_for_name(node.name()).to_builder();

		for key in node.keys()? {
			if !self.is_attribute(node, &key)? {
				// Value of the same-named child, picked up with the child
				continue;
			}
			let Some(value) = node.get(&key)? else { continue };
			match self {
				Mapper::AttributeBased => builder.add_attribute(key, value),
				Mapper::NodeBased => builder.add_child(ConfigNode::leaf(key, value)),
			}
		}

		for name in node.child_names()? {
			let child = node.child_handle(&name)?;
			let mut config_child = self.load_subtree(&child, refs)?;
			if let Some(value) = self.node_value(&child)? {
				config_child = config_child.with_value(Some(&value));
			}
			builder.add_child(config_child);
		}

		let config_node = builder.build();
		if let Some(refs) = refs.as_deref_mut() {
			refs.push((config_node.clone(), node.clone()));
		}
		Ok(config_node)
	}

	/// A configuration node stored as a single raw key of its parent
	fn is_raw_leaf(self, node: &ConfigNode) -> bool {
		self == Mapper::NodeBased
			&& node.value().is_some()
			&& node.children().is_empty()
			&& node.attributes().is_empty()
	}

	/// Write `content` into `base`. Children are reconciled by name and raw
	/// keys that `content` does not produce are removed, so saving twice is
	/// a no-op the second time.
	pub fn save_node_hierarchy(self, content: &ConfigNode, base: &PrefNode) -> PsResult<()> {
		let mut produced = HashSet::new();

		for (name, value) in content.attributes() {
			base.put(name, value)?;
			produced.insert(name.to_string());
		}

		let mut node_children: Vec<&ConfigNode> = Vec::new();
		for child in content.children() {
			if self.is_raw_leaf(child) {
				if let Some(value) = child.value() {
					base.put(child.name(), value)?;
					produced.insert(child.name().to_string());
				}
			} else {
				node_children.push(child);
			}
		}

		let wanted: HashSet<&str> = node_children.iter().map(|c| c.name()).collect();
		for name in base.child_names()? {
			if !wanted.contains(&*name) {
				debug!("Removing preference node {}/{}", base, name);
				ignore_removed(base.child_handle(&name)?.remove_node())?;
			}
		}

		for child in node_children {
			self.set_leaf_value(base, child.name(), child.value())?;
			if child.value().is_some() {
				produced.insert(child.name().to_string());
			}
			let target = base.child(child.name())?;
			self.save_node_hierarchy(child, &target)?;
		}

		for key in base.keys()? {
			if !produced.contains(&*key) {
				base.remove(&key)?;
			}
		}
		Ok(())
	}

	/// Write one subtree below `parent` without touching its siblings
	pub fn add_node_hierarchy(self, parent: &PrefNode, node: &ConfigNode) -> PsResult<()> {
		if self.is_raw_leaf(node) {
			return self.set_leaf_value(parent, node.name(), node.value());
		}
		if node.value().is_some() {
			self.set_leaf_value(parent, node.name(), node.value())?;
		}
		let target = parent.child(node.name())?;
		self.save_node_hierarchy(node, &target)
	}

	/// Configuration key of `node`; empty for `base_node` itself
	pub fn resolve_node_key(
		self,
		content: &dyn ConfigurationTree,
		base_node: &PrefNode,
		node: &PrefNode,
	) -> PsResult<String> {
		let mut names = Vec::new();
		let mut current = node.clone();
		while current != *base_node {
			names.push(current.name().to_string());
			current = match current.parent()? {
				Some(parent) => parent,
				None => {
					return Err(Error::runtime(format!(
						"{} is not below the base node {}",
						node, base_node
					)));
				}
			};
		}

		let engine = content.expression_engine();
		let mut key = String::new();
		for name in names.iter().rev() {
			key = engine.node_key(&self.create_node_for_name(name), &key);
		}
		Ok(key)
	}

	/// Configuration key of the raw key `leaf_name` of `node`
	pub fn resolve_property_key(
		self,
		content: &dyn ConfigurationTree,
		base_node: &PrefNode,
		node: &PrefNode,
		leaf_name: &str,
	) -> PsResult<String> {
		let node_key = self.resolve_node_key(content, base_node, node)?;
		let engine = content.expression_engine();
		Ok(match self {
			Mapper::AttributeBased => engine.attribute_key(&node_key, leaf_name),
			Mapper::NodeBased => engine.node_key(&self.create_node_for_name(leaf_name), &node_key),
		})
	}

	/// Locate `key` in the configuration as a node path plus property name
	pub fn get_property_data(self, content: &dyn ConfigurationTree, key: &str) -> PsResult<PropertyData> {
		let root = content.root();
		let plan = content.expression_engine().prepare_add(&root, key).map_err(|err| match err {
			Error::Parse(_) => Error::runtime_with(format!("cannot resolve key '{}'", key), err),
			other => other,
		})?;

		let view = TreeView::new(root);
		let Some(ancestors) = view.path_to(&plan.parent) else {
			return Err(Error::runtime(format!("no unique position for key '{}'", key)));
		};
		let mut path: Vec<String> = ancestors.iter().map(|n| n.name().to_string()).collect();
		path.extend(plan.path_nodes);

		Ok(PropertyData { path, leaf_name: plan.new_name, is_attribute: plan.is_attribute })
	}

	/// String form of a typed value. Falls back to the plain form when the
	/// conversion handler rejects the value; `null` means absent.
	pub fn convert_value(self, content: &dyn ConfigurationTree, value: Option<&Value>) -> Option<String> {
		let value = value.filter(|v| !v.is_null())?;
		match content.conversion_handler().convert_to_string(value) {
			Ok(converted) => Some(converted),
			Err(err) => {
				debug!("Conversion failed ({}), storing plain form", err);
				Some(match value {
					Value::String(s) => s.clone(),
					other => other.to_string(),
				})
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_kind_round_trip() {
		for kind in [MapperKind::AttributeBased, MapperKind::NodeBased] {
			assert_eq!(Mapper::from(kind).kind(), kind);
		}
	}

	#[test]
	fn test_node_path() {
		let data = PropertyData {
			path: vec!["window".into()],
			leaf_name: "size".into(),
			is_attribute: false,
		};
		assert_eq!(data.node_path(), vec!["window".to_string(), "size".to_string()]);
	}

	#[test]
	fn test_raw_leaf() {
		let leaf = ConfigNode::leaf("width", "800");
		let parent = ConfigNode::builder("window").child(leaf.clone()).build();
		assert!(Mapper::NodeBased.is_raw_leaf(&leaf));
		assert!(!Mapper::NodeBased.is_raw_leaf(&parent));
		assert!(!Mapper::AttributeBased.is_raw_leaf(&leaf));
	}
}

// vim: ts=4
