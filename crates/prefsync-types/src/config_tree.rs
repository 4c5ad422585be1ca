//! Immutable configuration tree nodes.
//!
//! A [`ConfigNode`] is a cheaply cloneable, shared, immutable value. Changing
//! anything produces a new node; subtrees that did not change are shared
//! between the old and the new tree. Node positions are identified by pointer
//! identity ([`ConfigNode::same_node`]), structural equality is `==`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

#[derive(PartialEq, Eq)]
struct NodeData {
	name: Box<str>,
	value: Option<Box<str>>,
	attributes: BTreeMap<Box<str>, Box<str>>,
	children: Vec<ConfigNode>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct ConfigNode(Arc<NodeData>);

impl ConfigNode {
	/// Empty node with just a name
	pub fn new(name: impl Into<Box<str>>) -> Self {
		ConfigNodeBuilder::new(name).build()
	}

	pub fn builder(name: impl Into<Box<str>>) -> ConfigNodeBuilder {
		ConfigNodeBuilder::new(name)
	}

	/// Leaf node carrying a value
	pub fn leaf(name: impl Into<Box<str>>, value: impl Into<Box<str>>) -> Self {
		ConfigNodeBuilder::new(name).value(value).build()
	}

	/// Builder pre-filled with this node's content
	pub fn to_builder(&self) -> ConfigNodeBuilder {
		ConfigNodeBuilder {
			name: self.0.name.clone(),
			value: self.0.value.clone(),
			attributes: self.0.attributes.clone(),
			children: self.0.children.clone(),
		}
	}

	pub fn name(&self) -> &str {
		&self.0.name
	}

	pub fn value(&self) -> Option<&str> {
		self.0.value.as_deref()
	}

	pub fn attributes(&self) -> &BTreeMap<Box<str>, Box<str>> {
		&self.0.attributes
	}

	pub fn attribute(&self, name: &str) -> Option<&str> {
		self.0.attributes.get(name).map(AsRef::as_ref)
	}

	pub fn children(&self) -> &[ConfigNode] {
		&self.0.children
	}

	/// First child with the given name
	pub fn child(&self, name: &str) -> Option<&ConfigNode> {
		self.0.children.iter().find(|c| c.name() == name)
	}

	pub fn children_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a ConfigNode> {
		self.0.children.iter().filter(move |c| c.name() == name)
	}

	/// No children and no attributes
	pub fn is_leaf(&self) -> bool {
		self.0.children.is_empty() && self.0.attributes.is_empty()
	}

	/// Nothing but a name
	pub fn is_empty(&self) -> bool {
		self.is_leaf() && self.0.value.is_none()
	}

	/// Pointer identity: both handles refer to the same tree position
	pub fn same_node(&self, other: &ConfigNode) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}

	pub fn with_name(&self, name: impl Into<Box<str>>) -> ConfigNode {
		self.to_builder().name(name).build()
	}

	pub fn with_value(&self, value: Option<&str>) -> ConfigNode {
		let mut builder = self.to_builder();
		builder.value = value.map(Into::into);
		builder.build()
	}

	/// Set (`Some`) or remove (`None`) an attribute
	pub fn with_attribute(&self, name: &str, value: Option<&str>) -> ConfigNode {
		let mut builder = self.to_builder();
		match value {
			Some(value) => {
				builder.attributes.insert(name.into(), value.into());
			}
			None => {
				builder.attributes.remove(name);
			}
		}
		builder.build()
	}

	pub fn with_child_added(&self, child: ConfigNode) -> ConfigNode {
		self.to_builder().child(child).build()
	}

	pub fn with_children(&self, children: Vec<ConfigNode>) -> ConfigNode {
		let mut builder = self.to_builder();
		builder.children = children;
		builder.build()
	}

	/// Replace the child at `old`'s position. Unchanged if `old` is not a child.
	pub fn with_child_replaced(&self, old: &ConfigNode, new: ConfigNode) -> ConfigNode {
		let mut replaced = false;
		let children = self
			.0
			.children
			.iter()
			.map(|c| {
				if !replaced && c.same_node(old) {
					replaced = true;
					new.clone()
				} else {
					c.clone()
				}
			})
			.collect();
		self.with_children(children)
	}

	pub fn with_child_removed(&self, old: &ConfigNode) -> ConfigNode {
		let children = self.0.children.iter().filter(|c| !c.same_node(old)).cloned().collect();
		self.with_children(children)
	}

	/// Structural equality ignoring the order of children.
	///
	/// Siblings are compared after a stable sort by name, so trees with
	/// duplicate sibling names only compare equal if those siblings appear in
	/// the same relative order.
	pub fn equivalent(&self, other: &ConfigNode) -> bool {
		if self.name() != other.name()
			|| self.value() != other.value()
			|| self.attributes() != other.attributes()
			|| self.children().len() != other.children().len()
		{
			return false;
		}
		let mut mine: Vec<&ConfigNode> = self.children().iter().collect();
		let mut theirs: Vec<&ConfigNode> = other.children().iter().collect();
		mine.sort_by(|a, b| a.name().cmp(b.name()));
		theirs.sort_by(|a, b| a.name().cmp(b.name()));
		mine.iter().zip(theirs.iter()).all(|(a, b)| a.equivalent(b))
	}

	/// Copy of this subtree in which every node is a fresh value, so no node
	/// of the copy is shared with any other tree or position.
	pub fn detached(&self) -> ConfigNode {
		ConfigNode(Arc::new(NodeData {
			name: self.0.name.clone(),
			value: self.0.value.clone(),
			attributes: self.0.attributes.clone(),
			children: self.0.children.iter().map(ConfigNode::detached).collect(),
		}))
	}

	/// Total number of nodes in this subtree, including this one
	pub fn node_count(&self) -> usize {
		1 + self.children().iter().map(ConfigNode::node_count).sum::<usize>()
	}

	fn ptr_key(&self) -> usize {
		Arc::as_ptr(&self.0) as usize
	}
}

impl fmt::Debug for ConfigNode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut s = f.debug_struct("ConfigNode");
		s.field("name", &self.0.name);
		if let Some(value) = &self.0.value {
			s.field("value", value);
		}
		if !self.0.attributes.is_empty() {
			s.field("attributes", &self.0.attributes);
		}
		if !self.0.children.is_empty() {
			s.field("children", &self.0.children);
		}
		s.finish()
	}
}

/// Builder for [`ConfigNode`] with fluent API
#[derive(Debug, Clone)]
pub struct ConfigNodeBuilder {
	name: Box<str>,
	value: Option<Box<str>>,
	attributes: BTreeMap<Box<str>, Box<str>>,
	children: Vec<ConfigNode>,
}

impl ConfigNodeBuilder {
	pub fn new(name: impl Into<Box<str>>) -> Self {
		Self { name: name.into(), value: None, attributes: BTreeMap::new(), children: Vec::new() }
	}

	pub fn name(mut self, name: impl Into<Box<str>>) -> Self {
		self.name = name.into();
		self
	}

	pub fn value(mut self, value: impl Into<Box<str>>) -> Self {
		self.value = Some(value.into());
		self
	}

	pub fn opt_value(mut self, value: Option<impl Into<Box<str>>>) -> Self {
		self.value = value.map(Into::into);
		self
	}

	pub fn attribute(mut self, name: impl Into<Box<str>>, value: impl Into<Box<str>>) -> Self {
		self.attributes.insert(name.into(), value.into());
		self
	}

	pub fn child(mut self, child: ConfigNode) -> Self {
		self.children.push(child);
		self
	}

	pub fn children(mut self, children: impl IntoIterator<Item = ConfigNode>) -> Self {
		self.children.extend(children);
		self
	}

	/// Add a child in place (for loops building a node)
	pub fn add_child(&mut self, child: ConfigNode) {
		self.children.push(child);
	}

	/// Add an attribute in place (for loops building a node)
	pub fn add_attribute(&mut self, name: impl Into<Box<str>>, value: impl Into<Box<str>>) {
		self.attributes.insert(name.into(), value.into());
	}

	pub fn build(self) -> ConfigNode {
		ConfigNode(Arc::new(NodeData {
			name: self.name,
			value: self.value,
			attributes: self.attributes,
			children: self.children,
		}))
	}
}

/// Parent index over one immutable tree.
///
/// Nodes are looked up by identity, so only handles taken from this very tree
/// are found. A node handle placed at more than one position of the tree does
/// not identify a position; it and everything below it are not found.
#[derive(Debug, Clone)]
pub struct TreeView {
	root: ConfigNode,
	parents: HashMap<usize, ConfigNode>,
	shared: HashSet<usize>,
}

impl TreeView {
	pub fn new(root: ConfigNode) -> Self {
		let mut parents = HashMap::new();
		let mut shared = HashSet::new();
		let mut stack = vec![root.clone()];
		while let Some(node) = stack.pop() {
			for child in node.children() {
				if parents.insert(child.ptr_key(), node.clone()).is_some() {
					// Already indexed from another position
					shared.insert(child.ptr_key());
					continue;
				}
				stack.push(child.clone());
			}
		}
		Self { root, parents, shared }
	}

	pub fn root(&self) -> &ConfigNode {
		&self.root
	}

	pub fn parent(&self, node: &ConfigNode) -> Option<&ConfigNode> {
		if self.shared.contains(&node.ptr_key()) {
			return None;
		}
		self.parents.get(&node.ptr_key())
	}

	pub fn contains(&self, node: &ConfigNode) -> bool {
		node.same_node(&self.root) || self.path_to(node).is_some()
	}

	/// Ancestors of `node` from the topmost child of the root down to `node`
	/// itself. Empty for the root, `None` if `node` has no unique position in
	/// this tree.
	pub fn path_to(&self, node: &ConfigNode) -> Option<Vec<ConfigNode>> {
		let mut path = Vec::new();
		let mut current = node.clone();
		while !current.same_node(&self.root) {
			let parent = self.parent(&current)?.clone();
			path.push(current);
			current = parent;
		}
		path.reverse();
		Some(path)
	}

	/// Rebuild the tree after replacing `old` with `new` (`None` removes it).
	///
	/// Every ancestor of `old` is rebuilt; all other subtrees are shared with
	/// the current root. Returns `None` if `old` is not part of this tree.
	pub fn replace(&self, old: &ConfigNode, new: Option<ConfigNode>) -> Option<ConfigNode> {
		if old.same_node(&self.root) {
			return Some(new.unwrap_or_else(|| ConfigNode::new(self.root.name())));
		}
		let mut parent = self.parent(old)?.clone();
		let mut replacement = match new {
			Some(node) => parent.with_child_replaced(old, node),
			None => parent.with_child_removed(old),
		};
		while !parent.same_node(&self.root) {
			let grand = self.parent(&parent)?.clone();
			replacement = grand.with_child_replaced(&parent, replacement);
			parent = grand;
		}
		Some(replacement)
	}
}


// vim: ts=4
