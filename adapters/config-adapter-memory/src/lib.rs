//! In-memory configuration tree for prefsync.
//!
//! [`InMemoryConfiguration`] keeps one immutable [`ConfigNode`] root behind a
//! lock and publishes a new root on every mutation. Listeners receive a
//! `Before` event while the old root is still published and an `After` event
//! once the new root is in place; both are delivered on the calling thread
//! with no lock held.

#![forbid(unsafe_code)]

pub mod conversion;
pub mod engine;

use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

use prefsync::Value;
use prefsync::config_adapter::{
	ConfigurationChange, ConfigurationEvent, ConfigurationListener, ConfigurationTree,
	ConversionHandler, ExpressionEngine, NodeAddData, QueryResult,
};
use prefsync::config_tree::{ConfigNode, TreeView};
use prefsync::prelude::*;
use prefsync::types::ListenerId;

pub use conversion::DefaultConversionHandler;
pub use engine::DefaultExpressionEngine;

type Listeners = Vec<(ListenerId, Arc<dyn ConfigurationListener>)>;

/// Nest `inner` below freshly created nodes named by `names` (outermost first)
fn wrap(names: &[String], inner: ConfigNode) -> ConfigNode {
	names.iter().rev().fold(inner, |acc, name| ConfigNode::builder(name.as_str()).child(acc).build())
}

fn replace_in(root: &ConfigNode, old: &ConfigNode, new: Option<ConfigNode>) -> PsResult<ConfigNode> {
	TreeView::new(root.clone())
		.replace(old, new)
		.ok_or_else(|| Error::runtime("node is not part of the configuration"))
}

/// Execute an insertion plan, storing `value` in the new node or attribute
fn insert_value(root: &ConfigNode, plan: NodeAddData, value: Option<String>) -> PsResult<ConfigNode> {
	let new_parent = if plan.is_attribute {
		match plan.path_nodes.split_last() {
			None => plan.parent.with_attribute(&plan.new_name, value.as_deref()),
			Some((last, outer)) => {
				let inner = ConfigNode::new(last.as_str()).with_attribute(&plan.new_name, value.as_deref());
				plan.parent.with_child_added(wrap(outer, inner))
			}
		}
	} else {
		let node = ConfigNode::builder(plan.new_name.as_str()).opt_value(value).build();
		plan.parent.with_child_added(wrap(&plan.path_nodes, node))
	};
	replace_in(root, &plan.parent, Some(new_parent))
}

/// Apply `f` to every position matching `key`, last match first.
///
/// Matches of one key all sit at the same depth, so changing or removing a
/// later match never moves an earlier one.
fn for_each_match(
	engine: &dyn ExpressionEngine,
	root: &ConfigNode,
	key: &str,
	f: impl Fn(&ConfigNode, &QueryResult) -> PsResult<ConfigNode>,
) -> PsResult<ConfigNode> {
	let count = engine.query(root, key)?.len();
	let mut tree = root.clone();
	for i in (0..count).rev() {
		let matches = engine.query(&tree, key)?;
		let Some(position) = matches.get(i) else { continue };
		tree = f(&tree, position)?;
	}
	Ok(tree)
}

/// Hierarchical configuration kept in memory
pub struct InMemoryConfiguration {
	root: RwLock<ConfigNode>,
	listeners: RwLock<Listeners>,
	engine: Arc<dyn ExpressionEngine>,
	conversion: Arc<dyn ConversionHandler>,
}

impl std::fmt::Debug for InMemoryConfiguration {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("InMemoryConfiguration")
			.field("root", &*self.root.read())
			.field("listeners", &self.listeners.read().len())
			.finish_non_exhaustive()
	}
}

impl Default for InMemoryConfiguration {
	fn default() -> Self {
		Self::new()
	}
}

impl InMemoryConfiguration {
	/// Empty configuration with the default key syntax and conversions
	pub fn new() -> Self {
		Self::with_root(ConfigNode::new(""))
	}

	pub fn with_root(root: ConfigNode) -> Self {
		Self {
			root: RwLock::new(root.detached()),
			listeners: RwLock::new(Vec::new()),
			engine: Arc::new(DefaultExpressionEngine),
			conversion: Arc::new(DefaultConversionHandler),
		}
	}

	pub fn with_expression_engine(mut self, engine: Arc<dyn ExpressionEngine>) -> Self {
		self.engine = engine;
		self
	}

	pub fn with_conversion_handler(mut self, conversion: Arc<dyn ConversionHandler>) -> Self {
		self.conversion = conversion;
		self
	}

	pub fn listener_count(&self) -> usize {
		self.listeners.read().len()
	}

	fn fire(&self, event: &ConfigurationEvent) {
		let listeners: Listeners = self.listeners.read().clone();
		for (_, listener) in listeners {
			listener.configuration_changed(event);
		}
	}

	/// `null` clears, everything else goes through the conversion handler
	fn convert(&self, value: &Value) -> PsResult<Option<String>> {
		match value {
			Value::Null => Ok(None),
			value => self.conversion.convert_to_string(value).map(Some),
		}
	}

	/// Fire `Before`, publish the root computed by `f`, fire `After`.
	///
	/// The key is parsed up front so a malformed key fails before any event.
	fn update(
		&self,
		key: Option<&str>,
		change: ConfigurationChange,
		f: impl FnOnce(&ConfigNode) -> PsResult<ConfigNode>,
	) -> PsResult<()> {
		if let Some(key) = key {
			self.engine.query(&self.root(), key)?;
		}

		self.fire(&ConfigurationEvent::before(change.clone()));
		{
			let mut root = self.root.write();
			let updated = f(&root)?;
			*root = updated;
		}
		self.fire(&ConfigurationEvent::after(change));
		Ok(())
	}
}

impl ConfigurationTree for InMemoryConfiguration {
	fn root(&self) -> ConfigNode {
		self.root.read().clone()
	}

	fn get_property(&self, key: &str) -> Option<String> {
		let root = self.root();
		let matches = self.engine.query(&root, key).ok()?;
		matches.iter().find_map(|m| m.value().map(str::to_string))
	}

	fn load(&self, tree: ConfigNode) -> PsResult<()> {
		debug!("Loading {} configuration nodes", tree.node_count());
		let tree = tree.detached();
		self.update(None, ConfigurationChange::SubnodeChanged { key: None }, |root| {
			let replaced: HashSet<&str> = tree.children().iter().map(ConfigNode::name).collect();
			let children = root
				.children()
				.iter()
				.filter(|child| !replaced.contains(child.name()))
				.chain(tree.children())
				.cloned()
				.collect();
			let mut merged = root.with_children(children);
			for (name, value) in tree.attributes() {
				merged = merged.with_attribute(name, Some(value));
			}
			if let Some(value) = tree.value() {
				merged = merged.with_value(Some(value));
			}
			Ok(merged)
		})
	}

	fn add_nodes(&self, key: &str, nodes: Vec<ConfigNode>) -> PsResult<()> {
		if nodes.is_empty() {
			return Ok(());
		}
		// Each inserted position gets its own nodes, even for a reused handle
		let nodes: Vec<ConfigNode> = nodes.iter().map(ConfigNode::detached).collect();
		let engine = Arc::clone(&self.engine);
		let change = ConfigurationChange::AddNodes { key: key.into(), nodes: nodes.clone() };
		self.update(Some(key), change, |root| {
			let matches = engine.query(root, key)?;
			match matches.into_iter().next() {
				Some(QueryResult::Node(target)) => {
					replace_in(root, &target, Some(target.to_builder().children(nodes).build()))
				}
				Some(QueryResult::Attribute { .. }) => {
					Err(Error::runtime(format!("cannot add nodes to an attribute: {}", key)))
				}
				None => {
					let plan = engine.prepare_add(root, key)?;
					if plan.is_attribute {
						return Err(Error::runtime(format!("cannot add nodes to an attribute: {}", key)));
					}
					let node = ConfigNode::builder(plan.new_name.as_str()).children(nodes).build();
					let new_parent = plan.parent.with_child_added(wrap(&plan.path_nodes, node));
					replace_in(root, &plan.parent, Some(new_parent))
				}
			}
		})
	}

	fn set_property(&self, key: &str, value: Value) -> PsResult<()> {
		let converted = self.convert(&value)?;
		let engine = Arc::clone(&self.engine);
		let change = ConfigurationChange::SetProperty { key: key.into(), value };
		self.update(Some(key), change, |root| {
			if engine.query(root, key)?.is_empty() {
				let plan = engine.prepare_add(root, key)?;
				return insert_value(root, plan, converted);
			}
			for_each_match(engine.as_ref(), root, key, |tree, position| match position {
				QueryResult::Node(node) => {
					replace_in(tree, node, Some(node.with_value(converted.as_deref())))
				}
				QueryResult::Attribute { parent, name } => {
					replace_in(tree, parent, Some(parent.with_attribute(name, converted.as_deref())))
				}
			})
		})
	}

	fn add_property(&self, key: &str, value: Value) -> PsResult<()> {
		let converted = self.convert(&value)?;
		let engine = Arc::clone(&self.engine);
		let change = ConfigurationChange::AddProperty { key: key.into(), value };
		self.update(Some(key), change, |root| {
			let plan = engine.prepare_add(root, key)?;
			insert_value(root, plan, converted)
		})
	}

	fn clear_property(&self, key: &str) -> PsResult<()> {
		let engine = Arc::clone(&self.engine);
		let change = ConfigurationChange::ClearProperty { key: key.into() };
		self.update(Some(key), change, |root| {
			for_each_match(engine.as_ref(), root, key, |tree, position| match position {
				QueryResult::Node(node) => replace_in(tree, node, Some(node.with_value(None))),
				QueryResult::Attribute { parent, name } => {
					replace_in(tree, parent, Some(parent.with_attribute(name, None)))
				}
			})
		})
	}

	fn clear_tree(&self, key: &str) -> PsResult<()> {
		if key.is_empty() {
			self.clear();
			return Ok(());
		}
		let engine = Arc::clone(&self.engine);
		let change = ConfigurationChange::ClearTree { key: key.into() };
		self.update(Some(key), change, |root| {
			for_each_match(engine.as_ref(), root, key, |tree, position| match position {
				QueryResult::Node(node) => replace_in(tree, node, None),
				QueryResult::Attribute { parent, name } => {
					replace_in(tree, parent, Some(parent.with_attribute(name, None)))
				}
			})
		})
	}

	fn clear(&self) {
		self.fire(&ConfigurationEvent::before(ConfigurationChange::Clear));
		{
			let mut root = self.root.write();
			let emptied = ConfigNode::new(root.name());
			*root = emptied;
		}
		self.fire(&ConfigurationEvent::after(ConfigurationChange::Clear));
	}

	fn expression_engine(&self) -> Arc<dyn ExpressionEngine> {
		Arc::clone(&self.engine)
	}

	fn conversion_handler(&self) -> Arc<dyn ConversionHandler> {
		Arc::clone(&self.conversion)
	}

	fn add_event_listener(&self, listener: Arc<dyn ConfigurationListener>) -> ListenerId {
		let id = ListenerId::next();
		self.listeners.write().push((id, listener));
		debug!("Configuration listener {} registered", id);
		id
	}

	fn remove_event_listener(&self, id: ListenerId) -> bool {
		let mut listeners = self.listeners.write();
		let before = listeners.len();
		listeners.retain(|(lid, _)| *lid != id);
		listeners.len() != before
	}
}

// vim: ts=4
