//! Synchronization handler.
//!
//! [`PreferencesHandler`] owns the two live references (base preference node
//! and configuration tree), runs the bulk transfers and applies change events
//! of one side to the other.
//!
//! The references are kept behind a lock only for memory safety: the lock is
//! never held while calling into a store, and switching references while
//! events are flowing is not serialized against those events.

use parking_lot::RwLock;
use std::sync::{Arc, Weak};

use crate::Value;
use crate::config_adapter::{ConfigurationChange, ConfigurationEvent, EventPhase};
use crate::coordination::EventCoordinationStrategy;
use crate::listener::EventListenerManager;
use crate::mapper::{Mapper, existing_descendant};
use crate::preferences_adapter::{NodeChangeEvent, PreferenceChangeEvent};
use crate::prelude::*;
use crate::settings::{MapperKind, SyncConfig};

type References = (PrefNode, Arc<dyn ConfigurationTree>);

#[derive(Default)]
struct HandlerState {
	base_node: Option<PrefNode>,
	content: Option<Arc<dyn ConfigurationTree>>,
	auto_load: bool,
	auto_save: bool,
}

impl HandlerState {
	fn references(&self) -> Option<References> {
		Some((self.base_node.clone()?, Arc::clone(self.content.as_ref()?)))
	}
}

pub struct PreferencesHandler {
	mapper: Mapper,
	coordinator: EventCoordinationStrategy,
	listeners: EventListenerManager,
	state: RwLock<HandlerState>,
}

impl std::fmt::Debug for PreferencesHandler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.state.read();
		f.debug_struct("PreferencesHandler")
			.field("mapper", &self.mapper)
			.field("base_node", &state.base_node)
			.field("auto_load", &state.auto_load)
			.field("auto_save", &state.auto_save)
			.finish_non_exhaustive()
	}
}

impl Drop for PreferencesHandler {
	fn drop(&mut self) {
		self.listeners.remove_all();
	}
}

impl PreferencesHandler {
	/// Handler without references, both auto flags off
	pub fn new(mapper: Mapper) -> Arc<Self> {
		Arc::new_cyclic(|me: &Weak<Self>| Self {
			mapper,
			coordinator: EventCoordinationStrategy::new(),
			listeners: EventListenerManager::new(me.clone()),
			state: RwLock::new(HandlerState::default()),
		})
	}

	pub fn builder() -> PreferencesHandlerBuilder {
		PreferencesHandlerBuilder::new()
	}

	pub fn mapper(&self) -> Mapper {
		self.mapper
	}

	pub fn coordinator(&self) -> &EventCoordinationStrategy {
		&self.coordinator
	}

	pub fn listener_manager(&self) -> &EventListenerManager {
		&self.listeners
	}

	pub fn base_node(&self) -> Option<PrefNode> {
		self.state.read().base_node.clone()
	}

	pub fn content(&self) -> Option<Arc<dyn ConfigurationTree>> {
		self.state.read().content.clone()
	}

	pub fn is_auto_load(&self) -> bool {
		self.state.read().auto_load
	}

	pub fn is_auto_save(&self) -> bool {
		self.state.read().auto_save
	}

	/// Switch the base node. With `auto_load` on, listeners move along.
	pub fn set_base_node(&self, node: Option<PrefNode>) -> PsResult<()> {
		let auto_load = {
			let mut state = self.state.write();
			state.base_node.clone_from(&node);
			state.auto_load
		};
		if auto_load {
			self.listeners.remove_preferences_listeners();
			if let Some(node) = node {
				self.listeners.install_preferences_listeners(&node)?;
			}
		}
		Ok(())
	}

	/// Switch the configuration. With `auto_save` on, the listener moves along.
	pub fn set_content(&self, content: Option<Arc<dyn ConfigurationTree>>) {
		let auto_save = {
			let mut state = self.state.write();
			state.content.clone_from(&content);
			state.auto_save
		};
		if auto_save {
			self.listeners.remove_configuration_listener();
			if let Some(content) = content {
				self.listeners.install_configuration_listener(&content);
			}
		}
	}

	/// Mirror preference store changes into the configuration as they happen
	pub fn set_auto_load(&self, auto_load: bool) -> PsResult<()> {
		let base_node = {
			let mut state = self.state.write();
			if state.auto_load == auto_load {
				return Ok(());
			}
			state.auto_load = auto_load;
			state.base_node.clone()
		};
		match base_node {
			Some(node) if auto_load => self.listeners.install_preferences_listeners(&node)?,
			_ => self.listeners.remove_preferences_listeners(),
		}
		Ok(())
	}

	/// Write configuration changes into the preference store as they happen
	pub fn set_auto_save(&self, auto_save: bool) {
		let content = {
			let mut state = self.state.write();
			if state.auto_save == auto_save {
				return;
			}
			state.auto_save = auto_save;
			state.content.clone()
		};
		match content {
			Some(content) if auto_save => self.listeners.install_configuration_listener(&content),
			_ => self.listeners.remove_configuration_listener(),
		}
	}

	fn references(&self) -> PsResult<References> {
		let state = self.state.read();
		match (&state.base_node, &state.content) {
			(None, _) => Err(Error::runtime("no base preference node set")),
			(_, None) => Err(Error::runtime("no configuration set")),
			_ => state.references().ok_or_else(|| Error::runtime("references unavailable")),
		}
	}

	/// Replace the mirrored part of the configuration with the store content.
	/// Top-level configuration nodes without a store counterpart are kept.
	pub fn load(&self) -> PsResult<()> {
		let (base, content) = self.references()?;
		info!("Loading configuration from preference node {}", base);
		self.coordinator.prevent_events(|| self.load_into(&base, content.as_ref()))
	}

	/// Like [`load`](Self::load), but empties the configuration first
	pub fn refresh(&self) -> PsResult<()> {
		let (base, content) = self.references()?;
		info!("Refreshing configuration from preference node {}", base);
		self.coordinator.prevent_events(|| {
			content.clear();
			self.load_into(&base, content.as_ref())
		})
	}

	fn load_into(&self, base: &PrefNode, content: &dyn ConfigurationTree) -> PsResult<()> {
		base.sync()?;
		let tree = self.mapper.load_node_hierarchy(base, None)?.with_value(None);
		debug!("Loaded {} nodes from {}", tree.node_count(), base);
		content.load(tree)
	}

	/// Write the whole configuration into the store and flush it
	pub fn save(&self) -> PsResult<()> {
		let (base, content) = self.references()?;
		info!("Saving configuration to preference node {}", base);
		self.coordinator.prevent_events(|| {
			base.sync()?;
			self.mapper.save_node_hierarchy(&content.root(), &base)?;
			base.flush()?;
			Ok(())
		})
	}

	/// References for incremental handling, if the flag selected by `enabled`
	/// is on
	fn live_references(&self, enabled: impl Fn(&HandlerState) -> bool) -> Option<References> {
		let state = self.state.read();
		if enabled(&state) { state.references() } else { None }
	}

	// Preference store -> configuration

	pub fn preference_changed(&self, event: &PreferenceChangeEvent) {
		self.coordinator.handle_preferences_event(event, |event| {
			let Some((base, content)) = self.live_references(|s| s.auto_load) else { return };
			if !base.is_ancestor_of(&event.node) {
				return;
			}
			let result = self.coordinator.prevent_configuration_events(|| {
				self.apply_preference_change(&base, content.as_ref(), event)
			});
			if let Err(err) = result {
				warn!("Could not apply change of {} {}: {}", event.node, event.key, err);
			}
		});
	}

	fn apply_preference_change(
		&self,
		base: &PrefNode,
		content: &dyn ConfigurationTree,
		event: &PreferenceChangeEvent,
	) -> PsResult<()> {
		let key = self.mapper.resolve_property_key(content, base, &event.node, &event.key)?;
		debug!("Preference {} {} changed -> {}", event.node, event.key, key);
		match &event.new_value {
			Some(value) => content.set_property(&key, Value::String(value.to_string())),
			// A node-based leaf disappears with its raw key
			None if self.mapper == Mapper::NodeBased
				&& self.mapper.is_attribute(&event.node, &event.key)? =>
			{
				content.clear_tree(&key)
			}
			None => content.clear_property(&key),
		}
	}

	pub fn child_added(&self, event: &NodeChangeEvent) {
		self.coordinator.handle_preferences_event(event, |event| {
			let Some((base, content)) = self.live_references(|s| s.auto_load) else { return };
			if !base.is_ancestor_of(event.child()) || *event.child() == base {
				return;
			}
			let result = self.coordinator.prevent_configuration_events(|| {
				let parent_key = self.mapper.resolve_node_key(content.as_ref(), &base, event.parent())?;
				let subtree = self.mapper.load_node_hierarchy(event.child(), None)?;
				debug!("Preference node {} added below '{}'", event.child(), parent_key);
				content.add_nodes(&parent_key, vec![subtree])
			});
			if let Err(err) = result {
				warn!("Could not mirror added node {}: {}", event.child(), err);
			}
		});
	}

	pub fn child_removed(&self, event: &NodeChangeEvent) {
		self.coordinator.handle_preferences_event(event, |event| {
			let Some((base, content)) = self.live_references(|s| s.auto_load) else { return };
			if !base.is_ancestor_of(event.child()) || *event.child() == base {
				return;
			}
			let result = self.coordinator.prevent_configuration_events(|| {
				// The child is gone, so its key is derived from its parent
				let parent_key = self.mapper.resolve_node_key(content.as_ref(), &base, event.parent())?;
				let placeholder = self.mapper.create_node_for_name(event.child().name());
				let key = content.expression_engine().node_key(&placeholder, &parent_key);
				debug!("Preference node {} removed -> '{}'", event.child(), key);
				content.clear_tree(&key)?;
				// A raw key of the same name is no longer the child's value
				if self.mapper == Mapper::NodeBased
					&& let Some(value) = self.mapper.leaf_value(event.parent(), event.child().name())?
				{
					content.set_property(&key, Value::String(value))?;
				}
				Ok::<_, Error>(())
			});
			if let Err(err) = result {
				warn!("Could not mirror removed node {}: {}", event.child(), err);
			}
		});
	}

	// Configuration -> preference store

	pub fn configuration_changed(&self, event: &ConfigurationEvent) {
		self.coordinator.handle_configuration_event(event, |event| {
			let Some((base, content)) = self.live_references(|s| s.auto_save) else { return };
			let result = self.coordinator.prevent_preferences_events(|| {
				let applied = self.apply_configuration_change(&base, content.as_ref(), event)?;
				if applied {
					base.flush()?;
				}
				Ok::<_, Error>(())
			});
			if let Err(err) = result {
				warn!("Could not write configuration change {:?}: {}", event.key(), err);
			}
		});
	}

	/// Returns whether the event was one to act on
	fn apply_configuration_change(
		&self,
		base: &PrefNode,
		content: &dyn ConfigurationTree,
		event: &ConfigurationEvent,
	) -> PsResult<bool> {
		match (&event.change, event.phase) {
			(
				ConfigurationChange::AddProperty { key, value }
				| ConfigurationChange::SetProperty { key, value },
				EventPhase::After,
			) => self.write_property(base, content, key, value),
			(ConfigurationChange::AddNodes { key, nodes }, EventPhase::After) => {
				self.write_nodes(base, content, key, nodes)
			}
			(ConfigurationChange::ClearProperty { key }, EventPhase::Before) => {
				self.clear_native_property(base, content, key)
			}
			(ConfigurationChange::ClearTree { key }, EventPhase::Before) if key.is_empty() => {
				clear_native(base)
			}
			(ConfigurationChange::ClearTree { key }, EventPhase::Before) => {
				self.clear_native_tree(base, content, key)
			}
			(ConfigurationChange::Clear, EventPhase::Before) => clear_native(base),
			_ => return Ok(false),
		}?;
		Ok(true)
	}

	fn write_property(
		&self,
		base: &PrefNode,
		content: &dyn ConfigurationTree,
		key: &str,
		value: &Value,
	) -> PsResult<()> {
		let data = self.mapper.get_property_data(content, key)?;
		let value = self.mapper.convert_value(content, Some(value));
		let node = base.descendant(&data.path)?;
		debug!("Configuration {} set -> {} {}", key, node, data.leaf_name);
		if data.is_attribute {
			match value {
				Some(value) => node.put(&data.leaf_name, &value)?,
				None => node.remove(&data.leaf_name)?,
			}
			Ok(())
		} else {
			self.mapper.set_leaf_value(&node, &data.leaf_name, value.as_deref())
		}
	}

	fn write_nodes(
		&self,
		base: &PrefNode,
		content: &dyn ConfigurationTree,
		key: &str,
		nodes: &[ConfigNode],
	) -> PsResult<()> {
		let target = if key.is_empty() {
			base.clone()
		} else {
			let data = self.mapper.get_property_data(content, key)?;
			if data.is_attribute {
				return Err(Error::runtime(format!("nodes cannot be added to attribute {}", key)));
			}
			base.descendant(&data.node_path())?
		};
		for node in nodes {
			self.mapper.add_node_hierarchy(&target, node)?;
		}
		Ok(())
	}

	fn clear_native_property(
		&self,
		base: &PrefNode,
		content: &dyn ConfigurationTree,
		key: &str,
	) -> PsResult<()> {
		let data = self.mapper.get_property_data(content, key)?;
		let Some(node) = existing_descendant(base, &data.path)? else {
			return Ok(());
		};
		if data.is_attribute {
			node.remove(&data.leaf_name)?;
			Ok(())
		} else {
			self.mapper.set_leaf_value(&node, &data.leaf_name, None)
		}
	}

	fn clear_native_tree(
		&self,
		base: &PrefNode,
		content: &dyn ConfigurationTree,
		key: &str,
	) -> PsResult<()> {
		let data = self.mapper.get_property_data(content, key)?;
		let Some(node) = existing_descendant(base, &data.path)? else {
			return Ok(());
		};
		if data.is_attribute {
			node.remove(&data.leaf_name)?;
			return Ok(());
		}
		if node.child_exists(&data.leaf_name)? {
			node.child_handle(&data.leaf_name)?.remove_node()?;
		}
		if self.mapper == Mapper::NodeBased {
			node.remove(&data.leaf_name)?;
		}
		Ok(())
	}
}

/// Remove every child and raw key of `base`
fn clear_native(base: &PrefNode) -> PsResult<()> {
	for name in base.child_names()? {
		base.child_handle(&name)?.remove_node()?;
	}
	for key in base.keys()? {
		base.remove(&key)?;
	}
	Ok(())
}

/// Fluent construction of a [`PreferencesHandler`]
#[derive(Default)]
pub struct PreferencesHandlerBuilder {
	config: SyncConfig,
	base_node: Option<PrefNode>,
	content: Option<Arc<dyn ConfigurationTree>>,
}

impl PreferencesHandlerBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn config(mut self, config: SyncConfig) -> Self {
		self.config = config;
		self
	}

	pub fn mapper(mut self, mapper: MapperKind) -> Self {
		self.config.mapper = mapper;
		self
	}

	pub fn auto_load(mut self, auto_load: bool) -> Self {
		self.config.auto_load = auto_load;
		self
	}

	pub fn auto_save(mut self, auto_save: bool) -> Self {
		self.config.auto_save = auto_save;
		self
	}

	pub fn base_node(mut self, node: PrefNode) -> Self {
		self.base_node = Some(node);
		self
	}

	pub fn content(mut self, content: Arc<dyn ConfigurationTree>) -> Self {
		self.content = Some(content);
		self
	}

	/// Build the handler and install listeners for the enabled auto flags.
	/// No data is transferred; call [`PreferencesHandler::load`] for that.
	pub fn build(self) -> PsResult<Arc<PreferencesHandler>> {
		let handler = PreferencesHandler::new(Mapper::from(self.config.mapper));
		handler.set_content(self.content);
		handler.set_base_node(self.base_node)?;
		handler.set_auto_save(self.config.auto_save);
		handler.set_auto_load(self.config.auto_load)?;
		Ok(handler)
	}
}

// vim: ts=4
