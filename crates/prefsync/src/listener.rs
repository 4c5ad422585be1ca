//! Listener registration on both sides.
//!
//! Preference store listeners are per node, so the manager registers on the
//! base node and on every descendant, follows nodes being added below the
//! base node and forgets nodes being removed. The configuration tree takes a
//! single listener.
//!
//! Listeners only hold a weak reference to the handler; dropping the handler
//! unregisters everything.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::config_adapter::{ConfigurationEvent, ConfigurationListener};
use crate::handler::PreferencesHandler;
use crate::preferences_adapter::{
	NodeChangeEvent, NodeChangeListener, PreferenceChangeEvent, PreferenceChangeListener,
	PreferencesAdapter, PrefsError, in_subtree,
};
use crate::prelude::*;
use crate::types::ListenerId;

/// Forwards preference store events to the handler
struct NativeListener {
	handler: Weak<PreferencesHandler>,
}

impl PreferenceChangeListener for NativeListener {
	fn preference_change(&self, event: &PreferenceChangeEvent) {
		if let Some(handler) = self.handler.upgrade() {
			handler.preference_changed(event);
		}
	}
}

impl NodeChangeListener for NativeListener {
	fn child_added(&self, event: &NodeChangeEvent) {
		if let Some(handler) = self.handler.upgrade() {
			// New nodes need listeners even when the event itself is suppressed
			handler.listener_manager().track_added(event.child());
			handler.child_added(event);
		}
	}

	fn child_removed(&self, event: &NodeChangeEvent) {
		if let Some(handler) = self.handler.upgrade() {
			handler.listener_manager().track_removed(event.child());
			handler.child_removed(event);
		}
	}
}

/// Forwards configuration events to the handler
struct ConfigListener {
	handler: Weak<PreferencesHandler>,
}

impl ConfigurationListener for ConfigListener {
	fn configuration_changed(&self, event: &ConfigurationEvent) {
		if let Some(handler) = self.handler.upgrade() {
			handler.configuration_changed(event);
		}
	}
}

#[derive(Default)]
struct NativeRegistrations {
	base: Option<PrefNode>,
	listener: Option<Arc<NativeListener>>,
	/// path -> (preference listener, node listener)
	nodes: HashMap<Box<str>, (ListenerId, ListenerId)>,
}

struct ConfigRegistration {
	content: Arc<dyn ConfigurationTree>,
	id: ListenerId,
}

pub struct EventListenerManager {
	handler: Weak<PreferencesHandler>,
	native: Mutex<NativeRegistrations>,
	configuration: Mutex<Option<ConfigRegistration>>,
}

impl std::fmt::Debug for EventListenerManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EventListenerManager")
			.field("native_nodes", &self.registered_node_count())
			.field("configuration", &self.has_configuration_listener())
			.finish()
	}
}

impl EventListenerManager {
	pub fn new(handler: Weak<PreferencesHandler>) -> Self {
		Self {
			handler,
			native: Mutex::new(NativeRegistrations::default()),
			configuration: Mutex::new(None),
		}
	}

	/// Register on `base` and all its descendants, replacing any previous
	/// registration.
	pub fn install_preferences_listeners(&self, base: &PrefNode) -> PsResult<()> {
		self.remove_preferences_listeners();

		let mut native = self.native.lock();
		let listener = Arc::new(NativeListener { handler: self.handler.clone() });
		native.base = Some(base.clone());
		native.listener = Some(Arc::clone(&listener));
		let count = register_subtree(&mut native.nodes, base, &listener)?;
		debug!("Installed preference listeners on {} nodes below {}", count, base);
		Ok(())
	}

	/// Unregister from every node. Nodes already removed are skipped.
	pub fn remove_preferences_listeners(&self) {
		let (base, nodes) = {
			let mut native = self.native.lock();
			native.listener = None;
			(native.base.take(), std::mem::take(&mut native.nodes))
		};
		let Some(base) = base else { return };

		let store: &Arc<dyn PreferencesAdapter> = base.store();
		for (path, (pref_id, node_id)) in &nodes {
			let _ = store.remove_preference_change_listener(path, *pref_id);
			let _ = store.remove_node_change_listener(path, *node_id);
		}
		debug!("Removed preference listeners from {} nodes below {}", nodes.len(), base);
	}

	/// A node was added below a registered node
	pub fn track_added(&self, child: &PrefNode) {
		let mut native = self.native.lock();
		let (Some(base), Some(listener)) = (native.base.clone(), native.listener.clone()) else {
			return;
		};
		if !base.is_ancestor_of(child) {
			return;
		}
		match register_subtree(&mut native.nodes, child, &listener) {
			Ok(count) => debug!("Installed preference listeners on {} new nodes below {}", count, child),
			Err(err) => debug!("Could not follow new node {}: {}", child, err),
		}
	}

	/// A registered node was removed; the store dropped its listeners
	pub fn track_removed(&self, child: &PrefNode) {
		let mut native = self.native.lock();
		native.nodes.retain(|path, _| !in_subtree(path, child.path()));
	}

	pub fn install_configuration_listener(&self, content: &Arc<dyn ConfigurationTree>) {
		self.remove_configuration_listener();
		let listener = Arc::new(ConfigListener { handler: self.handler.clone() });
		let id = content.add_event_listener(listener);
		*self.configuration.lock() = Some(ConfigRegistration { content: Arc::clone(content), id });
		debug!("Installed configuration listener {}", id);
	}

	pub fn remove_configuration_listener(&self) {
		let registration = self.configuration.lock().take();
		if let Some(ConfigRegistration { content, id }) = registration {
			content.remove_event_listener(id);
			debug!("Removed configuration listener {}", id);
		}
	}

	pub fn remove_all(&self) {
		self.remove_preferences_listeners();
		self.remove_configuration_listener();
	}

	pub fn registered_node_count(&self) -> usize {
		self.native.lock().nodes.len()
	}

	pub fn is_registered(&self, node: &PrefNode) -> bool {
		self.native.lock().nodes.contains_key(node.path())
	}

	pub fn has_configuration_listener(&self) -> bool {
		self.configuration.lock().is_some()
	}
}

/// Register `listener` on `start` and its descendants. A descendant removed
/// while walking is skipped; failing on `start` itself is an error.
fn register_subtree(
	nodes: &mut HashMap<Box<str>, (ListenerId, ListenerId)>,
	start: &PrefNode,
	listener: &Arc<NativeListener>,
) -> PsResult<usize> {
	let mut count = 0;
	let mut stack = vec![start.clone()];
	while let Some(node) = stack.pop() {
		match register_node(nodes, &node, listener) {
			Ok(children) => {
				count += 1;
				stack.extend(children);
			}
			Err(PrefsError::NodeRemoved(_)) if node != *start => continue,
			Err(err) => return Err(err.into()),
		}
	}
	Ok(count)
}

fn register_node(
	nodes: &mut HashMap<Box<str>, (ListenerId, ListenerId)>,
	node: &PrefNode,
	listener: &Arc<NativeListener>,
) -> Result<Vec<PrefNode>, PrefsError> {
	let store = node.store();
	if !nodes.contains_key(node.path()) {
		let pref_id = store.add_preference_change_listener(node.path(), listener.clone())?;
		let node_id = match store.add_node_change_listener(node.path(), listener.clone()) {
			Ok(id) => id,
			Err(err) => {
				let _ = store.remove_preference_change_listener(node.path(), pref_id);
				return Err(err);
			}
		};
		nodes.insert(node.path().into(), (pref_id, node_id));
	}
	node.child_names()?.iter().map(|name| node.child_handle(name)).collect()
}

// vim: ts=4
