//! In-memory preference store with an optional JSON backing file.

#![forbid(unsafe_code)]

pub mod storage;

use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

use prefsync::preferences_adapter::{
	NodeChangeEvent, NodeChangeListener, PrefNode, PreferenceChangeEvent, PreferenceChangeListener,
	PreferencesAdapter, PrefsError, PrefsResult, ROOT_PATH, check_node_name, child_path,
	in_subtree, parent_path,
};
use prefsync::types::ListenerId;

use storage::StoredNode;

/// Adapter configuration options
#[derive(Debug, Clone)]
pub struct MemoryPreferencesConfig {
	/// Maximum length of a raw key
	pub max_key_length: usize,

	/// Maximum length of a raw value
	pub max_value_length: usize,

	/// Maximum length of a node name
	pub max_name_length: usize,

	/// JSON file written by `flush` and read by `sync` (and on open)
	pub backing_file: Option<PathBuf>,
}

impl Default for MemoryPreferencesConfig {
	fn default() -> Self {
		Self { max_key_length: 80, max_value_length: 8 * 1024, max_name_length: 80, backing_file: None }
	}
}

/// Operation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefsStats {
	/// Effective `put`s (value actually changed)
	pub puts: u64,
	/// Effective `remove`s (key actually existed)
	pub removes: u64,
	pub nodes_created: u64,
	pub nodes_removed: u64,
	pub flushes: u64,
	pub syncs: u64,
}

#[derive(Debug, Default)]
struct Counters {
	puts: AtomicU64,
	removes: AtomicU64,
	nodes_created: AtomicU64,
	nodes_removed: AtomicU64,
	flushes: AtomicU64,
	syncs: AtomicU64,
}

#[derive(Debug, Clone, Default)]
struct NodeData {
	keys: BTreeMap<Box<str>, Box<str>>,
	children: BTreeSet<Box<str>>,
}

type NodeMap = BTreeMap<Box<str>, NodeData>;
type PrefListeners = Vec<(ListenerId, Arc<dyn PreferenceChangeListener>)>;
type NodeListeners = Vec<(ListenerId, Arc<dyn NodeChangeListener>)>;

#[derive(Default)]
struct Listeners {
	prefs: HashMap<Box<str>, PrefListeners>,
	nodes: HashMap<Box<str>, NodeListeners>,
}

/// Event collected under the store lock and dispatched after releasing it
enum Pending {
	Pref { path: Box<str>, key: Box<str>, new_value: Option<Box<str>> },
	Added { parent: Box<str>, child: Box<str> },
	Removed { parent: Box<str>, child: Box<str> },
}

fn export_node(nodes: &NodeMap, path: &str) -> StoredNode {
	let mut stored = StoredNode::default();
	if let Some(data) = nodes.get(path) {
		for (key, value) in &data.keys {
			stored.keys.insert(key.to_string(), value.to_string());
		}
		for name in &data.children {
			stored.children.insert(name.to_string(), export_node(nodes, &child_path(path, name)));
		}
	}
	stored
}

fn import_node(nodes: &mut NodeMap, path: &str, stored: &StoredNode) {
	let data = NodeData {
		keys: stored.keys.iter().map(|(k, v)| (Box::from(k.as_str()), Box::from(v.as_str()))).collect(),
		children: stored.children.keys().map(|name| Box::from(name.as_str())).collect(),
	};
	nodes.insert(path.into(), data);
	for (name, child) in &stored.children {
		import_node(nodes, &child_path(path, name), child);
	}
}

/// In-memory implementation of PreferencesAdapter.
///
/// Nodes live in one flat map keyed by absolute path. Listeners are called
/// synchronously on the calling thread once the store lock is released, so a
/// listener may call back into the store.
pub struct MemoryPreferences {
	me: Weak<MemoryPreferences>,
	config: MemoryPreferencesConfig,
	nodes: RwLock<NodeMap>,
	listeners: RwLock<Listeners>,
	counters: Counters,
}

impl std::fmt::Debug for MemoryPreferences {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MemoryPreferences")
			.field("config", &self.config)
			.field("nodes", &self.nodes.read().len())
			.finish_non_exhaustive()
	}
}

impl MemoryPreferences {
	/// Create an empty store holding only the root node.
	pub fn new(config: MemoryPreferencesConfig) -> Arc<Self> {
		let mut nodes = BTreeMap::new();
		nodes.insert(Box::from(ROOT_PATH), NodeData::default());

		Arc::new_cyclic(|me| Self {
			me: me.clone(),
			config,
			nodes: RwLock::new(nodes),
			listeners: RwLock::new(Listeners::default()),
			counters: Counters::default(),
		})
	}

	/// Create a store and populate it from the configured backing file.
	pub fn open(config: MemoryPreferencesConfig) -> PrefsResult<Arc<Self>> {
		let backing = config.backing_file.clone();
		let store = Self::new(config);
		if let Some(path) = backing {
			let root = storage::read_file(&path)?;
			store.replace_subtree(ROOT_PATH, &root);
			info!("Loaded preferences from {:?}", path);
		}
		Ok(store)
	}

	/// Root node handle
	pub fn root_node(self: &Arc<Self>) -> PrefNode {
		PrefNode::root(Arc::clone(self) as Arc<dyn PreferencesAdapter>)
	}

	/// Node handle for an absolute path, creating the node if missing
	pub fn node(self: &Arc<Self>, path: &str) -> PrefsResult<PrefNode> {
		let node = PrefNode::new(Arc::clone(self) as Arc<dyn PreferencesAdapter>, path)?;
		self.create_node(path)?;
		Ok(node)
	}

	pub fn config(&self) -> &MemoryPreferencesConfig {
		&self.config
	}

	pub fn stats(&self) -> PrefsStats {
		PrefsStats {
			puts: self.counters.puts.load(Ordering::Relaxed),
			removes: self.counters.removes.load(Ordering::Relaxed),
			nodes_created: self.counters.nodes_created.load(Ordering::Relaxed),
			nodes_removed: self.counters.nodes_removed.load(Ordering::Relaxed),
			flushes: self.counters.flushes.load(Ordering::Relaxed),
			syncs: self.counters.syncs.load(Ordering::Relaxed),
		}
	}

	/// Number of listeners registered on a node (both kinds)
	pub fn listener_count(&self, path: &str) -> usize {
		let listeners = self.listeners.read();
		listeners.prefs.get(path).map_or(0, Vec::len) + listeners.nodes.get(path).map_or(0, Vec::len)
	}

	/// Total number of registered listeners
	pub fn total_listener_count(&self) -> usize {
		let listeners = self.listeners.read();
		listeners.prefs.values().map(Vec::len).sum::<usize>()
			+ listeners.nodes.values().map(Vec::len).sum::<usize>()
	}

	/// Snapshot of the whole store in backing-file form
	pub fn export(&self) -> StoredNode {
		export_node(&self.nodes.read(), ROOT_PATH)
	}

	fn handle(&self, path: &str) -> Option<PrefNode> {
		let store: Arc<dyn PreferencesAdapter> = self.me.upgrade()?;
		PrefNode::new(store, path).ok()
	}

	fn check_key(&self, key: &str) -> PrefsResult<()> {
		if key.len() > self.config.max_key_length {
			return Err(PrefsError::IllegalArgument(format!(
				"key too long ({} > {})",
				key.len(),
				self.config.max_key_length
			)));
		}
		if key.contains('\0') {
			return Err(PrefsError::IllegalArgument("key contains NUL".into()));
		}
		Ok(())
	}

	fn check_value(&self, value: &str) -> PrefsResult<()> {
		if value.len() > self.config.max_value_length {
			return Err(PrefsError::IllegalArgument(format!(
				"value too long ({} > {})",
				value.len(),
				self.config.max_value_length
			)));
		}
		if value.contains('\0') {
			return Err(PrefsError::IllegalArgument("value contains NUL".into()));
		}
		Ok(())
	}

	fn check_path(&self, path: &str) -> PrefsResult<()> {
		if !path.starts_with('/') {
			return Err(PrefsError::IllegalArgument(format!("relative node path: {}", path)));
		}
		if path == ROOT_PATH {
			return Ok(());
		}
		for name in path[1..].split('/') {
			check_node_name(name)?;
			if name.len() > self.config.max_name_length {
				return Err(PrefsError::IllegalArgument(format!("node name too long: {}", name)));
			}
		}
		Ok(())
	}

	/// Replace the data of `path` and everything below it with `stored`.
	/// No events are fired.
	fn replace_subtree(&self, path: &str, stored: &StoredNode) {
		let mut nodes = self.nodes.write();
		nodes.retain(|p, _| !in_subtree(p, path));
		import_node(&mut nodes, path, stored);
	}

	fn with_node<T>(&self, path: &str, f: impl FnOnce(&NodeData) -> T) -> PrefsResult<T> {
		let nodes = self.nodes.read();
		match nodes.get(path) {
			Some(data) => Ok(f(data)),
			None => Err(PrefsError::NodeRemoved(path.into())),
		}
	}

	fn dispatch(&self, pending: Vec<Pending>) {
		for event in pending {
			match event {
				Pending::Pref { path, key, new_value } => {
					let targets: PrefListeners =
						self.listeners.read().prefs.get(&path).cloned().unwrap_or_default();
					if targets.is_empty() {
						continue;
					}
					let Some(node) = self.handle(&path) else { continue };
					let event = PreferenceChangeEvent { node, key, new_value };
					for (_, listener) in targets {
						listener.preference_change(&event);
					}
				}
				Pending::Added { parent, child } => {
					let targets: NodeListeners =
						self.listeners.read().nodes.get(&parent).cloned().unwrap_or_default();
					if targets.is_empty() {
						continue;
					}
					let (Some(parent), Some(child)) = (self.handle(&parent), self.handle(&child))
					else {
						continue;
					};
					let event = NodeChangeEvent::ChildAdded { parent, child };
					for (_, listener) in targets {
						listener.child_added(&event);
					}
				}
				Pending::Removed { parent, child } => {
					let targets: NodeListeners =
						self.listeners.read().nodes.get(&parent).cloned().unwrap_or_default();
					if targets.is_empty() {
						continue;
					}
					let (Some(parent), Some(child)) = (self.handle(&parent), self.handle(&child))
					else {
						continue;
					};
					let event = NodeChangeEvent::ChildRemoved { parent, child };
					for (_, listener) in targets {
						listener.child_removed(&event);
					}
				}
			}
		}
	}
}

impl PreferencesAdapter for MemoryPreferences {
	fn node_exists(&self, path: &str) -> PrefsResult<bool> {
		Ok(self.nodes.read().contains_key(path))
	}

	fn create_node(&self, path: &str) -> PrefsResult<()> {
		self.check_path(path)?;

		let mut pending = Vec::new();
		{
			let mut nodes = self.nodes.write();
			if nodes.contains_key(path) {
				return Ok(());
			}
			let mut current = String::from(ROOT_PATH);
			for name in path[1..].split('/') {
				let next = child_path(&current, name);
				if !nodes.contains_key(next.as_str()) {
					if let Some(parent) = nodes.get_mut(current.as_str()) {
						parent.children.insert(name.into());
					}
					nodes.insert(next.as_str().into(), NodeData::default());
					self.counters.nodes_created.fetch_add(1, Ordering::Relaxed);
					debug!("Created preference node {}", next);
					pending.push(Pending::Added {
						parent: current.as_str().into(),
						child: next.as_str().into(),
					});
				}
				current = next;
			}
		}
		self.dispatch(pending);
		Ok(())
	}

	fn keys(&self, path: &str) -> PrefsResult<Vec<Box<str>>> {
		self.with_node(path, |data| data.keys.keys().cloned().collect())
	}

	fn get(&self, path: &str, key: &str) -> PrefsResult<Option<Box<str>>> {
		self.with_node(path, |data| data.keys.get(key).cloned())
	}

	fn put(&self, path: &str, key: &str, value: &str) -> PrefsResult<()> {
		self.check_key(key)?;
		self.check_value(value)?;

		{
			let mut nodes = self.nodes.write();
			let data = nodes.get_mut(path).ok_or_else(|| PrefsError::NodeRemoved(path.into()))?;
			if data.keys.get(key).is_some_and(|old| &**old == value) {
				return Ok(());
			}
			data.keys.insert(key.into(), value.into());
		}
		self.counters.puts.fetch_add(1, Ordering::Relaxed);
		debug!("put {} {}={}", path, key, value);
		self.dispatch(vec![Pending::Pref {
			path: path.into(),
			key: key.into(),
			new_value: Some(value.into()),
		}]);
		Ok(())
	}

	fn remove(&self, path: &str, key: &str) -> PrefsResult<()> {
		{
			let mut nodes = self.nodes.write();
			let data = nodes.get_mut(path).ok_or_else(|| PrefsError::NodeRemoved(path.into()))?;
			if data.keys.remove(key).is_none() {
				return Ok(());
			}
		}
		self.counters.removes.fetch_add(1, Ordering::Relaxed);
		debug!("remove {} {}", path, key);
		self.dispatch(vec![Pending::Pref { path: path.into(), key: key.into(), new_value: None }]);
		Ok(())
	}

	fn child_names(&self, path: &str) -> PrefsResult<Vec<Box<str>>> {
		self.with_node(path, |data| data.children.iter().cloned().collect())
	}

	fn remove_node(&self, path: &str) -> PrefsResult<()> {
		let Some(parent) = parent_path(path) else {
			return Err(PrefsError::IllegalArgument("the root node cannot be removed".into()));
		};

		{
			let mut nodes = self.nodes.write();
			if !nodes.contains_key(path) {
				return Err(PrefsError::NodeRemoved(path.into()));
			}
			nodes.retain(|p, _| !in_subtree(p, path));
			if let Some(parent_data) = nodes.get_mut(parent) {
				let name = &path[path.rfind('/').map_or(0, |pos| pos + 1)..];
				parent_data.children.remove(name);
			}
		}
		{
			let mut listeners = self.listeners.write();
			listeners.prefs.retain(|p, _| !in_subtree(p, path));
			listeners.nodes.retain(|p, _| !in_subtree(p, path));
		}
		self.counters.nodes_removed.fetch_add(1, Ordering::Relaxed);
		debug!("Removed preference node {}", path);

		self.dispatch(vec![Pending::Removed { parent: parent.into(), child: path.into() }]);
		Ok(())
	}

	fn sync(&self, path: &str) -> PrefsResult<()> {
		if !self.node_exists(path)? {
			return Err(PrefsError::NodeRemoved(path.into()));
		}
		self.counters.syncs.fetch_add(1, Ordering::Relaxed);
		let Some(file) = &self.config.backing_file else {
			return Ok(());
		};
		let root = storage::read_file(file)?;
		if let Some(stored) = root.find(path) {
			self.replace_subtree(path, stored);
			debug!("Synced preference subtree {} from {:?}", path, file);
		}
		Ok(())
	}

	fn flush(&self, path: &str) -> PrefsResult<()> {
		if !self.node_exists(path)? {
			return Err(PrefsError::NodeRemoved(path.into()));
		}
		self.counters.flushes.fetch_add(1, Ordering::Relaxed);
		let Some(file) = &self.config.backing_file else {
			return Ok(());
		};
		storage::write_file(file, &self.export())?;
		debug!("Flushed preferences to {:?}", file);
		Ok(())
	}

	fn add_preference_change_listener(
		&self,
		path: &str,
		listener: Arc<dyn PreferenceChangeListener>,
	) -> PrefsResult<ListenerId> {
		if !self.node_exists(path)? {
			return Err(PrefsError::NodeRemoved(path.into()));
		}
		let id = ListenerId::next();
		self.listeners.write().prefs.entry(path.into()).or_default().push((id, listener));
		Ok(id)
	}

	fn remove_preference_change_listener(&self, path: &str, id: ListenerId) -> PrefsResult<bool> {
		let mut listeners = self.listeners.write();
		let Some(list) = listeners.prefs.get_mut(path) else {
			return Ok(false);
		};
		let before = list.len();
		list.retain(|(lid, _)| *lid != id);
		let removed = list.len() != before;
		if list.is_empty() {
			listeners.prefs.remove(path);
		}
		Ok(removed)
	}

	fn add_node_change_listener(
		&self,
		path: &str,
		listener: Arc<dyn NodeChangeListener>,
	) -> PrefsResult<ListenerId> {
		if !self.node_exists(path)? {
			return Err(PrefsError::NodeRemoved(path.into()));
		}
		let id = ListenerId::next();
		self.listeners.write().nodes.entry(path.into()).or_default().push((id, listener));
		Ok(id)
	}

	fn remove_node_change_listener(&self, path: &str, id: ListenerId) -> PrefsResult<bool> {
		let mut listeners = self.listeners.write();
		let Some(list) = listeners.nodes.get_mut(path) else {
			return Ok(false);
		};
		let before = list.len();
		list.retain(|(lid, _)| *lid != id);
		let removed = list.len() != before;
		if list.is_empty() {
			listeners.nodes.remove(path);
		}
		Ok(removed)
	}
}


// vim: ts=4
