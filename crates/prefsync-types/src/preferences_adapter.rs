//! Preferences Adapter
//!
//! Trait and types for the native, externally managed hierarchical key-value
//! store that gets mirrored into a configuration tree.
//!
//! Nodes are addressed by absolute slash-separated paths (`/`, `/app`,
//! `/app/window`). A [`PrefNode`] is only a handle (store + path): it owns
//! nothing and never points at its parent, so a node removed by another thread
//! or process simply starts failing with [`PrefsError::NodeRemoved`].
//!
//! Change listeners are registered per node (not per subtree) and are invoked
//! synchronously on the thread that performed the change.

use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::types::ListenerId;

pub const PATH_SEPARATOR: char = '/';
pub const ROOT_PATH: &str = "/";

/// Failure reported by a preference store
#[derive(Debug)]
pub enum PrefsError {
	/// The node (or one of its ancestors) has been removed
	NodeRemoved(Box<str>),
	/// Key, value or node name rejected (length, charset)
	IllegalArgument(String),
	/// The backing store could not be read or written
	BackingStore(std::io::Error),
}

pub type PrefsResult<T> = std::result::Result<T, PrefsError>;

impl fmt::Display for PrefsError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PrefsError::NodeRemoved(path) => write!(f, "node has been removed: {}", path),
			PrefsError::IllegalArgument(msg) => write!(f, "illegal argument: {}", msg),
			PrefsError::BackingStore(e) => write!(f, "backing store error: {}", e),
		}
	}
}

impl std::error::Error for PrefsError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			PrefsError::BackingStore(e) => Some(e),
			_ => None,
		}
	}
}

impl From<std::io::Error> for PrefsError {
	fn from(err: std::io::Error) -> Self {
		PrefsError::BackingStore(err)
	}
}

/// A raw key of a node was added, changed or removed (`new_value == None`).
#[derive(Debug, Clone)]
pub struct PreferenceChangeEvent {
	pub node: PrefNode,
	pub key: Box<str>,
	pub new_value: Option<Box<str>>,
}

/// A child node was added to or removed from `parent`.
#[derive(Debug, Clone)]
pub enum NodeChangeEvent {
	ChildAdded { parent: PrefNode, child: PrefNode },
	ChildRemoved { parent: PrefNode, child: PrefNode },
}

impl NodeChangeEvent {
	pub fn parent(&self) -> &PrefNode {
		match self {
			NodeChangeEvent::ChildAdded { parent, .. }
			| NodeChangeEvent::ChildRemoved { parent, .. } => parent,
		}
	}

	pub fn child(&self) -> &PrefNode {
		match self {
			NodeChangeEvent::ChildAdded { child, .. }
			| NodeChangeEvent::ChildRemoved { child, .. } => child,
		}
	}

	pub fn is_added(&self) -> bool {
		matches!(self, NodeChangeEvent::ChildAdded { .. })
	}
}

pub trait PreferenceChangeListener: Send + Sync {
	fn preference_change(&self, event: &PreferenceChangeEvent);
}

pub trait NodeChangeListener: Send + Sync {
	fn child_added(&self, event: &NodeChangeEvent);
	fn child_removed(&self, event: &NodeChangeEvent);
}

/// Preference store adapter trait.
///
/// Every path argument is absolute. Operations on a path that does not exist
/// (never created, or removed) fail with [`PrefsError::NodeRemoved`], except
/// [`node_exists`](Self::node_exists), [`create_node`](Self::create_node) and
/// listener removal, which reports `false` for a node that is gone.
pub trait PreferencesAdapter: Debug + Send + Sync {
	/// Check whether a node exists.
	fn node_exists(&self, path: &str) -> PrefsResult<bool>;

	/// Create a node and all missing ancestors (creation-on-access).
	/// Fires `ChildAdded` on the parent of every node actually created.
	fn create_node(&self, path: &str) -> PrefsResult<()>;

	/// Raw keys of a node.
	fn keys(&self, path: &str) -> PrefsResult<Vec<Box<str>>>;

	fn get(&self, path: &str, key: &str) -> PrefsResult<Option<Box<str>>>;

	fn put(&self, path: &str, key: &str, value: &str) -> PrefsResult<()>;

	/// Remove a raw key. Removing a missing key is not an error.
	fn remove(&self, path: &str, key: &str) -> PrefsResult<()>;

	/// Names of the direct children of a node.
	fn child_names(&self, path: &str) -> PrefsResult<Vec<Box<str>>>;

	/// Remove a node with its whole subtree. Fires `ChildRemoved` on the parent.
	fn remove_node(&self, path: &str) -> PrefsResult<()>;

	/// Make the in-memory state of a subtree reflect the backing store.
	fn sync(&self, path: &str) -> PrefsResult<()>;

	/// Write pending changes of a subtree to the backing store.
	fn flush(&self, path: &str) -> PrefsResult<()>;

	fn add_preference_change_listener(
		&self,
		path: &str,
		listener: Arc<dyn PreferenceChangeListener>,
	) -> PrefsResult<ListenerId>;

	fn remove_preference_change_listener(&self, path: &str, id: ListenerId) -> PrefsResult<bool>;

	fn add_node_change_listener(
		&self,
		path: &str,
		listener: Arc<dyn NodeChangeListener>,
	) -> PrefsResult<ListenerId>;

	fn remove_node_change_listener(&self, path: &str, id: ListenerId) -> PrefsResult<bool>;
}

/// Validate a single node name
pub fn check_node_name(name: &str) -> PrefsResult<()> {
	if name.is_empty() {
		return Err(PrefsError::IllegalArgument("empty node name".into()));
	}
	if name.contains(PATH_SEPARATOR) {
		return Err(PrefsError::IllegalArgument(format!("node name contains '/': {}", name)));
	}
	Ok(())
}

/// Join a parent path and a child name
pub fn child_path(parent: &str, name: &str) -> String {
	if parent == ROOT_PATH {
		format!("/{}", name)
	} else {
		format!("{}/{}", parent, name)
	}
}

/// Parent path of an absolute path, `None` for the root
pub fn parent_path(path: &str) -> Option<&str> {
	if path == ROOT_PATH {
		return None;
	}
	match path.rfind(PATH_SEPARATOR) {
		Some(0) => Some(ROOT_PATH),
		Some(pos) => Some(&path[..pos]),
		None => None,
	}
}

/// True if `path` is `base` or lies below it
pub fn in_subtree(path: &str, base: &str) -> bool {
	base == ROOT_PATH
		|| path == base
		|| (path.len() > base.len()
			&& path.starts_with(base)
			&& path[base.len()..].starts_with(PATH_SEPARATOR))
}

/// Handle to a node of a preference store.
#[derive(Clone)]
pub struct PrefNode {
	store: Arc<dyn PreferencesAdapter>,
	path: Box<str>,
}

impl PrefNode {
	/// Handle for an absolute path. The node is not created.
	pub fn new(store: Arc<dyn PreferencesAdapter>, path: &str) -> PrefsResult<Self> {
		if !path.starts_with(PATH_SEPARATOR) || (path.len() > 1 && path.ends_with(PATH_SEPARATOR)) {
			return Err(PrefsError::IllegalArgument(format!("not an absolute node path: {}", path)));
		}
		if path.len() > 1 {
			for name in path[1..].split(PATH_SEPARATOR) {
				check_node_name(name)?;
			}
		}
		Ok(Self { store, path: path.into() })
	}

	pub fn root(store: Arc<dyn PreferencesAdapter>) -> Self {
		Self { store, path: ROOT_PATH.into() }
	}

	pub fn store(&self) -> &Arc<dyn PreferencesAdapter> {
		&self.store
	}

	pub fn path(&self) -> &str {
		&self.path
	}

	/// Last path segment; empty for the root
	pub fn name(&self) -> &str {
		match self.path.rfind(PATH_SEPARATOR) {
			Some(pos) => &self.path[pos + 1..],
			None => &self.path,
		}
	}

	pub fn is_root(&self) -> bool {
		&*self.path == ROOT_PATH
	}

	pub fn exists(&self) -> PrefsResult<bool> {
		self.store.node_exists(&self.path)
	}

	fn ensure_exists(&self) -> PrefsResult<()> {
		if self.store.node_exists(&self.path)? {
			Ok(())
		} else {
			Err(PrefsError::NodeRemoved(self.path.clone()))
		}
	}

	/// Parent handle, `None` for the root. Fails if this node was removed.
	pub fn parent(&self) -> PrefsResult<Option<PrefNode>> {
		self.ensure_exists()?;
		Ok(parent_path(&self.path)
			.map(|path| PrefNode { store: Arc::clone(&self.store), path: path.into() }))
	}

	/// Handle of a direct child without touching the store.
	pub fn child_handle(&self, name: &str) -> PrefsResult<PrefNode> {
		check_node_name(name)?;
		Ok(PrefNode { store: Arc::clone(&self.store), path: child_path(&self.path, name).into() })
	}

	/// Direct child, created if missing.
	pub fn child(&self, name: &str) -> PrefsResult<PrefNode> {
		self.ensure_exists()?;
		let child = self.child_handle(name)?;
		self.store.create_node(&child.path)?;
		Ok(child)
	}

	/// Descendant addressed by a sequence of names, created if missing.
	pub fn descendant<S: AsRef<str>>(&self, names: &[S]) -> PrefsResult<PrefNode> {
		let mut node = self.clone();
		for name in names {
			node = node.child(name.as_ref())?;
		}
		Ok(node)
	}

	/// Whether a direct child exists. Fails if this node was removed.
	pub fn child_exists(&self, name: &str) -> PrefsResult<bool> {
		self.ensure_exists()?;
		let child = self.child_handle(name)?;
		self.store.node_exists(&child.path)
	}

	pub fn keys(&self) -> PrefsResult<Vec<Box<str>>> {
		self.store.keys(&self.path)
	}

	pub fn get(&self, key: &str) -> PrefsResult<Option<Box<str>>> {
		self.store.get(&self.path, key)
	}

	pub fn put(&self, key: &str, value: &str) -> PrefsResult<()> {
		self.store.put(&self.path, key, value)
	}

	pub fn remove(&self, key: &str) -> PrefsResult<()> {
		self.store.remove(&self.path, key)
	}

	pub fn child_names(&self) -> PrefsResult<Vec<Box<str>>> {
		self.store.child_names(&self.path)
	}

	pub fn remove_node(&self) -> PrefsResult<()> {
		self.store.remove_node(&self.path)
	}

	pub fn sync(&self) -> PrefsResult<()> {
		self.store.sync(&self.path)
	}

	pub fn flush(&self) -> PrefsResult<()> {
		self.store.flush(&self.path)
	}

	/// True if `other` is this node or lies below it.
	pub fn is_ancestor_of(&self, other: &PrefNode) -> bool {
		self.same_store(other) && in_subtree(&other.path, &self.path)
	}

	pub fn same_store(&self, other: &PrefNode) -> bool {
		std::ptr::addr_eq(Arc::as_ptr(&self.store), Arc::as_ptr(&other.store))
	}
}

impl PartialEq for PrefNode {
	fn eq(&self, other: &Self) -> bool {
		self.path == other.path && self.same_store(other)
	}
}

impl Eq for PrefNode {}

impl Debug for PrefNode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("PrefNode").field(&self.path).finish()
	}
}

impl fmt::Display for PrefNode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.path)
	}
}


// vim: ts=4
