//! Tests for the in-memory preference store
//!
//! Covers node creation, raw key access, validation limits, node removal and
//! the JSON backing file.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use prefsync::preferences_adapter::{PreferencesAdapter, PrefsError};
use prefsync_prefs_adapter_memory::{MemoryPreferences, MemoryPreferencesConfig};
use std::sync::Arc;
use tempfile::TempDir;

fn create_store() -> Arc<MemoryPreferences> {
	MemoryPreferences::new(MemoryPreferencesConfig::default())
}

fn create_backed_store(dir: &TempDir) -> Arc<MemoryPreferences> {
	let config = MemoryPreferencesConfig {
		backing_file: Some(dir.path().join("prefs.json")),
		..Default::default()
	};
	MemoryPreferences::open(config).expect("Failed to open store")
}

#[test]
fn test_root_exists() {
	let store = create_store();
	assert!(store.node_exists("/").expect("exists"));
	assert!(store.root_node().is_root());
	assert!(store.child_names("/").expect("children").is_empty());
}

#[test]
fn test_create_node_creates_ancestors() {
	let store = create_store();
	store.create_node("/app/window/size").expect("Failed to create node");

	assert!(store.node_exists("/app").expect("exists"));
	assert!(store.node_exists("/app/window").expect("exists"));
	assert_eq!(store.child_names("/app").expect("children"), vec![Box::from("window")]);
	assert_eq!(store.stats().nodes_created, 3);

	// Creating again is a no-op
	store.create_node("/app/window").expect("Failed to create node");
	assert_eq!(store.stats().nodes_created, 3);
}

#[test]
fn test_put_get_remove() {
	let store = create_store();
	let node = store.node("/app").expect("Failed to create node");

	node.put("token", "abc").expect("put");
	assert_eq!(node.get("token").expect("get").as_deref(), Some("abc"));
	assert_eq!(node.keys().expect("keys"), vec![Box::from("token")]);

	node.remove("token").expect("remove");
	assert_eq!(node.get("token").expect("get"), None);

	// Removing a missing key is fine
	node.remove("token").expect("remove");
	assert_eq!(store.stats().removes, 1);
}

#[test]
fn test_put_same_value_is_not_counted() {
	let store = create_store();
	let node = store.node("/app").expect("node");
	node.put("k", "v").expect("put");
	node.put("k", "v").expect("put");
	node.put("k", "w").expect("put");
	assert_eq!(store.stats().puts, 2);
}

#[test]
fn test_limits() {
	let store = create_store();
	let node = store.node("/app").expect("node");

	let long_key = "k".repeat(81);
	assert!(matches!(node.put(&long_key, "v"), Err(PrefsError::IllegalArgument(_))));

	let long_value = "v".repeat(8 * 1024 + 1);
	assert!(matches!(node.put("k", &long_value), Err(PrefsError::IllegalArgument(_))));

	let long_name = "n".repeat(81);
	assert!(matches!(node.child(&long_name), Err(PrefsError::IllegalArgument(_))));

	assert!(matches!(node.put("a\0b", "v"), Err(PrefsError::IllegalArgument(_))));
	assert!(node.put(&"k".repeat(80), "v").is_ok());
}

#[test]
fn test_remove_node() {
	let store = create_store();
	let window = store.node("/app/window").expect("node");
	window.put("width", "800").expect("put");
	let size = window.child("size").expect("child");

	window.remove_node().expect("remove");

	assert!(!window.exists().expect("exists"));
	assert!(!size.exists().expect("exists"));
	assert!(store.child_names("/app").expect("children").is_empty());
	assert!(matches!(window.get("width"), Err(PrefsError::NodeRemoved(_))));
	assert!(matches!(window.put("width", "1"), Err(PrefsError::NodeRemoved(_))));
	assert!(matches!(window.parent(), Err(PrefsError::NodeRemoved(_))));
	assert!(matches!(store.remove_node("/app/window"), Err(PrefsError::NodeRemoved(_))));
}

#[test]
fn test_root_cannot_be_removed() {
	let store = create_store();
	assert!(matches!(store.remove_node("/"), Err(PrefsError::IllegalArgument(_))));
}

#[test]
fn test_sibling_prefix_not_removed() {
	let store = create_store();
	store.create_node("/app").expect("node");
	store.create_node("/application").expect("node");
	store.remove_node("/app").expect("remove");
	assert!(store.node_exists("/application").expect("exists"));
}

#[test]
fn test_is_ancestor_of() {
	let store = create_store();
	let app = store.node("/app").expect("node");
	let window = store.node("/app/window").expect("node");
	let other = store.node("/application").expect("node");

	assert!(app.is_ancestor_of(&app));
	assert!(app.is_ancestor_of(&window));
	assert!(!window.is_ancestor_of(&app));
	assert!(!app.is_ancestor_of(&other));
	assert!(store.root_node().is_ancestor_of(&window));

	let foreign = create_store().node("/app").expect("node");
	assert!(!app.is_ancestor_of(&foreign));
}

#[test]
fn test_flush_and_reopen() {
	let dir = TempDir::new().expect("Failed to create temp directory");
	{
		let store = create_backed_store(&dir);
		let node = store.node("/app/window").expect("node");
		node.put("width", "800").expect("put");
		node.flush().expect("flush");
		assert_eq!(store.stats().flushes, 1);
	}

	let store = create_backed_store(&dir);
	assert_eq!(store.get("/app/window", "width").expect("get").as_deref(), Some("800"));
}

#[test]
fn test_sync_discards_unflushed_changes() {
	let dir = TempDir::new().expect("Failed to create temp directory");
	let store = create_backed_store(&dir);
	let node = store.node("/app").expect("node");
	node.put("a", "1").expect("put");
	node.flush().expect("flush");

	node.put("a", "2").expect("put");
	node.child("extra").expect("child");
	node.sync().expect("sync");

	assert_eq!(node.get("a").expect("get").as_deref(), Some("1"));
	assert!(!node.child_exists("extra").expect("exists"));
}

#[test]
fn test_open_missing_file_is_empty() {
	let dir = TempDir::new().expect("Failed to create temp directory");
	let store = create_backed_store(&dir);
	assert!(store.child_names("/").expect("children").is_empty());
}

// vim: ts=4
