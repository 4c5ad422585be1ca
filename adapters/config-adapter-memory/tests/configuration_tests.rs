//! Tests for the in-memory configuration tree
//!
//! Covers property access through the default key syntax, structural
//! mutations, merge-style loading and the before/after event protocol.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use parking_lot::Mutex;
use prefsync::config_adapter::{ConfigurationEvent, ConfigurationListener, ConfigurationTree};
use prefsync::config_tree::ConfigNode;
use prefsync_config_adapter_memory::InMemoryConfiguration;
use serde_json::json;
use std::sync::Arc;

#[derive(Default)]
struct Recorder {
	events: Mutex<Vec<String>>,
}

impl Recorder {
	fn take(&self) -> Vec<String> {
		std::mem::take(&mut *self.events.lock())
	}
}

impl ConfigurationListener for Recorder {
	fn configuration_changed(&self, event: &ConfigurationEvent) {
		let phase = if event.is_before_update() { "before" } else { "after" };
		let kind = format!("{:?}", event.change);
		let kind = kind.split([' ', '{']).next().unwrap_or_default().to_string();
		self.events.lock().push(format!("{} {} {}", phase, kind, event.key().unwrap_or("-")));
	}
}

fn sample() -> InMemoryConfiguration {
	InMemoryConfiguration::with_root(
		ConfigNode::builder("")
			.child(
				ConfigNode::builder("window")
					.attribute("visible", "true")
					.child(ConfigNode::leaf("width", "800"))
					.build(),
			)
			.child(ConfigNode::leaf("title", "Editor"))
			.build(),
	)
}

#[test]
fn test_get_property() {
	let config = sample();
	assert_eq!(config.get_property("window.width").as_deref(), Some("800"));
	assert_eq!(config.get_property("window[@visible]").as_deref(), Some("true"));
	assert_eq!(config.get_property("title").as_deref(), Some("Editor"));
	assert_eq!(config.get_property("missing"), None);
	assert_eq!(config.get_property("window"), None);
}

#[test]
fn test_set_property_existing_and_new() {
	let config = sample();
	config.set_property("window.width", json!(1024)).expect("set");
	assert_eq!(config.get_property("window.width").as_deref(), Some("1024"));

	config.set_property("window.size.height", json!("600")).expect("set");
	assert_eq!(config.get_property("window.size.height").as_deref(), Some("600"));

	config.set_property("window[@visible]", json!(false)).expect("set");
	assert_eq!(config.get_property("window[@visible]").as_deref(), Some("false"));

	config.set_property("theme[@name]", json!("dark")).expect("set");
	assert_eq!(config.get_property("theme[@name]").as_deref(), Some("dark"));
}

#[test]
fn test_set_property_keeps_unrelated_subtrees_shared() {
	let config = sample();
	let before = config.root();
	config.set_property("window.width", json!("900")).expect("set");
	let after = config.root();

	let old_title = before.child("title").expect("title");
	let new_title = after.child("title").expect("title");
	assert!(old_title.same_node(new_title));
	assert_eq!(before.child("window").and_then(|w| w.child("width")).and_then(ConfigNode::value), Some("800"));
}

#[test]
fn test_set_property_rejects_non_scalar() {
	let config = sample();
	assert!(config.set_property("window.width", json!([1, 2])).is_err());
	assert_eq!(config.get_property("window.width").as_deref(), Some("800"));
}

#[test]
fn test_add_property_appends() {
	let config = sample();
	config.add_property("window.width", json!("1024")).expect("add");
	let root = config.root();
	let window = root.child("window").expect("window");
	let widths: Vec<_> = window.children_named("width").filter_map(ConfigNode::value).collect();
	assert_eq!(widths, vec!["800", "1024"]);
	assert_eq!(config.get_property("window.width(1)").as_deref(), Some("1024"));
}

#[test]
fn test_clear_property() {
	let config = sample();
	config.clear_property("window.width").expect("clear");
	assert_eq!(config.get_property("window.width"), None);
	assert!(config.root().child("window").and_then(|w| w.child("width")).is_some());

	config.clear_property("window[@visible]").expect("clear");
	assert_eq!(config.get_property("window[@visible]"), None);
}

#[test]
fn test_clear_tree() {
	let config = sample();
	config.clear_tree("window").expect("clear tree");
	assert!(config.root().child("window").is_none());
	assert_eq!(config.get_property("title").as_deref(), Some("Editor"));
}

#[test]
fn test_add_nodes() {
	let config = sample();
	config
		.add_nodes("window", vec![ConfigNode::leaf("height", "600")])
		.expect("add nodes");
	assert_eq!(config.get_property("window.height").as_deref(), Some("600"));

	config
		.add_nodes("editor.fonts", vec![ConfigNode::leaf("size", "12")])
		.expect("add nodes");
	assert_eq!(config.get_property("editor.fonts.size").as_deref(), Some("12"));

	config.add_nodes("", vec![ConfigNode::leaf("top", "1")]).expect("add nodes");
	assert_eq!(config.get_property("top").as_deref(), Some("1"));
}

#[test]
fn test_add_nodes_reused_handle_keeps_positions_apart() {
	let config = InMemoryConfiguration::new();
	let node = ConfigNode::builder("n").child(ConfigNode::leaf("x", "1")).build();
	config.add_nodes("a", vec![node.clone()]).expect("add nodes");
	config.add_nodes("b", vec![node]).expect("add nodes");

	config.set_property("a.n.x", json!("2")).expect("set");

	assert_eq!(config.get_property("a.n.x").as_deref(), Some("2"));
	assert_eq!(config.get_property("b.n.x").as_deref(), Some("1"));
}

#[test]
fn test_shared_handle_in_initial_root() {
	let shared = ConfigNode::leaf("x", "1");
	let config = InMemoryConfiguration::with_root(
		ConfigNode::builder("")
			.child(ConfigNode::builder("a").child(shared.clone()).build())
			.child(ConfigNode::builder("b").child(shared).build())
			.build(),
	);

	config.clear_tree("b.x").expect("clear tree");
	config.set_property("a.x", json!("2")).expect("set");

	assert_eq!(config.get_property("a.x").as_deref(), Some("2"));
	assert_eq!(config.get_property("b.x"), None);
	assert!(config.root().child("b").is_some());
}

#[test]
fn test_load_merges_top_level() {
	let config = sample();
	let tree = ConfigNode::builder("")
		.attribute("version", "2")
		.child(ConfigNode::builder("window").child(ConfigNode::leaf("width", "1280")).build())
		.child(ConfigNode::leaf("theme", "dark"))
		.build();
	config.load(tree).expect("load");

	assert_eq!(config.get_property("window.width").as_deref(), Some("1280"));
	assert_eq!(config.get_property("window[@visible]"), None);
	assert_eq!(config.get_property("title").as_deref(), Some("Editor"));
	assert_eq!(config.get_property("theme").as_deref(), Some("dark"));
	assert_eq!(config.get_property("[@version]").as_deref(), Some("2"));
	assert_eq!(config.root().children_named("window").count(), 1);
}

#[test]
fn test_clear() {
	let config = sample();
	config.clear();
	assert!(config.root().is_empty());
}

#[test]
fn test_events_before_and_after() {
	let config = sample();
	let recorder = Arc::new(Recorder::default());
	let id = config.add_event_listener(recorder.clone());

	config.set_property("window.width", json!("1")).expect("set");
	config.clear_property("title").expect("clear");
	config.clear();
	assert_eq!(
		recorder.take(),
		vec![
			"before SetProperty window.width",
			"after SetProperty window.width",
			"before ClearProperty title",
			"after ClearProperty title",
			"before Clear -",
			"after Clear -",
		]
	);

	assert!(config.remove_event_listener(id));
	config.set_property("window.width", json!("2")).expect("set");
	assert!(recorder.take().is_empty());
}

#[test]
fn test_malformed_key_fires_nothing() {
	let config = sample();
	let recorder = Arc::new(Recorder::default());
	config.add_event_listener(recorder.clone());

	assert!(config.set_property("a[@x].b", json!("v")).is_err());
	assert!(recorder.take().is_empty());
}

/// Listener reading the tree during the before phase
struct Snapshot {
	config: Arc<InMemoryConfiguration>,
	seen: Mutex<Vec<Option<String>>>,
}

impl ConfigurationListener for Snapshot {
	fn configuration_changed(&self, event: &ConfigurationEvent) {
		self.seen.lock().push(self.config.get_property("title"));
		let _ = event;
	}
}

#[test]
fn test_before_event_sees_old_data() {
	let config = Arc::new(sample());
	let snapshot = Arc::new(Snapshot { config: config.clone(), seen: Mutex::new(Vec::new()) });
	config.add_event_listener(snapshot.clone());

	config.clear_property("title").expect("clear");
	assert_eq!(*snapshot.seen.lock(), vec![Some("Editor".to_string()), None]);
}

// vim: ts=4
