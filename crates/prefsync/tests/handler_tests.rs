//! Tests for bulk transfers and incremental synchronization

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use common::{RecordingConfiguration, create_store, init_tracing};
use prefsync::config_adapter::ConfigurationTree;
use prefsync::config_tree::ConfigNode;
use prefsync::error::Error;
use prefsync::{Mapper, MapperKind, PreferencesHandler, SyncConfig};
use prefsync_config_adapter_memory::InMemoryConfiguration;
use serde_json::json;
use std::sync::Arc;

fn handler_with(
	mapper: MapperKind,
	auto_load: bool,
	auto_save: bool,
) -> (
	Arc<prefsync_prefs_adapter_memory::MemoryPreferences>,
	Arc<RecordingConfiguration>,
	Arc<PreferencesHandler>,
) {
	init_tracing();
	let store = create_store();
	let content = RecordingConfiguration::new();
	let handler = PreferencesHandler::builder()
		.mapper(mapper)
		.auto_load(auto_load)
		.auto_save(auto_save)
		.base_node(store.node("/apps/editor").expect("Failed to create base node"))
		.content(content.clone())
		.build()
		.expect("Failed to build handler");
	(store, content, handler)
}

#[test]
fn test_load_node_based() {
	let (store, content, handler) = handler_with(MapperKind::NodeBased, false, false);
	let base = store.node("/apps/editor").expect("node");
	base.put("token", "abc").expect("put");

	handler.load().expect("load");

	assert_eq!(content.get_property("token").as_deref(), Some("abc"));
}

#[test]
fn test_load_attribute_based() {
	let (store, content, handler) = handler_with(MapperKind::AttributeBased, false, false);
	let base = store.node("/apps/editor").expect("node");
	base.child("window").expect("child").put("width", "800").expect("put");

	handler.load().expect("load");

	assert_eq!(content.get_property("window[@width]").as_deref(), Some("800"));
	assert_eq!(content.get_property("window.width"), None);
}

#[test]
fn test_load_keeps_unrelated_nodes() {
	let (store, content, handler) = handler_with(MapperKind::NodeBased, false, false);
	content.set_property("local.only", json!("x")).expect("set");
	content.set_property("token", json!("old")).expect("set");
	store.node("/apps/editor").expect("node").put("token", "new").expect("put");

	handler.load().expect("load");

	assert_eq!(content.get_property("token").as_deref(), Some("new"));
	assert_eq!(content.get_property("local.only").as_deref(), Some("x"));
}

#[test]
fn test_refresh_discards_unrelated_nodes() {
	let (store, content, handler) = handler_with(MapperKind::NodeBased, false, false);
	content.set_property("local.only", json!("x")).expect("set");
	store.node("/apps/editor").expect("node").put("token", "abc").expect("put");

	handler.refresh().expect("refresh");

	assert_eq!(content.get_property("token").as_deref(), Some("abc"));
	assert_eq!(content.get_property("local.only"), None);
}

#[test]
fn test_save() {
	let (store, content, handler) = handler_with(MapperKind::NodeBased, false, false);
	content.set_property("window.width", json!(800)).expect("set");
	content.set_property("title", json!("Editor")).expect("set");
	let base = store.node("/apps/editor").expect("node");
	base.put("stale", "x").expect("put");
	let flushes = store.stats().flushes;

	handler.save().expect("save");

	assert_eq!(base.get("title").expect("get").as_deref(), Some("Editor"));
	assert_eq!(base.child("window").expect("child").get("width").expect("get").as_deref(), Some("800"));
	assert_eq!(base.get("stale").expect("get"), None);
	assert_eq!(store.stats().flushes, flushes + 1);
}

#[test]
fn test_save_attribute_based_rejects_values() {
	let (_store, content, handler) = handler_with(MapperKind::AttributeBased, false, false);
	content.set_property("title", json!("Editor")).expect("set");

	let err = handler.save().expect_err("values are not supported");
	assert!(matches!(err, Error::ConfigurationRuntime { .. }));
}

#[test]
fn test_bulk_requires_references() {
	let handler = PreferencesHandler::new(Mapper::NodeBased);
	assert!(handler.load().is_err());
	assert!(handler.refresh().is_err());
	assert!(handler.save().is_err());

	handler.set_content(Some(Arc::new(InMemoryConfiguration::new())));
	assert!(handler.load().is_err());

	let store = create_store();
	handler.set_base_node(Some(store.root_node())).expect("set base");
	handler.set_content(None);
	assert!(handler.save().is_err());
}

#[test]
fn test_builder_from_config() {
	let store = create_store();
	let config = SyncConfig::from_json(r#"{"mapper": "attributeBased", "autoLoad": true}"#).expect("config");
	let handler = PreferencesHandler::builder()
		.config(config)
		.base_node(store.node("/apps/editor").expect("node"))
		.content(Arc::new(InMemoryConfiguration::new()))
		.build()
		.expect("build");

	assert_eq!(handler.mapper(), Mapper::AttributeBased);
	assert!(handler.is_auto_load());
	assert!(!handler.is_auto_save());
	assert!(handler.base_node().is_some());
	assert!(handler.content().is_some());
	assert!(handler.listener_manager().registered_node_count() > 0);
	assert!(!handler.listener_manager().has_configuration_listener());
}

#[test]
fn test_auto_flags_toggle_listeners() {
	let (store, content, handler) = handler_with(MapperKind::NodeBased, false, false);
	let manager = handler.listener_manager();
	assert_eq!(manager.registered_node_count(), 0);
	assert_eq!(store.total_listener_count(), 0);

	handler.set_auto_load(true).expect("auto load");
	assert!(manager.is_registered(&store.node("/apps/editor").expect("node")));
	assert_eq!(store.total_listener_count(), 2);

	handler.set_auto_save(true);
	assert!(manager.has_configuration_listener());

	handler.set_auto_load(false).expect("auto load");
	handler.set_auto_save(false);
	assert_eq!(store.total_listener_count(), 0);
	assert!(!manager.has_configuration_listener());

	// Nothing flows with both flags off
	store.node("/apps/editor").expect("node").put("k", "v").expect("put");
	content.set_property("x", json!("1")).expect("set");
	assert_eq!(content.calls(), vec!["set_property x"]);
	assert_eq!(store.node("/apps/editor").expect("node").get("x").expect("get"), None);
}

#[test]
fn test_set_base_node_moves_listeners() {
	let (store, content, handler) = handler_with(MapperKind::NodeBased, true, false);
	let other = store.node("/apps/other").expect("node");
	handler.set_base_node(Some(other.clone())).expect("set base");

	assert!(handler.listener_manager().is_registered(&other));
	assert!(!handler.listener_manager().is_registered(&store.node("/apps/editor").expect("node")));

	store.node("/apps/editor").expect("node").put("ignored", "1").expect("put");
	other.put("seen", "2").expect("put");
	assert_eq!(content.calls(), vec!["set_property seen"]);
}

#[test]
fn test_configuration_set_writes_through() {
	let (store, content, _handler) = handler_with(MapperKind::NodeBased, false, true);
	let before = store.stats();

	content.set_property("a.b", json!("v")).expect("set");

	let base = store.node("/apps/editor").expect("node");
	assert_eq!(base.child("a").expect("child").get("b").expect("get").as_deref(), Some("v"));
	assert_eq!(store.stats().puts, before.puts + 1);
	assert_eq!(store.stats().flushes, before.flushes + 1);
	assert_eq!(content.calls(), vec!["set_property a.b"]);
}

#[test]
fn test_configuration_attribute_writes_through() {
	let (store, content, _handler) = handler_with(MapperKind::AttributeBased, false, true);

	content.set_property("window[@width]", json!(800)).expect("set");
	content.add_property("window[@height]", json!(true)).expect("add");

	let window = store.node("/apps/editor/window").expect("node");
	assert_eq!(window.get("width").expect("get").as_deref(), Some("800"));
	assert_eq!(window.get("height").expect("get").as_deref(), Some("true"));

	content.clear_property("window[@width]").expect("clear");
	assert_eq!(window.get("width").expect("get"), None);
}

#[test]
fn test_configuration_add_nodes_writes_through() {
	let (store, content, _handler) = handler_with(MapperKind::NodeBased, false, true);
	let node = ConfigNode::builder("window").value("main").child(ConfigNode::leaf("width", "800")).build();

	content.add_nodes("", vec![node]).expect("add");

	let base = store.node("/apps/editor").expect("node");
	assert_eq!(base.get("window").expect("get").as_deref(), Some("main"));
	assert_eq!(base.child("window").expect("child").get("width").expect("get").as_deref(), Some("800"));
}

#[test]
fn test_configuration_clear_tree_writes_through() {
	let (store, content, _handler) = handler_with(MapperKind::NodeBased, false, true);
	content.set_property("window.width", json!(800)).expect("set");
	content.set_property("keep", json!("1")).expect("set");
	let base = store.node("/apps/editor").expect("node");
	assert!(base.child_exists("window").expect("exists"));

	content.clear_tree("window").expect("clear");
	assert!(!base.child_exists("window").expect("exists"));
	assert_eq!(base.get("keep").expect("get").as_deref(), Some("1"));

	content.clear();
	assert!(base.keys().expect("keys").is_empty());
	assert!(base.child_names().expect("names").is_empty());
}

#[test]
fn test_configuration_unsupported_write_is_dropped() {
	let (store, content, _handler) = handler_with(MapperKind::AttributeBased, false, true);

	// Node values have no place in the attribute-based layout
	content.set_property("title", json!("Editor")).expect("set");

	assert_eq!(content.get_property("title").as_deref(), Some("Editor"));
	assert!(store.node("/apps/editor").expect("node").keys().expect("keys").is_empty());
	assert_eq!(store.stats().flushes, 0);
}

#[test]
fn test_preference_put_reaches_configuration() {
	let (store, content, _handler) = handler_with(MapperKind::NodeBased, true, false);
	let base = store.node("/apps/editor").expect("node");

	base.put("token", "abc").expect("put");
	assert_eq!(content.get_property("token").as_deref(), Some("abc"));
	assert_eq!(content.take_calls(), vec!["set_property token"]);

	base.remove("token").expect("remove");
	assert_eq!(content.get_property("token"), None);
	assert_eq!(content.take_calls(), vec!["clear_tree token"]);
}

#[test]
fn test_preference_attribute_removal_clears_property() {
	let (store, content, _handler) = handler_with(MapperKind::AttributeBased, true, false);
	let base = store.node("/apps/editor").expect("node");

	base.put("token", "abc").expect("put");
	assert_eq!(content.get_property("[@token]").as_deref(), Some("abc"));
	base.remove("token").expect("remove");

	assert_eq!(content.get_property("[@token]"), None);
	assert_eq!(content.calls(), vec!["set_property [@token]", "clear_property [@token]"]);
}

#[test]
fn test_attribute_put_on_base_and_below() {
	let (store, content, _handler) = handler_with(MapperKind::AttributeBased, true, false);
	let base = store.node("/apps/editor").expect("node");
	let window = base.child("window").expect("child");
	content.take_calls();

	base.put("theme", "dark").expect("put");
	window.put("width", "800").expect("put");

	assert_eq!(content.get_property("[@theme]").as_deref(), Some("dark"));
	assert_eq!(content.get_property("window[@width]").as_deref(), Some("800"));
	assert_eq!(content.calls(), vec!["set_property [@theme]", "set_property window[@width]"]);
}

#[test]
fn test_preference_node_removal_clears_tree() {
	let (store, content, handler) = handler_with(MapperKind::NodeBased, true, false);
	let base = store.node("/apps/editor").expect("node");
	base.child("x").expect("child").put("k", "v").expect("put");
	handler.load().expect("load");
	content.take_calls();

	base.child_handle("x").expect("handle").remove_node().expect("remove");

	assert_eq!(content.calls(), vec!["clear_tree x"]);
	assert_eq!(content.get_property("x.k"), None);
}

#[test]
fn test_preference_node_removal_keeps_value_as_leaf() {
	let (store, content, handler) = handler_with(MapperKind::NodeBased, true, false);
	let base = store.node("/apps/editor").expect("node");
	base.put("x", "main").expect("put");
	base.child("x").expect("child").put("k", "v").expect("put");
	handler.load().expect("load");
	assert_eq!(content.get_property("x").as_deref(), Some("main"));
	content.take_calls();

	base.child_handle("x").expect("handle").remove_node().expect("remove");

	assert_eq!(content.calls(), vec!["clear_tree x", "set_property x"]);
	assert_eq!(content.get_property("x").as_deref(), Some("main"));
	assert_eq!(content.get_property("x.k"), None);
	assert_eq!(base.get("x").expect("get").as_deref(), Some("main"));
}

#[test]
fn test_preference_node_added_reaches_configuration() {
	let (store, content, _handler) = handler_with(MapperKind::NodeBased, true, false);
	let base = store.node("/apps/editor").expect("node");

	let window = base.child("window").expect("child");
	assert_eq!(content.take_calls(), vec!["add_nodes "]);

	window.put("width", "800").expect("put");
	assert_eq!(content.get_property("window.width").as_deref(), Some("800"));
	assert_eq!(content.calls(), vec!["set_property window.width"]);
}

#[test]
fn test_events_outside_base_ignored() {
	let (store, content, _handler) = handler_with(MapperKind::NodeBased, true, false);
	store.node("/apps").expect("node").put("outside", "1").expect("put");
	store.node("/apps/other").expect("node").put("outside", "1").expect("put");
	assert!(content.calls().is_empty());
}

// vim: ts=4
