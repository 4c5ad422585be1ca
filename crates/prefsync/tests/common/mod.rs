//! Shared helpers for prefsync integration tests

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use parking_lot::Mutex;
use prefsync::Value;
use prefsync::config_adapter::{
	ConfigurationListener, ConfigurationTree, ConversionHandler, ExpressionEngine,
};
use prefsync::config_tree::ConfigNode;
use prefsync::error::PsResult;
use prefsync::types::ListenerId;
use prefsync_config_adapter_memory::InMemoryConfiguration;
use prefsync_prefs_adapter_memory::{MemoryPreferences, MemoryPreferencesConfig};
use std::sync::Arc;

/// Print handler logs when running with RUST_LOG set
pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

pub fn create_store() -> Arc<MemoryPreferences> {
	MemoryPreferences::new(MemoryPreferencesConfig::default())
}

/// Configuration decorator recording every mutation call
#[derive(Debug, Default)]
pub struct RecordingConfiguration {
	inner: InMemoryConfiguration,
	calls: Mutex<Vec<String>>,
}

impl RecordingConfiguration {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn calls(&self) -> Vec<String> {
		self.calls.lock().clone()
	}

	pub fn take_calls(&self) -> Vec<String> {
		std::mem::take(&mut *self.calls.lock())
	}

	pub fn listener_count(&self) -> usize {
		self.inner.listener_count()
	}

	fn record(&self, call: String) {
		self.calls.lock().push(call);
	}
}

impl ConfigurationTree for RecordingConfiguration {
	fn root(&self) -> ConfigNode {
		self.inner.root()
	}

	fn get_property(&self, key: &str) -> Option<String> {
		self.inner.get_property(key)
	}

	fn load(&self, tree: ConfigNode) -> PsResult<()> {
		self.record("load".into());
		self.inner.load(tree)
	}

	fn add_nodes(&self, key: &str, nodes: Vec<ConfigNode>) -> PsResult<()> {
		self.record(format!("add_nodes {}", key));
		self.inner.add_nodes(key, nodes)
	}

	fn set_property(&self, key: &str, value: Value) -> PsResult<()> {
		self.record(format!("set_property {}", key));
		self.inner.set_property(key, value)
	}

	fn add_property(&self, key: &str, value: Value) -> PsResult<()> {
		self.record(format!("add_property {}", key));
		self.inner.add_property(key, value)
	}

	fn clear_property(&self, key: &str) -> PsResult<()> {
		self.record(format!("clear_property {}", key));
		self.inner.clear_property(key)
	}

	fn clear_tree(&self, key: &str) -> PsResult<()> {
		self.record(format!("clear_tree {}", key));
		self.inner.clear_tree(key)
	}

	fn clear(&self) {
		self.record("clear".into());
		self.inner.clear();
	}

	fn expression_engine(&self) -> Arc<dyn ExpressionEngine> {
		self.inner.expression_engine()
	}

	fn conversion_handler(&self) -> Arc<dyn ConversionHandler> {
		self.inner.conversion_handler()
	}

	fn add_event_listener(&self, listener: Arc<dyn ConfigurationListener>) -> ListenerId {
		self.inner.add_event_listener(listener)
	}

	fn remove_event_listener(&self, id: ListenerId) -> bool {
		self.inner.remove_event_listener(id)
	}
}

// vim: ts=4
