pub use prefsync_types::prelude::*;

pub use crate::config_adapter::ConfigurationTree;
pub use crate::config_tree::ConfigNode;
pub use crate::preferences_adapter::PrefNode;

// vim: ts=4
