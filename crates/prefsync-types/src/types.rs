//! Small shared types

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static LAST_LISTENER_ID: AtomicU64 = AtomicU64::new(0);

/// Handle returned when a listener is registered, used to unregister it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

impl ListenerId {
	/// Allocate a process-wide unique listener id
	pub fn next() -> Self {
		ListenerId(LAST_LISTENER_ID.fetch_add(1, Ordering::Relaxed) + 1)
	}
}

impl fmt::Display for ListenerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "L{}", self.0)
	}
}


// vim: ts=4
