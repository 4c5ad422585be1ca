//! Event suppression.
//!
//! A change applied to one side while handling an event from the other side
//! would otherwise be announced back and bounce forever. Before writing to a
//! side, the writer opens a prevention scope for that side; events raised by
//! that side on the same thread are then dropped. Scopes nest and are counted
//! per thread, so an unrelated thread writing at the same time is unaffected.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::thread::{self, ThreadId};

#[derive(Debug, Default, Clone, Copy)]
struct Depths {
	preferences: u32,
	configuration: u32,
}

impl Depths {
	fn is_idle(self) -> bool {
		self.preferences == 0 && self.configuration == 0
	}
}

/// Which side a prevention scope covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
	Preferences,
	Configuration,
	Both,
}

impl Scope {
	fn preferences(self) -> bool {
		matches!(self, Scope::Preferences | Scope::Both)
	}

	fn configuration(self) -> bool {
		matches!(self, Scope::Configuration | Scope::Both)
	}
}

/// Per-thread reentrant suppression counters
#[derive(Debug, Default)]
pub struct EventCoordinationStrategy {
	depths: Mutex<HashMap<ThreadId, Depths>>,
}

/// Closes a prevention scope when dropped, also during unwinding
struct PreventionGuard<'a> {
	strategy: &'a EventCoordinationStrategy,
	scope: Scope,
}

impl Drop for PreventionGuard<'_> {
	fn drop(&mut self) {
		if self.scope.preferences() {
			self.strategy.finish_preferences_prevention();
		}
		if self.scope.configuration() {
			self.strategy.finish_configuration_prevention();
		}
	}
}

impl EventCoordinationStrategy {
	pub fn new() -> Self {
		Self::default()
	}

	fn update(&self, f: impl FnOnce(&mut Depths)) {
		let mut depths = self.depths.lock();
		let id = thread::current().id();
		let entry = depths.entry(id).or_default();
		f(entry);
		if entry.is_idle() {
			depths.remove(&id);
		}
	}

	fn current(&self) -> Depths {
		self.depths.lock().get(&thread::current().id()).copied().unwrap_or_default()
	}

	fn guard(&self, scope: Scope) -> PreventionGuard<'_> {
		if scope.preferences() {
			self.start_preferences_prevention();
		}
		if scope.configuration() {
			self.start_configuration_prevention();
		}
		PreventionGuard { strategy: self, scope }
	}

	pub fn start_preferences_prevention(&self) {
		self.update(|d| d.preferences += 1);
	}

	/// Saturates at zero
	pub fn finish_preferences_prevention(&self) {
		self.update(|d| d.preferences = d.preferences.saturating_sub(1));
	}

	pub fn start_configuration_prevention(&self) {
		self.update(|d| d.configuration += 1);
	}

	/// Saturates at zero
	pub fn finish_configuration_prevention(&self) {
		self.update(|d| d.configuration = d.configuration.saturating_sub(1));
	}

	pub fn is_preferences_event_prevented(&self) -> bool {
		self.current().preferences > 0
	}

	pub fn is_configuration_event_prevented(&self) -> bool {
		self.current().configuration > 0
	}

	/// Run `body` with events of both sides suppressed on this thread
	pub fn prevent_events<T>(&self, body: impl FnOnce() -> T) -> T {
		let _guard = self.guard(Scope::Both);
		body()
	}

	/// Run `body` with preference store events suppressed on this thread
	pub fn prevent_preferences_events<T>(&self, body: impl FnOnce() -> T) -> T {
		let _guard = self.guard(Scope::Preferences);
		body()
	}

	/// Run `body` with configuration events suppressed on this thread
	pub fn prevent_configuration_events<T>(&self, body: impl FnOnce() -> T) -> T {
		let _guard = self.guard(Scope::Configuration);
		body()
	}

	/// Pass a preference store event to `f` unless suppressed on this thread
	pub fn handle_preferences_event<E, T>(&self, event: E, f: impl FnOnce(E) -> T) -> Option<T> {
		if self.is_preferences_event_prevented() { None } else { Some(f(event)) }
	}

	/// Pass a configuration event to `f` unless suppressed on this thread
	pub fn handle_configuration_event<E, T>(&self, event: E, f: impl FnOnce(E) -> T) -> Option<T> {
		if self.is_configuration_event_prevented() { None } else { Some(f(event)) }
	}

	/// Number of threads currently inside a prevention scope
	pub fn active_threads(&self) -> usize {
		self.depths.lock().len()
	}
}


// vim: ts=4
