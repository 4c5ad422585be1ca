//! Error types shared by the synchronization engine and its adapters.

use std::fmt;

use crate::preferences_adapter::PrefsError;

pub type PsResult<T> = std::result::Result<T, Error>;

type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug)]
pub enum Error {
	/// A preference node was removed (usually by another thread or process)
	/// while an operation was working on it.
	NodeDeleted { path: Box<str>, source: Option<Cause> },

	/// Malformed key or value, unsupported mapping operation, missing reference
	/// or any other fault of the native store (including I/O from sync/flush).
	ConfigurationRuntime { message: Box<str>, source: Option<Cause> },

	/// A configuration key could not be parsed by the expression engine.
	Parse(String),
}

impl Error {
	pub fn node_deleted(path: impl Into<Box<str>>) -> Self {
		Error::NodeDeleted { path: path.into(), source: None }
	}

	pub fn runtime(message: impl Into<Box<str>>) -> Self {
		Error::ConfigurationRuntime { message: message.into(), source: None }
	}

	/// Wrap an arbitrary cause into a runtime error with context.
	pub fn runtime_with<E>(message: impl Into<Box<str>>, cause: E) -> Self
	where
		E: std::error::Error + Send + Sync + 'static,
	{
		Error::ConfigurationRuntime { message: message.into(), source: Some(Box::new(cause)) }
	}

	pub fn is_node_deleted(&self) -> bool {
		matches!(self, Error::NodeDeleted { .. })
	}
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::NodeDeleted { path, .. } => write!(f, "preference node removed: {}", path),
			Error::ConfigurationRuntime { message, source: Some(source) } => {
				write!(f, "{}: {}", message, source)
			}
			Error::ConfigurationRuntime { message, source: None } => write!(f, "{}", message),
			Error::Parse(msg) => write!(f, "invalid configuration key: {}", msg),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::NodeDeleted { source, .. } | Error::ConfigurationRuntime { source, .. } => {
				source.as_deref().map(|e| e as &(dyn std::error::Error + 'static))
			}
			Error::Parse(_) => None,
		}
	}
}

impl From<PrefsError> for Error {
	fn from(err: PrefsError) -> Self {
		let removed = match &err {
			PrefsError::NodeRemoved(path) => Some(path.clone()),
			_ => None,
		};
		if let Some(path) = removed {
			return Error::NodeDeleted { path, source: Some(Box::new(err)) };
		}

		let message = match err {
			PrefsError::IllegalArgument(_) => "rejected by preference store",
			_ => "backing store failure",
		};
		Error::ConfigurationRuntime { message: message.into(), source: Some(Box::new(err)) }
	}
}


// vim: ts=4
