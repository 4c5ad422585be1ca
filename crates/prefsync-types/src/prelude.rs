pub use crate::error::{Error, PsResult};

pub use tracing::{debug, debug_span, error, info, info_span, warn};

// vim: ts=4
