use prefsync::Value;
use prefsync::config_adapter::ConversionHandler;
use prefsync::prelude::*;

/// Converts scalar JSON values to their plain string form.
///
/// Strings are taken as-is, numbers and booleans are formatted. `null`,
/// arrays and objects have no scalar form and are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConversionHandler;

impl ConversionHandler for DefaultConversionHandler {
	fn convert_to_string(&self, value: &Value) -> PsResult<String> {
		match value {
			Value::String(s) => Ok(s.clone()),
			Value::Number(n) => Ok(n.to_string()),
			Value::Bool(b) => Ok(b.to_string()),
			Value::Null => Err(Error::runtime("cannot convert null to a string")),
			Value::Array(_) | Value::Object(_) => {
				Err(Error::runtime(format!("cannot convert {} to a string", value)))
			}
		}
	}
}


// vim: ts=4
