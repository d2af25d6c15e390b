//! Model options
//!
//! Options are plain data so an embedding application can keep them next to
//! the rest of its configuration and hand them to [`crate::Model::builder`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SylvaError};

/// Tunables for one [`crate::Model`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelOptions {
    /// Number of retired update records kept for reuse
    pub update_pool_size: usize,

    /// Catch panics raised by listeners and route them to the exception sink
    pub catch_listener_panics: bool,

    /// Emit a trace event for every update start/end
    pub trace_updates: bool,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            update_pool_size: 8,
            catch_listener_panics: true,
            trace_updates: false,
        }
    }
}

impl ModelOptions {
    /// Parse options from JSON; missing fields keep their defaults
    ///
    /// # Errors
    /// * `Serialization` - If the text is not a valid options object
    pub fn from_json(text: &str) -> Result<Self> {
        object_from_json(text, "model options")
    }
}

/// Deserialize a settings object whose missing fields take defaults
///
/// Anything but a JSON object is rejected, so `[]` or `null` cannot pass as
/// an all-defaults value.
///
/// # Errors
/// * `Serialization` - If the text is not JSON, not an object, or has
///   fields of the wrong type
pub fn object_from_json<T: DeserializeOwned>(text: &str, what: &str) -> Result<T> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(SylvaError::Serialization {
            message: format!("{} must be a JSON object", what),
        });
    }
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ModelOptions::default();
        assert_eq!(options.update_pool_size, 8);
        assert!(options.catch_listener_panics);
        assert!(!options.trace_updates);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options = ModelOptions::from_json(r#"{ "trace_updates": true }"#).unwrap();
        assert!(options.trace_updates);
        assert_eq!(options.update_pool_size, 8);
    }

    #[test]
    fn test_invalid_json_is_serialization_error() {
        let err = ModelOptions::from_json("{ not json").unwrap_err();
        assert!(matches!(
            err,
            crate::errors::SylvaError::Serialization { .. }
        ));
    }

    #[test]
    fn test_non_object_json_is_rejected() {
        for text in ["[]", "null", "3", r#""options""#] {
            let err = ModelOptions::from_json(text).unwrap_err();
            assert!(
                matches!(err, SylvaError::Serialization { ref message } if message.contains("object")),
                "{}",
                text
            );
        }
        assert!(ModelOptions::from_json(r#"{"update_pool_size": "many"}"#).is_err());
    }
}
