//! Payload serialization for message bodies.
//!
//! Serializers work on the JSON document model so that they stay object-safe
//! and can be supplied by callers at runtime. Typed conversion is layered on
//! top by [`SerializerExt`], which every serializer (including trait objects)
//! gets for free.
//!
//! Two built-in serializers are provided:
//!
//! - [`ReflectiveJsonSerializer`] - compact or indented JSON, optionally
//!   dropping null members
//! - [`SchemaJsonSerializer`] - as above, plus a maximum nesting depth that is
//!   enforced in both directions

use crate::error::SerializationError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(test)]
#[path = "serializer_tests.rs"]
mod tests;

/// Default maximum nesting depth for [`SchemaJsonSerializer`]
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Settings for [`ReflectiveJsonSerializer`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReflectiveJsonSettings {
    /// Emit indented JSON
    pub indented: bool,
    /// Drop object members whose value is null
    pub ignore_null_values: bool,
}

/// Settings for [`SchemaJsonSerializer`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchemaJsonSettings {
    /// Emit indented JSON
    pub write_indented: bool,
    /// Drop object members whose value is null
    pub ignore_null_values: bool,
    /// Maximum nesting depth of arrays and objects
    pub max_depth: usize,
}

impl Default for SchemaJsonSettings {
    fn default() -> Self {
        Self {
            write_indented: false,
            ignore_null_values: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Per-call settings override
///
/// A serializer only honours the variant that belongs to it; settings for a
/// different serializer are ignored and the instance defaults apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerializerSettings {
    ReflectiveJson(ReflectiveJsonSettings),
    SchemaJson(SchemaJsonSettings),
}

/// Converts JSON documents to and from message text
pub trait MessageSerializer: Send + Sync {
    /// Render a document as message text
    fn serialize_value(
        &self,
        value: &Value,
        settings: Option<&SerializerSettings>,
    ) -> Result<String, SerializationError>;

    /// Parse message text into a document
    fn deserialize_value(
        &self,
        text: &str,
        settings: Option<&SerializerSettings>,
    ) -> Result<Value, SerializationError>;
}

/// Typed conversions available on every [`MessageSerializer`]
pub trait SerializerExt: MessageSerializer {
    /// Serialize a typed item into message text
    fn serialize_item<T>(
        &self,
        item: &T,
        settings: Option<&SerializerSettings>,
    ) -> Result<String, SerializationError>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(item)?;
        self.serialize_value(&value, settings)
    }

    /// Deserialize message text into a typed item
    fn deserialize_item<T>(
        &self,
        text: &str,
        settings: Option<&SerializerSettings>,
    ) -> Result<T, SerializationError>
    where
        T: DeserializeOwned,
    {
        let value = self.deserialize_value(text, settings)?;
        Ok(serde_json::from_value(value)?)
    }
}

impl<S: MessageSerializer + ?Sized> SerializerExt for S {}

// ============================================================================
// Built-in Serializers
// ============================================================================

/// General purpose JSON serializer
#[derive(Debug, Clone, Default)]
pub struct ReflectiveJsonSerializer {
    settings: ReflectiveJsonSettings,
}

impl ReflectiveJsonSerializer {
    pub fn new(settings: Option<ReflectiveJsonSettings>) -> Self {
        Self {
            settings: settings.unwrap_or_default(),
        }
    }

    fn effective<'a>(
        &'a self,
        settings: Option<&'a SerializerSettings>,
    ) -> &'a ReflectiveJsonSettings {
        match settings {
            Some(SerializerSettings::ReflectiveJson(overrides)) => overrides,
            _ => &self.settings,
        }
    }
}

impl MessageSerializer for ReflectiveJsonSerializer {
    fn serialize_value(
        &self,
        value: &Value,
        settings: Option<&SerializerSettings>,
    ) -> Result<String, SerializationError> {
        let settings = self.effective(settings);
        render(value, settings.indented, settings.ignore_null_values)
    }

    fn deserialize_value(
        &self,
        text: &str,
        _settings: Option<&SerializerSettings>,
    ) -> Result<Value, SerializationError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// JSON serializer with bounded document depth
#[derive(Debug, Clone, Default)]
pub struct SchemaJsonSerializer {
    settings: SchemaJsonSettings,
}

impl SchemaJsonSerializer {
    pub fn new(settings: Option<SchemaJsonSettings>) -> Self {
        Self {
            settings: settings.unwrap_or_default(),
        }
    }

    fn effective<'a>(&'a self, settings: Option<&'a SerializerSettings>) -> &'a SchemaJsonSettings {
        match settings {
            Some(SerializerSettings::SchemaJson(overrides)) => overrides,
            _ => &self.settings,
        }
    }
}

impl MessageSerializer for SchemaJsonSerializer {
    fn serialize_value(
        &self,
        value: &Value,
        settings: Option<&SerializerSettings>,
    ) -> Result<String, SerializationError> {
        let settings = self.effective(settings);
        check_depth(value, settings.max_depth)?;
        render(value, settings.write_indented, settings.ignore_null_values)
    }

    fn deserialize_value(
        &self,
        text: &str,
        settings: Option<&SerializerSettings>,
    ) -> Result<Value, SerializationError> {
        let settings = self.effective(settings);
        let value: Value = serde_json::from_str(text)?;
        check_depth(&value, settings.max_depth)?;
        Ok(value)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn render(value: &Value, indented: bool, ignore_nulls: bool) -> Result<String, SerializationError> {
    let stripped;
    let value = if ignore_nulls {
        stripped = strip_nulls(value);
        &stripped
    } else {
        value
    };

    let text = if indented {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(text)
}

/// Remove null object members at every level; nulls inside arrays are kept
fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_nulls).collect()),
        other => other.clone(),
    }
}

/// Nesting depth of a document; scalars have depth zero
fn depth(value: &Value) -> usize {
    match value {
        Value::Object(map) => 1 + map.values().map(depth).max().unwrap_or(0),
        Value::Array(items) => 1 + items.iter().map(depth).max().unwrap_or(0),
        _ => 0,
    }
}

fn check_depth(value: &Value, max_depth: usize) -> Result<(), SerializationError> {
    let depth = depth(value);
    if depth > max_depth {
        return Err(SerializationError::DepthExceeded { depth, max_depth });
    }
    Ok(())
}
