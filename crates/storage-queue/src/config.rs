//! Configuration for the queue service.
//!
//! Configuration is plain data: it can be built in code, or loaded from a
//! TOML/JSON/YAML file and `STORAGE_QUEUE__*` environment variables. It is
//! validated once, when the service is built.

use crate::error::ConfigurationError;
use crate::serializer::{
    MessageSerializer, ReflectiveJsonSerializer, ReflectiveJsonSettings, SchemaJsonSerializer,
    SchemaJsonSettings,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Prefix of environment variables that override configuration values
pub const ENV_PREFIX: &str = "STORAGE_QUEUE";

/// Default bound on a single backend round trip
pub const DEFAULT_CANCELLATION_TIMEOUT_MS: u64 = 30_000;

/// Default lease duration for received messages
pub const DEFAULT_VISIBILITY_TIMEOUT_SECS: u32 = 30;

/// Longest visibility timeout the service accepts (seven days)
pub const MAX_VISIBILITY_TIMEOUT_SECS: u32 = 7 * 24 * 60 * 60;

/// Encoding applied to message text on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageEncoding {
    /// Message text is base64-encoded UTF-8
    #[default]
    Base64,
    /// Message text is sent as-is (XML-escaped)
    Text,
}

/// Serializer used for typed payloads
///
/// Each variant carries the settings type of its own serializer, so settings
/// of the wrong shape cannot be expressed in code and are rejected when
/// parsing configuration sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SerializerSelection {
    ReflectiveJson {
        #[serde(default)]
        settings: Option<ReflectiveJsonSettings>,
    },
    SchemaJson {
        #[serde(default)]
        settings: Option<SchemaJsonSettings>,
    },
    /// Caller supplies the serializer when building the service
    External,
}

impl Default for SerializerSelection {
    fn default() -> Self {
        Self::ReflectiveJson { settings: None }
    }
}

impl SerializerSelection {
    /// Name of the selected serializer kind
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::ReflectiveJson { .. } => "reflective_json",
            Self::SchemaJson { .. } => "schema_json",
            Self::External => "external",
        }
    }

    /// Build the serializer for this selection
    pub fn resolve(
        &self,
        external: Option<Arc<dyn MessageSerializer>>,
    ) -> Result<Arc<dyn MessageSerializer>, ConfigurationError> {
        match self {
            Self::ReflectiveJson { settings } => {
                Ok(Arc::new(ReflectiveJsonSerializer::new(settings.clone())))
            }
            Self::SchemaJson { settings } => {
                if settings.as_ref().is_some_and(|s| s.max_depth == 0) {
                    return Err(ConfigurationError::Invalid {
                        key: "serializer.settings.max_depth".to_string(),
                        message: "must be at least 1".to_string(),
                    });
                }
                Ok(Arc::new(SchemaJsonSerializer::new(settings.clone())))
            }
            Self::External => external.ok_or_else(|| ConfigurationError::Missing {
                key: "serializer".to_string(),
            }),
        }
    }
}

/// Queue service configuration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfiguration {
    /// Storage account connection string
    pub connection_string: String,

    /// Create queues that do not exist instead of failing
    pub auto_create_queues: bool,

    /// Upper bound for a single backend round trip, in milliseconds
    pub cancellation_timeout_ms: u64,

    /// Encoding of message text on the wire
    pub message_encoding: MessageEncoding,

    /// Serializer for typed payloads
    pub serializer: SerializerSelection,

    /// Lease duration applied when messages are received, in seconds
    pub visibility_timeout_secs: u32,
}

impl Default for QueueConfiguration {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            auto_create_queues: false,
            cancellation_timeout_ms: DEFAULT_CANCELLATION_TIMEOUT_MS,
            message_encoding: MessageEncoding::default(),
            serializer: SerializerSelection::default(),
            visibility_timeout_secs: DEFAULT_VISIBILITY_TIMEOUT_SECS,
        }
    }
}

impl QueueConfiguration {
    /// Create configuration with defaults for everything but the connection string
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            ..Default::default()
        }
    }

    /// Enable or disable creation of missing queues
    pub fn with_auto_create_queues(mut self, enabled: bool) -> Self {
        self.auto_create_queues = enabled;
        self
    }

    /// Set the round trip timeout; durations beyond `u64::MAX` ms saturate
    pub fn with_cancellation_timeout(mut self, timeout: Duration) -> Self {
        self.cancellation_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the wire encoding of message text
    pub fn with_message_encoding(mut self, encoding: MessageEncoding) -> Self {
        self.message_encoding = encoding;
        self
    }

    /// Set the serializer selection
    pub fn with_serializer(mut self, serializer: SerializerSelection) -> Self {
        self.serializer = serializer;
        self
    }

    /// Set the lease duration for received messages
    ///
    /// Durations beyond `u32::MAX` seconds saturate, so they still fail
    /// validation instead of wrapping into range.
    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout_secs = u32::try_from(timeout.as_secs()).unwrap_or(u32::MAX);
        self
    }

    /// Load configuration from a file, with environment overrides
    ///
    /// The file format is taken from the extension (`.toml`, `.json`,
    /// `.yaml`). Environment variables named `STORAGE_QUEUE__<FIELD>` take
    /// precedence over file values, with `__` separating nested fields.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(true))
            .add_source(Self::environment());
        Self::load(builder)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let builder = config::Config::builder().add_source(Self::environment());
        Self::load(builder)
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
    }

    fn load(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigurationError> {
        let configuration: Self = builder.build()?.try_deserialize()?;
        Ok(configuration)
    }

    /// Check the values that do not depend on the chosen backend
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.connection_string.trim().is_empty() {
            return Err(ConfigurationError::Missing {
                key: "connection_string".to_string(),
            });
        }

        if self.cancellation_timeout_ms == 0 {
            return Err(ConfigurationError::Invalid {
                key: "cancellation_timeout_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        if self.visibility_timeout_secs == 0
            || self.visibility_timeout_secs > MAX_VISIBILITY_TIMEOUT_SECS
        {
            return Err(ConfigurationError::Invalid {
                key: "visibility_timeout_secs".to_string(),
                message: format!("must be between 1 and {}", MAX_VISIBILITY_TIMEOUT_SECS),
            });
        }

        Ok(())
    }

    /// Round trip timeout as a duration
    pub fn cancellation_timeout(&self) -> Duration {
        Duration::from_millis(self.cancellation_timeout_ms)
    }

    /// Lease duration as a duration
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.visibility_timeout_secs))
    }
}

impl fmt::Debug for QueueConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueConfiguration")
            .field("connection_string", &"<redacted>")
            .field("auto_create_queues", &self.auto_create_queues)
            .field("cancellation_timeout_ms", &self.cancellation_timeout_ms)
            .field("message_encoding", &self.message_encoding)
            .field("serializer", &self.serializer)
            .field("visibility_timeout_secs", &self.visibility_timeout_secs)
            .finish()
    }
}
