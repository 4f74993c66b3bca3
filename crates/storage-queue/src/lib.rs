//! # Storage Queue
//!
//! Client-side queue service over lease-based message queues with Azure Queue
//! Storage semantics.
//!
//! This library provides:
//! - Add, peek, receive and delete of raw and typed messages
//! - Update and delete of a message known only by its id
//! - Pluggable payload serialization
//! - Azure Queue Storage REST and in-memory backends
//! - Async and blocking facades
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all queue operations
//! - [`message`] - Identifiers, receipts and message structures
//! - [`serializer`] - Payload serializers
//! - [`config`] - Service configuration and connection strings
//! - [`backend`] - The backend trait and its value types
//! - [`providers`] - Backend implementations
//! - [`accessor`] - Queue handle resolution
//! - [`locator`] - Id-targeted update and delete
//! - [`service`] - The async facade
//! - [`blocking`] - The blocking facade
//!
//! ## Example
//!
//! ```no_run
//! use storage_queue::{QueueConfiguration, QueueService};
//!
//! # async fn run() -> Result<(), storage_queue::QueueError> {
//! let configuration = QueueConfiguration::new("UseDevelopmentStorage=true")
//!     .with_auto_create_queues(true);
//! let service = QueueService::new(configuration)?;
//!
//! let receipt = service.add_message("orders", "A").await?;
//! let result = service
//!     .update_message("orders", receipt.id.as_str(), "A2")
//!     .await?;
//! assert!(result.is_successful());
//! # Ok(())
//! # }
//! ```

// Module declarations
pub mod accessor;
pub mod backend;
pub mod blocking;
pub mod config;
pub mod connection;
pub mod error;
pub mod locator;
pub mod message;
pub mod providers;
pub mod serializer;
pub mod service;

#[cfg(test)]
mod test_support;

// Re-export commonly used types at crate root for convenience
pub use accessor::{QueueAccessor, QueueHandle};
pub use backend::{
    LeasedMessage, PeekedMessage, ProviderType, QueueBackend, SentMessage, UpdateReceipt,
    MAX_BATCH_SIZE,
};
pub use blocking::BlockingQueueService;
pub use config::{MessageEncoding, QueueConfiguration, SerializerSelection};
pub use connection::{AccountKey, StorageConnectionString, StorageCredentials};
pub use error::{ConfigurationError, QueueError, SerializationError, ValidationError};
pub use message::{
    MessageId, OperationResult, PopReceipt, QueueMessage, QueueMessageReceipt, QueueName,
    TypedQueueMessage,
};
pub use providers::{AzureError, AzureQueueProvider, InMemoryProvider};
pub use serializer::{
    MessageSerializer, ReflectiveJsonSerializer, ReflectiveJsonSettings, SchemaJsonSerializer,
    SchemaJsonSettings, SerializerExt, SerializerSettings,
};
pub use service::{QueueService, QueueServiceBuilder};
