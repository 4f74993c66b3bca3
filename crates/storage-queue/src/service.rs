//! Queue service facade.
//!
//! [`QueueService`] is the public entry point: it validates arguments,
//! resolves queue handles, converts payloads with the configured serializer
//! and runs id-targeted mutations through the message locator.

use crate::accessor::{QueueAccessor, QueueHandle};
use crate::backend::{ProviderType, QueueBackend};
use crate::config::{QueueConfiguration, SerializerSelection};
use crate::connection::StorageConnectionString;
use crate::error::{require_non_blank, ConfigurationError, QueueError};
use crate::locator::{delete_by_id, update_by_id};
use crate::message::{
    MessageId, OperationResult, PopReceipt, QueueMessage, QueueMessageReceipt, QueueName,
    TypedQueueMessage,
};
use crate::providers::{AzureQueueProvider, InMemoryProvider};
use crate::serializer::{MessageSerializer, SerializerExt};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;

/// Client-side facade over a message queue service
///
/// Cheap to clone; clones share the backend and serializer.
#[derive(Clone)]
pub struct QueueService {
    configuration: Arc<QueueConfiguration>,
    serializer: Arc<dyn MessageSerializer>,
    accessor: QueueAccessor,
}

impl QueueService {
    /// Start building a service
    pub fn builder() -> QueueServiceBuilder {
        QueueServiceBuilder::default()
    }

    /// Build a service backed by Azure Queue Storage
    pub fn new(configuration: QueueConfiguration) -> Result<Self, QueueError> {
        Self::builder().configuration(configuration).build()
    }

    /// Build a service backed by a fresh in-memory provider
    pub fn in_memory(configuration: QueueConfiguration) -> Result<Self, QueueError> {
        Self::builder()
            .configuration(configuration)
            .backend(InMemoryProvider::new())
            .build()
    }

    pub fn configuration(&self) -> &QueueConfiguration {
        &self.configuration
    }

    pub fn serializer(&self) -> &Arc<dyn MessageSerializer> {
        &self.serializer
    }

    pub fn provider_type(&self) -> ProviderType {
        self.accessor.provider_type()
    }

    /// Resolve a queue, creating it when `auto_create_queues` is enabled
    pub async fn queue_handle(&self, queue_name: &str) -> Result<QueueHandle, QueueError> {
        let queue = QueueName::new(queue_name)?;
        self.accessor.queue_handle(&queue).await
    }

    /// Add a message with raw text
    pub async fn add_message(
        &self,
        queue_name: &str,
        message: &str,
    ) -> Result<QueueMessageReceipt, QueueError> {
        let queue = QueueName::new(queue_name)?;
        require_non_blank(message, "message")?;

        let handle = self.accessor.queue_handle(&queue).await?;
        let sent = handle.send(message).await?;

        info!(queue = %queue, message_id = %sent.id, "Message added");
        Ok(QueueMessageReceipt::new(sent.id, sent.receipt))
    }

    /// Serialize an item and add it as a message
    pub async fn add_item<T>(
        &self,
        queue_name: &str,
        item: &T,
    ) -> Result<QueueMessageReceipt, QueueError>
    where
        T: Serialize + ?Sized,
    {
        QueueName::new(queue_name)?;
        let text = self.serializer.serialize_item(item, None)?;
        self.add_message(queue_name, &text).await
    }

    /// Take the next visible message off the queue
    ///
    /// The message is deleted as soon as it is received. Returns `None` when
    /// no message is visible.
    pub async fn get_next_message(
        &self,
        queue_name: &str,
    ) -> Result<Option<QueueMessage>, QueueError> {
        let queue = QueueName::new(queue_name)?;
        let handle = self.accessor.queue_handle(&queue).await?;

        let Some(leased) = handle.receive(1).await?.into_iter().next() else {
            debug!(queue = %queue, "No message available");
            return Ok(None);
        };

        let status = handle.delete(&leased.id, &leased.receipt).await?;
        if status != StatusCode::NO_CONTENT {
            warn!(
                queue = %queue,
                message_id = %leased.id,
                status = status.as_u16(),
                "Received message could not be deleted and will become visible again"
            );
        }

        Ok(Some(QueueMessage {
            id: leased.id,
            receipt: leased.receipt,
            body: leased.body,
        }))
    }

    /// Take the next visible message off the queue and deserialize it
    ///
    /// The message is deleted before deserialization is attempted, so a body
    /// that does not deserialize into `T` is still consumed.
    pub async fn get_next_item<T>(
        &self,
        queue_name: &str,
    ) -> Result<Option<TypedQueueMessage<T>>, QueueError>
    where
        T: DeserializeOwned,
    {
        let Some(message) = self.get_next_message(queue_name).await? else {
            return Ok(None);
        };

        let body = self
            .serializer
            .deserialize_item::<T>(&message.body, None)
            .map_err(|e| {
                warn!(
                    queue = queue_name,
                    message_id = %message.id,
                    error = %e,
                    "Consumed message could not be deserialized"
                );
                e
            })?;

        Ok(Some(TypedQueueMessage {
            id: message.id,
            receipt: message.receipt,
            body,
        }))
    }

    /// Check whether a visible message has the given text, ignoring case
    ///
    /// Only the first batch of visible messages is inspected.
    pub async fn does_message_exist(
        &self,
        queue_name: &str,
        message: &str,
    ) -> Result<bool, QueueError> {
        let queue = QueueName::new(queue_name)?;
        require_non_blank(message, "message")?;

        let handle = self.accessor.queue_handle(&queue).await?;
        let peeked = handle.peek(handle.max_batch_size()).await?;

        let wanted = message.to_lowercase();
        Ok(peeked.iter().any(|m| m.body.to_lowercase() == wanted))
    }

    /// Serialize an item and check whether a visible message matches it
    pub async fn does_item_exist<T>(&self, queue_name: &str, item: &T) -> Result<bool, QueueError>
    where
        T: Serialize + ?Sized,
    {
        QueueName::new(queue_name)?;
        let text = self.serializer.serialize_item(item, None)?;
        self.does_message_exist(queue_name, &text).await
    }

    /// Check whether a visible message has the given id
    pub async fn does_message_id_exist(
        &self,
        queue_name: &str,
        message_id: &str,
    ) -> Result<bool, QueueError> {
        let queue = QueueName::new(queue_name)?;
        let id = MessageId::new(message_id)?;

        let handle = self.accessor.queue_handle(&queue).await?;
        let peeked = handle.peek(handle.max_batch_size()).await?;

        Ok(peeked.iter().any(|m| m.id == id))
    }

    /// Delete a message using a receipt the caller holds
    ///
    /// Returns `true` when the service confirmed the delete. A stale receipt
    /// or unknown id yields `false`.
    pub async fn remove_message(
        &self,
        queue_name: &str,
        message_id: &str,
        receipt: &str,
    ) -> Result<bool, QueueError> {
        let queue = QueueName::new(queue_name)?;
        let id = MessageId::new(message_id)?;
        let receipt = PopReceipt::new(receipt)?;

        let handle = self.accessor.queue_handle(&queue).await?;
        let status = handle.delete(&id, &receipt).await?;

        let deleted = status == StatusCode::NO_CONTENT;
        if deleted {
            info!(queue = %queue, message_id = %id, "Message removed");
        } else {
            debug!(queue = %queue, message_id = %id, status = status.as_u16(), "Message not removed");
        }
        Ok(deleted)
    }

    /// Delete a message known only by id
    ///
    /// Scans one leased batch for the id; see [`crate::locator`].
    pub async fn remove_message_by_id(
        &self,
        queue_name: &str,
        message_id: &str,
    ) -> Result<bool, QueueError> {
        let queue = QueueName::new(queue_name)?;
        let id = MessageId::new(message_id)?;

        let handle = self.accessor.queue_handle(&queue).await?;
        let deleted = delete_by_id(&handle, &id).await?;
        if deleted {
            info!(queue = %queue, message_id = %id, "Message removed");
        }
        Ok(deleted)
    }

    /// Replace the content of a message known only by id
    ///
    /// On success the result carries the receipt issued by the update and the
    /// message is visible again.
    pub async fn update_message(
        &self,
        queue_name: &str,
        message_id: &str,
        message: &str,
    ) -> Result<OperationResult, QueueError> {
        let queue = QueueName::new(queue_name)?;
        let id = MessageId::new(message_id)?;
        require_non_blank(message, "message")?;

        let handle = self.accessor.queue_handle(&queue).await?;
        let result = update_by_id(&handle, &id, message).await?;

        if result.is_successful() {
            info!(queue = %queue, message_id = %id, "Message updated");
        } else {
            debug!(queue = %queue, message_id = %id, "No message to update");
        }
        Ok(result)
    }

    /// Serialize an item and use it as the new content of a message
    pub async fn update_item<T>(
        &self,
        queue_name: &str,
        message_id: &str,
        item: &T,
    ) -> Result<OperationResult, QueueError>
    where
        T: Serialize + ?Sized,
    {
        QueueName::new(queue_name)?;
        MessageId::new(message_id)?;
        let text = self.serializer.serialize_item(item, None)?;
        self.update_message(queue_name, message_id, &text).await
    }
}

impl std::fmt::Debug for QueueService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueService")
            .field("configuration", &self.configuration)
            .field("accessor", &self.accessor)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`QueueService`]
///
/// All validation happens in [`QueueServiceBuilder::build`], before any
/// network traffic.
#[derive(Default)]
pub struct QueueServiceBuilder {
    configuration: Option<QueueConfiguration>,
    serializer: Option<Arc<dyn MessageSerializer>>,
    backend: Option<Arc<dyn QueueBackend>>,
}

impl QueueServiceBuilder {
    /// Set the service configuration (required)
    pub fn configuration(mut self, configuration: QueueConfiguration) -> Self {
        self.configuration = Some(configuration);
        self
    }

    /// Supply the serializer used with [`SerializerSelection::External`]
    pub fn serializer<S>(mut self, serializer: S) -> Self
    where
        S: MessageSerializer + 'static,
    {
        self.serializer = Some(Arc::new(serializer));
        self
    }

    /// Use a specific backend instead of Azure Queue Storage
    pub fn backend<B>(mut self, backend: B) -> Self
    where
        B: QueueBackend + 'static,
    {
        self.backend = Some(Arc::new(backend));
        self
    }

    /// Validate the configuration and build the service
    ///
    /// # Errors
    ///
    /// `QueueError::Configuration` naming the offending field when:
    /// - no configuration was supplied (`configuration`)
    /// - the connection string is blank (`connection_string`) or malformed
    /// - the serializer selection is `External` and no serializer was
    ///   supplied (`serializer`)
    /// - any other configuration value is out of range
    pub fn build(self) -> Result<QueueService, QueueError> {
        let configuration = self.configuration.ok_or_else(|| ConfigurationError::Missing {
            key: "configuration".to_string(),
        })?;
        configuration.validate()?;
        StorageConnectionString::parse(&configuration.connection_string)?;

        if self.serializer.is_some()
            && !matches!(configuration.serializer, SerializerSelection::External)
        {
            warn!(
                serializer = configuration.serializer.kind_name(),
                "Supplied serializer is ignored because the configuration selects a built-in serializer"
            );
        }
        let serializer = configuration.serializer.resolve(self.serializer)?;

        let backend: Arc<dyn QueueBackend> = match self.backend {
            Some(backend) => backend,
            None => Arc::new(AzureQueueProvider::from_configuration(&configuration)?),
        };

        let accessor = QueueAccessor::new(
            Arc::clone(&backend),
            configuration.auto_create_queues,
            configuration.cancellation_timeout(),
            configuration.visibility_timeout(),
        );

        info!(
            provider = %backend.provider_type(),
            serializer = configuration.serializer.kind_name(),
            auto_create_queues = configuration.auto_create_queues,
            "Queue service created"
        );

        Ok(QueueService {
            configuration: Arc::new(configuration),
            serializer,
            accessor,
        })
    }
}
