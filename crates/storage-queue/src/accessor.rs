//! Resolution of per-queue handles.
//!
//! Every call to [`QueueAccessor::queue_handle`] checks with the backend that
//! the queue exists, creating it when `auto_create_queues` is enabled. Nothing
//! is cached between calls.

use crate::backend::{
    LeasedMessage, PeekedMessage, ProviderType, QueueBackend, SentMessage, UpdateReceipt,
};
use crate::error::QueueError;
use crate::message::{MessageId, PopReceipt, QueueName};
use reqwest::StatusCode;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[cfg(test)]
#[path = "accessor_tests.rs"]
mod tests;

/// Resolves queue names to handles according to the service configuration
#[derive(Clone)]
pub struct QueueAccessor {
    backend: Arc<dyn QueueBackend>,
    auto_create_queues: bool,
    timeout: Duration,
    visibility_timeout: Duration,
}

impl QueueAccessor {
    pub fn new(
        backend: Arc<dyn QueueBackend>,
        auto_create_queues: bool,
        timeout: Duration,
        visibility_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            auto_create_queues,
            timeout,
            visibility_timeout,
        }
    }

    /// Get a handle to an existing queue, creating it if allowed
    ///
    /// # Errors
    ///
    /// - `QueueError::QueueNotFound` when the queue is missing and
    ///   `auto_create_queues` is disabled
    /// - any operation error from the existence check or creation
    pub async fn queue_handle(&self, queue: &QueueName) -> Result<QueueHandle, QueueError> {
        let handle = QueueHandle {
            name: queue.clone(),
            backend: Arc::clone(&self.backend),
            timeout: self.timeout,
            visibility_timeout: self.visibility_timeout,
        };

        if handle.exists().await? {
            return Ok(handle);
        }

        if !self.auto_create_queues {
            warn!(queue = %queue, "Queue does not exist and auto-create is disabled");
            return Err(QueueError::queue_not_found(queue.as_str()));
        }

        let created = handle.create_if_not_exists().await?;
        if created {
            info!(queue = %queue, "Created queue");
        }

        Ok(handle)
    }

    pub fn provider_type(&self) -> ProviderType {
        self.backend.provider_type()
    }
}

impl std::fmt::Debug for QueueAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueAccessor")
            .field("provider", &self.backend.provider_type())
            .field("auto_create_queues", &self.auto_create_queues)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A resolved queue
///
/// Each backend round trip made through the handle is bounded by the
/// configured cancellation timeout.
#[derive(Clone)]
pub struct QueueHandle {
    name: QueueName,
    backend: Arc<dyn QueueBackend>,
    timeout: Duration,
    visibility_timeout: Duration,
}

impl QueueHandle {
    pub fn name(&self) -> &QueueName {
        &self.name
    }

    /// Lease duration applied by [`QueueHandle::receive`]
    pub fn visibility_timeout(&self) -> Duration {
        self.visibility_timeout
    }

    /// Per-call maximum for peek and receive
    pub fn max_batch_size(&self) -> u32 {
        self.backend.max_batch_size()
    }

    pub async fn exists(&self) -> Result<bool, QueueError> {
        self.bounded(self.backend.queue_exists(&self.name)).await
    }

    pub async fn create_if_not_exists(&self) -> Result<bool, QueueError> {
        self.bounded(self.backend.create_queue_if_not_exists(&self.name))
            .await
    }

    pub async fn send(&self, text: &str) -> Result<SentMessage, QueueError> {
        self.bounded(self.backend.send_message(&self.name, text))
            .await
    }

    pub async fn peek(&self, max_messages: u32) -> Result<Vec<PeekedMessage>, QueueError> {
        self.bounded(self.backend.peek_messages(&self.name, max_messages))
            .await
    }

    /// Lease up to `max_messages` messages for the configured visibility timeout
    pub async fn receive(&self, max_messages: u32) -> Result<Vec<LeasedMessage>, QueueError> {
        self.bounded(self.backend.receive_messages(
            &self.name,
            max_messages,
            self.visibility_timeout,
        ))
        .await
    }

    pub async fn delete(
        &self,
        id: &MessageId,
        receipt: &PopReceipt,
    ) -> Result<StatusCode, QueueError> {
        self.bounded(self.backend.delete_message(&self.name, id, receipt))
            .await
    }

    pub async fn update(
        &self,
        id: &MessageId,
        receipt: &PopReceipt,
        body: Option<&str>,
        visibility_timeout: Duration,
    ) -> Result<UpdateReceipt, QueueError> {
        self.bounded(self.backend.update_message(
            &self.name,
            id,
            receipt,
            body,
            visibility_timeout,
        ))
        .await
    }

    async fn bounded<T>(
        &self,
        operation: impl Future<Output = Result<T, QueueError>>,
    ) -> Result<T, QueueError> {
        match tokio::time::timeout(self.timeout, operation).await {
            Ok(result) => result,
            Err(_) => {
                warn!(queue = %self.name, timeout = ?self.timeout, "Queue operation timed out");
                Err(QueueError::Timeout {
                    duration: self.timeout,
                })
            }
        }
    }
}

impl std::fmt::Debug for QueueHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueHandle")
            .field("name", &self.name)
            .field("provider", &self.backend.provider_type())
            .field("timeout", &self.timeout)
            .finish()
    }
}
