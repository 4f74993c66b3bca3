//! Synchronous variants of the queue service operations.
//!
//! [`BlockingQueueService`] owns a current-thread Tokio runtime and drives
//! the async facade to completion on the calling thread. It must not be used
//! from inside an async runtime; `block_on` panics there.

use crate::accessor::QueueHandle;
use crate::backend::ProviderType;
use crate::config::QueueConfiguration;
use crate::error::{ConfigurationError, QueueError};
use crate::message::{OperationResult, QueueMessage, QueueMessageReceipt, TypedQueueMessage};
use crate::service::QueueService;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::runtime::{Builder, Runtime};

#[cfg(test)]
#[path = "blocking_tests.rs"]
mod tests;

/// Blocking wrapper around [`QueueService`]
pub struct BlockingQueueService {
    inner: QueueService,
    runtime: Runtime,
}

impl BlockingQueueService {
    /// Wrap an existing service
    pub fn new(service: QueueService) -> Result<Self, QueueError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .thread_name("storage-queue-blocking")
            .build()
            .map_err(|e| ConfigurationError::Invalid {
                key: "runtime".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            inner: service,
            runtime,
        })
    }

    /// Build a service backed by Azure Queue Storage and wrap it
    pub fn from_configuration(configuration: QueueConfiguration) -> Result<Self, QueueError> {
        Self::new(QueueService::new(configuration)?)
    }

    /// The async service behind this wrapper
    pub fn service(&self) -> &QueueService {
        &self.inner
    }

    pub fn provider_type(&self) -> ProviderType {
        self.inner.provider_type()
    }

    pub fn queue_handle(&self, queue_name: &str) -> Result<QueueHandle, QueueError> {
        self.runtime.block_on(self.inner.queue_handle(queue_name))
    }

    pub fn add_message(
        &self,
        queue_name: &str,
        message: &str,
    ) -> Result<QueueMessageReceipt, QueueError> {
        self.runtime
            .block_on(self.inner.add_message(queue_name, message))
    }

    pub fn add_item<T>(&self, queue_name: &str, item: &T) -> Result<QueueMessageReceipt, QueueError>
    where
        T: Serialize + ?Sized,
    {
        self.runtime.block_on(self.inner.add_item(queue_name, item))
    }

    pub fn get_next_message(&self, queue_name: &str) -> Result<Option<QueueMessage>, QueueError> {
        self.runtime.block_on(self.inner.get_next_message(queue_name))
    }

    pub fn get_next_item<T>(
        &self,
        queue_name: &str,
    ) -> Result<Option<TypedQueueMessage<T>>, QueueError>
    where
        T: DeserializeOwned,
    {
        self.runtime.block_on(self.inner.get_next_item(queue_name))
    }

    pub fn does_message_exist(&self, queue_name: &str, message: &str) -> Result<bool, QueueError> {
        self.runtime
            .block_on(self.inner.does_message_exist(queue_name, message))
    }

    pub fn does_item_exist<T>(&self, queue_name: &str, item: &T) -> Result<bool, QueueError>
    where
        T: Serialize + ?Sized,
    {
        self.runtime
            .block_on(self.inner.does_item_exist(queue_name, item))
    }

    pub fn does_message_id_exist(
        &self,
        queue_name: &str,
        message_id: &str,
    ) -> Result<bool, QueueError> {
        self.runtime
            .block_on(self.inner.does_message_id_exist(queue_name, message_id))
    }

    pub fn remove_message(
        &self,
        queue_name: &str,
        message_id: &str,
        receipt: &str,
    ) -> Result<bool, QueueError> {
        self.runtime
            .block_on(self.inner.remove_message(queue_name, message_id, receipt))
    }

    pub fn remove_message_by_id(&self, queue_name: &str, message_id: &str) -> Result<bool, QueueError> {
        self.runtime
            .block_on(self.inner.remove_message_by_id(queue_name, message_id))
    }

    pub fn update_message(
        &self,
        queue_name: &str,
        message_id: &str,
        message: &str,
    ) -> Result<OperationResult, QueueError> {
        self.runtime
            .block_on(self.inner.update_message(queue_name, message_id, message))
    }

    pub fn update_item<T>(
        &self,
        queue_name: &str,
        message_id: &str,
        item: &T,
    ) -> Result<OperationResult, QueueError>
    where
        T: Serialize + ?Sized,
    {
        self.runtime
            .block_on(self.inner.update_item(queue_name, message_id, item))
    }
}

impl std::fmt::Debug for BlockingQueueService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingQueueService")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}
