//! Boundary between the queue service and the system that stores messages.
//!
//! The service only ever talks to a [`QueueBackend`]. Two implementations
//! ship with the crate, see [`crate::providers`].

use crate::error::QueueError;
use crate::message::{MessageId, PopReceipt, QueueName};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;

/// Largest number of messages a single peek or receive may return
pub const MAX_BATCH_SIZE: u32 = 32;

/// Enumeration of supported queue backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderType {
    AzureQueueStorage,
    InMemory,
}

impl ProviderType {
    /// Name used in logs and provider errors
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AzureQueueStorage => "AzureQueueStorage",
            Self::InMemory => "InMemory",
        }
    }

    /// Largest message body the backend accepts, in bytes
    pub fn max_message_size(&self) -> usize {
        match self {
            Self::AzureQueueStorage => 64 * 1024,
            Self::InMemory => 64 * 1024,
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Backend Value Types
// ============================================================================

/// Result of adding a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub id: MessageId,
    pub receipt: PopReceipt,
    pub inserted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub next_visible_at: DateTime<Utc>,
}

/// A message observed without taking a lease
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeekedMessage {
    pub id: MessageId,
    pub body: String,
    pub dequeue_count: u32,
}

/// A message leased by a receive call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeasedMessage {
    pub id: MessageId,
    pub receipt: PopReceipt,
    pub body: String,
    pub dequeue_count: u32,
    pub next_visible_at: DateTime<Utc>,
}

/// Receipt issued by a successful update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReceipt {
    pub receipt: PopReceipt,
    pub next_visible_at: DateTime<Utc>,
}

// ============================================================================
// Backend Trait
// ============================================================================

/// Interface implemented by queue storage backends
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Check whether a queue exists
    async fn queue_exists(&self, queue: &QueueName) -> Result<bool, QueueError>;

    /// Create a queue, tolerating one that already exists
    ///
    /// Returns `true` when this call created the queue.
    async fn create_queue_if_not_exists(&self, queue: &QueueName) -> Result<bool, QueueError>;

    /// Append a message with the given text
    async fn send_message(&self, queue: &QueueName, text: &str)
        -> Result<SentMessage, QueueError>;

    /// Read up to `max_messages` visible messages without leasing them
    async fn peek_messages(
        &self,
        queue: &QueueName,
        max_messages: u32,
    ) -> Result<Vec<PeekedMessage>, QueueError>;

    /// Lease up to `max_messages` visible messages, hiding them for
    /// `visibility_timeout`
    async fn receive_messages(
        &self,
        queue: &QueueName,
        max_messages: u32,
        visibility_timeout: Duration,
    ) -> Result<Vec<LeasedMessage>, QueueError>;

    /// Delete a leased message
    ///
    /// The status the service answered with is returned as-is; `204 No
    /// Content` means the message was deleted. A stale receipt or unknown id
    /// is reported through the status, not as an error.
    async fn delete_message(
        &self,
        queue: &QueueName,
        id: &MessageId,
        receipt: &PopReceipt,
    ) -> Result<StatusCode, QueueError>;

    /// Change the visibility and optionally the content of a leased message
    ///
    /// `body: None` leaves the content untouched. The receipt used for the
    /// call is invalidated; the returned one replaces it.
    async fn update_message(
        &self,
        queue: &QueueName,
        id: &MessageId,
        receipt: &PopReceipt,
        body: Option<&str>,
        visibility_timeout: Duration,
    ) -> Result<UpdateReceipt, QueueError>;

    /// Per-call maximum for peek and receive
    fn max_batch_size(&self) -> u32 {
        MAX_BATCH_SIZE
    }

    /// Get provider type
    fn provider_type(&self) -> ProviderType;
}
