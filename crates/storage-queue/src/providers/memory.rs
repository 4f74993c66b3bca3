//! In-memory queue backend for testing and development.
//!
//! Follows the lease model of the storage service:
//! - Every send, receive and update issues a fresh pop receipt
//! - Receiving hides a message until its visibility deadline passes
//! - Deletes and updates must present the current receipt
//! - Messages expire seven days after insertion
//!
//! State is shared between clones, so a test can keep a handle to the
//! provider it passed to the service.

use crate::backend::{
    LeasedMessage, PeekedMessage, ProviderType, QueueBackend, SentMessage, UpdateReceipt,
    MAX_BATCH_SIZE,
};
use crate::config::MAX_VISIBILITY_TIMEOUT_SECS;
use crate::error::QueueError;
use crate::message::{MessageId, PopReceipt, QueueName};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

const MESSAGE_TIME_TO_LIVE_DAYS: i64 = 7;

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// Storage for all queues
#[derive(Default)]
struct QueueStorage {
    queues: HashMap<QueueName, InMemoryQueue>,
}

/// Messages of a single queue, in insertion order
#[derive(Default)]
struct InMemoryQueue {
    messages: Vec<StoredMessage>,
}

impl InMemoryQueue {
    fn purge_expired(&mut self, now: DateTime<Utc>) {
        self.messages.retain(|m| m.expires_at > now);
    }

    fn find_leased(&mut self, id: &MessageId, receipt: &PopReceipt) -> Option<&mut StoredMessage> {
        self.messages
            .iter_mut()
            .find(|m| &m.id == id && &m.receipt == receipt)
    }
}

struct StoredMessage {
    id: MessageId,
    receipt: PopReceipt,
    body: String,
    dequeue_count: u32,
    expires_at: DateTime<Utc>,
    next_visible_at: DateTime<Utc>,
}

impl StoredMessage {
    fn is_visible(&self, now: DateTime<Utc>) -> bool {
        self.next_visible_at <= now
    }
}

// ============================================================================
// InMemoryProvider
// ============================================================================

/// In-memory queue backend
#[derive(Clone, Default)]
pub struct InMemoryProvider {
    storage: Arc<RwLock<QueueStorage>>,
}

impl InMemoryProvider {
    /// Create a provider with no queues
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unexpired messages in a queue, visible or not
    ///
    /// Returns zero for a queue that does not exist.
    pub async fn message_count(&self, queue: &QueueName) -> usize {
        let now = Utc::now();
        let storage = self.storage.read().await;
        storage
            .queues
            .get(queue)
            .map(|q| q.messages.iter().filter(|m| m.expires_at > now).count())
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for InMemoryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryProvider").finish_non_exhaustive()
    }
}

#[async_trait]
impl QueueBackend for InMemoryProvider {
    async fn queue_exists(&self, queue: &QueueName) -> Result<bool, QueueError> {
        Ok(self.storage.read().await.queues.contains_key(queue))
    }

    async fn create_queue_if_not_exists(&self, queue: &QueueName) -> Result<bool, QueueError> {
        let mut storage = self.storage.write().await;
        if storage.queues.contains_key(queue) {
            return Ok(false);
        }

        storage.queues.insert(queue.clone(), InMemoryQueue::default());
        tracing::debug!(queue = %queue, "Created in-memory queue");
        Ok(true)
    }

    async fn send_message(
        &self,
        queue: &QueueName,
        text: &str,
    ) -> Result<SentMessage, QueueError> {
        let max_size = self.provider_type().max_message_size();
        if text.len() > max_size {
            return Err(provider_error(
                StatusCode::PAYLOAD_TOO_LARGE,
                "RequestBodyTooLarge",
                format!(
                    "Message of {} bytes exceeds the limit of {} bytes",
                    text.len(),
                    max_size
                ),
            ));
        }

        let mut storage = self.storage.write().await;
        let queue_state = existing_queue(&mut storage, queue)?;

        let now = Utc::now();
        let stored = StoredMessage {
            id: MessageId::generate(),
            receipt: PopReceipt::generate(),
            body: text.to_string(),
            dequeue_count: 0,
            expires_at: now + chrono::Duration::days(MESSAGE_TIME_TO_LIVE_DAYS),
            next_visible_at: now,
        };

        let sent = SentMessage {
            id: stored.id.clone(),
            receipt: stored.receipt.clone(),
            inserted_at: now,
            expires_at: stored.expires_at,
            next_visible_at: stored.next_visible_at,
        };
        queue_state.messages.push(stored);

        Ok(sent)
    }

    async fn peek_messages(
        &self,
        queue: &QueueName,
        max_messages: u32,
    ) -> Result<Vec<PeekedMessage>, QueueError> {
        check_batch_size(max_messages)?;

        let mut storage = self.storage.write().await;
        let queue_state = existing_queue(&mut storage, queue)?;

        let now = Utc::now();
        queue_state.purge_expired(now);

        Ok(queue_state
            .messages
            .iter()
            .filter(|m| m.is_visible(now))
            .take(max_messages as usize)
            .map(|m| PeekedMessage {
                id: m.id.clone(),
                body: m.body.clone(),
                dequeue_count: m.dequeue_count,
            })
            .collect())
    }

    async fn receive_messages(
        &self,
        queue: &QueueName,
        max_messages: u32,
        visibility_timeout: Duration,
    ) -> Result<Vec<LeasedMessage>, QueueError> {
        check_batch_size(max_messages)?;
        let hidden_for = check_visibility(visibility_timeout)?;

        let mut storage = self.storage.write().await;
        let queue_state = existing_queue(&mut storage, queue)?;

        let now = Utc::now();
        queue_state.purge_expired(now);

        let mut leased = Vec::new();
        for message in queue_state
            .messages
            .iter_mut()
            .filter(|m| m.is_visible(now))
            .take(max_messages as usize)
        {
            message.dequeue_count += 1;
            message.receipt = PopReceipt::generate();
            message.next_visible_at = now + hidden_for;

            leased.push(LeasedMessage {
                id: message.id.clone(),
                receipt: message.receipt.clone(),
                body: message.body.clone(),
                dequeue_count: message.dequeue_count,
                next_visible_at: message.next_visible_at,
            });
        }

        Ok(leased)
    }

    async fn delete_message(
        &self,
        queue: &QueueName,
        id: &MessageId,
        receipt: &PopReceipt,
    ) -> Result<StatusCode, QueueError> {
        let mut storage = self.storage.write().await;
        let queue_state = existing_queue(&mut storage, queue)?;

        let position = queue_state
            .messages
            .iter()
            .position(|m| &m.id == id && &m.receipt == receipt);

        match position {
            Some(index) => {
                queue_state.messages.remove(index);
                Ok(StatusCode::NO_CONTENT)
            }
            None => Ok(StatusCode::NOT_FOUND),
        }
    }

    async fn update_message(
        &self,
        queue: &QueueName,
        id: &MessageId,
        receipt: &PopReceipt,
        body: Option<&str>,
        visibility_timeout: Duration,
    ) -> Result<UpdateReceipt, QueueError> {
        let hidden_for = check_visibility_allow_zero(visibility_timeout)?;

        let mut storage = self.storage.write().await;
        let queue_state = existing_queue(&mut storage, queue)?;

        let message = queue_state
            .find_leased(id, receipt)
            .ok_or_else(|| QueueError::MessageNotFound {
                message_id: id.to_string(),
            })?;

        if let Some(body) = body {
            message.body = body.to_string();
        }
        message.receipt = PopReceipt::generate();
        message.next_visible_at = Utc::now() + hidden_for;

        Ok(UpdateReceipt {
            receipt: message.receipt.clone(),
            next_visible_at: message.next_visible_at,
        })
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::InMemory
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn existing_queue<'a>(
    storage: &'a mut QueueStorage,
    queue: &QueueName,
) -> Result<&'a mut InMemoryQueue, QueueError> {
    storage.queues.get_mut(queue).ok_or_else(|| {
        provider_error(
            StatusCode::NOT_FOUND,
            "QueueNotFound",
            format!("The queue '{}' does not exist.", queue),
        )
    })
}

fn check_batch_size(max_messages: u32) -> Result<(), QueueError> {
    if max_messages == 0 || max_messages > MAX_BATCH_SIZE {
        return Err(provider_error(
            StatusCode::BAD_REQUEST,
            "OutOfRangeQueryParameterValue",
            format!(
                "numofmessages must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, max_messages
            ),
        ));
    }
    Ok(())
}

/// Receive requires a visibility timeout of at least one second
fn check_visibility(timeout: Duration) -> Result<chrono::Duration, QueueError> {
    if timeout.as_secs() == 0 {
        return Err(provider_error(
            StatusCode::BAD_REQUEST,
            "OutOfRangeQueryParameterValue",
            "visibilitytimeout must be at least 1 second".to_string(),
        ));
    }
    check_visibility_allow_zero(timeout)
}

fn check_visibility_allow_zero(timeout: Duration) -> Result<chrono::Duration, QueueError> {
    if timeout.as_secs() > u64::from(MAX_VISIBILITY_TIMEOUT_SECS) {
        return Err(provider_error(
            StatusCode::BAD_REQUEST,
            "OutOfRangeQueryParameterValue",
            format!(
                "visibilitytimeout must not exceed {} seconds",
                MAX_VISIBILITY_TIMEOUT_SECS
            ),
        ));
    }
    Ok(chrono::Duration::seconds(timeout.as_secs() as i64))
}

fn provider_error(status: StatusCode, code: &str, message: String) -> QueueError {
    QueueError::Provider {
        provider: ProviderType::InMemory.to_string(),
        code: code.to_string(),
        status: status.as_u16(),
        message,
    }
}
