//! Backend wrapper used by unit tests to observe and disturb backend calls.

use crate::backend::{
    LeasedMessage, PeekedMessage, ProviderType, QueueBackend, SentMessage, UpdateReceipt,
};
use crate::error::QueueError;
use crate::message::{MessageId, PopReceipt, QueueName};
use crate::providers::InMemoryProvider;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) struct RecordedUpdate {
    pub id: MessageId,
    pub body: Option<String>,
    pub visibility_timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Recorded {
    pub exists_calls: usize,
    pub create_calls: usize,
    pub receive_calls: usize,
    pub deletes: Vec<MessageId>,
    pub updates: Vec<RecordedUpdate>,
}

/// In-memory backend that records calls and can inject failures or delays
#[derive(Clone, Default)]
pub(crate) struct RecordingBackend {
    inner: InMemoryProvider,
    recorded: Arc<Mutex<Recorded>>,
    fail_update_on_call: Option<usize>,
    delay: Option<Duration>,
}

impl RecordingBackend {
    pub fn new(inner: InMemoryProvider) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    /// Fail the n-th update call (1-based) with a server error
    pub fn failing_update_on_call(mut self, call: usize) -> Self {
        self.fail_update_on_call = Some(call);
        self
    }

    /// Delay every call before it reaches the backend
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn recorded(&self) -> Recorded {
        self.recorded.lock().unwrap().clone()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl QueueBackend for RecordingBackend {
    async fn queue_exists(&self, queue: &QueueName) -> Result<bool, QueueError> {
        self.pause().await;
        self.recorded.lock().unwrap().exists_calls += 1;
        self.inner.queue_exists(queue).await
    }

    async fn create_queue_if_not_exists(&self, queue: &QueueName) -> Result<bool, QueueError> {
        self.pause().await;
        self.recorded.lock().unwrap().create_calls += 1;
        self.inner.create_queue_if_not_exists(queue).await
    }

    async fn send_message(
        &self,
        queue: &QueueName,
        text: &str,
    ) -> Result<SentMessage, QueueError> {
        self.pause().await;
        self.inner.send_message(queue, text).await
    }

    async fn peek_messages(
        &self,
        queue: &QueueName,
        max_messages: u32,
    ) -> Result<Vec<PeekedMessage>, QueueError> {
        self.pause().await;
        self.inner.peek_messages(queue, max_messages).await
    }

    async fn receive_messages(
        &self,
        queue: &QueueName,
        max_messages: u32,
        visibility_timeout: Duration,
    ) -> Result<Vec<LeasedMessage>, QueueError> {
        self.pause().await;
        self.recorded.lock().unwrap().receive_calls += 1;
        self.inner
            .receive_messages(queue, max_messages, visibility_timeout)
            .await
    }

    async fn delete_message(
        &self,
        queue: &QueueName,
        id: &MessageId,
        receipt: &PopReceipt,
    ) -> Result<StatusCode, QueueError> {
        self.pause().await;
        self.recorded.lock().unwrap().deletes.push(id.clone());
        self.inner.delete_message(queue, id, receipt).await
    }

    async fn update_message(
        &self,
        queue: &QueueName,
        id: &MessageId,
        receipt: &PopReceipt,
        body: Option<&str>,
        visibility_timeout: Duration,
    ) -> Result<UpdateReceipt, QueueError> {
        self.pause().await;
        let call = {
            let mut recorded = self.recorded.lock().unwrap();
            recorded.updates.push(RecordedUpdate {
                id: id.clone(),
                body: body.map(str::to_string),
                visibility_timeout,
            });
            recorded.updates.len()
        };

        if self.fail_update_on_call == Some(call) {
            return Err(QueueError::Provider {
                provider: ProviderType::InMemory.to_string(),
                code: "InternalError".to_string(),
                status: 500,
                message: "injected failure".to_string(),
            });
        }

        self.inner
            .update_message(queue, id, receipt, body, visibility_timeout)
            .await
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::InMemory
    }
}
