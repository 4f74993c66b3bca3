//! Message types for queue operations including core domain identifiers.

use crate::error::{require_non_blank, ValidationError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// Core Domain Identifiers
// ============================================================================

/// Validated queue name
///
/// Only blank names are rejected here; the backing service applies its own
/// naming rules and reports violations as operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QueueName(String);

impl QueueName {
    /// Create new queue name with validation
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        require_non_blank(&name, "queue_name")?;
        Ok(Self(name))
    }

    /// Get queue name as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for QueueName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<QueueName> for String {
    fn from(value: QueueName) -> Self {
        value.0
    }
}

/// Identifier the queue service assigns to a message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageId(String);

impl MessageId {
    /// Create message ID with validation
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        require_non_blank(&id, "message_id")?;
        Ok(Self(id))
    }

    /// Generate new random message ID
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for MessageId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MessageId> for String {
    fn from(value: MessageId) -> Self {
        value.0
    }
}

/// Opaque lease token proving current ownership of a message
///
/// Every mutation of a message (content update, visibility change, delete)
/// consumes the receipt it was made with and, where the message survives,
/// yields a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PopReceipt(String);

impl PopReceipt {
    /// Create pop receipt with validation
    pub fn new(receipt: impl Into<String>) -> Result<Self, ValidationError> {
        let receipt = receipt.into();
        require_non_blank(&receipt, "receipt")?;
        Ok(Self(receipt))
    }

    /// Generate new random pop receipt
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Get receipt as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PopReceipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for PopReceipt {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PopReceipt> for String {
    fn from(value: PopReceipt) -> Self {
        value.0
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// Identity of a message for its current lease
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessageReceipt {
    pub id: MessageId,
    pub receipt: PopReceipt,
}

impl QueueMessageReceipt {
    pub fn new(id: MessageId, receipt: PopReceipt) -> Self {
        Self { id, receipt }
    }
}

/// A message taken from the queue with its raw body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub id: MessageId,
    pub receipt: PopReceipt,
    pub body: String,
}

impl QueueMessage {
    /// Identity of the message at the time it was taken
    pub fn receipt(&self) -> QueueMessageReceipt {
        QueueMessageReceipt::new(self.id.clone(), self.receipt.clone())
    }
}

/// A message taken from the queue with its body deserialized into `T`
#[derive(Debug, Clone, PartialEq)]
pub struct TypedQueueMessage<T> {
    pub id: MessageId,
    pub receipt: PopReceipt,
    pub body: T,
}

impl<T> TypedQueueMessage<T> {
    /// Identity of the message at the time it was taken
    pub fn receipt(&self) -> QueueMessageReceipt {
        QueueMessageReceipt::new(self.id.clone(), self.receipt.clone())
    }

    /// Short name of the payload type
    pub fn data_type(&self) -> &'static str {
        let full = std::any::type_name::<T>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base)
    }
}

/// Outcome of an id-targeted update
///
/// A receipt is present exactly when the operation succeeded; it is the
/// receipt issued by the mutation, not the one the message was leased with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    is_successful: bool,
    details: Option<String>,
    receipt: Option<QueueMessageReceipt>,
}

impl OperationResult {
    /// Successful mutation carrying the new receipt
    pub fn succeeded(receipt: QueueMessageReceipt) -> Self {
        Self {
            is_successful: true,
            details: None,
            receipt: Some(receipt),
        }
    }

    /// No message in the scanned batch carried the requested id
    pub fn no_match() -> Self {
        Self::failed("No message matched the specified id.")
    }

    /// Unsuccessful outcome with a description
    pub fn failed(details: impl Into<String>) -> Self {
        Self {
            is_successful: false,
            details: Some(details.into()),
            receipt: None,
        }
    }

    pub fn is_successful(&self) -> bool {
        self.is_successful
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    pub fn receipt(&self) -> Option<&QueueMessageReceipt> {
        self.receipt.as_ref()
    }

    pub fn into_receipt(self) -> Option<QueueMessageReceipt> {
        self.receipt
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
