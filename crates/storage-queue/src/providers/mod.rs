//! Queue backend implementations.
//!
//! This module contains concrete implementations of the `QueueBackend` trait:
//! the Azure Queue Storage REST provider and an in-memory provider.

pub mod azure;
pub mod memory;

pub use azure::{AzureError, AzureQueueProvider};
pub use memory::InMemoryProvider;
