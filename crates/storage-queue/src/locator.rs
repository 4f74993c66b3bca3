//! Id-targeted mutation of messages.
//!
//! The storage service can only delete or update a message given its current
//! pop receipt, which is obtained by leasing the message. To act on a message
//! known only by id, one batch of messages is leased and scanned in backend
//! order:
//!
//! 1. a message with the target id gets the requested mutation, using the
//!    receipt from the lease, and the scan stops;
//! 2. every message before it is released again immediately (visibility zero,
//!    content rewritten unchanged);
//! 3. if no message matches, the scan reports no match.
//!
//! A backend failure aborts the scan. Messages released before the failure
//! stay released; the remainder of the batch stays hidden until its lease
//! expires.

use crate::accessor::QueueHandle;
use crate::backend::LeasedMessage;
use crate::error::QueueError;
use crate::message::{MessageId, OperationResult, QueueMessageReceipt};
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

#[cfg(test)]
#[path = "locator_tests.rs"]
mod tests;

/// Lease one batch, find `target` in it and replace its content
///
/// The updated message is visible again. On a match the result carries the
/// receipt issued by the update.
pub async fn update_by_id(
    handle: &QueueHandle,
    target: &MessageId,
    body: &str,
) -> Result<OperationResult, QueueError> {
    let updated = scan(handle, target, |message: LeasedMessage| async move {
        let update = handle
            .update(&message.id, &message.receipt, Some(body), Duration::ZERO)
            .await?;
        Ok::<_, QueueError>(QueueMessageReceipt::new(message.id, update.receipt))
    })
    .await?;

    Ok(match updated {
        Some(receipt) => OperationResult::succeeded(receipt),
        None => OperationResult::no_match(),
    })
}

/// Lease one batch, find `target` in it and delete it
///
/// Returns `true` only when the service confirmed the delete.
pub async fn delete_by_id(handle: &QueueHandle, target: &MessageId) -> Result<bool, QueueError> {
    let status = scan(handle, target, |message: LeasedMessage| async move {
        handle.delete(&message.id, &message.receipt).await
    })
    .await?;

    Ok(status == Some(StatusCode::NO_CONTENT))
}

/// Run the scan, handing the matched message to `apply`
///
/// Returns `None` when no leased message carried the target id.
async fn scan<T, F, Fut>(
    handle: &QueueHandle,
    target: &MessageId,
    apply: F,
) -> Result<Option<T>, QueueError>
where
    F: FnOnce(LeasedMessage) -> Fut,
    Fut: Future<Output = Result<T, QueueError>>,
{
    let batch = handle.receive(handle.max_batch_size()).await?;
    let leased = batch.len();

    let mut matched = None;
    let mut released = 0usize;

    for message in batch {
        if &message.id == target {
            matched = Some(message);
            break;
        }

        // Release the non-matching message; its new receipt is not needed
        handle
            .update(
                &message.id,
                &message.receipt,
                Some(message.body.as_str()),
                Duration::ZERO,
            )
            .await?;
        released += 1;
    }

    debug!(
        queue = %handle.name(),
        message_id = %target,
        leased,
        released,
        matched = matched.is_some(),
        "Message scan finished"
    );

    match matched {
        Some(message) => apply(message).await.map(Some),
        None => Ok(None),
    }
}
