//! Tests for queue handle resolution.

use super::*;
use crate::providers::InMemoryProvider;
use crate::test_support::RecordingBackend;

const TIMEOUT: Duration = Duration::from_secs(5);
const LEASE: Duration = Duration::from_secs(30);

fn queue(name: &str) -> QueueName {
    QueueName::new(name).unwrap()
}

fn accessor(backend: RecordingBackend, auto_create: bool) -> QueueAccessor {
    QueueAccessor::new(Arc::new(backend), auto_create, TIMEOUT, LEASE)
}

mod resolution_tests {
    use super::*;

    /// Verify that an existing queue resolves without being created.
    #[tokio::test]
    async fn test_existing_queue_resolves() {
        let provider = InMemoryProvider::new();
        provider
            .create_queue_if_not_exists(&queue("orders"))
            .await
            .unwrap();
        let backend = RecordingBackend::new(provider);

        let handle = accessor(backend.clone(), false)
            .queue_handle(&queue("orders"))
            .await
            .unwrap();

        assert_eq!(handle.name().as_str(), "orders");
        assert_eq!(backend.recorded().exists_calls, 1);
        assert_eq!(backend.recorded().create_calls, 0);
    }

    /// Verify that a missing queue fails when auto-create is disabled.
    #[tokio::test]
    async fn test_missing_queue_without_auto_create() {
        let backend = RecordingBackend::new(InMemoryProvider::new());

        let error = accessor(backend.clone(), false)
            .queue_handle(&queue("orders"))
            .await
            .unwrap_err();

        match &error {
            QueueError::QueueNotFound {
                queue_name,
                message,
            } => {
                assert_eq!(queue_name, "orders");
                assert!(message.contains("auto_create_queues"));
            }
            other => panic!("Expected QueueNotFound, got {:?}", other),
        }
        assert_eq!(backend.recorded().create_calls, 0);
    }

    /// Verify that a missing queue is created when auto-create is enabled.
    #[tokio::test]
    async fn test_missing_queue_with_auto_create() {
        let provider = InMemoryProvider::new();
        let backend = RecordingBackend::new(provider.clone());

        accessor(backend.clone(), true)
            .queue_handle(&queue("orders"))
            .await
            .unwrap();

        assert!(provider.queue_exists(&queue("orders")).await.unwrap());
        assert_eq!(backend.recorded().create_calls, 1);
    }

    /// Verify that nothing is cached between resolutions.
    #[tokio::test]
    async fn test_every_resolution_checks_existence() {
        let backend = RecordingBackend::new(InMemoryProvider::new());
        let accessor = accessor(backend.clone(), true);

        accessor.queue_handle(&queue("orders")).await.unwrap();
        accessor.queue_handle(&queue("orders")).await.unwrap();

        let recorded = backend.recorded();
        assert_eq!(recorded.exists_calls, 2);
        assert_eq!(recorded.create_calls, 1);
    }
}

mod timeout_tests {
    use super::*;

    /// Verify that a slow backend round trip ends in a timeout error.
    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let backend =
            RecordingBackend::new(InMemoryProvider::new()).with_delay(Duration::from_secs(10));
        let accessor = QueueAccessor::new(
            Arc::new(backend),
            true,
            Duration::from_millis(20),
            LEASE,
        );

        let error = accessor.queue_handle(&queue("orders")).await.unwrap_err();

        match error {
            QueueError::Timeout { duration } => {
                assert_eq!(duration, Duration::from_millis(20));
            }
            other => panic!("Expected timeout, got {:?}", other),
        }
    }
}

mod handle_tests {
    use super::*;

    /// Verify that receive uses the configured visibility timeout.
    #[tokio::test]
    async fn test_receive_uses_configured_lease() {
        let accessor = accessor(RecordingBackend::new(InMemoryProvider::new()), true);
        let handle = accessor.queue_handle(&queue("orders")).await.unwrap();
        handle.send("hello").await.unwrap();

        let leased = handle.receive(handle.max_batch_size()).await.unwrap();

        assert_eq!(leased.len(), 1);
        assert_eq!(handle.visibility_timeout(), LEASE);
        assert!(leased[0].next_visible_at > chrono::Utc::now());
    }

    /// Verify the handle passes calls through to the backend.
    #[tokio::test]
    async fn test_handle_round_trip() {
        let accessor = accessor(RecordingBackend::new(InMemoryProvider::new()), true);
        let handle = accessor.queue_handle(&queue("orders")).await.unwrap();

        handle.send("hello").await.unwrap();
        let leased = handle.receive(1).await.unwrap();
        let updated = handle
            .update(&leased[0].id, &leased[0].receipt, Some("bye"), Duration::ZERO)
            .await
            .unwrap();
        let peeked = handle.peek(32).await.unwrap();
        let status = handle.delete(&leased[0].id, &updated.receipt).await.unwrap();

        assert_eq!(peeked[0].body, "bye");
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(accessor.provider_type(), ProviderType::InMemory);
    }
}
