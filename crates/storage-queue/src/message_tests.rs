//! Tests for message types and identifiers.

use super::*;

mod identifier_tests {
    use super::*;

    #[test]
    fn test_queue_name_rejects_blank_values() {
        for blank in ["", "   ", "\t"] {
            let error = QueueName::new(blank).unwrap_err();
            assert_eq!(error.field(), "queue_name");
        }
    }

    #[test]
    fn test_queue_name_accepts_service_names() {
        let name = QueueName::new("orders").unwrap();
        assert_eq!(name.as_str(), "orders");
        assert_eq!(name.to_string(), "orders");

        let parsed: QueueName = "order-events".parse().unwrap();
        assert_eq!(parsed.as_str(), "order-events");
    }

    #[test]
    fn test_message_id_validation() {
        assert!(MessageId::new("").is_err());
        assert_eq!(MessageId::new(" ").unwrap_err().field(), "message_id");
        assert_eq!(MessageId::new("abc").unwrap().as_str(), "abc");
    }

    #[test]
    fn test_generated_identifiers_are_unique() {
        assert_ne!(MessageId::generate(), MessageId::generate());
        assert_ne!(PopReceipt::generate(), PopReceipt::generate());
    }

    #[test]
    fn test_pop_receipt_rejects_blank() {
        assert_eq!(PopReceipt::new("").unwrap_err().field(), "receipt");
    }

    /// Identifiers deserialize through the same validation as `new`
    #[test]
    fn test_identifier_deserialization_is_validated() {
        let ok: Result<MessageId, _> = serde_json::from_str("\"id-1\"");
        assert!(ok.is_ok());

        let blank: Result<QueueName, _> = serde_json::from_str("\"  \"");
        assert!(blank.is_err());
    }
}

mod message_tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct OrderPlaced {
        order: u32,
    }

    #[test]
    fn test_queue_message_receipt_projection() {
        let message = QueueMessage {
            id: MessageId::new("id-1").unwrap(),
            receipt: PopReceipt::new("r-1").unwrap(),
            body: "A".to_string(),
        };

        let receipt = message.receipt();
        assert_eq!(receipt.id.as_str(), "id-1");
        assert_eq!(receipt.receipt.as_str(), "r-1");
    }

    #[test]
    fn test_typed_message_reports_payload_type_name() {
        let message = TypedQueueMessage {
            id: MessageId::new("id-1").unwrap(),
            receipt: PopReceipt::new("r-1").unwrap(),
            body: OrderPlaced { order: 7 },
        };

        assert_eq!(message.data_type(), "OrderPlaced");
        assert_eq!(message.body.order, 7);
    }

    #[test]
    fn test_typed_message_type_name_strips_generics() {
        let message = TypedQueueMessage {
            id: MessageId::new("id-1").unwrap(),
            receipt: PopReceipt::new("r-1").unwrap(),
            body: vec![1u8],
        };

        assert_eq!(message.data_type(), "Vec");
    }
}

mod operation_result_tests {
    use super::*;

    #[test]
    fn test_succeeded_carries_receipt() {
        let receipt = QueueMessageReceipt::new(
            MessageId::new("id-1").unwrap(),
            PopReceipt::new("r-2").unwrap(),
        );

        let result = OperationResult::succeeded(receipt.clone());

        assert!(result.is_successful());
        assert!(result.details().is_none());
        assert_eq!(result.receipt(), Some(&receipt));
        assert_eq!(result.into_receipt(), Some(receipt));
    }

    #[test]
    fn test_no_match_has_details_and_no_receipt() {
        let result = OperationResult::no_match();

        assert!(!result.is_successful());
        assert_eq!(result.details(), Some("No message matched the specified id."));
        assert!(result.receipt().is_none());
    }
}
