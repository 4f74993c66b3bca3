//! Tests for message serializers.

use super::*;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Order {
    id: u32,
    customer: String,
    note: Option<String>,
}

fn sample_order() -> Order {
    Order {
        id: 42,
        customer: "contoso".to_string(),
        note: None,
    }
}

mod reflective_json_tests {
    use super::*;

    #[test]
    fn test_round_trip_typed_item() {
        let serializer = ReflectiveJsonSerializer::default();

        let text = serializer.serialize_item(&sample_order(), None).unwrap();
        let back: Order = serializer.deserialize_item(&text, None).unwrap();

        assert_eq!(back, sample_order());
    }

    #[test]
    fn test_default_output_is_compact_and_keeps_nulls() {
        let serializer = ReflectiveJsonSerializer::default();

        let text = serializer.serialize_item(&sample_order(), None).unwrap();

        assert!(!text.contains('\n'));
        assert!(text.contains("\"note\":null"));
    }

    #[test]
    fn test_instance_settings_drop_nulls_and_indent() {
        let serializer = ReflectiveJsonSerializer::new(Some(ReflectiveJsonSettings {
            indented: true,
            ignore_null_values: true,
        }));

        let text = serializer.serialize_item(&sample_order(), None).unwrap();

        assert!(text.contains('\n'));
        assert!(!text.contains("note"));

        // Missing optional members still deserialize
        let back: Order = serializer.deserialize_item(&text, None).unwrap();
        assert_eq!(back, sample_order());
    }

    /// Per-call settings replace the instance defaults
    #[test]
    fn test_per_call_settings_override_instance_settings() {
        let serializer = ReflectiveJsonSerializer::default();
        let overrides = SerializerSettings::ReflectiveJson(ReflectiveJsonSettings {
            indented: false,
            ignore_null_values: true,
        });

        let text = serializer
            .serialize_item(&sample_order(), Some(&overrides))
            .unwrap();

        assert!(!text.contains("note"));
    }

    /// Settings meant for another serializer fall back to the instance defaults
    #[test]
    fn test_foreign_settings_are_ignored() {
        let serializer = ReflectiveJsonSerializer::default();
        let foreign = SerializerSettings::SchemaJson(SchemaJsonSettings {
            write_indented: true,
            ignore_null_values: true,
            max_depth: 1,
        });

        let text = serializer
            .serialize_item(&sample_order(), Some(&foreign))
            .unwrap();

        assert!(!text.contains('\n'));
        assert!(text.contains("\"note\":null"));
    }

    #[test]
    fn test_nested_nulls_removed_but_array_nulls_kept() {
        let serializer = ReflectiveJsonSerializer::new(Some(ReflectiveJsonSettings {
            indented: false,
            ignore_null_values: true,
        }));
        let value = json!({"a": {"b": null, "c": 1}, "list": [null, 2]});

        let text = serializer.serialize_value(&value, None).unwrap();
        let back: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(back, json!({"a": {"c": 1}, "list": [null, 2]}));
    }

    #[test]
    fn test_invalid_text_fails_to_deserialize() {
        let serializer = ReflectiveJsonSerializer::default();

        let result: Result<Order, _> = serializer.deserialize_item("not json", None);

        assert!(matches!(result, Err(SerializationError::Json(_))));
    }

    #[test]
    fn test_wrong_shape_fails_to_deserialize() {
        let serializer = ReflectiveJsonSerializer::default();

        let result: Result<Order, _> = serializer.deserialize_item("{\"id\":\"x\"}", None);

        assert!(result.is_err());
    }
}

mod schema_json_tests {
    use super::*;

    fn nested(levels: usize) -> Value {
        let mut value = json!(1);
        for _ in 0..levels {
            value = json!({ "inner": value });
        }
        value
    }

    #[test]
    fn test_round_trip_typed_item() {
        let serializer = SchemaJsonSerializer::default();

        let text = serializer.serialize_item(&sample_order(), None).unwrap();
        let back: Order = serializer.deserialize_item(&text, None).unwrap();

        assert_eq!(back, sample_order());
    }

    #[test]
    fn test_default_max_depth() {
        assert_eq!(SchemaJsonSettings::default().max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_serialize_rejects_documents_deeper_than_max_depth() {
        let serializer = SchemaJsonSerializer::new(Some(SchemaJsonSettings {
            max_depth: 3,
            ..Default::default()
        }));

        assert!(serializer.serialize_value(&nested(3), None).is_ok());

        let error = serializer.serialize_value(&nested(4), None).unwrap_err();
        assert!(matches!(
            error,
            SerializationError::DepthExceeded {
                depth: 4,
                max_depth: 3
            }
        ));
    }

    #[test]
    fn test_deserialize_rejects_documents_deeper_than_max_depth() {
        let serializer = SchemaJsonSerializer::new(Some(SchemaJsonSettings {
            max_depth: 2,
            ..Default::default()
        }));
        let text = serde_json::to_string(&nested(3)).unwrap();

        let result = serializer.deserialize_value(&text, None);

        assert!(matches!(
            result,
            Err(SerializationError::DepthExceeded { .. })
        ));
    }

    #[test]
    fn test_per_call_settings_override_depth() {
        let serializer = SchemaJsonSerializer::new(Some(SchemaJsonSettings {
            max_depth: 1,
            ..Default::default()
        }));
        let overrides = SerializerSettings::SchemaJson(SchemaJsonSettings::default());

        assert!(serializer
            .serialize_value(&nested(5), Some(&overrides))
            .is_ok());
    }

    #[test]
    fn test_write_indented() {
        let serializer = SchemaJsonSerializer::new(Some(SchemaJsonSettings {
            write_indented: true,
            ..Default::default()
        }));

        let text = serializer.serialize_item(&sample_order(), None).unwrap();

        assert!(text.contains('\n'));
    }
}

mod trait_object_tests {
    use super::*;

    /// Serializer that upper-cases string payloads, standing in for a
    /// caller-supplied implementation
    struct ShoutingSerializer;

    impl MessageSerializer for ShoutingSerializer {
        fn serialize_value(
            &self,
            value: &Value,
            _settings: Option<&SerializerSettings>,
        ) -> Result<String, SerializationError> {
            match value {
                Value::String(s) => Ok(s.to_uppercase()),
                other => Ok(other.to_string()),
            }
        }

        fn deserialize_value(
            &self,
            text: &str,
            _settings: Option<&SerializerSettings>,
        ) -> Result<Value, SerializationError> {
            Ok(Value::String(text.to_lowercase()))
        }
    }

    #[test]
    fn test_typed_helpers_work_through_trait_objects() {
        let serializer: Arc<dyn MessageSerializer> = Arc::new(ShoutingSerializer);

        let text = serializer.serialize_item("hello", None).unwrap();
        assert_eq!(text, "HELLO");

        let back: String = serializer.deserialize_item(&text, None).unwrap();
        assert_eq!(back, "hello");
    }
}
