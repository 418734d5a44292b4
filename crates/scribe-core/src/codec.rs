//! Cache codec: entity ↔ structured record.
//!
//! The codec maps entities to JSON records keyed by field name, never by
//! memory layout. The schema is:
//!
//! | Entity | Field | Required |
//! |--------|-------|----------|
//! | Parameter | `argumentLabel`, `name`, `typeName` | yes |
//! | Parameter | `type` | no (nullable back-reference) |
//! | Method | `selectorName`, `parameters`, `returnTypeName`, `accessLevel` | yes |
//! | Method | `isStatic`, `isClass`, `isFailableInitializer`, `annotations` | yes |
//! | Method | `returnType` | no (nullable back-reference) |
//!
//! A required field that is missing or has the wrong shape fails the whole
//! record: decoding never substitutes a default, because a partially rebuilt
//! declaration could make a changed declaration look unchanged. Unknown
//! fields are ignored so newer writers stay readable. Fields added to the
//! schema later must be `#[serde(default)]` so older caches keep decoding.
//!
//! Container layout (file header, versioning, storage) is the caller's
//! concern; this module only defines the per-entity record.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::annotations::Annotations;
use crate::error::{DecodeError, DecodeResult, EntityKind};
use crate::method::{Method, Parameter};
use crate::resolve::{TypeId, TypeSlot};
use crate::types::{AccessLevel, TypeName};

// ============================================================================
// CacheCodec
// ============================================================================

/// Entities that can be persisted in the model cache.
pub trait CacheCodec: Sized {
    /// Encode into the structured record form.
    fn encode(&self) -> Value;

    /// Decode a record, failing on any missing or malformed required field.
    fn decode(record: &Value) -> DecodeResult<Self>;

    /// Decode a record, yielding `None` on failure.
    ///
    /// This is the form the cache-consuming pipeline uses: `None` means
    /// "cache miss for this declaration".
    fn try_decode(record: &Value) -> Option<Self> {
        match Self::decode(record) {
            Ok(entity) => Some(entity),
            Err(err) => {
                debug!("dropping cached {} record: {}", err.entity(), err);
                None
            }
        }
    }

    /// Encode to bytes.
    fn encode_to_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&self.encode())
    }

    /// Decode from bytes produced by [`CacheCodec::encode_to_vec`].
    fn decode_from_slice(bytes: &[u8]) -> DecodeResult<Self>;
}

// ============================================================================
// Records
// ============================================================================

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParameterRecord {
    argument_label: String,
    name: String,
    type_name: TypeName,
    #[serde(rename = "type", default)]
    resolved_type: Option<TypeId>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MethodRecord {
    selector_name: String,
    parameters: Vec<ParameterRecord>,
    return_type_name: TypeName,
    #[serde(default)]
    return_type: Option<TypeId>,
    access_level: AccessLevel,
    is_static: bool,
    is_class: bool,
    is_failable_initializer: bool,
    annotations: Annotations,
}

impl From<&Parameter> for ParameterRecord {
    fn from(param: &Parameter) -> Self {
        ParameterRecord {
            argument_label: param.argument_label().to_string(),
            name: param.name().to_string(),
            type_name: param.type_name().clone(),
            resolved_type: param.resolved_type(),
        }
    }
}

impl From<&Method> for MethodRecord {
    fn from(method: &Method) -> Self {
        MethodRecord {
            selector_name: method.selector_name().to_string(),
            parameters: method.parameters().iter().map(ParameterRecord::from).collect(),
            return_type_name: method.return_type_name().clone(),
            return_type: method.return_type(),
            access_level: method.access_level(),
            is_static: method.is_static(),
            is_class: method.is_class(),
            is_failable_initializer: method.is_failable_initializer(),
            annotations: method.annotations().clone(),
        }
    }
}

impl ParameterRecord {
    /// Validate and build the entity. `path` prefixes field names in errors.
    fn into_parameter(self, entity: EntityKind, path: &str) -> DecodeResult<Parameter> {
        if self.name.is_empty() {
            return Err(DecodeError::empty_field(entity, format!("{}name", path)));
        }
        Ok(
            Parameter::labeled(self.argument_label, self.name, self.type_name)
                .with_type_slot(TypeSlot::restored(self.resolved_type)),
        )
    }
}

impl MethodRecord {
    fn into_method(self) -> DecodeResult<Method> {
        if self.selector_name.is_empty() {
            return Err(DecodeError::empty_field(EntityKind::Method, "selectorName"));
        }
        let parameters = self
            .parameters
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                record.into_parameter(EntityKind::Method, &format!("parameters[{}].", index))
            })
            .collect::<DecodeResult<Vec<_>>>()?;

        Ok(Method::new(self.selector_name)
            .with_parameters(parameters)
            .with_return_type_name(self.return_type_name)
            .with_return_type_slot(TypeSlot::restored(self.return_type))
            .with_access_level(self.access_level)
            .with_static(self.is_static)
            .with_class(self.is_class)
            .with_failable_initializer(self.is_failable_initializer)
            .with_annotations(self.annotations))
    }
}

/// Records only hold strings, booleans, integers and string-keyed maps,
/// so conversion to a `Value` cannot fail.
fn record_to_value<T: Serialize>(record: &T) -> Value {
    serde_json::to_value(record).unwrap_or(Value::Null)
}

// ============================================================================
// Codec Implementations
// ============================================================================

impl CacheCodec for Parameter {
    fn encode(&self) -> Value {
        record_to_value(&ParameterRecord::from(self))
    }

    fn decode(record: &Value) -> DecodeResult<Self> {
        ParameterRecord::deserialize(record)
            .map_err(|e| DecodeError::malformed(EntityKind::Parameter, e))?
            .into_parameter(EntityKind::Parameter, "")
    }

    fn decode_from_slice(bytes: &[u8]) -> DecodeResult<Self> {
        serde_json::from_slice::<ParameterRecord>(bytes)
            .map_err(|e| DecodeError::malformed(EntityKind::Parameter, e))?
            .into_parameter(EntityKind::Parameter, "")
    }
}

impl CacheCodec for Method {
    fn encode(&self) -> Value {
        record_to_value(&MethodRecord::from(self))
    }

    fn decode(record: &Value) -> DecodeResult<Self> {
        MethodRecord::deserialize(record)
            .map_err(|e| DecodeError::malformed(EntityKind::Method, e))?
            .into_method()
    }

    fn decode_from_slice(bytes: &[u8]) -> DecodeResult<Self> {
        serde_json::from_slice::<MethodRecord>(bytes)
            .map_err(|e| DecodeError::malformed(EntityKind::Method, e))?
            .into_method()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::ParserData;
    use serde_json::json;

    fn sample() -> Method {
        let mut annotations = Annotations::new();
        annotations.mark("skipEquality").unwrap();
        annotations.insert("name", "value").unwrap();
        annotations.insert("count", 2).unwrap();
        Method::new("init(with:count:)")
            .with_parameters([
                Parameter::labeled("with", "value", "String?"),
                Parameter::new("count", "Int"),
            ])
            .with_return_type_name("Foo")
            .with_access_level(AccessLevel::Public)
            .with_failable_initializer(true)
            .with_annotations(annotations)
    }

    fn sample_record() -> Value {
        json!({
            "selectorName": "init(with:count:)",
            "parameters": [
                {"argumentLabel": "with", "name": "value", "typeName": "String?", "type": null},
                {"argumentLabel": "count", "name": "count", "typeName": "Int", "type": null}
            ],
            "returnTypeName": "Foo",
            "returnType": null,
            "accessLevel": "public",
            "isStatic": false,
            "isClass": false,
            "isFailableInitializer": true,
            "annotations": {"skipEquality": true, "name": "value", "count": 2}
        })
    }

    fn without(record: &Value, field: &str) -> Value {
        let mut record = record.clone();
        record.as_object_mut().unwrap().remove(field);
        record
    }

    mod encode_tests {
        use super::*;

        #[test]
        fn method_encodes_to_schema() {
            assert_eq!(sample().encode(), sample_record());
        }

        #[test]
        fn parser_data_is_not_encoded() {
            let method = sample().with_parser_data(ParserData::new(String::from("hidden text")));
            let encoded = method.encode();
            assert_eq!(encoded, sample_record());
            assert!(!encoded.to_string().contains("hidden"));
        }

        #[test]
        fn back_references_are_encoded_when_present() {
            let mut method = sample();
            method.resolve_return_type(TypeId::new(4)).unwrap();
            method.parameters_mut()[1].resolve_type(TypeId::new(7)).unwrap();

            let encoded = method.encode();
            assert_eq!(encoded["returnType"], json!(4));
            assert_eq!(encoded["parameters"][1]["type"], json!(7));
            assert_eq!(encoded["parameters"][0]["type"], Value::Null);
        }
    }

    mod round_trip_tests {
        use super::*;

        #[test]
        fn method_round_trips() {
            let method = sample();
            let decoded = Method::decode(&method.encode()).unwrap();
            assert_eq!(decoded, method);
            assert!(decoded.is_optional_return_type());
            assert_eq!(decoded.short_name(), "init");
        }

        #[test]
        fn round_trip_through_bytes() {
            let method = sample().with_static(true).with_class(true);
            let bytes = method.encode_to_vec().unwrap();
            let decoded = Method::decode_from_slice(&bytes).unwrap();
            assert_eq!(decoded, method);
        }

        #[test]
        fn resolved_back_references_survive() {
            let mut method = sample();
            method.resolve_return_type(TypeId::new(4)).unwrap();
            method.parameters_mut()[0].resolve_type(TypeId::new(9)).unwrap();

            let decoded = Method::decode(&method.encode()).unwrap();
            assert_eq!(decoded.return_type(), Some(TypeId::new(4)));
            assert_eq!(decoded.parameters()[0].resolved_type(), Some(TypeId::new(9)));
            assert!(decoded.parameters()[1].resolved_type().is_none());
        }

        #[test]
        fn parameter_round_trips() {
            let param = Parameter::labeled("_", "value", "[String: Int]");
            assert_eq!(Parameter::decode(&param.encode()).unwrap(), param);
        }

        #[test]
        fn minimal_method_round_trips() {
            let method = Method::new("run");
            let decoded = Method::decode(&method.encode()).unwrap();
            assert_eq!(decoded, method);
            assert!(decoded.return_type_name().is_void());
        }
    }

    mod decode_tests {
        use super::*;

        #[test]
        fn missing_selector_name_yields_no_method() {
            let record = without(&sample_record(), "selectorName");
            let err = Method::decode(&record).unwrap_err();
            assert!(err.to_string().contains("selectorName"));
            assert!(Method::try_decode(&record).is_none());
        }

        #[test]
        fn empty_selector_name_yields_no_method() {
            let mut record = sample_record();
            record["selectorName"] = json!("");
            let err = Method::decode(&record).unwrap_err();
            assert!(matches!(err, DecodeError::EmptyField { ref field, .. } if field == "selectorName"));
        }

        #[test]
        fn every_required_field_is_required() {
            for field in [
                "selectorName",
                "parameters",
                "returnTypeName",
                "accessLevel",
                "isStatic",
                "isClass",
                "isFailableInitializer",
                "annotations",
            ] {
                let record = without(&sample_record(), field);
                assert!(
                    Method::decode(&record).is_err(),
                    "decoding without `{}` should fail",
                    field
                );
            }
        }

        #[test]
        fn missing_back_references_decode_as_absent() {
            let mut record = without(&sample_record(), "returnType");
            for param in record["parameters"].as_array_mut().unwrap() {
                param.as_object_mut().unwrap().remove("type");
            }
            let decoded = Method::decode(&record).unwrap();
            assert!(decoded.return_type().is_none());
            assert!(decoded.parameters().iter().all(|p| p.resolved_type().is_none()));
            assert_eq!(decoded, sample());
        }

        #[test]
        fn wrong_shape_fails() {
            let mut record = sample_record();
            record["isStatic"] = json!("yes");
            assert!(Method::decode(&record).is_err());

            let mut record = sample_record();
            record["accessLevel"] = json!("protected");
            assert!(Method::decode(&record).is_err());

            let mut record = sample_record();
            record["parameters"] = json!({"not": "a list"});
            assert!(Method::decode(&record).is_err());

            assert!(Method::decode(&json!("not an object")).is_err());
        }

        #[test]
        fn malformed_parameter_fails_the_method() {
            let mut record = sample_record();
            record["parameters"][1]
                .as_object_mut()
                .unwrap()
                .remove("typeName");
            let err = Method::decode(&record).unwrap_err();
            assert_eq!(err.entity(), EntityKind::Method);
        }

        #[test]
        fn empty_parameter_name_fails_the_method() {
            let mut record = sample_record();
            record["parameters"][1]["name"] = json!("");
            let err = Method::decode(&record).unwrap_err();
            match err {
                DecodeError::EmptyField { entity, field } => {
                    assert_eq!(entity, EntityKind::Method);
                    assert_eq!(field, "parameters[1].name");
                }
                other => panic!("unexpected error: {}", other),
            }
        }

        #[test]
        fn unknown_fields_are_ignored() {
            let mut record = sample_record();
            record["addedInALaterVersion"] = json!({"anything": 1});
            assert_eq!(Method::decode(&record).unwrap(), sample());
        }

        #[test]
        fn duplicate_annotation_keys_fail_the_record() {
            let bytes = br#"{
                "selectorName": "f()", "parameters": [], "returnTypeName": "Void",
                "accessLevel": "internal", "isStatic": false, "isClass": false,
                "isFailableInitializer": false,
                "annotations": {"a": 1, "a": 2}
            }"#;
            assert!(Method::decode_from_slice(bytes).is_err());
        }

        #[test]
        fn parameter_errors_are_parameter_kind() {
            let err = Parameter::decode(&json!({"name": "x", "typeName": "Int"})).unwrap_err();
            assert_eq!(err.entity(), EntityKind::Parameter);
            assert!(err.to_string().contains("argumentLabel"));

            let err = Parameter::decode(&json!({"argumentLabel": "x", "name": "", "typeName": "Int"}))
                .unwrap_err();
            assert_eq!(err.to_string(), "parameter record has an empty `name`");
        }
    }
}
