//! Field format descriptors.
//!
//! Two views of the same thing live here: the compact wire descriptor
//! (`{n, t}`) found in serialized payloads, and the typed [`FieldFormat`]
//! that adapters hand out from `format()` and accept in `add_field()`.

use crate::{error::Result, Error, FieldName};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type slot of a wire descriptor: either a plain type name or a nested
/// descriptor (`{"n": "Array", "t": "Object"}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldType {
    Name(String),
    Nested(Box<FieldDescriptor>),
}

impl From<&str> for FieldType {
    fn from(name: &str) -> Self {
        FieldType::Name(name.to_string())
    }
}

/// One entry of a wire field list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    #[serde(rename = "n")]
    pub name: FieldName,
    #[serde(rename = "t")]
    pub field_type: FieldType,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<FieldName>, field_type: impl Into<FieldType>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
        }
    }

    /// Kind described by this entry.
    pub fn kind(&self) -> FieldKind {
        FieldKind::from_field_type(&self.field_type)
    }
}

/// An ordered field list as carried in the `s` slot of a payload node.
pub type Format = Vec<FieldDescriptor>;

/// Parse a raw `s` value into a field list.
pub fn parse_format(raw: &Value) -> Result<Format> {
    serde_json::from_value(raw.clone()).map_err(|e| Error::InvalidFormat(e.to_string()))
}

/// Position of `name` in a field list.
pub fn position(format: &[FieldDescriptor], name: &str) -> Option<usize> {
    format.iter().position(|field| field.name == name)
}

/// Names of a field list, in order.
pub fn field_names(format: &[FieldDescriptor]) -> Vec<FieldName> {
    format.iter().map(|field| field.name.clone()).collect()
}

/// Semantic kind of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Boolean,
    Integer,
    Real,
    String,
    Object,
    Array(Box<FieldKind>),
    Record,
    RecordSet,
    /// Unknown or untyped
    Any,
}

impl FieldKind {
    /// Kind for a wire type name. Unknown names map to [`FieldKind::Any`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "Boolean" => FieldKind::Boolean,
            "Integer" => FieldKind::Integer,
            "Real" | "Double" | "Money" => FieldKind::Real,
            "String" | "Text" => FieldKind::String,
            "Object" => FieldKind::Object,
            "Array" => FieldKind::Array(Box::new(FieldKind::Any)),
            "Record" => FieldKind::Record,
            "RecordSet" => FieldKind::RecordSet,
            _ => FieldKind::Any,
        }
    }

    /// Kind for the type slot of a wire descriptor.
    pub fn from_field_type(field_type: &FieldType) -> Self {
        match field_type {
            FieldType::Name(name) => FieldKind::from_name(name),
            FieldType::Nested(inner) if inner.name == "Array" => {
                FieldKind::Array(Box::new(FieldKind::from_field_type(&inner.field_type)))
            }
            FieldType::Nested(inner) => FieldKind::from_name(&inner.name),
        }
    }

    /// Wire type slot for this kind.
    pub fn to_field_type(&self) -> FieldType {
        match self {
            FieldKind::Array(inner) => FieldType::Nested(Box::new(FieldDescriptor {
                name: "Array".to_string(),
                field_type: inner.to_field_type(),
            })),
            other => FieldType::Name(other.name().to_string()),
        }
    }

    /// Bare type name, without element kinds.
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Boolean => "Boolean",
            FieldKind::Integer => "Integer",
            FieldKind::Real => "Real",
            FieldKind::String => "String",
            FieldKind::Object => "Object",
            FieldKind::Array(_) => "Array",
            FieldKind::Record => "Record",
            FieldKind::RecordSet => "RecordSet",
            FieldKind::Any => "Any",
        }
    }

    /// Detect the kind of a plain JSON value.
    pub fn detect(value: &Value) -> Self {
        match value {
            Value::Null => FieldKind::Any,
            Value::Bool(_) => FieldKind::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => FieldKind::Integer,
            Value::Number(_) => FieldKind::Real,
            Value::String(_) => FieldKind::String,
            Value::Array(items) => {
                let inner = items
                    .iter()
                    .find(|item| !item.is_null())
                    .map(FieldKind::detect)
                    .unwrap_or(FieldKind::Any);
                FieldKind::Array(Box::new(inner))
            }
            Value::Object(obj) => match (obj.get("d"), obj.get("s")) {
                (Some(Value::Array(rows)), Some(Value::Array(_)))
                    if !rows.is_empty() && rows.iter().all(Value::is_array) =>
                {
                    FieldKind::RecordSet
                }
                (Some(Value::Array(_)), Some(_)) => FieldKind::Record,
                _ => FieldKind::Object,
            },
        }
    }

    /// Whether `value` can be stored in a field of this kind.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (FieldKind::Any, _) => true,
            (FieldKind::Boolean, v) => v.is_boolean(),
            (FieldKind::Integer, v) => v.is_i64() || v.is_u64(),
            (FieldKind::Real, v) => v.is_number(),
            (FieldKind::String, v) => v.is_string(),
            (FieldKind::Array(_), v) => v.is_array(),
            (FieldKind::Object | FieldKind::Record | FieldKind::RecordSet, v) => v.is_object(),
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::Array(inner) => write!(f, "Array<{}>", inner),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Typed format of one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFormat {
    /// Field name
    pub name: FieldName,
    /// Field kind
    pub kind: FieldKind,
    /// Value written into existing records when the field is added
    pub default_value: Value,
    /// Whether the field accepts null
    pub nullable: bool,
}

impl FieldFormat {
    /// A nullable field defaulting to null.
    pub fn nullable(name: impl Into<FieldName>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default_value: Value::Null,
            nullable: true,
        }
    }

    /// A non-null field with an explicit default.
    pub fn required(name: impl Into<FieldName>, kind: FieldKind, default_value: Value) -> Self {
        Self {
            name: name.into(),
            kind,
            default_value,
            nullable: false,
        }
    }

    /// Build from a wire descriptor.
    pub fn from_descriptor(descriptor: &FieldDescriptor) -> Self {
        Self::nullable(descriptor.name.clone(), descriptor.kind())
    }

    /// Wire descriptor for this field.
    pub fn descriptor(&self) -> FieldDescriptor {
        FieldDescriptor {
            name: self.name.clone(),
            field_type: self.kind.to_field_type(),
        }
    }

    /// Check that the default value fits the field before it is written anywhere.
    pub fn validate_default(&self) -> Result<()> {
        if self.default_value.is_null() && !self.nullable {
            return Err(Error::InvalidFormat(format!(
                "field '{}' is not nullable but has no default",
                self.name
            )));
        }
        if !self.kind.accepts(&self.default_value) {
            return Err(Error::InvalidFormat(format!(
                "default for field '{}' is not a valid {}",
                self.name, self.kind
            )));
        }
        Ok(())
    }
}

/// Lightweight positional descriptor handed out by `shared_format()`.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedFormat {
    pub name: FieldName,
    pub kind: FieldKind,
    /// Position among the view's fields
    pub index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_nested_descriptor() {
        let raw = json!([
            {"n": "@Parent", "t": "Integer"},
            {"n": "Children", "t": {"n": "Array", "t": "Object"}}
        ]);
        let format = parse_format(&raw).unwrap();

        assert_eq!(format.len(), 2);
        assert_eq!(format[0].kind(), FieldKind::Integer);
        assert_eq!(
            format[1].kind(),
            FieldKind::Array(Box::new(FieldKind::Object))
        );
        assert_eq!(serde_json::to_value(&format).unwrap(), raw);
    }

    #[test]
    fn parse_rejects_malformed() {
        let result = parse_format(&json!([{"name": "x"}]));
        assert!(matches!(result, Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn kind_roundtrips_through_wire_type() {
        let kind = FieldKind::Array(Box::new(FieldKind::Integer));
        assert_eq!(FieldKind::from_field_type(&kind.to_field_type()), kind);
        assert_eq!(kind.to_string(), "Array<Integer>");
    }

    #[test]
    fn detect_kinds() {
        assert_eq!(FieldKind::detect(&json!(true)), FieldKind::Boolean);
        assert_eq!(FieldKind::detect(&json!(1)), FieldKind::Integer);
        assert_eq!(FieldKind::detect(&json!(1.5)), FieldKind::Real);
        assert_eq!(FieldKind::detect(&json!("x")), FieldKind::String);
        assert_eq!(FieldKind::detect(&json!({"a": 1})), FieldKind::Object);
        assert_eq!(
            FieldKind::detect(&json!([null, "a"])),
            FieldKind::Array(Box::new(FieldKind::String))
        );
        assert_eq!(
            FieldKind::detect(&json!({"d": [1], "s": [{"n": "a", "t": "Integer"}]})),
            FieldKind::Record
        );
        assert_eq!(
            FieldKind::detect(&json!({"d": [[1]], "s": [{"n": "a", "t": "Integer"}]})),
            FieldKind::RecordSet
        );
    }

    #[test]
    fn validate_default() {
        assert!(FieldFormat::nullable("a", FieldKind::Integer)
            .validate_default()
            .is_ok());
        assert!(FieldFormat::required("a", FieldKind::Integer, json!(0))
            .validate_default()
            .is_ok());
        assert!(FieldFormat::required("a", FieldKind::Integer, Value::Null)
            .validate_default()
            .is_err());
        assert!(FieldFormat::required("a", FieldKind::Integer, json!("zero"))
            .validate_default()
            .is_err());
    }
}
