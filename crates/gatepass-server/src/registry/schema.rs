//! Registry field schemas.
//!
//! A schema is an ordered list of `(name, declared type, required)` entries
//! stored as JSON on the registry row. Records are validated against it when
//! written; reads never consult it for validation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Declared type of a registry field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Boolean,
    /// ISO-8601 calendar date, `YYYY-MM-DD`.
    Date,
    Email,
    Phone,
}

/// One column of a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
}

impl SchemaField {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
        }
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Ordered field list of a registry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrySchema {
    fields: Vec<SchemaField>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema is not a field list: {0}")]
    Shape(String),

    #[error("duplicate field name {0:?}")]
    DuplicateField(String),

    #[error("field name must not be empty")]
    EmptyFieldName,

    #[error("required field {0:?} is missing")]
    MissingRequired(String),

    #[error("field {field:?} expects {expected:?}")]
    TypeMismatch { field: String, expected: FieldType },
}

impl RegistrySchema {
    pub fn new(fields: Vec<SchemaField>) -> Result<Self, SchemaError> {
        let schema = Self { fields };
        schema.check_names()?;
        Ok(schema)
    }

    /// Parse the stored JSON form.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let schema: Self =
            serde_json::from_str(json).map_err(|e| SchemaError::Shape(e.to_string()))?;
        schema.check_names()?;
        Ok(schema)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.fields).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field used as the primary display name: the first one declared.
    pub fn display_field(&self) -> Option<&SchemaField> {
        self.fields.first()
    }

    /// Stand-in schema built from the keys present on a record, in key order.
    pub fn synthesize_from(attributes: &Map<String, Value>) -> Self {
        Self {
            fields: attributes
                .iter()
                .map(|(name, value)| SchemaField::new(name.clone(), infer_type(value)))
                .collect(),
        }
    }

    /// Check a record's attributes against this schema.
    ///
    /// Attributes not declared in the schema are allowed; declared fields must
    /// match their type when present and non-null.
    pub fn validate(&self, attributes: &Map<String, Value>) -> Result<(), SchemaError> {
        for field in &self.fields {
            match attributes.get(&field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        return Err(SchemaError::MissingRequired(field.name.clone()));
                    }
                }
                Some(Value::String(s)) if field.required && s.trim().is_empty() => {
                    return Err(SchemaError::MissingRequired(field.name.clone()));
                }
                Some(value) => {
                    if !value_matches(field.field_type, value) {
                        return Err(SchemaError::TypeMismatch {
                            field: field.name.clone(),
                            expected: field.field_type,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn check_names(&self) -> Result<(), SchemaError> {
        let mut seen = std::collections::HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(SchemaError::EmptyFieldName);
            }
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }
        Ok(())
    }
}

fn infer_type(value: &Value) -> FieldType {
    match value {
        Value::Number(_) => FieldType::Number,
        Value::Bool(_) => FieldType::Boolean,
        _ => FieldType::Text,
    }
}

fn value_matches(field_type: FieldType, value: &Value) -> bool {
    match field_type {
        // CSV imports deliver everything as strings; numbers and booleans are
        // accepted in their textual form too.
        FieldType::Text => value.is_string() || value.is_number(),
        FieldType::Number => {
            value.is_number() || value.as_str().is_some_and(|s| s.trim().parse::<f64>().is_ok())
        }
        FieldType::Boolean => {
            value.is_boolean()
                || value
                    .as_str()
                    .is_some_and(|s| matches!(s, "true" | "false" | "yes" | "no" | "1" | "0"))
        }
        FieldType::Date => value.as_str().is_some_and(is_iso_date),
        FieldType::Email => value
            .as_str()
            .and_then(|s| s.split_once('@'))
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.')),
        FieldType::Phone => value.as_str().is_some_and(|s| {
            let digits = s.chars().filter(char::is_ascii_digit).count();
            digits >= 5
                && s.chars()
                    .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'))
        }),
    }
}

fn is_iso_date(s: &str) -> bool {
    let parts: Vec<&str> = s.split('-').collect();
    let [y, m, d] = parts.as_slice() else {
        return false;
    };
    let (Ok(_), Ok(month), Ok(day)) = (y.parse::<u16>(), m.parse::<u8>(), d.parse::<u8>()) else {
        return false;
    };
    y.len() == 4 && m.len() == 2 && d.len() == 2 && (1..=12).contains(&month) && (1..=31).contains(&day)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn staff_schema() -> RegistrySchema {
        RegistrySchema::new(vec![
            SchemaField::new("name", FieldType::Text).required(),
            SchemaField::new("dept", FieldType::Text),
            SchemaField::new("badge_no", FieldType::Number),
            SchemaField::new("email", FieldType::Email),
            SchemaField::new("since", FieldType::Date),
        ])
        .unwrap()
    }

    fn attrs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn json_roundtrip_preserves_order() {
        let schema = staff_schema();
        let parsed = RegistrySchema::from_json(&schema.to_json()).unwrap();
        assert_eq!(parsed, schema);
        assert_eq!(parsed.display_field().unwrap().name, "name");
    }

    #[test]
    fn stored_json_uses_type_key() {
        let schema = RegistrySchema::from_json(
            r#"[{"name":"name","type":"text","required":true},{"name":"age","type":"number"}]"#,
        )
        .unwrap();
        assert_eq!(schema.fields()[1].field_type, FieldType::Number);
        assert!(schema.fields()[0].required);
    }

    #[test]
    fn unexpected_shape_is_rejected() {
        assert!(matches!(
            RegistrySchema::from_json(r#"{"name": "oops"}"#),
            Err(SchemaError::Shape(_))
        ));
    }

    #[test]
    fn duplicate_names_rejected() {
        let err = RegistrySchema::new(vec![
            SchemaField::new("a", FieldType::Text),
            SchemaField::new("a", FieldType::Number),
        ])
        .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateField("a".into()));
    }

    #[test]
    fn valid_record_passes() {
        let record = attrs(json!({
            "name": "Ada",
            "dept": "Eng",
            "badge_no": "1042",
            "email": "ada@example.org",
            "since": "2024-02-29",
            "extra": "kept"
        }));
        assert!(staff_schema().validate(&record).is_ok());
    }

    #[test]
    fn missing_required_field() {
        let record = attrs(json!({"dept": "Eng"}));
        assert_eq!(
            staff_schema().validate(&record),
            Err(SchemaError::MissingRequired("name".into()))
        );
        let blank = attrs(json!({"name": "  "}));
        assert!(staff_schema().validate(&blank).is_err());
    }

    #[test]
    fn wrong_types_rejected() {
        for bad in [
            json!({"name": "Ada", "badge_no": "twelve"}),
            json!({"name": "Ada", "email": "not-an-email"}),
            json!({"name": "Ada", "since": "29/02/2024"}),
        ] {
            assert!(
                matches!(
                    staff_schema().validate(&attrs(bad.clone())),
                    Err(SchemaError::TypeMismatch { .. })
                ),
                "{bad}"
            );
        }
    }

    #[test]
    fn synthesized_schema_follows_record_keys() {
        let record = attrs(json!({"full_name": "Grace", "floor": 3, "vip": true}));
        let schema = RegistrySchema::synthesize_from(&record);
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["full_name", "floor", "vip"]);
        assert_eq!(
            schema
                .fields()
                .iter()
                .find(|f| f.name == "floor")
                .unwrap()
                .field_type,
            FieldType::Number
        );
    }
}
