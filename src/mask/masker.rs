use serde_json::Value;

use super::FieldType;

/// Replaces a sensitive value according to its field type
pub trait Masker: Send + Sync {
    fn mask(&self, value: Value, field_type: FieldType) -> Value;
}

/// Constant replacement per type: placeholder string, zero, false
#[derive(Debug, Clone)]
pub struct JsonMasker {
    string_placeholder: String,
}

impl JsonMasker {
    pub fn new(string_placeholder: impl Into<String>) -> Self {
        Self {
            string_placeholder: string_placeholder.into(),
        }
    }
}

impl Default for JsonMasker {
    fn default() -> Self {
        Self::new("x")
    }
}

impl Masker for JsonMasker {
    fn mask(&self, _value: Value, field_type: FieldType) -> Value {
        match field_type {
            FieldType::String => Value::String(self.string_placeholder.clone()),
            FieldType::Number => Value::from(0),
            FieldType::Boolean => Value::Bool(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mask_per_type() {
        let masker = JsonMasker::default();

        assert_eq!(masker.mask(json!("mark@example.com"), FieldType::String), json!("x"));
        assert_eq!(masker.mask(json!(42.5), FieldType::Number), json!(0));
        assert_eq!(masker.mask(json!(true), FieldType::Boolean), json!(false));
    }

    #[test]
    fn test_mask_is_idempotent() {
        let masker = JsonMasker::new("***");

        for (value, field_type) in [
            (json!("secret"), FieldType::String),
            (json!(-7), FieldType::Number),
            (json!(true), FieldType::Boolean),
        ] {
            let once = masker.mask(value, field_type);
            let twice = masker.mask(once.clone(), field_type);
            assert_eq!(once, twice);
        }
    }
}
