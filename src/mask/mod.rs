pub mod classifier;
pub mod inspector;
pub mod masker;

use serde_json::Value;

pub use classifier::{Classifier, PiiClassifier};
pub use inspector::{Inspector, JsonInspector};
pub use masker::{JsonMasker, Masker};

/// JSON scalar kinds that can be classified and masked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    String,
    Boolean,
    Number,
}

impl FieldType {
    /// Objects, arrays and null have no field type
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::String(_) => Some(FieldType::String),
            Value::Bool(_) => Some(FieldType::Boolean),
            Value::Number(_) => Some(FieldType::Number),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}
