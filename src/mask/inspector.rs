use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::InspectError;
use super::{Classifier, FieldType, Masker};

/// Rewrites a response body, masking sensitive fields
pub trait Inspector: Send + Sync {
    fn inspect(&self, input: &[u8]) -> Result<Vec<u8>, InspectError>;
}

/// Walks a JSON document and masks every classified scalar field
///
/// Classification is by object key, so array elements and a bare top-level
/// scalar are never masked themselves; only their nested objects are.
#[derive(Clone)]
pub struct JsonInspector {
    masker: Arc<dyn Masker>,
    classifier: Arc<dyn Classifier>,
}

impl JsonInspector {
    pub fn new(masker: Arc<dyn Masker>, classifier: Arc<dyn Classifier>) -> Self {
        Self { masker, classifier }
    }

    fn inspect_value(&self, value: &mut Value) {
        match value {
            Value::Object(map) => self.inspect_object(map),
            Value::Array(items) => items.iter_mut().for_each(|item| self.inspect_value(item)),
            _ => {}
        }
    }

    fn inspect_object(&self, map: &mut Map<String, Value>) {
        for (key, value) in map.iter_mut() {
            match FieldType::of(value) {
                Some(field_type) => {
                    if self.classifier.classify(key, field_type) {
                        let original = std::mem::take(value);
                        *value = self.masker.mask(original, field_type);
                    }
                }
                None => self.inspect_value(value),
            }
        }
    }
}

impl Inspector for JsonInspector {
    fn inspect(&self, input: &[u8]) -> Result<Vec<u8>, InspectError> {
        let mut document: Value = serde_json::from_slice(input).map_err(InspectError::Decode)?;

        self.inspect_value(&mut document);

        serde_json::to_vec(&document).map_err(InspectError::Encode)
    }
}
