use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};

use super::FieldType;

/// Field names containing these are treated as personal data
pub const DEFAULT_PATTERNS: [&str; 3] = ["email", "name", "gender"];

/// Decides whether a named field holds personal data
pub trait Classifier: Send + Sync {
    fn classify(&self, field_name: &str, field_type: FieldType) -> bool;
}

/// Name-based classifier; a field is sensitive if any pattern matches its name
#[derive(Debug, Clone)]
pub struct PiiClassifier {
    patterns: Vec<Regex>,
}

impl PiiClassifier {
    pub fn new(patterns: Vec<Regex>) -> Self {
        Self { patterns }
    }

    /// Compile case-insensitive patterns
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let compiled = patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern.as_ref())
                    .case_insensitive(true)
                    .build()
                    .with_context(|| format!("Invalid masking pattern: {}", pattern.as_ref()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(compiled))
    }
}

impl Classifier for PiiClassifier {
    fn classify(&self, field_name: &str, _field_type: FieldType) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(field_name))
    }
}
