use serde_json::{Map, Value};
use tracing::debug;

use crate::error::DecodeError;
use super::{GuardTree, LeafGuard};

const DISCRIMINATORS: [&str; 4] = ["header", "query_param", "method", "path"];

/// Turns an untyped rule description into a leaf guard
pub trait GuardDecoder {
    fn decode(&self, rule: &Value) -> Result<LeafGuard, DecodeError>;
}

/// Decodes rules by their discriminator key
///
/// Each rule must carry exactly one of `header`, `query_param`, `method` or
/// `path`. Header and query param rules additionally need a `value`. Unknown
/// keys are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleDecoder;

impl GuardDecoder for RuleDecoder {
    fn decode(&self, rule: &Value) -> Result<LeafGuard, DecodeError> {
        let map = rule
            .as_object()
            .ok_or_else(|| DecodeError::NotAnObject(rule.clone()))?;

        let present: Vec<&str> = DISCRIMINATORS
            .iter()
            .copied()
            .filter(|key| map.contains_key(*key))
            .collect();

        let guard = match present.as_slice() {
            [] => return Err(DecodeError::NoMatchingGuard(rule.clone())),
            ["header"] => LeafGuard::Header {
                header: string_field(map, "header")?,
                value: string_field(map, "value")?,
            },
            ["query_param"] => LeafGuard::QueryParam {
                query_param: string_field(map, "query_param")?,
                value: string_field(map, "value")?,
            },
            ["method"] => LeafGuard::Method {
                method: string_field(map, "method")?,
            },
            ["path"] => LeafGuard::Path {
                path: string_field(map, "path")?,
            },
            keys => {
                return Err(DecodeError::AmbiguousGuard {
                    keys: keys.join(", "),
                    rule: rule.clone(),
                })
            }
        };

        if !guard.is_valid() {
            return Err(DecodeError::NoMatchingGuard(rule.clone()));
        }

        Ok(guard)
    }
}

/// Missing fields read as empty; present fields must be strings
fn string_field(map: &Map<String, Value>, field: &str) -> Result<String, DecodeError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(DecodeError::FieldType {
            field: field.to_string(),
            value: other.clone(),
        }),
    }
}

/// Build `OR(AND(group₁), AND(group₂), …)` from rule groups
///
/// Fails on the first rule that does not decode.
pub fn guards_from_groups<D: GuardDecoder + ?Sized>(
    groups: &[Vec<Value>],
    decoder: &D,
) -> Result<GuardTree, DecodeError> {
    let mut collection = Vec::with_capacity(groups.len());

    for group in groups {
        let mut joined = Vec::with_capacity(group.len());
        for rule in group {
            let guard = decoder.decode(rule)?;
            debug!("Decoded {} guard: {:?}", guard.kind(), guard);
            joined.push(GuardTree::Leaf(guard));
        }
        collection.push(GuardTree::Joiner(joined));
    }

    Ok(GuardTree::Collection(collection))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::tests::view;
    use crate::guard::Guard;
    use serde_json::json;

    #[test]
    fn test_decode_each_shape() {
        let decoder = RuleDecoder;

        let cases = [
            (json!({"header": "header", "value": "value"}), "header"),
            (json!({"query_param": "test", "value": "test"}), "query_param"),
            (json!({"method": "get"}), "method"),
            (json!({"path": "/api"}), "path"),
        ];

        for (rule, kind) in cases {
            let guard = decoder.decode(&rule).unwrap();
            assert!(guard.is_valid());
            assert_eq!(guard.kind(), kind);
        }
    }

    #[test]
    fn test_decode_no_matching_shape() {
        let decoder = RuleDecoder;

        for rule in [
            json!({"test": "test"}),
            json!({}),
            json!({"value": "v"}),
            json!({"header": "h"}),
            json!({"query_param": "", "value": "v"}),
            json!({"path": ""}),
        ] {
            let err = decoder.decode(&rule).unwrap_err();
            assert!(matches!(err, DecodeError::NoMatchingGuard(_)), "{}: {}", rule, err);
        }
    }

    #[test]
    fn test_decode_rejects_ambiguous_rule() {
        let err = RuleDecoder
            .decode(&json!({"header": "h", "value": "v", "method": "GET"}))
            .unwrap_err();

        match err {
            DecodeError::AmbiguousGuard { keys, .. } => assert_eq!(keys, "header, method"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_decode_structural_errors() {
        let decoder = RuleDecoder;

        assert!(matches!(
            decoder.decode(&json!({"method": 1})),
            Err(DecodeError::FieldType { .. })
        ));
        assert!(matches!(
            decoder.decode(&json!({"header": "h", "value": ["v"]})),
            Err(DecodeError::FieldType { .. })
        ));
        assert!(matches!(
            decoder.decode(&json!("method")),
            Err(DecodeError::NotAnObject(_))
        ));
    }

    #[test]
    fn test_decode_error_names_input() {
        let err = RuleDecoder.decode(&json!({"test": "test"})).unwrap_err();
        assert!(err.to_string().contains("\"test\""));
    }

    #[test]
    fn test_guards_from_groups() {
        let groups = vec![vec![
            json!({"method": "GET"}),
            json!({"query_param": "test", "value": "test"}),
        ]];

        let guard = guards_from_groups(&groups, &RuleDecoder).unwrap();

        assert!(guard.should_block(&view("GET", "/?test=test", &[])));
        assert!(!guard.should_block(&view("GET", "/?test=other", &[])));
        assert!(!guard.should_block(&view("POST", "/?test=test", &[])));
    }

    #[test]
    fn test_guards_from_groups_fails_fast() {
        let groups = vec![
            vec![json!({"method": "GET"})],
            vec![json!({"path": "/admin"}), json!({"nope": true})],
        ];

        assert!(guards_from_groups(&groups, &RuleDecoder).is_err());
    }

    #[test]
    fn test_empty_configuration_blocks_nothing() {
        let guard = guards_from_groups(&[], &RuleDecoder).unwrap();
        assert!(!guard.should_block(&view("DELETE", "/admin", &[])));

        // a single empty group is a vacuous AND
        let guard = guards_from_groups(&[vec![]], &RuleDecoder).unwrap();
        assert!(guard.should_block(&view("GET", "/", &[])));
    }
}
