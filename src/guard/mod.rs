pub mod decoder;
pub mod rules;

use std::borrow::Cow;

use axum::http::{request::Parts, HeaderMap, Method, Uri};
use bytes::Bytes;
use percent_encoding::percent_decode_str;

pub use decoder::{guards_from_groups, GuardDecoder, RuleDecoder};
pub use rules::LeafGuard;

/// Decides whether an inbound request must be rejected
pub trait Guard: Send + Sync {
    fn should_block(&self, request: &RequestView) -> bool;
}

/// Request snapshot the guards are evaluated against
#[derive(Debug, Clone)]
pub struct RequestView {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RequestView {
    pub fn from_parts(parts: &Parts, body: Bytes) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            body,
        }
    }

    /// Percent-decoded request path
    pub fn path(&self) -> Cow<'_, str> {
        percent_decode_str(self.uri.path()).decode_utf8_lossy()
    }

    /// First value of a query parameter, if present
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// First value of a header, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Boolean combination of leaf guards
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardTree {
    Leaf(LeafGuard),
    /// AND: blocks only if every child blocks; an empty joiner always blocks
    Joiner(Vec<GuardTree>),
    /// OR: blocks if any child blocks; an empty collection never blocks
    Collection(Vec<GuardTree>),
}

impl GuardTree {
    pub fn evaluate(&self, request: &RequestView) -> bool {
        match self {
            GuardTree::Leaf(leaf) => leaf.matches(request),
            GuardTree::Joiner(children) => children.iter().all(|child| child.evaluate(request)),
            GuardTree::Collection(children) => children.iter().any(|child| child.evaluate(request)),
        }
    }
}

impl Guard for GuardTree {
    fn should_block(&self, request: &RequestView) -> bool {
        self.evaluate(request)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::http::Request;

    pub(crate) fn view(method: &str, uri: &str, headers: &[(&str, &str)]) -> RequestView {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        RequestView::from_parts(&parts, Bytes::new())
    }

    #[test]
    fn test_collection_blocks_when_any_guard_blocks() {
        let collection = GuardTree::Collection(vec![
            GuardTree::Leaf(LeafGuard::Method { method: "DELETE".to_string() }),
            GuardTree::Leaf(LeafGuard::Header {
                header: "header".to_string(),
                value: "header".to_string(),
            }),
            GuardTree::Leaf(LeafGuard::QueryParam {
                query_param: "queryParam".to_string(),
                value: "queryParam".to_string(),
            }),
        ]);

        let cases = [
            ("method_guard", view("DELETE", "/", &[]), true),
            ("header_guard", view("GET", "/", &[("header", "header")]), true),
            ("query_param_guard", view("GET", "http://localhost/?queryParam=queryParam", &[]), true),
            ("passing_request", view("GET", "/", &[]), false),
        ];

        for (name, request, expected) in cases {
            assert_eq!(collection.should_block(&request), expected, "{}", name);
        }
    }

    #[test]
    fn test_joiner_blocks_only_when_all_guards_block() {
        let joiner = GuardTree::Joiner(vec![
            GuardTree::Leaf(LeafGuard::Method { method: "DELETE".to_string() }),
            GuardTree::Leaf(LeafGuard::Path { path: "/api".to_string() }),
        ]);

        assert!(joiner.should_block(&view("DELETE", "http://domain.com/api", &[])));
        assert!(!joiner.should_block(&view("GET", "http://domain.com/api", &[])));
    }

    #[test]
    fn test_empty_combinators() {
        let request = view("GET", "/anything", &[]);

        assert!(GuardTree::Joiner(vec![]).should_block(&request));
        assert!(!GuardTree::Collection(vec![]).should_block(&request));
    }

    #[test]
    fn test_nested_tree() {
        // (GET AND /admin) OR header x-debug: 1
        let tree = GuardTree::Collection(vec![
            GuardTree::Joiner(vec![
                GuardTree::Leaf(LeafGuard::Method { method: "GET".to_string() }),
                GuardTree::Leaf(LeafGuard::Path { path: "/admin".to_string() }),
            ]),
            GuardTree::Joiner(vec![GuardTree::Leaf(LeafGuard::Header {
                header: "x-debug".to_string(),
                value: "1".to_string(),
            })]),
        ]);

        assert!(tree.should_block(&view("GET", "/admin/users", &[])));
        assert!(tree.should_block(&view("POST", "/public", &[("X-Debug", "1")])));
        assert!(!tree.should_block(&view("POST", "/admin/users", &[])));
    }

    #[test]
    fn test_path_is_percent_decoded() {
        assert_eq!(view("GET", "/%61dmin/users", &[]).path(), "/admin/users");
        assert_eq!(view("GET", "/a%20b?x=%61", &[]).path(), "/a b");
        assert_eq!(view("GET", "/plain", &[]).path(), "/plain");
    }

    #[test]
    fn test_query_param_lookup() {
        let request = view("GET", "/search?q=a%20b&q=second&empty=", &[]);

        assert_eq!(request.query_param("q").as_deref(), Some("a b"));
        assert_eq!(request.query_param("empty").as_deref(), Some(""));
        assert_eq!(request.query_param("missing"), None);
    }
}
