use super::RequestView;

/// Single-condition guard decoded from one rule description
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafGuard {
    /// Header `header` equals `value`
    Header { header: String, value: String },
    /// Query parameter `query_param` equals `value`
    QueryParam { query_param: String, value: String },
    /// Request method equals `method`, case-sensitive
    Method { method: String },
    /// Percent-decoded request path starts with `path`
    Path { path: String },
}

impl LeafGuard {
    pub fn kind(&self) -> &'static str {
        match self {
            LeafGuard::Header { .. } => "header",
            LeafGuard::QueryParam { .. } => "query_param",
            LeafGuard::Method { .. } => "method",
            LeafGuard::Path { .. } => "path",
        }
    }

    /// All required fields are non-empty
    pub fn is_valid(&self) -> bool {
        match self {
            LeafGuard::Header { header, value } => !header.is_empty() && !value.is_empty(),
            LeafGuard::QueryParam { query_param, value } => {
                !query_param.is_empty() && !value.is_empty()
            }
            LeafGuard::Method { method } => !method.is_empty(),
            LeafGuard::Path { path } => !path.is_empty(),
        }
    }

    pub fn matches(&self, request: &RequestView) -> bool {
        match self {
            LeafGuard::Header { header, value } => request.header(header) == Some(value.as_str()),
            LeafGuard::QueryParam { query_param, value } => {
                request.query_param(query_param).as_deref() == Some(value.as_str())
            }
            LeafGuard::Method { method } => request.method.as_str() == method,
            LeafGuard::Path { path } => request.path().starts_with(path.as_str()),
        }
    }
}
