use axum::http::StatusCode;
use thiserror::Error;

/// Errors raised while turning rule descriptions into guards
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("rule must be a key/value map, got: {0}")]
    NotAnObject(serde_json::Value),

    #[error("field '{field}' must be a string, got: {value}")]
    FieldType { field: String, value: serde_json::Value },

    #[error("no matching guard shape for rule: {0}")]
    NoMatchingGuard(serde_json::Value),

    #[error("rule matches more than one guard shape ({keys}): {rule}")]
    AmbiguousGuard { keys: String, rule: serde_json::Value },
}

/// Errors raised by the JSON inspector
#[derive(Error, Debug)]
pub enum InspectError {
    #[error("failed to decode json: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to encode json: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Runtime errors of the proxy
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Failed to build upstream url: {0}")]
    UpstreamUrl(String),

    #[error("Failed to forward request: {0}")]
    Forward(String),

    #[error("Exchange log error: {0}")]
    ExchangeLog(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProxyError>;

/// Per-request failure exits of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineFailure {
    ReadRequestBody,
    Blocked,
    Forward,
    ReadResponseBody,
    Inspect,
}

impl PipelineFailure {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PipelineFailure::Blocked => StatusCode::FORBIDDEN,
            PipelineFailure::ReadRequestBody
            | PipelineFailure::Forward
            | PipelineFailure::ReadResponseBody
            | PipelineFailure::Inspect => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            PipelineFailure::ReadRequestBody => "proxy failed to read request body",
            PipelineFailure::Blocked => "proxy config blocks this request",
            PipelineFailure::Forward => "proxy failed to forward request and get response",
            PipelineFailure::ReadResponseBody => "proxy failed to read forwarded response body",
            PipelineFailure::Inspect => "proxy failed to inspect forwarded response body",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_blocked_maps_to_forbidden() {
        let failures = [
            PipelineFailure::ReadRequestBody,
            PipelineFailure::Blocked,
            PipelineFailure::Forward,
            PipelineFailure::ReadResponseBody,
            PipelineFailure::Inspect,
        ];

        for failure in failures {
            let expected = if failure == PipelineFailure::Blocked {
                StatusCode::FORBIDDEN
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            assert_eq!(failure.status_code(), expected, "{:?}", failure);
        }
    }
}
