pub mod engine;
pub mod upstream;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, StatusCode};

pub use engine::ReverseProxy;
pub use upstream::{Forwarder, HttpForwarder};

/// Header present on every response; `true` when the proxy itself failed
pub const PROXY_ERROR_HEADER: &str = "x-proxy-error";
pub const PROXY_ERROR_TRUE: &str = "true";
pub const PROXY_ERROR_FALSE: &str = "false";

/// Response received from the upstream, body not yet read
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

/// Headers that only apply to a single connection
pub(crate) fn is_hop_by_hop_header(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection" | "keep-alive" | "proxy-authenticate" | "proxy-authorization" |
        "te" | "trailers" | "transfer-encoding" | "upgrade"
    )
}
