use anyhow::Context;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, request::Parts};
use bytes::Bytes;
use tracing::{debug, error};

use crate::config::UpstreamConfig;
use crate::error::{ProxyError, Result as ProxyResult};
use super::{is_hop_by_hop_header, UpstreamResponse};

/// Issues the single upstream call for an inbound request
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(
        &self,
        parts: &Parts,
        body: Bytes,
        host: &str,
        scheme: &str,
    ) -> ProxyResult<UpstreamResponse>;
}

/// Forwarder backed by a shared reqwest client
#[derive(Clone)]
pub struct HttpForwarder {
    http_client: reqwest::Client,
}

impl HttpForwarder {
    pub fn new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::with_client(http_client))
    }

    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

/// Target URL on the upstream, keeping the original path and query
pub fn upstream_url(parts: &Parts, host: &str, scheme: &str) -> ProxyResult<url::Url> {
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let target = format!("{}://{}{}", scheme, host, path_and_query);
    url::Url::parse(&target).map_err(|e| ProxyError::UpstreamUrl(format!("{}: {}", target, e)))
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(
        &self,
        parts: &Parts,
        body: Bytes,
        host: &str,
        scheme: &str,
    ) -> ProxyResult<UpstreamResponse> {
        let target_url = upstream_url(parts, host, scheme)?;

        debug!("Forwarding {} {} to {}", parts.method, parts.uri, target_url);

        let mut request_builder = self.http_client.request(parts.method.clone(), target_url);

        // Host and Content-Length are derived from the rewritten url and the body
        for (name, value) in parts.headers.iter() {
            if is_hop_by_hop_header(name) || name == header::HOST || name == header::CONTENT_LENGTH {
                continue;
            }
            request_builder = request_builder.header(name, value);
        }

        if !body.is_empty() {
            request_builder = request_builder.body(body);
        }

        let response = request_builder.send().await.map_err(|e| {
            error!("Upstream request failed: {}", e);
            ProxyError::Forward(e.to_string())
        })?;

        Ok(UpstreamResponse {
            status: response.status(),
            headers: response.headers().clone(),
            body: Body::from_stream(response.bytes_stream()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use std::time::Duration;

    fn parts(uri: &str) -> Parts {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[test]
    fn test_upstream_url_rewrites_host_and_scheme() {
        let url = upstream_url(&parts("http://localhost:8000/api/users?id=1"), "api.domain.com", "https")
            .unwrap();

        assert_eq!(url.as_str(), "https://api.domain.com/api/users?id=1");
    }

    #[test]
    fn test_upstream_url_for_origin_form() {
        let url = upstream_url(&parts("/status"), "localhost:9000", "http").unwrap();

        assert_eq!(url.host_str(), Some("localhost"));
        assert_eq!(url.port(), Some(9000));
        assert_eq!(url.path(), "/status");
    }

    #[test]
    fn test_upstream_url_rejects_bad_host() {
        let err = upstream_url(&parts("/"), "bad host", "http").unwrap_err();
        assert!(matches!(err, ProxyError::UpstreamUrl(_)));
    }

    #[tokio::test]
    async fn test_forward_error_is_wrapped() {
        let forwarder = HttpForwarder::new(&UpstreamConfig {
            forward_host: "127.0.0.1:1".to_string(),
            forward_scheme: "http".to_string(),
            timeout: Duration::from_secs(2),
        })
        .unwrap();

        let result = forwarder
            .forward(&parts("/api"), Bytes::new(), "127.0.0.1:1", "http")
            .await;

        assert!(matches!(result, Err(ProxyError::Forward(_))));
    }
}
