use std::sync::Arc;

use anyhow::Context;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, Method, StatusCode},
    response::Response,
    Router,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::{ServerConfig, UpstreamConfig};
use crate::error::PipelineFailure;
use crate::guard::{Guard, RequestView};
use crate::mask::Inspector;
use crate::observability::{Exchange, ExchangeSink};
use super::{
    is_hop_by_hop_header, Forwarder, UpstreamResponse, PROXY_ERROR_FALSE, PROXY_ERROR_HEADER,
    PROXY_ERROR_TRUE,
};

const JSON_CONTENT_TYPE: &[u8] = b"application/json";

/// Guarding, masking reverse proxy
///
/// Built once at startup and shared read-only by every request.
pub struct ReverseProxy {
    guard: Arc<dyn Guard>,
    inspector: Arc<dyn Inspector>,
    forwarder: Arc<dyn Forwarder>,
    exchange_log: Arc<dyn ExchangeSink>,
    forward_host: String,
    forward_scheme: String,
}

#[derive(Clone)]
struct AppState {
    proxy: Arc<ReverseProxy>,
}

impl ReverseProxy {
    pub fn new(
        upstream: &UpstreamConfig,
        guard: Arc<dyn Guard>,
        inspector: Arc<dyn Inspector>,
        forwarder: Arc<dyn Forwarder>,
        exchange_log: Arc<dyn ExchangeSink>,
    ) -> Self {
        Self {
            guard,
            inspector,
            forwarder,
            exchange_log,
            forward_host: upstream.forward_host.clone(),
            forward_scheme: upstream.forward_scheme.clone(),
        }
    }

    /// Catch-all router serving every path and method
    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .fallback(handle_request)
            .layer(TraceLayer::new_for_http())
            .with_state(AppState { proxy: self })
    }

    /// Start the reverse proxy server
    pub async fn start(self: Arc<Self>, server_config: &ServerConfig) -> anyhow::Result<()> {
        let addr = format!("{}:{}", server_config.host, server_config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;

        info!(
            "Reverse proxy listening on {}, forwarding to {}://{}",
            addr, self.forward_scheme, self.forward_host
        );

        axum::serve(listener, self.router())
            .await
            .context("Server error")?;

        Ok(())
    }

    /// Run one request through capture, guard, forward, inspect and emit
    #[instrument(
        skip(self, req),
        fields(
            request_id = tracing::field::Empty,
            method = tracing::field::Empty,
            uri = tracing::field::Empty
        )
    )]
    pub async fn handle_proxy_request(&self, req: Request) -> Response {
        let request_id = Uuid::new_v4().to_string();
        tracing::Span::current()
            .record("request_id", request_id.as_str())
            .record("method", req.method().as_str())
            .record("uri", req.uri().to_string().as_str());

        let (parts, body) = req.into_parts();

        let body_bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                error!("Failed to read request body: {}", e);
                return self.fail(&parts, None, PipelineFailure::ReadRequestBody).await;
            }
        };

        let view = RequestView::from_parts(&parts, body_bytes.clone());
        if self.guard.should_block(&view) {
            warn!("Request blocked by guard rules: {} {}", parts.method, parts.uri);
            return self.fail(&parts, Some(&body_bytes), PipelineFailure::Blocked).await;
        }

        let upstream = match self
            .forwarder
            .forward(&parts, body_bytes.clone(), &self.forward_host, &self.forward_scheme)
            .await
        {
            Ok(upstream) => upstream,
            Err(e) => {
                error!("Failed to forward request: {}", e);
                return self.fail(&parts, Some(&body_bytes), PipelineFailure::Forward).await;
            }
        };

        let UpstreamResponse { status, mut headers, body } = upstream;

        let mut response_body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                error!("Failed to read forwarded response body: {}", e);
                return self.fail(&parts, Some(&body_bytes), PipelineFailure::ReadResponseBody).await;
            }
        };

        if should_inspect(&parts.method, &headers) {
            match self.inspector.inspect(&response_body) {
                Ok(masked) => {
                    response_body = Bytes::from(masked);
                    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(response_body.len()));
                    debug!("Inspected JSON response, {} bytes after masking", response_body.len());
                }
                Err(e) => {
                    error!("Failed to inspect forwarded response body: {}", e);
                    return self.fail(&parts, Some(&body_bytes), PipelineFailure::Inspect).await;
                }
            }
        }

        let mut response_headers = HeaderMap::with_capacity(headers.len() + 1);
        for (name, value) in headers.iter() {
            if !is_hop_by_hop_header(name) {
                response_headers.append(name.clone(), value.clone());
            }
        }
        response_headers.insert(PROXY_ERROR_HEADER, HeaderValue::from_static(PROXY_ERROR_FALSE));

        self.emit(&parts, Some(&body_bytes), status, response_headers, response_body)
            .await
    }

    /// Failure exit: fixed status and body, `x-proxy-error: true`
    ///
    /// Besides `x-proxy-error` the only header set is
    /// `content-type: text/plain; charset=utf-8`. No upstream header is carried over.
    async fn fail(
        &self,
        parts: &Parts,
        request_body: Option<&Bytes>,
        failure: PipelineFailure,
    ) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(PROXY_ERROR_HEADER, HeaderValue::from_static(PROXY_ERROR_TRUE));
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );

        self.emit(
            parts,
            request_body,
            failure.status_code(),
            headers,
            Bytes::from_static(failure.message().as_bytes()),
        )
        .await
    }

    /// Log the exchange, then build the outgoing response
    async fn emit(
        &self,
        parts: &Parts,
        request_body: Option<&Bytes>,
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response {
        let exchange = Exchange {
            request: parts,
            request_body: request_body.map(|b| b.as_ref()),
            status,
            response_headers: &headers,
            response_body: &body,
        };

        if let Err(e) = self.exchange_log.record(&exchange).await {
            error!("Failed to write exchange log: {}", e);
        }

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

/// Only JSON answers to GET requests are masked
fn should_inspect(method: &Method, headers: &HeaderMap) -> bool {
    method == Method::GET
        && headers
            .get(header::CONTENT_TYPE)
            .map_or(false, |ct| ct.as_bytes() == JSON_CONTENT_TYPE)
}

async fn handle_request(State(state): State<AppState>, req: Request) -> Response {
    state.proxy.handle_proxy_request(req).await
}
