use std::collections::BTreeMap;

use async_trait::async_trait;
use axum::http::{request::Parts, HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

use crate::config::{ExchangeLogConfig, LogOutput};
use crate::error::{ProxyError, Result as ProxyResult};

/// One handled request together with the response written for it
pub struct Exchange<'a> {
    pub request: &'a Parts,
    /// `None` when the request body could not be read
    pub request_body: Option<&'a [u8]>,
    pub status: StatusCode,
    pub response_headers: &'a HeaderMap,
    pub response_body: &'a [u8],
}

/// Receives one record per handled request
#[async_trait]
pub trait ExchangeSink: Send + Sync {
    async fn record(&self, exchange: &Exchange<'_>) -> ProxyResult<()>;
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestLog {
    pub req_url: String,
    pub req_method: String,
    pub req_headers: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub req_body: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseLog {
    pub resp_status_code: u16,
    pub resp_headers: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resp_body: Option<String>,
}

/// Exchange log entry
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeLogEntry {
    pub timestamp: DateTime<Utc>,
    pub request: RequestLog,
    pub response: ResponseLog,
}

impl ExchangeLogEntry {
    pub fn new(exchange: &Exchange<'_>, include_request_body: bool, include_response_body: bool) -> Self {
        let request = RequestLog {
            req_url: exchange.request.uri.to_string(),
            req_method: exchange.request.method.to_string(),
            req_headers: header_map(&exchange.request.headers),
            req_body: exchange
                .request_body
                .filter(|_| include_request_body)
                .map(|body| String::from_utf8_lossy(body).into_owned()),
        };

        let response = ResponseLog {
            resp_status_code: exchange.status.as_u16(),
            resp_headers: header_map(exchange.response_headers),
            resp_body: include_response_body
                .then(|| String::from_utf8_lossy(exchange.response_body).into_owned()),
        };

        Self {
            timestamp: Utc::now(),
            request,
            response,
        }
    }
}

fn header_map(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers.iter() {
        map.entry(name.to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    map
}

/// Writes exchange records to tracing, stdout or an append-only file
pub struct ExchangeLogger {
    config: ExchangeLogConfig,
    file_writer: Option<Mutex<tokio::fs::File>>,
}

impl ExchangeLogger {
    pub async fn new(config: &ExchangeLogConfig) -> anyhow::Result<Self> {
        let file_writer = match (config.enabled, config.output, &config.file_path) {
            (true, LogOutput::File, Some(path)) => Some(Mutex::new(Self::create_log_writer(path).await?)),
            _ => None,
        };

        Ok(Self {
            config: config.clone(),
            file_writer,
        })
    }

    async fn create_log_writer(output_path: &str) -> anyhow::Result<tokio::fs::File> {
        if let Some(parent) = std::path::Path::new(output_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(output_path)
            .await?;

        Ok(file)
    }
}

#[async_trait]
impl ExchangeSink for ExchangeLogger {
    async fn record(&self, exchange: &Exchange<'_>) -> ProxyResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let entry = ExchangeLogEntry::new(
            exchange,
            self.config.include_request_body,
            self.config.include_response_body,
        );
        let line = serde_json::to_string(&entry)?;

        match self.config.output {
            LogOutput::Tracing => info!(target: "exchange", "{}", line),
            LogOutput::Stdout => println!("{}", line),
            LogOutput::File => {
                let writer = self
                    .file_writer
                    .as_ref()
                    .ok_or_else(|| ProxyError::ExchangeLog("log file is not open".to_string()))?;

                let mut file = writer.lock().await;
                file.write_all(format!("{}\n", line).as_bytes()).await?;
                file.flush().await?;
            }
        }

        Ok(())
    }
}
