use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::mask::classifier::DEFAULT_PATTERNS;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(flatten)]
    pub upstream: UpstreamConfig,
    /// Rule groups: the outer list is OR-ed, every inner list is AND-ed
    #[serde(default)]
    pub block: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    pub masking: MaskingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    pub forward_host: String,
    pub forward_scheme: String,
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MaskingConfig {
    /// Case-insensitive regular expressions matched against field names
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,
    #[serde(default = "default_placeholder")]
    pub string_placeholder: String,
}

impl Default for MaskingConfig {
    fn default() -> Self {
        Self {
            patterns: default_patterns(),
            string_placeholder: default_placeholder(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub exchange_log: ExchangeLogConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            exchange_log: ExchangeLogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangeLogConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub output: LogOutput,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default = "default_true")]
    pub include_request_body: bool,
    #[serde(default = "default_true")]
    pub include_response_body: bool,
}

impl Default for ExchangeLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output: LogOutput::default(),
            file_path: None,
            include_request_body: true,
            include_response_body: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Tracing,
    Stdout,
    File,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_patterns() -> Vec<String> {
    DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect()
}

fn default_placeholder() -> String {
    "x".to_string()
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a YAML (or JSON) file
    pub async fn load(path: &str) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be zero");
        }

        if self.upstream.forward_host.is_empty() {
            anyhow::bail!("forward_host cannot be empty");
        }

        if !matches!(self.upstream.forward_scheme.as_str(), "http" | "https") {
            anyhow::bail!(
                "forward_scheme must be http or https, got '{}'",
                self.upstream.forward_scheme
            );
        }

        if self.masking.patterns.iter().any(|p| p.is_empty()) {
            anyhow::bail!("Masking patterns cannot be empty strings");
        }

        let exchange_log = &self.logging.exchange_log;
        if exchange_log.enabled
            && exchange_log.output == LogOutput::File
            && exchange_log.file_path.as_deref().map_or(true, str::is_empty)
        {
            anyhow::bail!("exchange_log.file_path is required when output is 'file'");
        }

        Ok(())
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawDuration {
            Seconds(u64),
            Text(String),
        }

        match RawDuration::deserialize(deserializer)? {
            RawDuration::Seconds(secs) => Ok(Duration::from_secs(secs)),
            RawDuration::Text(s) => parse_duration(&s).map_err(serde::de::Error::custom),
        }
    }

    pub(super) fn parse_duration(
        s: &str,
    ) -> std::result::Result<Duration, Box<dyn std::error::Error + Send + Sync>> {
        if let Some(num) = s.strip_suffix('s') {
            Ok(Duration::from_secs(num.parse()?))
        } else if let Some(num) = s.strip_suffix('m') {
            Ok(Duration::from_secs(num.parse::<u64>()? * 60))
        } else if let Some(num) = s.strip_suffix('h') {
            Ok(Duration::from_secs(num.parse::<u64>()? * 3600))
        } else {
            Ok(Duration::from_secs(s.parse()?))
        }
    }
}
