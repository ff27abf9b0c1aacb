//! Pipeline and transport configuration.

use std::collections::HashMap;
use std::time::Duration;

use url::Url;

use crate::log::LogTemplate;
use crate::{ResponseType, Result};

/// Key holding the response type.
pub const RESPONSE_TYPE_KEY: &str = "response_type";
/// Key holding the log template.
pub const LOG_TEMPLATE_KEY: &str = "http.log_template";
/// Key holding the base URI relative URLs resolve against.
pub const BASE_URI_KEY: &str = "http.base_uri";

/// Read access to an external configuration container.
pub trait ConfigSource {
    /// Value for `key`, if set.
    fn get(&self, key: &str) -> Option<String>;
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Configuration read from environment variables.
///
/// `http.log_template` with prefix `WECHAT_` reads `WECHAT_HTTP_LOG_TEMPLATE`.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    prefix: String,
}

impl EnvConfig {
    /// Read variables named `<prefix><KEY>`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn variable(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.to_ascii_uppercase().replace('.', "_"))
    }
}

impl ConfigSource for EnvConfig {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(self.variable(key)).ok()
    }
}

/// Settings the request pipeline reads.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    response_type: Option<String>,
    log_template: Option<String>,
    base_url: Option<Url>,
}

impl PipelineConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Read the settings from a [`ConfigSource`].
    ///
    /// The response type is kept as written; it is only validated when a
    /// call asks for an unwrapped response.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URI is not a valid URL.
    pub fn from_source(source: &impl ConfigSource) -> Result<Self> {
        let base_url = source
            .get(BASE_URI_KEY)
            .map(|uri| Url::parse(&uri))
            .transpose()?;
        Ok(Self {
            response_type: source.get(RESPONSE_TYPE_KEY),
            log_template: source.get(LOG_TEMPLATE_KEY),
            base_url,
        })
    }

    /// Configured response type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`](crate::Error::Configuration) if the
    /// response type is unset or unknown.
    pub fn response_type(&self) -> Result<ResponseType> {
        ResponseType::from_setting(self.response_type.as_deref())
    }

    /// Log template, falling back to the default.
    #[must_use]
    pub fn log_template(&self) -> LogTemplate {
        self.log_template
            .as_deref()
            .map(LogTemplate::new)
            .unwrap_or_default()
    }

    /// Base URL relative request URLs resolve against.
    #[must_use]
    pub const fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug, Clone, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Set the response type.
    #[must_use]
    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.config.response_type = Some(response_type.to_string());
        self
    }

    /// Set the log template.
    #[must_use]
    pub fn log_template(mut self, template: impl Into<String>) -> Self {
        self.config.log_template = Some(template.into());
        self
    }

    /// Set the base URL.
    #[must_use]
    pub fn base_url(mut self, base_url: Url) -> Self {
        self.config.base_url = Some(base_url);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

// ============================================================================
// Transport configuration
// ============================================================================

/// Configuration for [`HyperTransport`](crate::HyperTransport).
#[derive(Debug, Clone)]
pub struct HyperTransportConfig {
    /// Total time allowed per request when the request carries no timeouts.
    pub timeout: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Maximum idle connections per host.
    pub pool_idle_per_host: usize,
    /// Idle connection timeout.
    pub pool_idle_timeout: Duration,
}

impl Default for HyperTransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_per_host: 32,
            pool_idle_timeout: Duration::from_secs(90),
        }
    }
}

impl HyperTransportConfig {
    /// Builder seeded with the defaults.
    #[must_use]
    pub fn builder() -> HyperTransportConfigBuilder {
        HyperTransportConfigBuilder::default()
    }
}

/// Builder for [`HyperTransportConfig`], starting from the defaults.
#[derive(Debug, Clone, Default)]
pub struct HyperTransportConfigBuilder {
    config: HyperTransportConfig,
}

impl HyperTransportConfigBuilder {
    /// Total time allowed per request without per-call timeouts.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Time allowed to establish a connection.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Idle connections kept per host.
    #[must_use]
    pub const fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.config.pool_idle_per_host = count;
        self
    }

    /// How long an idle connection stays pooled.
    #[must_use]
    pub const fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> HyperTransportConfig {
        self.config
    }
}
