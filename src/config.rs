//! Configuration for the proxy pool and the retry loop.

use crate::error::{Error, Result};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Default environment variables the proxy address is exposed through.
pub const DEFAULT_EXPOSED_ENV_VARS: [&str; 4] = ["HTTP_PROXY", "HTTPS_PROXY", "http_proxy", "https_proxy"];

/// Default endpoint that echoes back the caller's public IP.
pub const DEFAULT_VERIFY_URL: &str = "http://checkip.amazonaws.com/";

/// Default page the proxy listing is scraped from.
pub const DEFAULT_LISTING_URL: &str = "https://www.sslproxies.org/";

/// Configuration for a run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Environment variable names the child sees the proxy address under.
    pub exposed_env_vars: Vec<String>,
    /// URL used to verify proxies.
    pub verify_url: Url,
    /// Timeout for a single verification probe.
    pub verify_timeout: Duration,
    /// Number of draws `random_proxy` makes before giving up.
    pub random_max_tries: usize,
    /// Failed attempts after which the pool is refreshed.
    pub refresh_tries: usize,
    /// Total attempts before the run is aborted.
    pub command_max_tries: usize,
    /// Use `https://` addresses for proxies that support it.
    pub use_https: bool,
    /// Page the proxy listing is fetched from.
    pub listing_url: Url,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = ConfigBuilder::new();

        if let Some(vars) = lookup("PROXY_EXPOSED_ENV_VARS") {
            builder = builder.exposed_env_vars(vars.split_whitespace().collect::<Vec<&str>>());
        }
        if let Some(url) = lookup("PROXY_VERIFY_URL") {
            builder = builder.verify_url(parse_url("PROXY_VERIFY_URL", &url)?);
        }
        if let Some(secs) = lookup("PROXY_INVALID_TIMEOUT") {
            builder = builder.verify_timeout(Duration::from_secs(parse_number("PROXY_INVALID_TIMEOUT", &secs)?));
        }
        if let Some(tries) = lookup("PROXY_RANDOM_MAX_TRIES") {
            builder = builder.random_max_tries(parse_number("PROXY_RANDOM_MAX_TRIES", &tries)?);
        }
        if let Some(tries) = lookup("REFRESH_TRIES") {
            builder = builder.refresh_tries(parse_number("REFRESH_TRIES", &tries)?);
        }
        if let Some(tries) = lookup("COMMAND_MAX_TRIES") {
            builder = builder.command_max_tries(parse_number("COMMAND_MAX_TRIES", &tries)?);
        }
        if let Some(flag) = lookup("PROXY_USE_HTTPS") {
            builder = builder.use_https(is_truthy(&flag));
        }
        if let Some(url) = lookup("PROXY_LISTING_URL") {
            builder = builder.listing_url(parse_url("PROXY_LISTING_URL", &url)?);
        }

        Ok(builder.build())
    }
}

impl Default for Config {
    fn default() -> Self {
        ConfigBuilder::new().build()
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "yes" | "y" | "1")
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("{} must be a non-negative integer, got {:?}", key, value)))
}

fn parse_url(key: &str, value: &str) -> Result<Url> {
    Url::parse(value.trim()).map_err(|e| Error::InvalidConfig(format!("{} is not a valid URL ({}): {:?}", key, e, value)))
}

/// Builder for `Config`.
pub struct ConfigBuilder {
    exposed_env_vars: Option<Vec<String>>,
    verify_url: Option<Url>,
    verify_timeout: Option<Duration>,
    random_max_tries: Option<usize>,
    refresh_tries: Option<usize>,
    command_max_tries: Option<usize>,
    use_https: bool,
    listing_url: Option<Url>,
}

impl ConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            exposed_env_vars: None,
            verify_url: None,
            verify_timeout: None,
            random_max_tries: None,
            refresh_tries: None,
            command_max_tries: None,
            use_https: false,
            listing_url: None,
        }
    }

    /// Set the environment variable names the proxy address is exposed through.
    pub fn exposed_env_vars(mut self, vars: Vec<impl Into<String>>) -> Self {
        self.exposed_env_vars = Some(vars.into_iter().map(Into::into).collect());
        self
    }

    /// Set the URL used to verify proxies.
    pub fn verify_url(mut self, url: Url) -> Self {
        self.verify_url = Some(url);
        self
    }

    /// Set the timeout for a verification probe.
    pub fn verify_timeout(mut self, timeout: Duration) -> Self {
        self.verify_timeout = Some(timeout);
        self
    }

    /// Set the number of draws a random selection may take.
    pub fn random_max_tries(mut self, tries: usize) -> Self {
        self.random_max_tries = Some(tries);
        self
    }

    /// Set the number of failed attempts that triggers a refresh.
    pub fn refresh_tries(mut self, tries: usize) -> Self {
        self.refresh_tries = Some(tries);
        self
    }

    /// Set the total attempt budget.
    pub fn command_max_tries(mut self, tries: usize) -> Self {
        self.command_max_tries = Some(tries);
        self
    }

    /// Prefer `https://` addresses for proxies that support it.
    pub fn use_https(mut self, use_https: bool) -> Self {
        self.use_https = use_https;
        self
    }

    /// Set the page the proxy listing is fetched from.
    pub fn listing_url(mut self, url: Url) -> Self {
        self.listing_url = Some(url);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Config {
        Config {
            exposed_env_vars: self
                .exposed_env_vars
                .unwrap_or_else(|| DEFAULT_EXPOSED_ENV_VARS.iter().map(|s| s.to_string()).collect()),
            verify_url: self.verify_url.unwrap_or_else(|| default_url(DEFAULT_VERIFY_URL)),
            verify_timeout: self.verify_timeout.unwrap_or(Duration::from_secs(2)),
            random_max_tries: self.random_max_tries.unwrap_or(10),
            refresh_tries: self.refresh_tries.unwrap_or(3),
            command_max_tries: self.command_max_tries.unwrap_or(10),
            use_https: self.use_https,
            listing_url: self.listing_url.unwrap_or_else(|| default_url(DEFAULT_LISTING_URL)),
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// Only ever called with the compile-time constants above.
fn default_url(url: &str) -> Url {
    Url::parse(url).unwrap_or_else(|e| panic!("invalid built-in URL {}: {}", url, e))
}
