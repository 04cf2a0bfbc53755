//! Fetching and parsing the public proxy listing.

use crate::config::Config;
use crate::error::{Error, Result};

use async_trait::async_trait;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Timeout for fetching the listing page.
const LISTING_TIMEOUT_SECS: u64 = 30;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

static TBODY_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<tbody[^>]*>(.*?)</tbody>").expect("Invalid tbody regex"));
static ROW_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").expect("Invalid row regex"));
static CELL_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<td[^>]*>(.*?)</td>").expect("Invalid cell regex"));
static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("Invalid tag regex"));

/// One row of the proxy listing, as raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRow {
    pub host: String,
    pub port: String,
    pub country_code: String,
    pub country: String,
    pub anonymity: String,
    pub google: String,
    pub https: String,
    pub last_checked: String,
}

impl ProxyRow {
    /// Build a row from its cells in listing order; `None` unless there are exactly eight.
    pub fn from_cells(cells: Vec<String>) -> Option<Self> {
        let [host, port, country_code, country, anonymity, google, https, last_checked]: [String; 8] =
            cells.try_into().ok()?;
        Some(Self {
            host,
            port,
            country_code,
            country,
            anonymity,
            google,
            https,
            last_checked,
        })
    }
}

/// A source of proxy listing rows.
#[async_trait]
pub trait ProxyListing: Send + Sync {
    /// Fetch the current listing.
    async fn fetch(&self) -> Result<Vec<ProxyRow>>;
}

/// Scrapes the proxy table published on sslproxies.org and its sister sites.
#[derive(Debug, Clone)]
pub struct SslProxiesListing {
    client: Client,
    url: Url,
}

impl SslProxiesListing {
    pub fn new(url: Url) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(LISTING_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, url })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.listing_url.clone())
    }

    fn fetch_error(&self, status: Option<u16>, reason: impl Into<String>) -> Error {
        Error::ListingFetch {
            url: self.url.to_string(),
            status,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ProxyListing for SslProxiesListing {
    async fn fetch(&self) -> Result<Vec<ProxyRow>> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| self.fetch_error(e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            info!("There was an error ({}) fetching from {}", status.as_u16(), self.url);
            return Err(self.fetch_error(Some(status.as_u16()), format!("Bad status code: {}", status.as_u16())));
        }

        let content = response
            .text()
            .await
            .map_err(|e| self.fetch_error(Some(status.as_u16()), e.to_string()))?;

        let rows = parse_listing(&content);
        debug!("Parsed {} rows from {}", rows.len(), self.url);
        Ok(rows)
    }
}

/// Extract the proxy rows from the listing page HTML.
///
/// Only body rows with exactly eight cells are kept.
pub fn parse_listing(html: &str) -> Vec<ProxyRow> {
    TBODY_REGEX
        .captures_iter(html)
        .flat_map(|tbody| {
            let body = tbody.get(1).map_or("", |m| m.as_str());
            ROW_REGEX
                .captures_iter(body)
                .filter_map(|row| {
                    let cells = CELL_REGEX
                        .captures_iter(row.get(1)?.as_str())
                        .map(|cell| cell_text(cell.get(1).map_or("", |m| m.as_str())))
                        .collect::<Vec<_>>();
                    ProxyRow::from_cells(cells)
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

fn cell_text(cell: &str) -> String {
    TAG_REGEX
        .replace_all(cell, "")
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}
