//! Proxy verification.

use crate::config::Config;
use crate::proxy::Verdict;

use async_trait::async_trait;
use log::debug;
use std::time::Duration;
use url::Url;

/// Checks whether a proxy is alive and forwards traffic as itself.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Probe the proxy at `address`, expecting the public IP seen through it to equal `host`.
    async fn verify(&self, host: &str, address: &str) -> Verdict;
}

/// Verifies proxies by fetching a "what is my IP" endpoint through them.
#[derive(Debug, Clone)]
pub struct HttpVerifier {
    verify_url: Url,
    timeout: Duration,
}

impl HttpVerifier {
    pub fn new(verify_url: Url, timeout: Duration) -> Self {
        Self { verify_url, timeout }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.verify_url.clone(), config.verify_timeout)
    }

    fn error_verdict(&self, err: reqwest::Error) -> Verdict {
        if err.is_timeout() {
            Verdict::failed(format!("Timeout after {} seconds", self.timeout.as_secs()))
        } else {
            Verdict::failed(format!("An error occurred: {}", err))
        }
    }
}

#[async_trait]
impl Verifier for HttpVerifier {
    async fn verify(&self, host: &str, address: &str) -> Verdict {
        debug!("Verifying proxy {} against {}", address, self.verify_url);

        let client = match reqwest::Proxy::all(address)
            .and_then(|proxy| reqwest::Client::builder().proxy(proxy).timeout(self.timeout).build())
        {
            Ok(client) => client,
            Err(e) => return self.error_verdict(e),
        };

        let response = match client.get(self.verify_url.clone()).send().await {
            Ok(response) => response,
            Err(e) => return self.error_verdict(e),
        };

        let status = response.status();
        if !status.is_success() {
            return Verdict::failed(format!("Bad status code: {}", status.as_u16()));
        }

        let public_ip = match response.text().await {
            Ok(body) => body.replace('\n', ""),
            Err(e) => return self.error_verdict(e),
        };

        if public_ip != host {
            return Verdict::failed(format!("IPs don't match: {}(proxy) != {}(public IP)", host, public_ip));
        }

        Verdict::ok()
    }
}
