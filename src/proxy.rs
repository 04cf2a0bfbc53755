//! Proxy representation and status.

use crate::error::{Error, Result};
use crate::listing::ProxyRow;
use crate::verifier::Verifier;

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Anonymity level advertised by the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anonymity {
    /// Listed as "anonymous".
    Low,
    /// Listed as "elite proxy".
    High,
}

impl Anonymity {
    /// Map a raw listing label to an anonymity level.
    pub fn from_label(label: &str) -> Result<Self> {
        match label {
            "anonymous" => Ok(Anonymity::Low),
            "elite proxy" => Ok(Anonymity::High),
            other => Err(Error::UnknownAnonymityLevel(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Anonymity::Low => "low",
            Anonymity::High => "high",
        }
    }
}

impl fmt::Display for Anonymity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of verifying a proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Whether the proxy forwarded traffic as its own host.
    pub valid: bool,
    /// Why verification failed; empty when valid.
    pub reason: String,
}

impl Verdict {
    pub fn ok() -> Self {
        Self {
            valid: true,
            reason: String::new(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: reason.into(),
        }
    }
}

/// Verification status of a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStatus {
    /// The proxy has not been verified yet.
    Unknown,
    /// The proxy passed verification.
    Valid,
    /// The proxy failed verification.
    Invalid,
}

/// A proxy endpoint taken from the listing.
#[derive(Debug)]
pub struct ProxyRecord {
    pub host: String,
    pub port: u16,
    pub country_code: String,
    pub country: String,
    anonymity: String,
    google: String,
    https: String,
    /// Last check time as reported by the listing.
    pub last_checked: String,
    /// Whether `https://` addresses are preferred for proxies supporting it.
    use_https: bool,
    used: AtomicBool,
    validation: Mutex<Option<Verdict>>,
}

impl ProxyRecord {
    /// Create a record from a listing row.
    pub fn from_row(row: ProxyRow, use_https: bool) -> Result<Self> {
        let port = row
            .port
            .trim()
            .parse::<u16>()
            .map_err(|_| Error::MalformedRow(format!("invalid port {:?} for host {}", row.port, row.host)))?;

        Ok(Self {
            host: row.host,
            port,
            country_code: row.country_code,
            country: row.country,
            anonymity: row.anonymity,
            google: row.google,
            https: row.https,
            last_checked: row.last_checked,
            use_https,
            used: AtomicBool::new(false),
            validation: Mutex::new(None),
        })
    }

    /// The proxy URL, e.g. `http://10.0.0.1:8080`.
    pub fn address(&self) -> String {
        let scheme = if self.use_https && self.https == "yes" {
            "https"
        } else {
            "http"
        };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    pub fn anonymity_level(&self) -> Result<Anonymity> {
        Anonymity::from_label(&self.anonymity)
    }

    pub fn is_google_proxy(&self) -> bool {
        self.google == "yes"
    }

    pub fn is_used(&self) -> bool {
        self.used.load(Ordering::Acquire)
    }

    /// Only the pool marks records used; see [`crate::ProxyPool::mark_used`].
    pub(crate) fn mark_used(&self) {
        self.used.store(true, Ordering::Release);
    }

    pub fn validation_status(&self) -> ValidationStatus {
        match &*self.validation.lock() {
            None => ValidationStatus::Unknown,
            Some(verdict) if verdict.valid => ValidationStatus::Valid,
            Some(_) => ValidationStatus::Invalid,
        }
    }

    /// Verify the proxy, at most once per record.
    ///
    /// The first verdict is cached and returned on every later call without
    /// consulting `verifier` again.
    pub async fn verify(&self, verifier: &dyn Verifier) -> Verdict {
        let cached = self.validation.lock().clone();
        if let Some(verdict) = cached {
            return verdict;
        }

        let verdict = verifier.verify(&self.host, &self.address()).await;
        *self.validation.lock() = Some(verdict.clone());
        verdict
    }
}

impl fmt::Display for ProxyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let anonymity = match self.anonymity_level() {
            Ok(level) => level.as_str(),
            Err(_) => "unknown",
        };
        write!(
            f,
            "Address: {} | Country: {} | Anonymity level: {} | Managed by Google: {} | Already used: {} | Last checked: {}",
            self.address(),
            self.country,
            anonymity,
            self.google,
            if self.is_used() { "yes" } else { "no" },
            self.last_checked,
        )
    }
}
