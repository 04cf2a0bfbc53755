//! Error types for the hpw crate.

use std::fmt;
use thiserror::Error;

/// What was being retried when a try budget ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// Drawing a random valid proxy from the pool.
    Selection,
    /// Running the wrapped command.
    Command,
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activity::Selection => write!(f, "trying to get a random valid proxy"),
            Activity::Command => write!(f, "running command"),
        }
    }
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum Error {
    /// The proxy listing could not be fetched or read.
    #[error("Failed to fetch proxy listing from {url}: {reason}")]
    ListingFetch {
        url: String,
        /// HTTP status of the response, when one was received.
        status: Option<u16>,
        reason: String,
    },

    /// The listing contained an anonymity label we don't know how to map.
    #[error("Unknown anonymity level: {0:?}")]
    UnknownAnonymityLevel(String),

    /// A listing row could not be turned into a proxy record.
    #[error("Malformed listing row: {0}")]
    MalformedRow(String),

    /// Every proxy in the pool has already been used.
    #[error("All proxies are already used")]
    AllProxiesUsed,

    /// The pool has no proxies at all.
    #[error("No proxy available in pool")]
    NoProxyAvailable,

    #[error("Reached max tries {max_tries} {activity}")]
    MaxTriesExceeded { max_tries: usize, activity: Activity },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Empty command")]
    EmptyCommand,

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for hpw operations.
pub type Result<T> = std::result::Result<T, Error>;
