//! # hpw
//!
//! Run and retry any command through HTTP proxies.
//!
//! This library fetches a public proxy listing, verifies candidate proxies, and
//! runs a command through a different unused proxy on every attempt until it
//! succeeds, refreshing the proxy list when attempts keep failing.

pub mod config;
pub mod error;
pub mod listing;
pub mod orchestrator;
pub mod pool;
pub mod proxy;
pub mod runner;
pub mod verifier;

pub use config::{Config, ConfigBuilder};
pub use error::{Activity, Error, Result};
pub use listing::{parse_listing, ProxyListing, ProxyRow, SslProxiesListing};
pub use orchestrator::{Orchestrator, Outcome};
pub use pool::ProxyPool;
pub use proxy::{Anonymity, ProxyRecord, ValidationStatus, Verdict};
pub use runner::{CommandRunner, ProcessRunner};
pub use verifier::{HttpVerifier, Verifier};
