//! Core proxy pool implementation.

use crate::error::{Activity, Error, Result};
use crate::listing::ProxyListing;
use crate::proxy::ProxyRecord;
use crate::verifier::Verifier;

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::Arc;

/// A pool of proxies taken from the listing.
///
/// Records are shared with the views returned by [`ProxyPool::unused`] and
/// [`ProxyPool::valid`], so marking a record used through a view is seen by the
/// pool it came from.
pub struct ProxyPool {
    /// All proxies in the pool, unique by address.
    proxies: RwLock<Vec<Arc<ProxyRecord>>>,
    listing: Arc<dyn ProxyListing>,
    verifier: Arc<dyn Verifier>,
    /// Whether new records prefer `https://` addresses.
    use_https: bool,
    rng: Arc<Mutex<StdRng>>,
}

impl ProxyPool {
    /// Create an empty pool.
    pub fn new(listing: Arc<dyn ProxyListing>, verifier: Arc<dyn Verifier>, use_https: bool) -> Self {
        Self {
            proxies: RwLock::new(Vec::new()),
            listing,
            verifier,
            use_https,
            rng: Arc::new(Mutex::new(StdRng::from_os_rng())),
        }
    }

    /// Create a pool and fill it from the listing.
    pub async fn load(listing: Arc<dyn ProxyListing>, verifier: Arc<dyn Verifier>, use_https: bool) -> Result<Self> {
        let pool = Self::new(listing, verifier, use_https);
        pool.refresh().await?;
        Ok(pool)
    }

    /// Replace the pool contents with `records`, keeping the first record per address.
    pub fn with_records(self, records: Vec<ProxyRecord>) -> Self {
        *self.proxies.write() = dedup(records);
        self
    }

    /// Use `rng` for random selection.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Arc::new(Mutex::new(rng));
        self
    }

    /// A snapshot of the records currently in the pool.
    pub fn proxies(&self) -> Vec<Arc<ProxyRecord>> {
        self.proxies.read().clone()
    }

    pub fn len(&self) -> usize {
        self.proxies.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.read().is_empty()
    }

    /// Fetch the listing and turn it into fresh, unused records.
    ///
    /// Rows that can't be parsed are skipped.
    pub async fn fetch_listing(&self) -> Result<Vec<ProxyRecord>> {
        let rows = self.listing.fetch().await?;
        let total = rows.len();

        let records: Vec<ProxyRecord> = rows
            .into_iter()
            .filter_map(|row| match ProxyRecord::from_row(row, self.use_https) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping listing row: {}", e);
                    None
                }
            })
            .collect();

        debug!("Fetched {} proxies ({} rows)", records.len(), total);
        Ok(records)
    }

    /// Re-fetch the listing and replace the pool contents.
    ///
    /// Addresses that were used before the refresh stay used. If fetching
    /// fails the pool is left untouched.
    pub async fn refresh(&self) -> Result<()> {
        let fresh = dedup(self.fetch_listing().await?);

        let used_before: HashSet<String> = self
            .proxies
            .read()
            .iter()
            .filter(|p| p.is_used())
            .map(|p| p.address())
            .collect();

        for proxy in &fresh {
            if used_before.contains(&proxy.address()) {
                proxy.mark_used();
            }
        }

        *self.proxies.write() = fresh;

        let (total, used) = self.get_stats();
        info!("Proxy pool refreshed: {}/{} proxies already used", used, total);
        Ok(())
    }

    /// A view of the proxies that haven't been used yet.
    pub fn unused(&self) -> ProxyPool {
        let unused = self.proxies().into_iter().filter(|p| !p.is_used()).collect();
        self.view(unused)
    }

    /// A view of the proxies that pass verification.
    ///
    /// Verifies every proxy in the pool that hasn't been verified yet.
    pub async fn valid(&self) -> ProxyPool {
        let mut valid = Vec::new();
        for proxy in self.proxies() {
            if proxy.verify(self.verifier.as_ref()).await.valid {
                valid.push(proxy);
            }
        }
        self.view(valid)
    }

    /// Pick a random proxy.
    ///
    /// Each of the `max_tries` draws picks uniformly from the whole pool. With
    /// `unused_only`, used draws are rejected and unused ones must pass
    /// verification; otherwise the first draw is returned as is.
    pub async fn random_proxy(&self, unused_only: bool, max_tries: usize) -> Result<Arc<ProxyRecord>> {
        let proxies = self.proxies();

        // An empty pool counts as fully used.
        if unused_only && proxies.iter().all(|p| p.is_used()) {
            return Err(Error::AllProxiesUsed);
        }
        if proxies.is_empty() {
            return Err(Error::NoProxyAvailable);
        }

        for _ in 0..max_tries {
            let proxy = {
                let mut rng = self.rng.lock();
                Arc::clone(&proxies[rng.random_range(0..proxies.len())])
            };

            if !unused_only {
                return Ok(proxy);
            }
            if proxy.is_used() {
                continue;
            }

            let verdict = proxy.verify(self.verifier.as_ref()).await;
            if verdict.valid {
                return Ok(proxy);
            }
            debug!("Rejected proxy {}: {}", proxy.address(), verdict.reason);
        }

        Err(Error::MaxTriesExceeded {
            max_tries,
            activity: Activity::Selection,
        })
    }

    /// Record that a command attempt went through `proxy`.
    pub fn mark_used(&self, proxy: &ProxyRecord) {
        proxy.mark_used();
        debug!("Marked proxy {} as used", proxy.address());
    }

    /// Get statistics about the proxy pool: `(total, used)`.
    pub fn get_stats(&self) -> (usize, usize) {
        let proxies = self.proxies.read();
        let total = proxies.len();
        let used = proxies.iter().filter(|p| p.is_used()).count();

        (total, used)
    }

    fn view(&self, proxies: Vec<Arc<ProxyRecord>>) -> ProxyPool {
        ProxyPool {
            proxies: RwLock::new(proxies),
            listing: Arc::clone(&self.listing),
            verifier: Arc::clone(&self.verifier),
            use_https: self.use_https,
            rng: Arc::clone(&self.rng),
        }
    }
}

fn dedup(records: Vec<ProxyRecord>) -> Vec<Arc<ProxyRecord>> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.address()))
        .map(Arc::new)
        .collect()
}
