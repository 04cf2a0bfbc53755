use async_trait::async_trait;
use hpw::{
    Activity, CommandRunner, Config, Error, Orchestrator, ProxyListing, ProxyPool, ProxyRecord, ProxyRow, Result,
    Verdict, Verifier,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn row(host: &str) -> ProxyRow {
    ProxyRow {
        host: host.to_string(),
        port: "8080".to_string(),
        country_code: "NL".to_string(),
        country: "Netherlands".to_string(),
        anonymity: "elite proxy".to_string(),
        google: "no".to_string(),
        https: "yes".to_string(),
        last_checked: "5 secs ago".to_string(),
    }
}

fn records(hosts: &[&str]) -> Vec<ProxyRecord> {
    hosts
        .iter()
        .map(|h| ProxyRecord::from_row(row(h), false).unwrap())
        .collect()
}

/// Each fetch returns the next queued response; once the queue is empty it
/// returns two never-seen-before proxies.
struct ScriptedListing {
    queued: Mutex<VecDeque<std::result::Result<Vec<ProxyRow>, u16>>>,
    fetches: AtomicUsize,
}

impl ScriptedListing {
    fn new(queued: Vec<std::result::Result<Vec<ProxyRow>, u16>>) -> Arc<Self> {
        Arc::new(Self {
            queued: Mutex::new(queued.into()),
            fetches: AtomicUsize::new(0),
        })
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProxyListing for ScriptedListing {
    async fn fetch(&self) -> Result<Vec<ProxyRow>> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        match self.queued.lock().pop_front() {
            Some(Ok(rows)) => Ok(rows),
            Some(Err(status)) => Err(Error::ListingFetch {
                url: "https://listing.test/".to_string(),
                status: Some(status),
                reason: format!("Bad status code: {}", status),
            }),
            None => Ok(vec![row(&format!("10.{}.0.1", n)), row(&format!("10.{}.0.2", n))]),
        }
    }
}

struct FixedVerifier {
    verdict: Verdict,
    calls: AtomicUsize,
}

impl FixedVerifier {
    fn valid() -> Arc<Self> {
        Arc::new(Self {
            verdict: Verdict::ok(),
            calls: AtomicUsize::new(0),
        })
    }

    fn timing_out() -> Arc<Self> {
        Arc::new(Self {
            verdict: Verdict::failed("Timeout after 2 seconds"),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Verifier for FixedVerifier {
    async fn verify(&self, _host: &str, _address: &str) -> Verdict {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.verdict.clone()
    }
}

/// Returns the queued exit codes in order, then `fallback`.
struct ScriptedRunner {
    exit_codes: Mutex<VecDeque<i32>>,
    fallback: i32,
    addresses: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    fn new(exit_codes: Vec<i32>, fallback: i32) -> Arc<Self> {
        Arc::new(Self {
            exit_codes: Mutex::new(exit_codes.into()),
            fallback,
            addresses: Mutex::new(Vec::new()),
        })
    }

    fn addresses(&self) -> Vec<String> {
        self.addresses.lock().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, _command: &[String], proxy_address: &str) -> Result<i32> {
        self.addresses.lock().push(proxy_address.to_string());
        Ok(self.exit_codes.lock().pop_front().unwrap_or(self.fallback))
    }
}

fn command() -> Vec<String> {
    vec!["curl".to_string(), "https://example.com".to_string()]
}

fn pool(listing: Arc<ScriptedListing>, verifier: Arc<FixedVerifier>, hosts: &[&str]) -> ProxyPool {
    ProxyPool::new(listing, verifier, false)
        .with_records(records(hosts))
        .with_rng(StdRng::seed_from_u64(42))
}

#[tokio::test]
async fn succeeds_on_first_attempt() {
    let listing = ScriptedListing::new(vec![]);
    let runner = ScriptedRunner::new(vec![0], 1);
    let pool = pool(Arc::clone(&listing), FixedVerifier::valid(), &["10.0.0.1", "10.0.0.2", "10.0.0.3"]);

    let orchestrator = Orchestrator::new(pool, runner.clone(), &Config::default());
    let outcome = orchestrator.run(&command()).await.unwrap();

    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.refreshes, 0);
    assert!(outcome.proxy.is_used());
    assert_eq!(runner.addresses(), vec![outcome.proxy.address()]);
    assert_eq!(orchestrator.pool().get_stats(), (3, 1));
    assert_eq!(listing.fetches(), 0);
}

#[tokio::test]
async fn aborts_after_total_budget() {
    let listing = ScriptedListing::new(vec![]);
    let runner = ScriptedRunner::new(vec![], 1);
    let pool = pool(Arc::clone(&listing), FixedVerifier::valid(), &["10.0.0.1", "10.0.0.2"]);
    let config = Config::builder().refresh_tries(1).command_max_tries(4).build();

    let err = Orchestrator::new(pool, runner.clone(), &config)
        .run(&command())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::MaxTriesExceeded {
            max_tries: 4,
            activity: Activity::Command
        }
    ));
    assert_eq!(runner.addresses().len(), 4);
    assert_eq!(listing.fetches(), 3);
}

#[tokio::test]
async fn refresh_failure_aborts_and_keeps_pool() {
    let listing = ScriptedListing::new(vec![Err(500)]);
    let runner = ScriptedRunner::new(vec![], 1);
    let pool = pool(Arc::clone(&listing), FixedVerifier::valid(), &["10.0.0.1", "10.0.0.2"]);
    let config = Config::builder().refresh_tries(1).build();

    let orchestrator = Orchestrator::new(pool, runner.clone(), &config);
    let err = orchestrator.run(&command()).await.unwrap_err();

    assert!(matches!(err, Error::ListingFetch { status: Some(500), .. }));
    assert_eq!(runner.addresses().len(), 1);

    let addresses: Vec<String> = orchestrator.pool().proxies().iter().map(|p| p.address()).collect();
    assert_eq!(addresses, vec!["http://10.0.0.1:8080", "http://10.0.0.2:8080"]);
    assert_eq!(orchestrator.pool().get_stats(), (2, 1));
}

#[tokio::test]
async fn no_valid_proxy_aborts_selection() {
    let verifier = FixedVerifier::timing_out();
    let runner = ScriptedRunner::new(vec![0], 0);
    let pool = pool(ScriptedListing::new(vec![]), Arc::clone(&verifier), &["10.0.0.1", "10.0.0.2"]);

    assert!(pool.valid().await.is_empty());

    let err = Orchestrator::new(pool, runner.clone(), &Config::default())
        .run(&command())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::MaxTriesExceeded {
            max_tries: 10,
            activity: Activity::Selection
        }
    ));
    assert!(runner.addresses().is_empty());
    assert_eq!(verifier.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn used_addresses_are_not_reselected_after_refresh() {
    let listing = ScriptedListing::new(vec![Ok(vec![row("10.0.0.1"), row("10.0.0.2")])]);
    let runner = ScriptedRunner::new(vec![1, 0], 1);
    let pool = pool(Arc::clone(&listing), FixedVerifier::valid(), &["10.0.0.1"]);
    let config = Config::builder().refresh_tries(1).random_max_tries(100).build();

    let outcome = Orchestrator::new(pool, runner.clone(), &config)
        .run(&command())
        .await
        .unwrap();

    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.refreshes, 1);
    assert_eq!(runner.addresses(), vec!["http://10.0.0.1:8080", "http://10.0.0.2:8080"]);
}

#[tokio::test]
async fn all_used_after_refresh_is_fatal() {
    let listing = ScriptedListing::new(vec![Ok(vec![row("10.0.0.1")])]);
    let runner = ScriptedRunner::new(vec![], 1);
    let pool = pool(Arc::clone(&listing), FixedVerifier::valid(), &["10.0.0.1"]);
    let config = Config::builder().refresh_tries(1).build();

    let err = Orchestrator::new(pool, runner.clone(), &config)
        .run(&command())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::AllProxiesUsed));
    assert_eq!(runner.addresses().len(), 1);
}

#[tokio::test]
async fn empty_command_is_rejected() {
    let runner = ScriptedRunner::new(vec![], 0);
    let pool = pool(ScriptedListing::new(vec![]), FixedVerifier::valid(), &["10.0.0.1"]);

    let err = Orchestrator::new(pool, runner.clone(), &Config::default())
        .run(&[])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::EmptyCommand));
    assert!(runner.addresses().is_empty());
}

#[tokio::test]
async fn unknown_anonymity_label_is_fatal() {
    let mut transparent = row("10.0.0.1");
    transparent.anonymity = "transparent".to_string();
    let runner = ScriptedRunner::new(vec![0], 0);
    let pool = ProxyPool::new(ScriptedListing::new(vec![]), FixedVerifier::valid(), false)
        .with_records(vec![ProxyRecord::from_row(transparent, false).unwrap()]);

    let orchestrator = Orchestrator::new(pool, runner.clone(), &Config::default());
    let err = orchestrator.run(&command()).await.unwrap_err();

    assert!(matches!(err, Error::UnknownAnonymityLevel(label) if label == "transparent"));
    assert!(runner.addresses().is_empty());
    assert_eq!(orchestrator.pool().get_stats(), (1, 0));
}
