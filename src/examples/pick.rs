//! Pick one verified proxy from the public listing.

use hpw::{Config, HttpVerifier, ProxyPool, SslProxiesListing};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = Config::from_env()?;

    println!("Fetching proxy list from {}...", config.listing_url);
    let listing = Arc::new(SslProxiesListing::from_config(&config)?);
    let verifier = Arc::new(HttpVerifier::from_config(&config));
    let pool = ProxyPool::load(listing, verifier, config.use_https).await?;

    let (total, _) = pool.get_stats();
    println!("{} proxies listed, verifying against {}", total, config.verify_url);

    let proxy = pool.random_proxy(true, config.random_max_tries).await?;
    println!("{}", proxy);

    Ok(())
}
