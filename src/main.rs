use anyhow::{Context, Result};
use clap::Parser;
use hpw::{Config, HttpVerifier, Orchestrator, ProcessRunner, ProxyPool, SslProxiesListing};
use log::{error, info};
use std::io::Write;
use std::sync::Arc;

/// Run and retry a command through HTTP proxies from a public listing
///
/// Configuration is read from the environment: PROXY_EXPOSED_ENV_VARS,
/// PROXY_VERIFY_URL, PROXY_INVALID_TIMEOUT, PROXY_RANDOM_MAX_TRIES,
/// REFRESH_TRIES, COMMAND_MAX_TRIES, PROXY_USE_HTTPS and PROXY_LISTING_URL.
#[derive(Parser)]
#[command(name = "hpw", version)]
struct Cli {
    /// Command to run, with its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    let cli = Cli::parse();
    if cli.command.is_empty() {
        info!("No command specified");
        std::process::exit(1);
    }

    if let Err(e) = run(&cli.command).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(command: &[String]) -> Result<()> {
    let config = Config::from_env().context("failed to read configuration")?;

    let listing = Arc::new(SslProxiesListing::from_config(&config)?);
    let verifier = Arc::new(HttpVerifier::from_config(&config));
    let pool = ProxyPool::load(listing, verifier, config.use_https)
        .await
        .context("failed to load the proxy list")?;

    let (total, _) = pool.get_stats();
    info!("Loaded {} proxies from {}", total, config.listing_url);

    let runner = Arc::new(ProcessRunner::from_config(&config));
    let outcome = Orchestrator::new(pool, runner, &config).run(command).await?;

    info!(
        "Command succeeded through {} after {} attempt(s)",
        outcome.proxy.address(),
        outcome.attempts
    );
    Ok(())
}
