//! The retry loop running a command through successive proxies.

use crate::config::Config;
use crate::error::{Activity, Error, Result};
use crate::pool::ProxyPool;
use crate::proxy::ProxyRecord;
use crate::runner::CommandRunner;

use log::{info, warn};
use std::sync::Arc;

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Number of times the command was run.
    pub attempts: usize,
    /// Number of times the pool was refreshed.
    pub refreshes: usize,
    /// The proxy the command succeeded through.
    pub proxy: Arc<ProxyRecord>,
}

/// Runs a command through random unused proxies until it succeeds.
pub struct Orchestrator {
    pool: ProxyPool,
    runner: Arc<dyn CommandRunner>,
    /// Failed attempts after which the pool is refreshed.
    refresh_tries: usize,
    /// Total attempts before giving up.
    command_max_tries: usize,
    /// Draws allowed per proxy selection.
    random_max_tries: usize,
}

impl Orchestrator {
    pub fn new(pool: ProxyPool, runner: Arc<dyn CommandRunner>, config: &Config) -> Self {
        Self {
            pool,
            runner,
            refresh_tries: config.refresh_tries,
            command_max_tries: config.command_max_tries,
            random_max_tries: config.random_max_tries,
        }
    }

    pub fn pool(&self) -> &ProxyPool {
        &self.pool
    }

    /// Run `command` until it exits with status zero.
    ///
    /// The pool is refreshed after every `refresh_tries` failed attempts and
    /// the run is aborted after `command_max_tries` attempts in total.
    pub async fn run(&self, command: &[String]) -> Result<Outcome> {
        if command.is_empty() {
            return Err(Error::EmptyCommand);
        }

        info!("Running command: {}", command.join(" "));

        let mut tries = 0;
        let mut total_tries = 0;
        let mut refreshes = 0;

        loop {
            if total_tries >= self.command_max_tries {
                return Err(Error::MaxTriesExceeded {
                    max_tries: self.command_max_tries,
                    activity: Activity::Command,
                });
            }

            if tries >= self.refresh_tries {
                info!("Reached {} unsuccessful tries. Refreshing proxy list...", self.refresh_tries);
                self.pool.refresh().await?;
                refreshes += 1;
                tries = 0;
            }

            let proxy = self.pool.random_proxy(true, self.random_max_tries).await?;
            // An anonymity label we can't map is fatal before the proxy is used.
            proxy.anonymity_level()?;
            info!("Using proxy (try {}): {}", tries + 1, proxy);

            let exit_code = self.runner.run(command, &proxy.address()).await?;
            self.pool.mark_used(&proxy);
            tries += 1;
            total_tries += 1;

            if exit_code == 0 {
                info!("Done!");
                return Ok(Outcome {
                    attempts: total_tries,
                    refreshes,
                    proxy,
                });
            }

            warn!("Command exited with code {} through {}", exit_code, proxy.address());
        }
    }
}
