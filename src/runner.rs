//! Orchestrator loop: connect, poll all adapters, publish, sleep.
//!
//! One logical control task drives the whole pipeline. Blocking mailbox
//! work runs on the blocking pool; the shutdown token is observed at
//! every state transition and inside every wait. Exhausted retry budgets
//! propagate as errors so the process exits non-zero instead of limping
//! along against a dead collaborator.

use anyhow::{bail, Context, Result};
use tracing::{debug, error, info};

use crate::adapter::all_adapters;
use crate::config::Config;
use crate::dedup::PublishedIds;
use crate::mailbox::imap::{self, ImapMailbox};
use crate::mailbox::MailSession;
use crate::model::BonSummary;
use crate::poller;
use crate::publish::{CospendClient, PublishError};
use crate::retry::{self, BackoffPolicy, MAILBOX_CONNECT_ATTEMPTS, PUBLISH_ATTEMPTS};
use crate::shutdown::Shutdown;

/// Run the worker until shutdown is signaled or a fatal condition occurs.
///
/// In dry mode the publish step is replaced by logging and the loop
/// terminates after one cycle.
pub async fn run(config: Config, shutdown: Shutdown, dry: bool) -> Result<()> {
    for adapter in all_adapters() {
        if config.is_adapter_enabled(adapter.name()) {
            debug!(adapter = adapter.name(), "adapter_enabled");
        } else {
            debug!(adapter = adapter.name(), "adapter_disabled");
        }
    }

    let client = CospendClient::new(&config).context("failed to build HTTP client")?;
    if !client.test_connection().await {
        bail!(
            "no connection to the cospend project: {}",
            config.cospend_project_url
        );
    }

    let store = PublishedIds::new(&config.published_ids_file);
    let connect_policy =
        BackoffPolicy::new(MAILBOX_CONNECT_ATTEMPTS, config.interval_duration());
    let publish_policy = BackoffPolicy::new(PUBLISH_ATTEMPTS, config.interval_duration());

    while !shutdown.is_triggered() {
        let session = match connect_mailbox(&config, &connect_policy, &shutdown).await? {
            Some(session) => session,
            None => break, // shutdown during connect/backoff
        };

        let published = store
            .load()
            .context("failed to load the published-id file")?;

        let cycle_config = config.clone();
        let cycle_shutdown = shutdown.clone();
        let bons = tokio::task::spawn_blocking(move || {
            let mut session = session;
            let adapters = all_adapters();
            let result = poller::poll_cycle(
                &mut session,
                &adapters,
                &cycle_config,
                &published,
                &cycle_shutdown,
            );
            // The connection is per-cycle; never carried across cycles.
            let _ = session.logout();
            result
        })
        .await
        .context("mailbox poll task panicked")?
        .context("mailbox cycle failed")?;

        if shutdown.is_triggered() {
            break;
        }

        if dry {
            info!(count = bons.len(), "dry_run_results");
            for bon in &bons {
                info!(identity = %bon.identity(), bon = %bon, "dry_run_bon");
            }
            break;
        }

        publish_with_retry(&client, bons, &store, &publish_policy, &shutdown).await?;

        if shutdown.is_triggered() {
            break;
        }
        info!(seconds = config.interval, "cycle_sleep");
        if !shutdown.sleep(config.interval_duration()).await {
            break;
        }
    }

    info!("worker_stopped");
    Ok(())
}

/// Open a fresh mailbox connection with exponential backoff.
///
/// `Ok(None)` means shutdown was signaled while connecting or waiting;
/// exhausting the attempt budget is an error (fatal upstream).
async fn connect_mailbox(
    config: &Config,
    policy: &BackoffPolicy,
    shutdown: &Shutdown,
) -> Result<Option<ImapMailbox>> {
    let mut attempt = 0;
    loop {
        if shutdown.is_triggered() {
            return Ok(None);
        }

        let cfg = config.clone();
        let result = tokio::task::spawn_blocking(move || imap::connect(&cfg))
            .await
            .context("mailbox connect task panicked")?;

        match result {
            Ok(session) => return Ok(Some(session)),
            Err(e) => {
                error!(host = %config.imap_host, error = %e, "no connection to the imap server");
                attempt += 1;
                if attempt >= policy.max_attempts {
                    bail!(
                        "no connection to the imap server after {} attempts",
                        policy.max_attempts
                    );
                }
                if !retry::wait_before_retry(policy, attempt - 1, shutdown).await {
                    return Ok(None);
                }
            }
        }
    }
}

/// Publish a batch with exponential backoff on connection-level failure.
///
/// Records already handled (published or rejected) are drained from the
/// batch inside `publish_batch`, so a retry only re-sends the remainder.
async fn publish_with_retry(
    client: &CospendClient,
    mut bons: Vec<BonSummary>,
    store: &PublishedIds,
    policy: &BackoffPolicy,
    shutdown: &Shutdown,
) -> Result<()> {
    let mut attempt = 0;
    loop {
        if shutdown.is_triggered() {
            return Ok(());
        }

        match client.publish_batch(&mut bons, store).await {
            Ok(()) => return Ok(()),
            Err(PublishError::Connection(e)) => {
                error!(error = %e, "no connection to the cospend server");
                attempt += 1;
                if attempt >= policy.max_attempts {
                    bail!(
                        "no connection to the cospend server after {} attempts",
                        policy.max_attempts
                    );
                }
                if !retry::wait_before_retry(policy, attempt - 1, shutdown).await {
                    return Ok(());
                }
            }
            Err(e) => return Err(e).context("failed to publish bons"),
        }
    }
}
