//! One polling cycle: search, fetch, parse and dedup-filter per adapter.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::adapter::SearchAdapter;
use crate::config::Config;
use crate::mailbox::message::{self, ContentWants};
use crate::mailbox::{MailSession, MailboxError};
use crate::model::BonSummary;
use crate::shutdown::Shutdown;

/// Run one full polling cycle over all enabled adapters.
///
/// `published` is the dedup snapshot taken at cycle start; it is shared
/// across adapters, so a message matched by two adapters in the same
/// cycle is not deduplicated here (adapters keep their subject filters
/// disjoint). Parse and decompose failures skip the single message;
/// only connection-level mailbox errors abort the cycle.
pub fn poll_cycle(
    session: &mut dyn MailSession,
    adapters: &[Box<dyn SearchAdapter>],
    config: &Config,
    published: &HashSet<String>,
    shutdown: &Shutdown,
) -> Result<Vec<BonSummary>, MailboxError> {
    let since = config.since_date();
    let mut batch = Vec::new();

    for adapter in adapters {
        if shutdown.is_triggered() {
            break;
        }
        if !config.is_adapter_enabled(adapter.name()) {
            continue;
        }

        let query = adapter.search_query(since);
        info!(
            adapter = adapter.name(),
            subject = %query.subject,
            "mailbox_search"
        );

        session.select(&config.imap_inbox)?;
        let ids = session.search(&query)?;
        debug!(adapter = adapter.name(), hits = ids.len(), "mailbox_search_hits");

        let wants = ContentWants::for_adapter(adapter.as_ref());
        for seq in ids {
            let raw = session.fetch(seq)?;
            let msg = match message::decompose(&raw, &wants) {
                Ok(msg) => msg,
                Err(e) => {
                    warn!(
                        adapter = adapter.name(),
                        seq = seq,
                        error = %e,
                        "message_decompose_failed"
                    );
                    continue;
                }
            };

            match adapter.parse(&msg.content, msg.timestamp) {
                Some(bon) => {
                    let identity = bon.identity();
                    if published.contains(&identity) {
                        debug!(identity = %identity, "bon_already_published");
                    } else {
                        info!(identity = %identity, bon = %bon, "bon_found");
                        batch.push(bon);
                    }
                }
                None => {
                    warn!(adapter = adapter.name(), seq = seq, "bon_parse_failed");
                }
            }
        }

        // Sessions require the selection to be closed between distinct
        // search/fetch sequences against the same folder.
        session.close()?;
    }

    Ok(batch)
}
