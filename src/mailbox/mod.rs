//! Mailbox collaborator boundary.
//!
//! The poller only ever talks to the [`MailSession`] capability trait;
//! [`imap`] provides the production implementation, [`message`] the MIME
//! decomposition of fetched messages. Errors here are classified so the
//! retry policy attaches precisely: everything in [`MailboxError`] is
//! connection-level (retried with backoff), while malformed individual
//! messages surface as per-message decompose failures and never abort a
//! cycle.

pub mod imap;
pub mod message;

use thiserror::Error;

use crate::adapter::SearchQuery;

/// Connection-level mailbox failure.
#[derive(Debug, Error)]
pub enum MailboxError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("unexpected server response: {0}")]
    Protocol(String),
}

/// Capability interface of a connected mailbox session.
///
/// One selection is active at a time; callers must `close` the selection
/// between distinct search/fetch sequences against the same folder.
pub trait MailSession: Send {
    /// Select the folder to search in.
    fn select(&mut self, folder: &str) -> Result<(), MailboxError>;

    /// Search the selected folder, returning message sequence numbers.
    fn search(&mut self, query: &SearchQuery) -> Result<Vec<u32>, MailboxError>;

    /// Fetch the raw RFC 5322 bytes of one message.
    fn fetch(&mut self, seq: u32) -> Result<Vec<u8>, MailboxError>;

    /// Close the active selection.
    fn close(&mut self) -> Result<(), MailboxError>;

    /// Log out and shut the connection down.
    fn logout(&mut self) -> Result<(), MailboxError>;
}
