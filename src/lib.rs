//! mailspend - unattended mailbox-to-Cospend expense publishing worker.
//!
//! This library provides the shared modules for the two mailspend binaries:
//! - `mailspend`: the long-lived polling worker
//! - `mailspend-infos`: prints the remote project's categories, payment
//!   modes and members (the ids used for configuration)
//!
//! ## Architecture
//!
//! ```text
//! IMAP mailbox → adapter search/fetch → parse → dedup filter → Cospend API
//! ```

pub mod adapter;
pub mod config;
pub mod dedup;
pub mod mailbox;
pub mod model;
pub mod poller;
pub mod publish;
pub mod retry;
pub mod runner;
pub mod shutdown;

// Re-export commonly used types
pub use adapter::{all_adapters, MessageContent, SearchAdapter, SearchQuery};
pub use config::Config;
pub use dedup::PublishedIds;
pub use model::BonSummary;
pub use publish::CospendClient;
pub use shutdown::Shutdown;
