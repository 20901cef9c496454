//! Merchant search adapters.
//!
//! An adapter knows which emails belong to its merchant (subject + since
//! search predicate), which MIME parts it needs decoded, and how to turn
//! the decoded content into a [`BonSummary`]. Parsing is pure and total:
//! malformed input yields `None`, never a panic, so one bad email can
//! never abort a polling cycle.

pub mod netto;
pub mod picnic;
pub mod rewe;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::model::BonSummary;

pub use netto::NettoAdapter;
pub use picnic::PicnicAdapter;
pub use rewe::ReweAdapter;

/// Mailbox search predicate produced by an adapter.
///
/// Adapters are expected to keep their subject predicates disjoint; the
/// pipeline does not dedupe the same message across two sources.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// Substring matched against the Subject header.
    pub subject: String,
    /// Lower bound on the message date.
    pub since: NaiveDate,
}

impl SearchQuery {
    /// Render as an IMAP SEARCH argument, e.g.
    /// `(SUBJECT "Dein Bon") (SINCE "04-Mar-2024")`.
    pub fn to_imap(&self) -> String {
        format!(
            "(SUBJECT \"{}\") (SINCE \"{}\")",
            self.subject,
            self.since.format("%d-%b-%Y")
        )
    }
}

/// A named binary attachment of a fetched message.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Decoded content parts of a fetched message.
///
/// Only the parts an adapter declared interest in are populated; the
/// others stay empty to avoid wasted decoding work.
#[derive(Debug, Clone, Default)]
pub struct MessageContent {
    /// Decoded text/plain parts.
    pub plain_text: Vec<String>,
    /// Decoded text/html parts.
    pub html_text: Vec<String>,
    /// Named binary attachments.
    pub attachments: Vec<Attachment>,
}

/// Per-merchant parsing strategy.
pub trait SearchAdapter: Send + Sync {
    /// Stable merchant identifier; used for config lookups and as the
    /// record's source name.
    fn name(&self) -> &'static str;

    /// Search predicate for messages this adapter can parse.
    fn search_query(&self, since: NaiveDate) -> SearchQuery;

    /// Whether the poller must decode text/plain parts for this adapter.
    fn wants_plain_text(&self) -> bool {
        false
    }

    /// Whether the poller must decode text/html parts for this adapter.
    fn wants_html(&self) -> bool {
        false
    }

    /// Whether the poller must decode binary attachments for this adapter.
    fn wants_attachments(&self) -> bool {
        false
    }

    /// Convert decoded content into a record.
    ///
    /// Returns `None` when any required field is missing; partial records
    /// are never produced.
    fn parse(&self, content: &MessageContent, email_timestamp: NaiveDateTime)
        -> Option<BonSummary>;
}

/// All known adapters, statically assembled at startup.
pub fn all_adapters() -> Vec<Box<dyn SearchAdapter>> {
    vec![
        Box::new(PicnicAdapter),
        Box::new(ReweAdapter),
        Box::new(NettoAdapter),
    ]
}

/// Parse a monetary amount tolerating German formatting: comma decimal
/// separator, dot thousands separator and a stray currency suffix
/// (`"1.234,56 EUR"` → `1234.56`).
pub(crate) fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned = raw
        .trim()
        .trim_end_matches('€')
        .trim_end_matches("EUR")
        .trim();
    if cleaned.is_empty() {
        return None;
    }
    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned.to_string()
    };
    normalized.parse().ok()
}

/// Labeled fields scanned out of extracted receipt-document text.
#[derive(Debug, Default)]
pub(crate) struct ReceiptFields {
    pub amount: Option<f64>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub receipt: Option<String>,
}

/// Scan line-oriented receipt text for the German field prefixes used on
/// printed receipts (`SUMME`, `Datum:`, `Uhrzeit:`, `Beleg-Nr.`).
///
/// The first occurrence of each field wins.
pub(crate) fn scan_receipt_text(text: &str) -> ReceiptFields {
    let mut fields = ReceiptFields::default();
    for line in text.lines() {
        if fields.amount.is_none() && line.contains("SUMME") {
            fields.amount = parse_amount(line.replace("SUMME", "").trim());
        } else if fields.date.is_none() && line.contains("Datum:") {
            let raw = line.replace("Datum:", "");
            fields.date = NaiveDate::parse_from_str(raw.trim(), "%d.%m.%Y").ok();
        } else if fields.time.is_none() && line.contains("Uhrzeit:") {
            let raw = line.replace("Uhrzeit:", "").replace("Uhr", "");
            let raw = raw.trim();
            fields.time = NaiveTime::parse_from_str(raw, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
                .ok();
        } else if fields.receipt.is_none() && line.contains("Beleg-Nr.") {
            let raw = line.replace("Beleg-Nr.", "");
            let raw = raw.trim();
            if !raw.is_empty() {
                fields.receipt = Some(raw.to_string());
            }
        }
    }
    fields
}

/// Build a bon from extracted receipt-document text, requiring amount,
/// date, time and receipt number.
pub(crate) fn bon_from_receipt_text(text: &str, source: &str) -> Option<BonSummary> {
    let fields = scan_receipt_text(text);
    Some(BonSummary {
        timestamp: fields.date?.and_time(fields.time?),
        amount: fields.amount?,
        receipt: fields.receipt?,
        source: source.to_string(),
    })
}

/// Extract text from a PDF attachment; `None` when extraction fails
/// (encrypted, truncated or not actually a PDF).
pub(crate) fn attachment_text(attachment: &Attachment) -> Option<String> {
    pdf_extract::extract_text_from_mem(&attachment.data).ok()
}
