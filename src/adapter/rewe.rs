//! REWE eBon receipts (PDF attachment).
//!
//! The eBon PDF reproduces the printed receipt: the amount, date, time
//! and receipt number sit on labeled lines. All four fields are required;
//! a document missing any of them yields no record.

use chrono::{NaiveDate, NaiveDateTime};

use super::{attachment_text, bon_from_receipt_text, MessageContent, SearchAdapter, SearchQuery};
use crate::model::BonSummary;

pub struct ReweAdapter;

impl SearchAdapter for ReweAdapter {
    fn name(&self) -> &'static str {
        "Rewe eBon"
    }

    fn search_query(&self, since: NaiveDate) -> SearchQuery {
        SearchQuery {
            subject: "REWE eBon".to_string(),
            since,
        }
    }

    fn wants_attachments(&self) -> bool {
        true
    }

    fn parse(&self, content: &MessageContent, _email_timestamp: NaiveDateTime) -> Option<BonSummary> {
        content
            .attachments
            .iter()
            .filter_map(|attachment| attachment_text(attachment))
            .find_map(|text| bon_from_receipt_text(&text, self.name()))
    }
}
