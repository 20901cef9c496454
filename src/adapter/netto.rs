//! Netto digital receipts (PDF attachment).
//!
//! Netto's Kassenbon PDFs use the same labeled lines as the REWE eBon
//! (`SUMME`, `Datum:`, `Uhrzeit:`, `Beleg-Nr.`), so the shared receipt
//! scanner does the work; only the search subject and source name differ.

use chrono::{NaiveDate, NaiveDateTime};

use super::{attachment_text, bon_from_receipt_text, MessageContent, SearchAdapter, SearchQuery};
use crate::model::BonSummary;

pub struct NettoAdapter;

impl SearchAdapter for NettoAdapter {
    fn name(&self) -> &'static str {
        "Netto eBon"
    }

    fn search_query(&self, since: NaiveDate) -> SearchQuery {
        SearchQuery {
            subject: "Ihr digitaler Kassenbon".to_string(),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_name_and_subject_differ_from_rewe() {
        let since = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(NettoAdapter.name(), "Netto eBon");
        assert_eq!(
            NettoAdapter.search_query(since).subject,
            "Ihr digitaler Kassenbon"
        );
    }

    #[test]
    fn test_parse_no_attachments_is_none() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert!(NettoAdapter.parse(&MessageContent::default(), ts).is_none());
    }
}
