//! Picnic delivery receipts ("Dein Bon" emails).
//!
//! Picnic sends the receipt inline as plain text; the total sits on a
//! `Gesamtbetrag` line. These emails carry no receipt number, so the
//! purchase time is the email timestamp and the receipt field stays empty.

use chrono::{NaiveDate, NaiveDateTime};

use super::{parse_amount, MessageContent, SearchAdapter, SearchQuery};
use crate::model::BonSummary;

pub struct PicnicAdapter;

impl SearchAdapter for PicnicAdapter {
    fn name(&self) -> &'static str {
        "Picnic eBon"
    }

    fn search_query(&self, since: NaiveDate) -> SearchQuery {
        SearchQuery {
            subject: "Dein Bon".to_string(),
            since,
        }
    }

    fn wants_plain_text(&self) -> bool {
        true
    }

    fn parse(
        &self,
        content: &MessageContent,
        email_timestamp: NaiveDateTime,
    ) -> Option<BonSummary> {
        for part in &content.plain_text {
            for line in part.lines() {
                if !line.contains("Gesamtbetrag") {
                    continue;
                }
                let amount = line.split_whitespace().nth(1).and_then(parse_amount)?;
                return Some(BonSummary {
                    timestamp: email_timestamp,
                    amount,
                    receipt: String::new(),
                    source: self.name().to_string(),
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_gesamtbetrag_line() {
        let content = MessageContent {
            plain_text: vec!["Danke fuer deine Bestellung\nGesamtbetrag 23,45 EUR\n".to_string()],
            ..Default::default()
        };
        let bon = PicnicAdapter.parse(&content, ts()).unwrap();
        assert_eq!(bon.amount, 23.45);
        assert_eq!(bon.source, "Picnic eBon");
        assert_eq!(bon.receipt, "");
        assert_eq!(bon.timestamp, ts());
    }

    #[test]
    fn test_parse_missing_total_line_is_none() {
        let content = MessageContent {
            plain_text: vec!["Danke fuer deine Bestellung\n".to_string()],
            ..Default::default()
        };
        assert!(PicnicAdapter.parse(&content, ts()).is_none());
    }

    #[test]
    fn test_parse_unparseable_amount_is_none() {
        let content = MessageContent {
            plain_text: vec!["Gesamtbetrag abc EUR\n".to_string()],
            ..Default::default()
        };
        assert!(PicnicAdapter.parse(&content, ts()).is_none());
    }

    #[test]
    fn test_parse_empty_content_is_none() {
        assert!(PicnicAdapter.parse(&MessageContent::default(), ts()).is_none());
    }

    #[test]
    fn test_wants_only_plain_text() {
        assert!(PicnicAdapter.wants_plain_text());
        assert!(!PicnicAdapter.wants_html());
        assert!(!PicnicAdapter.wants_attachments());
    }
}
