//! The normalized expense record extracted from a receipt email.

use std::fmt;

use chrono::NaiveDateTime;

/// One expense record ("bon") extracted from a matched email.
///
/// Values are never mutated after construction; a bon lives from the
/// adapter that parsed it until it is published (or rejected) within the
/// same polling cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct BonSummary {
    /// Purchase time, local-naive (taken from the receipt itself or the
    /// email `Date` header).
    pub timestamp: NaiveDateTime,
    /// Monetary total in the source currency, two-decimal precision.
    pub amount: f64,
    /// Receipt/reference string; may be empty.
    pub receipt: String,
    /// Name of the adapter that produced this record.
    pub source: String,
}

impl BonSummary {
    /// Stable identity of the underlying purchase event.
    ///
    /// Deterministic across runs so the published-id file keeps working
    /// over process restarts: `source + "_" + ISO timestamp + "_" + receipt`.
    pub fn identity(&self) -> String {
        format!(
            "{}_{}_{}",
            self.source,
            self.timestamp.format("%Y-%m-%dT%H:%M:%S"),
            self.receipt
        )
    }
}

impl fmt::Display for BonSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:.2} at {}",
            self.source,
            self.amount,
            self.timestamp.format("%Y-%m-%dT%H:%M:%S")
        )?;
        if !self.receipt.is_empty() {
            write!(f, " (receipt {})", self.receipt)?;
        }
        Ok(())
    }
}
