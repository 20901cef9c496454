//! Cospend API client: connectivity test, project infos and bill publishing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::dedup::PublishedIds;
use crate::model::BonSummary;

/// Publishing failure, classified so the caller can attach the right
/// policy: `Connection` is retried with backoff, `Store` is fatal.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("no connection to the cospend server: {0}")]
    Connection(#[from] reqwest::Error),

    #[error("failed to record published id: {0}")]
    Store(#[from] std::io::Error),
}

/// JSON body of `POST .../bills`.
#[derive(Debug, Serialize)]
pub struct NewBill {
    pub amount: f64,
    pub what: String,
    pub payed_for: String,
    pub payer: String,
    /// Unix seconds of the purchase.
    pub timestamp: i64,
    pub categoryid: i64,
    pub paymentmodeid: i64,
    pub comment: String,
}

/// A category or payment mode entry of the project infos response.
#[derive(Debug, Deserialize)]
pub struct NamedEntry {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
}

/// A project member.
#[derive(Debug, Deserialize)]
pub struct Member {
    pub id: i64,
    pub name: String,
}

/// Response of the project infos endpoint, keyed by numeric id.
#[derive(Debug, Deserialize)]
pub struct ProjectInfos {
    #[serde(default)]
    pub categories: HashMap<String, NamedEntry>,
    #[serde(default)]
    pub paymentmodes: HashMap<String, NamedEntry>,
    #[serde(default)]
    pub members: Vec<Member>,
}

enum ApiEndpoint {
    Bills,
    Infos,
}

/// HTTP client for one Cospend project.
pub struct CospendClient {
    http: reqwest::Client,
    config: Config,
}

impl CospendClient {
    pub fn new(config: &Config) -> Result<Self, PublishError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    /// Endpoint URL derivation: a share link (`…/cospend/s/…`) is rewritten
    /// to the API form, and the auth segment is the project password or
    /// the literal `no-pass` (`members` for the infos endpoint).
    fn endpoint_url(&self, endpoint: ApiEndpoint) -> String {
        let mut url = self.config.cospend_project_url.clone();
        if !url.ends_with('/') {
            url.push('/');
        }
        if !url.contains("api") {
            url = url.replace("/cospend/s/", "/cospend/api/projects/");
        }

        match (&self.config.cospend_project_password, endpoint) {
            (Some(pw), ApiEndpoint::Bills) => url + pw + "/bills",
            (Some(pw), ApiEndpoint::Infos) => url + pw,
            (None, ApiEndpoint::Bills) => url + "no-pass/bills",
            (None, ApiEndpoint::Infos) => url + "members",
        }
    }

    /// Startup connectivity probe against the infos endpoint.
    pub async fn test_connection(&self) -> bool {
        let url = self.endpoint_url(ApiEndpoint::Infos);
        match self.http.get(&url).send().await {
            Ok(resp) if resp.status().as_u16() < 400 => {
                debug!("cospend_connection_ok");
                true
            }
            Ok(resp) => {
                error!(
                    url = %self.config.cospend_project_url,
                    status = resp.status().as_u16(),
                    "cospend_connection_rejected"
                );
                false
            }
            Err(e) => {
                error!(
                    url = %self.config.cospend_project_url,
                    error = %e,
                    "cospend_connection_failed"
                );
                false
            }
        }
    }

    /// Fetch the project's categories, payment modes and members.
    pub async fn project_infos(&self) -> Result<ProjectInfos, PublishError> {
        let url = self.endpoint_url(ApiEndpoint::Infos);
        let infos = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(infos)
    }

    /// Publish a batch of bons, draining `bons` as records are handled.
    ///
    /// Per record: a rejection (status ≥ 400) is logged and the record
    /// dropped for this cycle without touching the dedup store (it stays
    /// "new" and is retried next cycle); a success appends the identity
    /// durably before the next record is attempted. A connection-level
    /// failure returns early, leaving the unhandled records in `bons`
    /// for the caller's retry.
    pub async fn publish_batch(
        &self,
        bons: &mut Vec<BonSummary>,
        store: &PublishedIds,
    ) -> Result<(), PublishError> {
        if bons.is_empty() {
            return Ok(());
        }
        info!(count = bons.len(), "publishing_bons");

        let url = self.endpoint_url(ApiEndpoint::Bills);
        while let Some(bon) = bons.first() {
            let identity = bon.identity();
            let bill = self.bill_for(bon);
            info!(identity = %identity, bon = %bon, "pushing_bill");
            debug!(payload = ?bill, url = %url, "sending_bill");

            let resp = self.http.post(&url).json(&bill).send().await?;
            let status = resp.status();
            if status.as_u16() < 400 {
                store.append(&identity)?;
                debug!(identity = %identity, "bill_published");
            } else {
                warn!(
                    identity = %identity,
                    status = status.as_u16(),
                    reason = status.canonical_reason().unwrap_or("unknown"),
                    "bill_rejected"
                );
            }
            bons.remove(0);
        }
        Ok(())
    }

    fn bill_for(&self, bon: &BonSummary) -> NewBill {
        let comment = if bon.receipt.is_empty() {
            format!("{} - Autopush", bon.source)
        } else {
            format!("{} - Autopush - Beleg: {}", bon.source, bon.receipt)
        };
        NewBill {
            amount: bon.amount,
            what: bon.source.clone(),
            payed_for: self.config.payed_for_for(&bon.source),
            payer: self.config.payer_for(&bon.source),
            timestamp: bon.timestamp.and_utc().timestamp(),
            categoryid: self.config.categoryid_for(&bon.source),
            paymentmodeid: self.config.paymentmodeid_for(&bon.source),
            comment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn config_with_url(url: &str, password: Option<&str>) -> Config {
        Config {
            imap_host: "imap.test.com".to_string(),
            imap_user: "user".to_string(),
            imap_password: "pass".to_string(),
            imap_inbox: "Inbox".to_string(),
            imap_port: 993,
            cospend_project_url: url.to_string(),
            cospend_project_password: password.map(str::to_string),
            cospend_payed_for: "1,2".to_string(),
            cospend_payer: "3".to_string(),
            cospend_categoryid_default: 4,
            cospend_paymentmodeid_default: 5,
            interval: 60,
            since: "today".to_string(),
            published_ids_file: PathBuf::from("data/published_ids.txt"),
            adapter_env: HashMap::new(),
        }
    }

    #[test]
    fn test_share_url_rewritten_to_api_url() {
        let config = config_with_url("https://cloud.test/index.php/apps/cospend/s/abc123", None);
        let client = CospendClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint_url(ApiEndpoint::Bills),
            "https://cloud.test/index.php/apps/cospend/api/projects/abc123/no-pass/bills"
        );
        assert_eq!(
            client.endpoint_url(ApiEndpoint::Infos),
            "https://cloud.test/index.php/apps/cospend/api/projects/abc123/members"
        );
    }

    #[test]
    fn test_api_url_with_password() {
        let config = config_with_url(
            "https://cloud.test/index.php/apps/cospend/api/projects/abc123/",
            Some("secret"),
        );
        let client = CospendClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint_url(ApiEndpoint::Bills),
            "https://cloud.test/index.php/apps/cospend/api/projects/abc123/secret/bills"
        );
        assert_eq!(
            client.endpoint_url(ApiEndpoint::Infos),
            "https://cloud.test/index.php/apps/cospend/api/projects/abc123/secret"
        );
    }

    #[test]
    fn test_bill_payload_fields() {
        let config = config_with_url("https://cloud.test/api/projects/abc", None);
        let client = CospendClient::new(&config).unwrap();
        let bon = BonSummary {
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 4)
                .unwrap()
                .and_hms_opt(15, 42, 0)
                .unwrap(),
            amount: 12.30,
            receipt: "9981".to_string(),
            source: "Rewe eBon".to_string(),
        };

        let bill = client.bill_for(&bon);
        assert_eq!(bill.amount, 12.30);
        assert_eq!(bill.what, "Rewe eBon");
        assert_eq!(bill.payer, "3");
        assert_eq!(bill.payed_for, "1,2");
        assert_eq!(bill.categoryid, 4);
        assert_eq!(bill.paymentmodeid, 5);
        assert_eq!(bill.timestamp, 1709566920);
        assert_eq!(bill.comment, "Rewe eBon - Autopush - Beleg: 9981");
    }

    #[test]
    fn test_bill_comment_without_receipt() {
        let config = config_with_url("https://cloud.test/api/projects/abc", None);
        let client = CospendClient::new(&config).unwrap();
        let bon = BonSummary {
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 5)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            amount: 23.45,
            receipt: String::new(),
            source: "Picnic eBon".to_string(),
        };
        assert_eq!(client.bill_for(&bon).comment, "Picnic eBon - Autopush");
    }

    #[test]
    fn test_project_infos_deserializes() {
        let json = r#"{
            "categories": {"1": {"name": "Groceries", "icon": "🛒"}},
            "paymentmodes": {"2": {"name": "Card"}},
            "members": [{"id": 3, "name": "Alice", "weight": 1}]
        }"#;
        let infos: ProjectInfos = serde_json::from_str(json).unwrap();
        assert_eq!(infos.categories["1"].name, "Groceries");
        assert_eq!(infos.paymentmodes["2"].name, "Card");
        assert_eq!(infos.members[0].name, "Alice");
    }
}
