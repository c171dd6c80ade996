//! Push alerts via ntfy.
//!
//! Publishes JSON to the ntfy base URL (`{topic, title, message, priority, tags}`).
//! Delivery is best-effort: failures are logged and reported as `false`.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::NtfyConfig;
use crate::fisis::Record;
use crate::month::YearMonth;

/// Shown in place of any field missing from the record.
pub const PLACEHOLDER: &str = "N/A";

/// Destination for new-data alerts.
#[async_trait]
pub trait AlertSink {
    /// Returns whether the alert was accepted.
    async fn notify(&self, month: YearMonth, records: &[Record]) -> bool;
}

/// Human-readable alert built from the first record of a response.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub month: YearMonth,
    pub finance_name: String,
    pub account_name: String,
    pub value: String,
    pub record_count: usize,
}

impl Alert {
    pub fn from_records(month: YearMonth, records: &[Record], value_field: &str) -> Self {
        let first = records.first();
        let field = |key: &str| {
            first
                .and_then(|r| r.text(key))
                .unwrap_or_else(|| PLACEHOLDER.to_string())
        };
        Self {
            month,
            finance_name: field("finance_nm"),
            account_name: field("account_nm"),
            value: field(value_field),
            record_count: records.len(),
        }
    }

    pub fn message(&self) -> String {
        let mut message = format!(
            "New FISIS data for {}\nInstitution: {}\nAccount: {}\nValue: {}",
            self.month, self.finance_name, self.account_name, self.value
        );
        if self.record_count > 1 {
            message.push_str(&format!("\n(+{} more records)", self.record_count - 1));
        }
        message
    }
}

#[derive(Debug, Serialize)]
struct NtfyPayload<'a> {
    topic: &'a str,
    title: String,
    message: String,
    priority: u8,
    tags: &'a [String],
}

pub struct NtfyNotifier {
    client: reqwest::Client,
    config: NtfyConfig,
    value_field: String,
}

impl NtfyNotifier {
    pub fn new(config: NtfyConfig, value_field: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            config,
            value_field: value_field.into(),
        })
    }

    fn payload(&self, alert: &Alert) -> NtfyPayload<'_> {
        NtfyPayload {
            topic: &self.config.topic,
            title: format!("{} ({})", self.config.title, alert.month),
            message: alert.message(),
            priority: self.config.priority,
            tags: &self.config.tags,
        }
    }

    async fn publish(&self, alert: &Alert) -> Result<(), String> {
        let resp = self
            .client
            .post(&self.config.base_url)
            .json(&self.payload(alert))
            .send()
            .await
            .map_err(|e| format!("ntfy request failed: {}", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("ntfy returned {}: {}", status, body));
        }
        Ok(())
    }
}

#[async_trait]
impl AlertSink for NtfyNotifier {
    async fn notify(&self, month: YearMonth, records: &[Record]) -> bool {
        let alert = Alert::from_records(month, records, &self.value_field);
        match self.publish(&alert).await {
            Ok(()) => {
                info!(month = %month, topic = %self.config.topic, "alert sent");
                true
            }
            Err(e) => {
                warn!(month = %month, topic = %self.config.topic, error = %e, "alert delivery failed");
                false
            }
        }
    }
}
