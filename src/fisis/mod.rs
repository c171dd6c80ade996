//! FISIS (Financial Statistics Information System) statistics query client.
//!
//! One GET per candidate month against `statisticsInfoSearch.json`, with the
//! month as both start and end of the range. Institution, report and account
//! codes come from config.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::FisisConfig;
use crate::month::YearMonth;

/// `err_cd` value of a successful response.
pub const SUCCESS_CODE: &str = "000";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("FISIS_API_KEY is not set")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("FISIS returned status {status} for {month}")]
    Status { status: u16, month: YearMonth },
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    pub fn is_config(&self) -> bool {
        matches!(self, FetchError::MissingApiKey)
    }
}

/// Top-level response body. `result` is absent on some gateway errors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub result: Option<ApiResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiResult {
    #[serde(default)]
    pub err_cd: String,
    #[serde(default)]
    pub err_msg: String,
    #[serde(default)]
    pub list: Option<Vec<Record>>,
}

/// One statistics row: field name → value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Record(pub serde_json::Map<String, serde_json::Value>);

impl Record {
    /// Field rendered as text. Numbers keep their JSON form; null and blank
    /// strings count as absent.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            serde_json::Value::String(s) if s.trim().is_empty() => None,
            serde_json::Value::String(s) => Some(s.trim().to_string()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Source of quarterly statistics for one month.
#[async_trait]
pub trait StatisticsSource {
    async fn fetch(&self, month: YearMonth) -> Result<ApiResponse, FetchError>;
}

pub struct FisisClient {
    client: reqwest::Client,
    config: FisisConfig,
}

impl FisisClient {
    pub fn new(config: FisisConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self { client, config })
    }

    fn query(&self, month: YearMonth) -> Vec<(&'static str, String)> {
        let month = month.to_string();
        vec![
            ("auth", self.config.api_key.clone()),
            ("accountCd", self.config.account_cd.clone()),
            ("financeCd", self.config.finance_cd.clone()),
            ("listNo", self.config.list_no.clone()),
            ("lang", self.config.lang.clone()),
            ("term", self.config.term.clone()),
            ("startBaseMm", month.clone()),
            ("endBaseMm", month),
        ]
    }
}

#[async_trait]
impl StatisticsSource for FisisClient {
    async fn fetch(&self, month: YearMonth) -> Result<ApiResponse, FetchError> {
        if !self.config.has_api_key() {
            return Err(FetchError::MissingApiKey);
        }

        let resp = self
            .client
            .get(&self.config.base_url)
            .query(&self.query(month))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                month,
            });
        }

        let body = resp.text().await?;
        debug!(month = %month, bytes = body.len(), "fetched FISIS statistics");

        parse_response(&body)
    }
}

pub fn parse_response(body: &str) -> Result<ApiResponse, FetchError> {
    Ok(serde_json::from_str(body)?)
}
