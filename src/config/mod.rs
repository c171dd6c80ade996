use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fisis: FisisConfig,
    #[serde(default)]
    pub ntfy: NtfyConfig,
    #[serde(default)]
    pub watermark: WatermarkConfig,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub keep_alive: KeepAliveConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FisisConfig {
    /// Statistics query endpoint
    #[serde(default = "default_fisis_url")]
    pub base_url: String,
    /// API key, loaded from env FISIS_API_KEY
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_account_cd")]
    pub account_cd: String,
    /// Financial institution code.
    #[serde(default = "default_finance_cd")]
    pub finance_cd: String,
    /// Statistics list (report) code.
    #[serde(default = "default_list_no")]
    pub list_no: String,
    #[serde(default = "default_lang")]
    pub lang: String,
    /// Term granularity, "Q" = quarterly.
    #[serde(default = "default_term")]
    pub term: String,
    #[serde(default = "default_fisis_timeout")]
    pub timeout_secs: u64,
    /// Record key that carries the reported figure.
    #[serde(default = "default_value_field")]
    pub value_field: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NtfyConfig {
    #[serde(default = "default_ntfy_url")]
    pub base_url: String,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_title")]
    pub title: String,
    /// ntfy priority, 1 (min) to 5 (max).
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default = "default_tags")]
    pub tags: Vec<String>,
    #[serde(default = "default_ntfy_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatermarkConfig {
    #[serde(default = "default_watermark_path")]
    pub path: PathBuf,
    /// Months to look back when no usable watermark is stored.
    #[serde(default = "default_fallback_months")]
    pub fallback_months: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClockConfig {
    /// Offset from UTC used to decide "today". Defaults to KST.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeepAliveConfig {
    #[serde(default = "default_keep_alive_interval")]
    pub interval_secs: u64,
    /// None = run until killed.
    #[serde(default)]
    pub max_duration_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_fisis_url() -> String {
    "https://fisis.fss.or.kr/openapi/statisticsInfoSearch.json".to_string()
}
fn default_account_cd() -> String {
    "A".to_string()
}
fn default_finance_cd() -> String {
    "0010635".to_string()
}
fn default_list_no() -> String {
    "SI021".to_string()
}
fn default_lang() -> String {
    "kr".to_string()
}
fn default_term() -> String {
    "Q".to_string()
}
fn default_fisis_timeout() -> u64 {
    15
}
fn default_value_field() -> String {
    "a".to_string()
}
fn default_ntfy_url() -> String {
    "https://ntfy.sh".to_string()
}
fn default_topic() -> String {
    "stock-info".to_string()
}
fn default_title() -> String {
    "New FISIS data".to_string()
}
fn default_priority() -> u8 {
    3
}
fn default_tags() -> Vec<String> {
    vec!["chart_with_upwards_trend".to_string()]
}
fn default_ntfy_timeout() -> u64 {
    10
}
fn default_watermark_path() -> PathBuf {
    PathBuf::from("last_month.txt")
}
fn default_fallback_months() -> u32 {
    12
}
fn default_utc_offset() -> i32 {
    9
}
fn default_keep_alive_interval() -> u64 {
    300
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for FisisConfig {
    fn default() -> Self {
        Self {
            base_url: default_fisis_url(),
            api_key: String::new(),
            account_cd: default_account_cd(),
            finance_cd: default_finance_cd(),
            list_no: default_list_no(),
            lang: default_lang(),
            term: default_term(),
            timeout_secs: default_fisis_timeout(),
            value_field: default_value_field(),
        }
    }
}

impl Default for NtfyConfig {
    fn default() -> Self {
        Self {
            base_url: default_ntfy_url(),
            topic: default_topic(),
            title: default_title(),
            priority: default_priority(),
            tags: default_tags(),
            timeout_secs: default_ntfy_timeout(),
        }
    }
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            path: default_watermark_path(),
            fallback_months: default_fallback_months(),
        }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: default_utc_offset(),
        }
    }
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_keep_alive_interval(),
            max_duration_secs: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl FisisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl NtfyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load config from a TOML file, then overlay environment variables for secrets.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load a default config with env-only overrides (no file needed).
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    // The API key is never read from the config file.
    fn apply_env(&mut self) {
        self.fisis.api_key = std::env::var("FISIS_API_KEY").unwrap_or_default();
        if let Ok(url) = std::env::var("FISIS_BASE_URL") {
            self.fisis.base_url = url;
        }
        if let Ok(url) = std::env::var("NTFY_BASE_URL") {
            self.ntfy.base_url = url;
        }
        if let Ok(topic) = std::env::var("NTFY_TOPIC") {
            self.ntfy.topic = topic;
        }
        if let Ok(path) = std::env::var("WATERMARK_PATH") {
            self.watermark.path = PathBuf::from(path);
        }
        if let Some(offset) = std::env::var("TZ_OFFSET_HOURS")
            .ok()
            .and_then(|s| s.trim().parse::<i32>().ok())
        {
            self.clock.utc_offset_hours = offset;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(-23..=23).contains(&self.clock.utc_offset_hours) {
            return Err(ConfigError::Invalid(format!(
                "clock.utc_offset_hours must be within -23..=23, got {}",
                self.clock.utc_offset_hours
            )));
        }
        if self.fisis.timeout_secs == 0 || self.ntfy.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request timeouts must be at least one second".to_string(),
            ));
        }
        if self.ntfy.topic.trim().is_empty() {
            return Err(ConfigError::Invalid("ntfy.topic must not be empty".to_string()));
        }
        if !(1..=5).contains(&self.ntfy.priority) {
            return Err(ConfigError::Invalid(format!(
                "ntfy.priority must be within 1..=5, got {}",
                self.ntfy.priority
            )));
        }
        if self.keep_alive.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "keep_alive.interval_secs must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}
