//! Playerwatch configuration system.
//!
//! Loaded from TOML (`~/.playerwatch/config.toml` by default), then overridden
//! by environment variables such as `DATA_API_KEY` or `MAIL_TO`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PlayerwatchError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerwatchConfig {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl PlayerwatchConfig {
    /// Load config from the default path (~/.playerwatch/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PlayerwatchError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| PlayerwatchError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Playerwatch home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".playerwatch")
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup. Unset keys leave the field alone.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("APP_VERSION") {
            self.app.version = v;
        }
        if let Some(v) = get("APP_LOG_LEVEL") {
            self.app.log_level = v.to_lowercase();
        }
        if let Some(v) = get("APP_LOG_JSON") {
            self.app.log_json = parse_env("APP_LOG_JSON", &v)?;
        }
        if let Some(v) = get("APP_MODE") {
            self.app.mode = parse_env("APP_MODE", &v)?;
        }
        if let Some(v) = get("APP_MAX_GOROUTINES") {
            self.app.max_concurrency = parse_env("APP_MAX_GOROUTINES", &v)?;
        }
        if let Some(v) = get("APP_RUN_TIMEOUT") {
            self.app.run_timeout = env_duration("APP_RUN_TIMEOUT", &v)?;
        }
        if let Some(v) = get("APP_SCHEDULE") {
            self.app.schedule = Some(v);
        }

        if let Some(v) = get("DATA_URL") {
            self.data.url = v;
        }
        if let Some(v) = get("DATA_API_KEY") {
            self.data.api_key = v;
        }
        if let Some(v) = get("DATA_IGNORED_GROUPS") {
            self.data.ignored_groups = parse_list(&v);
        }
        if let Some(v) = get("DATA_COMPANIES") {
            self.data.companies = parse_map("DATA_COMPANIES", &v)?;
        }
        if let Some(v) = get("DATA_ALLOWED_COMPANIES") {
            self.data.allowed_companies = parse_list(&v);
        }
        if let Some(v) = get("DATA_MAX_OFFLINE") {
            self.data.max_offline = env_duration("DATA_MAX_OFFLINE", &v)?;
        }
        if let Some(v) = get("DATA_STORE_TEST_NUMBER") {
            self.data.store_test_number = parse_env("DATA_STORE_TEST_NUMBER", &v)?;
        }
        if let Some(v) = get("DATA_STORE_NUMBER_PREFIX") {
            self.data.store_number_prefix = v;
        }
        if let Some(v) = get("DATA_COMPANY_NAME_PREFIX") {
            self.data.company_name_prefix = v;
        }
        if let Some(v) = get("DATA_IGNORED_TAGS") {
            self.data.ignored_tags = parse_list(&v);
        }

        if let Some(v) = get("MAIL_FROM") {
            self.mail.from = v;
        }
        if let Some(v) = get("MAIL_HOST") {
            self.mail.host = v;
        }
        if let Some(v) = get("MAIL_PASSWORD") {
            self.mail.password = v;
        }
        if let Some(v) = get("MAIL_PORT") {
            self.mail.port = parse_env("MAIL_PORT", &v)?;
        }
        if let Some(v) = get("MAIL_TO") {
            self.mail.to = parse_list(&v);
        }
        if let Some(v) = get("MAIL_STORES") {
            self.mail.stores = parse_map("MAIL_STORES", &v)?;
        }
        if let Some(v) = get("MAIL_SUBJECT") {
            self.mail.subject = v;
        }
        if let Some(v) = get("MAIL_TEMPLATE_NAME") {
            self.mail.template_name = v;
        }
        if let Some(v) = get("MAIL_TEMPLATES_DIR") {
            self.mail.templates_dir = v;
        }

        if let Some(v) = get("GATEWAY_HOST") {
            self.gateway.host = v;
        }
        if let Some(v) = get("GATEWAY_PORT") {
            self.gateway.port = parse_env("GATEWAY_PORT", &v)?;
        }

        Ok(())
    }

    /// Check that a run can actually be attempted with this config.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.data.url.is_empty() {
            missing.push("data.url");
        }
        if self.data.api_key.is_empty() {
            missing.push("data.api_key");
        }
        if self.mail.host.is_empty() {
            missing.push("mail.host");
        }
        if self.mail.from.is_empty() {
            missing.push("mail.from");
        }
        if self.mail.to.is_empty() {
            missing.push("mail.to");
        }
        if !missing.is_empty() {
            return Err(PlayerwatchError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }

        if self.data.allowed_companies.is_empty() {
            tracing::warn!(
                "⚠️ data.allowed_companies is empty: every player will be filtered out"
            );
        }
        if self.data.store_number_prefix.is_empty() || self.data.company_name_prefix.is_empty() {
            tracing::warn!("⚠️ Empty tag prefix matches every tag");
        }
        Ok(())
    }

    /// Copy with secrets masked, for debug logging.
    pub fn redacted(&self) -> Self {
        let mut cfg = self.clone();
        if !cfg.data.api_key.is_empty() {
            cfg.data.api_key = "***".into();
        }
        if !cfg.mail.password.is_empty() {
            cfg.mail.password = "***".into();
        }
        cfg
    }
}

/// Runtime mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Prod,
    Dev,
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prod" => Ok(Mode::Prod),
            "dev" => Ok(Mode::Dev),
            other => Err(format!("unknown mode '{other}' (expected prod or dev)")),
        }
    }
}

/// Application-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "bool_true")]
    pub log_json: bool,
    #[serde(default)]
    pub mode: Mode,
    /// Upper bound on notifications in flight at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Wall-clock budget for one run, fetch through dispatch.
    #[serde(default = "default_run_timeout", with = "duration_str")]
    pub run_timeout: Duration,
    /// Cron expression for timer-triggered runs (`serve` only).
    #[serde(default)]
    pub schedule: Option<String>,
}

fn bool_true() -> bool { true }
fn default_version() -> String { "0.0.1".into() }
fn default_log_level() -> String { "info".into() }
fn default_max_concurrency() -> usize { 5 }
fn default_run_timeout() -> Duration { Duration::from_secs(300) }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            log_level: default_log_level(),
            log_json: true,
            mode: Mode::default(),
            max_concurrency: default_max_concurrency(),
            run_timeout: default_run_timeout(),
            schedule: None,
        }
    }
}

/// Reporting API access and player selection rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub ignored_groups: Vec<String>,
    /// Company tag value → display name.
    #[serde(default)]
    pub companies: HashMap<String, String>,
    #[serde(default)]
    pub allowed_companies: Vec<String>,
    /// Players seen more recently than this are considered online.
    #[serde(default = "default_max_offline", with = "duration_str")]
    pub max_offline: Duration,
    /// Store number carried by test/demo players; never assigned.
    #[serde(default)]
    pub store_test_number: i64,
    #[serde(default = "default_store_number_prefix")]
    pub store_number_prefix: String,
    #[serde(default = "default_company_name_prefix")]
    pub company_name_prefix: String,
    #[serde(default)]
    pub ignored_tags: Vec<String>,
}

fn default_max_offline() -> Duration { Duration::from_secs(48 * 3600) }
fn default_store_number_prefix() -> String { "store:".into() }
fn default_company_name_prefix() -> String { "company:".into() }

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            ignored_groups: vec![],
            companies: HashMap::new(),
            allowed_companies: vec![],
            max_offline: default_max_offline(),
            store_test_number: 0,
            store_number_prefix: default_store_number_prefix(),
            company_name_prefix: default_company_name_prefix(),
            ignored_tags: vec![],
        }
    }
}

/// SMTP delivery and report template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub to: Vec<String>,
    /// Store number → store id shown in the report.
    #[serde(default)]
    pub stores: HashMap<String, String>,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_template_name")]
    pub template_name: String,
    #[serde(default = "default_templates_dir")]
    pub templates_dir: String,
}

fn default_smtp_port() -> u16 { 587 }
fn default_subject() -> String { "Offline players".into() }
fn default_template_name() -> String { "offline_players".into() }
fn default_templates_dir() -> String { "templates".into() }

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: String::new(),
            host: String::new(),
            password: String::new(),
            port: default_smtp_port(),
            to: vec![],
            stores: HashMap::new(),
            subject: default_subject(),
            template_name: default_template_name(),
            templates_dir: default_templates_dir(),
        }
    }
}

/// HTTP trigger endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 { 3000 }
fn default_host() -> String { "127.0.0.1".into() }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

/// Parse a duration such as `48h`, `30m`, `90s`, `500ms`.
/// A bare number is read as seconds.
pub fn parse_duration(src: &str) -> std::result::Result<Duration, String> {
    let src = src.trim();
    if src.is_empty() {
        return Err("empty duration string".to_string());
    }

    let (num, unit_secs, unit_ms) = if let Some(num) = src.strip_suffix("ms") {
        (num, 0, 1)
    } else if let Some(num) = src.strip_suffix('h') {
        (num, 3600, 0)
    } else if let Some(num) = src.strip_suffix('m') {
        (num, 60, 0)
    } else if let Some(num) = src.strip_suffix('s') {
        (num, 1, 0)
    } else {
        (src, 1, 0)
    };

    let value: u64 = num
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration: {src}"))?;
    if unit_ms > 0 {
        Ok(Duration::from_millis(value))
    } else {
        let secs = value
            .checked_mul(unit_secs)
            .ok_or_else(|| format!("duration too large: {src}"))?;
        Ok(Duration::from_secs(secs))
    }
}

/// Inverse of [`parse_duration`], choosing the largest exact unit.
pub fn format_duration(d: Duration) -> String {
    if d.subsec_millis() != 0 {
        return format!("{}ms", d.as_millis());
    }
    let secs = d.as_secs();
    if secs != 0 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs != 0 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

/// `a,b,c` → `["a", "b", "c"]`; blank items dropped.
fn parse_list(src: &str) -> Vec<String> {
    src.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// `k1:v1,k 2:v 2` → map.
fn parse_map(key: &str, src: &str) -> Result<HashMap<String, String>> {
    src.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| {
            pair.split_once(':')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .ok_or_else(|| {
                    PlayerwatchError::Config(format!("{key}: expected key:value, got '{pair}'"))
                })
        })
        .collect()
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| PlayerwatchError::Config(format!("{key}: {e}")))
}

fn env_duration(key: &str, value: &str) -> Result<Duration> {
    parse_duration(value).map_err(|e| PlayerwatchError::Config(format!("{key}: {e}")))
}

/// Serde adapter storing durations as `48h`-style strings.
mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
