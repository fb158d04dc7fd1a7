//! CLI configuration.
//!
//! ```toml
//! [app]
//! appid = "wx2421b1c4370ec43b"
//! secret = "${WX_APP_SECRET}"
//!
//! [component]
//! appid = "wx3f0e4c1a9b8d7e6f"
//! secret = "${WX_COMPONENT_SECRET}"
//! token = "callback-token"
//! encoding_aes_key = "${WX_ENCODING_AES_KEY}"
//!
//! [merchant]
//! appid = "wx2421b1c4370ec43b"
//! mch_id = "10000100"
//! key = "${WX_MCH_KEY}"
//! sign_type = "HMAC-SHA256"
//!
//! [http]
//! timeout_secs = 30
//!
//! [cache]
//! backend = "file"
//! namespace = "prod"
//! ```

use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use wxbroker_api::{AppConfig, ComponentConfig, HttpConfig, MerchantConfig, TradeType};
use wxbroker_cache::DEFAULT_NAMESPACE;
use wxbroker_crypto::{Secret, SignType};

use crate::error::{CliError, CliResult};


/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "WXBROKER_DATA_DIR";

/// Expand environment variables in a string.
/// Supports `${VAR_NAME}` syntax; unset variables are left as written.
fn expand_env_vars(input: &str) -> CliResult<String> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|e| CliError::config(format!("invalid expansion pattern: {}", e)))?;
    Ok(re
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string())
}

fn expand_secret(secret: &Secret) -> CliResult<Secret> {
    Ok(Secret::new(expand_env_vars(secret.expose())?))
}

/// CLI configuration loaded from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// App holding its own secret.
    pub app: Option<AppSection>,
    /// Third-party component account.
    pub component: Option<ComponentSection>,
    /// Merchant payment account.
    pub merchant: Option<MerchantSection>,
    /// HTTP client settings.
    pub http: HttpConfig,
    /// Credential cache settings.
    pub cache: CacheSection,
}

impl CliConfig {
    /// Load configuration from a file.
    ///
    /// A missing file yields the default (empty) configuration. Secrets may
    /// reference environment variables as `${VAR}`.
    pub fn load(path: &Path) -> CliResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&contents)?;
        config.expand()?;
        Ok(config)
    }

    fn expand(&mut self) -> CliResult<()> {
        if let Some(app) = &mut self.app {
            app.secret = expand_secret(&app.secret)?;
        }
        if let Some(component) = &mut self.component {
            component.secret = expand_secret(&component.secret)?;
            component.token = expand_secret(&component.token)?;
            component.encoding_aes_key = expand_secret(&component.encoding_aes_key)?;
        }
        if let Some(merchant) = &mut self.merchant {
            merchant.key = expand_secret(&merchant.key)?;
        }
        Ok(())
    }

    fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.cache.fetch_timeout_secs)
    }

    /// Settings for the secret-holding app.
    pub fn app_config(&self) -> CliResult<AppConfig> {
        let app = self
            .app
            .as_ref()
            .ok_or_else(|| CliError::config("missing [app] section"))?;
        let mut config = AppConfig::new(app.appid.clone(), app.secret.clone());
        config.fetch_timeout = self.fetch_timeout();
        Ok(config)
    }

    /// Settings for the component account.
    pub fn component_config(&self) -> CliResult<ComponentConfig> {
        let component = self
            .component
            .as_ref()
            .ok_or_else(|| CliError::config("missing [component] section"))?;
        let mut config = ComponentConfig::new(
            component.appid.clone(),
            component.secret.clone(),
            component.token.clone(),
            component.encoding_aes_key.clone(),
        );
        config.fetch_timeout = self.fetch_timeout();
        Ok(config)
    }

    /// Settings for the merchant account.
    pub fn merchant_config(&self) -> CliResult<MerchantConfig> {
        let merchant = self
            .merchant
            .as_ref()
            .ok_or_else(|| CliError::config("missing [merchant] section"))?;
        let mut config = MerchantConfig::new(
            merchant.appid.clone(),
            merchant.mch_id.clone(),
            merchant.key.clone(),
        );
        if let Some(sign_type) = &merchant.sign_type {
            config.sign_type = parse_sign_type(sign_type)?;
        }
        if let Some(trade_type) = merchant.trade_type {
            config.trade_type = trade_type;
        }
        Ok(config)
    }

    /// Path of the credential cache file.
    pub fn cache_path(&self) -> PathBuf {
        self.cache
            .path
            .clone()
            .unwrap_or_else(|| default_base_dir().join("credentials.json"))
    }
}

/// Parse `MD5` / `HMAC-SHA256`.
pub fn parse_sign_type(value: &str) -> CliResult<SignType> {
    value
        .parse()
        .map_err(|_| CliError::config(format!("unknown sign_type: {}", value)))
}

/// `[app]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub appid: String,
    pub secret: Secret,
}

/// `[component]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ComponentSection {
    pub appid: String,
    pub secret: Secret,
    /// Callback token.
    pub token: Secret,
    /// 43-character EncodingAESKey.
    pub encoding_aes_key: Secret,
}

/// `[merchant]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct MerchantSection {
    pub appid: String,
    pub mch_id: String,
    pub key: Secret,
    /// `MD5` (default) or `HMAC-SHA256`.
    pub sign_type: Option<String>,
    pub trade_type: Option<TradeType>,
}

/// Where credentials are kept between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// In-process only; every run starts empty.
    Memory,
    /// JSON file shared by every run.
    #[default]
    File,
}

/// `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub backend: CacheBackendKind,
    /// Cache file; defaults to `credentials.json` in the data directory.
    pub path: Option<PathBuf>,
    /// First segment of every cache key.
    pub namespace: String,
    /// Upper bound on one credential fetch.
    pub fetch_timeout_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::default(),
            path: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
            fetch_timeout_secs: 10,
        }
    }
}

/// Get the default base directory for wxbroker data.
///
/// Priority:
/// 1. `WXBROKER_DATA_DIR` environment variable (if set)
/// 2. Platform-specific data directory (e.g., `~/.local/share/wxbroker` on Linux)
/// 3. Fallback to `~/.wxbroker`
pub fn default_base_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    directories::ProjectDirs::from("io", "wxbroker", "wxbroker")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| {
            std::env::var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".wxbroker")
        })
}

/// Get the default config file path.
pub fn default_config_path() -> PathBuf {
    directories::ProjectDirs::from("io", "wxbroker", "wxbroker")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| default_base_dir().join("config.toml"))
}
