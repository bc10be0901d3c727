use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_KRX_URL: &str = "http://data.krx.co.kr";
pub const DEFAULT_NAVER_URL: &str = "https://m.stock.naver.com";
pub const DEFAULT_TELEGRAM_URL: &str = "https://api.telegram.org";
pub const MAX_LOOKBACK_DAYS: usize = 10;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct FundConfig {
    pub code: String,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct KrxProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NaverProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub krx: Option<KrxProviderConfig>,
    pub naver: Option<NaverProviderConfig>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            krx: Some(KrxProviderConfig {
                base_url: DEFAULT_KRX_URL.to_string(),
            }),
            naver: Some(NaverProviderConfig {
                base_url: DEFAULT_NAVER_URL.to_string(),
            }),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProvidersConfig {
    pub fn krx_base_url(&self) -> &str {
        self.krx
            .as_ref()
            .map_or(DEFAULT_KRX_URL, |p| p.base_url.as_str())
    }

    pub fn naver_base_url(&self) -> &str {
        self.naver
            .as_ref()
            .map_or(DEFAULT_NAVER_URL, |p| p.base_url.as_str())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TelegramConfig {
    #[serde(default = "default_telegram_url")]
    pub base_url: String,
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}

fn default_telegram_url() -> String {
    DEFAULT_TELEGRAM_URL.to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        TelegramConfig {
            base_url: default_telegram_url(),
            bot_token: None,
            chat_id: None,
        }
    }
}

impl TelegramConfig {
    /// Bot token and chat id, environment values taking precedence over the file.
    pub fn credentials(&self) -> Option<(String, String)> {
        Self::merge_credentials(
            self,
            std::env::var("TELEGRAM_BOT_TOKEN").ok(),
            std::env::var("TELEGRAM_CHAT_ID").ok(),
        )
    }

    fn merge_credentials(
        &self,
        env_token: Option<String>,
        env_chat_id: Option<String>,
    ) -> Option<(String, String)> {
        let token = env_token
            .or_else(|| self.bot_token.clone())
            .filter(|t| !t.trim().is_empty())?;
        let chat_id = env_chat_id
            .or_else(|| self.chat_id.clone())
            .filter(|c| !c.trim().is_empty())?;
        Some((token, chat_id))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub etfs: Vec<FundConfig>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: usize,
    /// Static constituent lists by fund code, merged over the built-in ones.
    #[serde(default)]
    pub fallbacks: BTreeMap<String, Vec<String>>,
    pub data_path: Option<String>,
    pub dashboard_path: Option<String>,
}

fn default_lookback_days() -> usize {
    MAX_LOOKBACK_DAYS
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "etfwatch", "etfwatch")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config = Self::from_yaml(&config_str)
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.etfs.is_empty() {
            bail!("No ETFs configured");
        }

        let mut seen = HashSet::new();
        for fund in &self.etfs {
            if fund.code.trim().is_empty() {
                bail!("ETF '{}' has an empty code", fund.name);
            }
            if !seen.insert(fund.code.as_str()) {
                bail!("Duplicate ETF code: {}", fund.code);
            }
        }

        if !(1..=MAX_LOOKBACK_DAYS).contains(&self.lookback_days) {
            bail!(
                "lookback_days must be between 1 and {MAX_LOOKBACK_DAYS}, got {}",
                self.lookback_days
            );
        }
        Ok(())
    }

    pub fn enabled_funds(&self) -> Vec<FundConfig> {
        self.etfs.iter().filter(|f| f.enabled).cloned().collect()
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "etfwatch", "etfwatch")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn history_file(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("history").join("constituents.json"))
    }

    pub fn dashboard_file(&self) -> Result<PathBuf> {
        match &self.dashboard_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => Ok(self.data_dir()?.join("dashboard_data.json")),
        }
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("cache"))
    }
}
