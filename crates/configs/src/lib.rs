use std::path::Path;

use anyhow::{anyhow, Result};
use models::{Currency, RateDefaults, RateType};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub rates: RatesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4) }
    }
}

/// `[rates]` section: where the collection is checkpointed and which defaults fill candidates.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RatesConfig {
    pub data_file: String,
    pub persistent: bool,
    pub seed_file: Option<String>,
    pub default_currency: Currency,
    pub default_rate_type: RateType,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            data_file: "data/rates.json".into(),
            persistent: true,
            seed_file: None,
            default_currency: Currency::default(),
            default_rate_type: RateType::default(),
        }
    }
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    from_toml_str(&content)
}

pub fn from_toml_str(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

fn config_path() -> String {
    std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string())
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

impl AppConfig {
    /// Load `CONFIG_PATH` (default `config.toml`); a missing file yields defaults.
    /// A file that exists but does not parse is an error. Environment overrides
    /// are applied on top in both cases.
    pub fn load_or_default() -> Result<Self> {
        let path = config_path();
        let mut cfg = if Path::new(&path).exists() { load_from_file(&path)? } else { Self::default() };
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        // 环境变量优先于文件配置
        self.server.apply_overrides(env_lookup);
        self.server.normalize()?;
        // rates 支持从环境变量覆盖
        self.rates.apply_overrides(env_lookup);
        self.rates.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    pub fn apply_overrides<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(host) = lookup("SERVER_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("SERVER_PORT").and_then(|p| p.parse::<u16>().ok()) {
            self.port = port;
        }
        if let Some(w) = lookup("TOKIO_WORKER_THREADS").and_then(|v| v.parse::<usize>().ok()) {
            self.worker_threads = Some(w);
        }
    }

    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port 必须在 1..=65535 范围内"));
        }
        match self.worker_threads {
            Some(w) if w > 0 => {}
            _ => self.worker_threads = Some(4),
        }
        Ok(())
    }
}

impl RatesConfig {
    pub fn apply_overrides<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(path) = lookup("RATES_DATA_FILE") {
            self.data_file = path;
        }
        if let Some(flag) = lookup("RATES_PERSISTENT").and_then(|v| parse_flag(&v)) {
            self.persistent = flag;
        }
        if let Some(seed) = lookup("RATES_SEED_FILE") {
            self.seed_file = if seed.trim().is_empty() { None } else { Some(seed) };
        }
        if let Some(currency) = lookup("RATES_DEFAULT_CURRENCY").and_then(|v| v.parse::<Currency>().ok()) {
            self.default_currency = currency;
        }
        if let Some(rate_type) = lookup("RATES_DEFAULT_RATE_TYPE").and_then(|v| v.parse::<RateType>().ok()) {
            self.default_rate_type = rate_type;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.persistent && self.data_file.trim().is_empty() {
            return Err(anyhow!("rates.data_file 为空；启用持久化时必须提供数据文件路径"));
        }
        Ok(())
    }

    pub fn defaults(&self) -> RateDefaults {
        RateDefaults { currency: self.default_currency, rate_type: self.default_rate_type }
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
