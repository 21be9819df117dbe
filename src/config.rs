use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub estimate: EstimateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_image_path")]
    pub image_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_countries_url")]
    pub countries_url: String,
    #[serde(default = "default_rates_url")]
    pub rates_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateConfig {
    #[serde(default = "default_multiplier_min")]
    pub multiplier_min: f64,
    #[serde(default = "default_multiplier_max")]
    pub multiplier_max: f64,
    /// Pins the multiplier RNG. Unset means a fresh random draw every refresh.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub db_path: Option<String>,
    pub image_path: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/country-atlas/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<()> {
        let EstimateConfig {
            multiplier_min,
            multiplier_max,
            ..
        } = self.estimate;
        if !(multiplier_min.is_finite() && multiplier_max.is_finite()) {
            bail!("estimate multipliers must be finite numbers");
        }
        if multiplier_min <= 0.0 || multiplier_min > multiplier_max {
            bail!(
                "invalid estimate multiplier range {multiplier_min}..={multiplier_max}"
            );
        }
        if self.upstream.timeout_secs == 0 {
            bail!("upstream.timeout_secs must be at least 1");
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(db_path) = overrides.db_path {
            self.storage.db_path = db_path;
        }
        if let Some(image_path) = overrides.image_path {
            self.storage.image_path = image_path;
        }
        if let Some(host) = overrides.host {
            self.server.host = host;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn resolved_image_path(&self) -> PathBuf {
        expand_tilde(&self.storage.image_path)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.timeout_secs.max(1))
    }

    pub fn default_template() -> String {
        let template = r#"[server]
host = "127.0.0.1"
port = 3001

[storage]
db_path = "~/.local/share/country-atlas/countries.db"
image_path = "~/.local/share/country-atlas/cache/summary.png"

[upstream]
countries_url = "https://restcountries.com/v2/all?fields=name,capital,region,population,flag,currencies"
rates_url = "https://open.er-api.com/v6/latest/USD"
timeout_secs = 10

[estimate]
multiplier_min = 1000.0
multiplier_max = 2000.0
# seed = 42
"#;
        template.to_string()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            image_path: default_image_path(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            countries_url: default_countries_url(),
            rates_url: default_rates_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for EstimateConfig {
    fn default() -> Self {
        Self {
            multiplier_min: default_multiplier_min(),
            multiplier_max: default_multiplier_max(),
            seed: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_db_path() -> String {
    "~/.local/share/country-atlas/countries.db".to_string()
}

fn default_image_path() -> String {
    "~/.local/share/country-atlas/cache/summary.png".to_string()
}

fn default_countries_url() -> String {
    "https://restcountries.com/v2/all?fields=name,capital,region,population,flag,currencies"
        .to_string()
}

fn default_rates_url() -> String {
    "https://open.er-api.com/v6/latest/USD".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_multiplier_min() -> f64 {
    1000.0
}

fn default_multiplier_max() -> f64 {
    2000.0
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigOverrides};

    #[test]
    fn template_parses_to_defaults() {
        let parsed: Config =
            toml::from_str(&Config::default_template()).expect("template should parse");
        let defaults = Config::default();
        assert_eq!(parsed.upstream.rates_url, defaults.upstream.rates_url);
        assert_eq!(parsed.server.port, defaults.server.port);
        assert!(parsed.estimate.seed.is_none());
        parsed.validate().expect("template should validate");
    }

    #[test]
    fn partial_file_keeps_section_defaults() {
        let parsed: Config = toml::from_str("[estimate]\nseed = 7\n").expect("parse");
        assert_eq!(parsed.estimate.seed, Some(7));
        assert!((parsed.estimate.multiplier_min - 1000.0).abs() < f64::EPSILON);
        assert_eq!(parsed.upstream.timeout_secs, 10);
    }

    #[test]
    fn rejects_inverted_multiplier_range() {
        let mut config = Config::default();
        config.estimate.multiplier_min = 3000.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn overrides_replace_storage_paths() {
        let mut config = Config::default();
        config.apply_overrides(ConfigOverrides {
            db_path: Some("/tmp/atlas.db".to_string()),
            port: Some(8080),
            ..ConfigOverrides::default()
        });
        assert_eq!(
            config.resolved_db_path(),
            std::path::PathBuf::from("/tmp/atlas.db")
        );
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::load(Some(&dir.path().join("absent.toml"))).expect("load");
        assert_eq!(config.server.host, "127.0.0.1");
    }
}
