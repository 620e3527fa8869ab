use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub backend: BackendConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackendConfig {
    /// Base URL of the hosted backend, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Service/anon API key. `$FUNDROAD_API_KEY` overrides the file value.
    pub api_key: Option<String>,
    /// Table holding the journey resource records.
    #[serde(default = "default_resources_table")]
    pub resources_table: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_resources_table() -> String {
    "journey_resources".to_string()
}

fn default_request_timeout_secs() -> u64 {
    20
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProgressConfig {
    /// How often the background loop recomputes tracked users' progress.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

fn default_refresh_interval_secs() -> u64 {
    30
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub directory: Option<String>,
    pub retention_days: Option<u64>,
}

impl Config {
    pub fn load_with_path() -> Result<(Self, Option<PathBuf>)> {
        let mut candidates = Vec::new();

        if let Ok(explicit) = std::env::var("FUNDROAD_CONFIG") {
            candidates.push(PathBuf::from(explicit));
        }

        candidates.push(PathBuf::from("fundroad.toml"));

        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join("fundroad").join("fundroad.toml"));
        }

        if let Some(dir) = dirs::data_dir() {
            candidates.push(dir.join("fundroad").join("fundroad.toml"));
        }

        for path in candidates {
            if path.exists() {
                let content = fs::read_to_string(&path)?;
                let mut config: Config = toml::from_str(&content)?;
                config.apply_env_overrides();
                return Ok((config, Some(path)));
            }
        }

        let mut config = Config::default();
        config.apply_env_overrides();
        Ok((config, None))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("FUNDROAD_API_KEY") {
            if !key.trim().is_empty() {
                self.backend.api_key = Some(key);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url_lower = self.backend.url.trim().to_lowercase();
        if !url_lower.starts_with("http://") && !url_lower.starts_with("https://") {
            anyhow::bail!(
                "Backend URL must start with http:// or https://, got: {}",
                self.backend.url
            );
        }
        if self.backend.resources_table.trim().is_empty() {
            anyhow::bail!("Backend resources_table cannot be empty");
        }
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }
        if self.progress.refresh_interval_secs == 0 {
            anyhow::bail!("Progress refresh_interval_secs must be greater than 0");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig {
                url: "http://127.0.0.1:54321".to_string(),
                api_key: None,
                resources_table: default_resources_table(),
                request_timeout_secs: default_request_timeout_secs(),
            },
            server: ServerConfig { port: 8080 },
            progress: ProgressConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn validate_rejects_bad_url() {
        let mut config = Config::default();
        config.backend.url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.progress.refresh_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_minimal_toml() {
        let config: Config = toml::from_str(
            r#"
            [backend]
            url = "https://project.supabase.co"

            [server]
            port = 9090
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.backend.resources_table, "journey_resources");
        assert_eq!(config.progress.refresh_interval_secs, 30);
    }
}
