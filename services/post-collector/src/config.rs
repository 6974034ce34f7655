//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Credentials live in their own JSON-lines file, never in the TOML; the
//! path comes from `[credentials] file` or the TWITTER_CREDENTIALS_FILE env
//! var.

use collector::WatermarkMode;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "post-collector.toml";
pub const CREDENTIALS_ENV: &str = "TWITTER_CREDENTIALS_FILE";

/// Root configuration. Every section is optional.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub links: LinksConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Credential file location
#[derive(Debug, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_credentials_file")]
    pub file: PathBuf,
}

/// Remote API transport
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub base_url: String,
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct PoolConfig {
    /// Sleep after every credential failed in one rotation
    #[serde(default = "default_backoff")]
    pub backoff_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub watermark: WatermarkMode,
}

/// Search index connection
#[derive(Debug, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_index_url")]
    pub url: String,
    #[serde(default = "default_index_name")]
    pub name: String,
    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,
}

/// Source extraction from post links
#[derive(Debug, Deserialize)]
pub struct LinksConfig {
    #[serde(default = "default_follow_redirects")]
    pub follow_redirects: bool,
    #[serde(default = "default_link_timeout")]
    pub timeout_secs: u64,
}

/// Prometheus listener; disabled unless `listen_addr` is set
#[derive(Debug, Default, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub listen_addr: Option<SocketAddr>,
}

fn default_credentials_file() -> PathBuf {
    PathBuf::from("tweet_keys.json")
}

fn default_api_url() -> String {
    twitter_api::constants::DEFAULT_BASE_URL.to_string()
}

fn default_api_timeout() -> u64 {
    twitter_api::constants::DEFAULT_TIMEOUT_SECS
}

fn default_backoff() -> u64 {
    credential_pool::DEFAULT_BACKOFF.as_secs()
}

fn default_page_size() -> u32 {
    collector::DEFAULT_PAGE_SIZE
}

fn default_index_url() -> String {
    collector::index::DEFAULT_INDEX_URL.to_string()
}

fn default_index_name() -> String {
    collector::index::DEFAULT_INDEX_NAME.to_string()
}

fn default_index_timeout() -> u64 {
    10
}

fn default_follow_redirects() -> bool {
    true
}

fn default_link_timeout() -> u64 {
    collector::links::DEFAULT_LINK_TIMEOUT.as_secs()
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            file: default_credentials_file(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            timeout_secs: default_api_timeout(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            backoff_secs: default_backoff(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            watermark: WatermarkMode::default(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            url: default_index_url(),
            name: default_index_name(),
            timeout_secs: default_index_timeout(),
        }
    }
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            follow_redirects: default_follow_redirects(),
            timeout_secs: default_link_timeout(),
        }
    }
}

impl PoolConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse, overlay environment variables, validate.
    ///
    /// An empty document yields the defaults.
    pub fn from_toml_str(contents: &str) -> common::Result<Self> {
        let mut config: Config = toml::from_str(contents)?;

        if let Ok(file) = std::env::var(CREDENTIALS_ENV) {
            let file = file.trim();
            if !file.is_empty() {
                config.credentials.file = PathBuf::from(file);
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        check_http_url("api.base_url", &self.api.base_url)?;
        check_http_url("index.url", &self.index.url)?;

        for (name, value) in [
            ("api.timeout_secs", self.api.timeout_secs),
            ("pool.backoff_secs", self.pool.backoff_secs),
            ("index.timeout_secs", self.index.timeout_secs),
            ("links.timeout_secs", self.links.timeout_secs),
        ] {
            if value == 0 {
                return Err(common::Error::Config(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        if !(1..=twitter_api::constants::MAX_SEARCH_COUNT).contains(&self.search.page_size) {
            return Err(common::Error::Config(format!(
                "search.page_size must be between 1 and {}, got: {}",
                twitter_api::constants::MAX_SEARCH_COUNT,
                self.search.page_size
            )));
        }

        if self.index.name.trim().is_empty() {
            return Err(common::Error::Config("index.name must not be empty".into()));
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    ///
    /// The flag says whether the path was asked for explicitly; only the
    /// implicit default may be missing.
    pub fn resolve_path(cli_path: Option<&Path>) -> (PathBuf, bool) {
        if let Some(p) = cli_path {
            return (p.to_path_buf(), true);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return (PathBuf::from(p), true);
        }
        (PathBuf::from(DEFAULT_CONFIG_FILE), false)
    }
}

fn check_http_url(name: &str, value: &str) -> common::Result<()> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(common::Error::Config(format!(
            "{name} must start with http:// or https://, got: {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn full_toml() -> &'static str {
        r#"
[credentials]
file = "/etc/post-collector/keys.jsonl"

[api]
base_url = "http://127.0.0.1:9000/1.1"
timeout_secs = 5

[pool]
backoff_secs = 30

[search]
page_size = 50
watermark = "fixed_step"

[index]
url = "http://search.internal:9200"
name = "posts"

[links]
follow_redirects = false

[metrics]
listen_addr = "127.0.0.1:9464"
"#
    }

    #[test]
    fn test_load_full_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CREDENTIALS_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("post-collector.toml");
        std::fs::write(&path, full_toml()).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.credentials.file,
            PathBuf::from("/etc/post-collector/keys.jsonl")
        );
        assert_eq!(config.api.base_url, "http://127.0.0.1:9000/1.1");
        assert_eq!(config.api.timeout_secs, 5);
        assert_eq!(config.pool.backoff(), Duration::from_secs(30));
        assert_eq!(config.search.page_size, 50);
        assert_eq!(config.search.watermark, WatermarkMode::FixedStep);
        assert_eq!(config.index.name, "posts");
        assert_eq!(config.index.timeout_secs, 10);
        assert!(!config.links.follow_redirects);
        assert_eq!(
            config.metrics.listen_addr,
            Some("127.0.0.1:9464".parse().unwrap())
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CREDENTIALS_ENV) };

        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.credentials.file, PathBuf::from("tweet_keys.json"));
        assert_eq!(config.api.base_url, "https://api.twitter.com/1.1");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.pool.backoff_secs, 15);
        assert_eq!(config.search.page_size, 100);
        assert_eq!(config.search.watermark, WatermarkMode::Recompute);
        assert_eq!(config.index.url, "http://localhost:9220");
        assert_eq!(config.index.name, "shokesu");
        assert!(config.links.follow_redirects);
        assert_eq!(config.links.timeout_secs, 10);
        assert!(config.metrics.listen_addr.is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(common::Error::Io(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let result = Config::from_toml_str("not valid {{{{ toml");
        assert!(matches!(result, Err(common::Error::Toml(_))));
    }

    #[test]
    fn test_credentials_file_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env(CREDENTIALS_ENV, "/run/secrets/keys.jsonl") };
        let config = Config::from_toml_str(full_toml());
        unsafe { remove_env(CREDENTIALS_ENV) };

        assert_eq!(
            config.unwrap().credentials.file,
            PathBuf::from("/run/secrets/keys.jsonl"),
            "env var must take precedence over [credentials] file"
        );
    }

    #[test]
    fn test_blank_credentials_env_is_ignored() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env(CREDENTIALS_ENV, "   ") };
        let config = Config::from_toml_str("");
        unsafe { remove_env(CREDENTIALS_ENV) };

        assert_eq!(
            config.unwrap().credentials.file,
            PathBuf::from("tweet_keys.json")
        );
    }

    #[test]
    fn test_resolve_path_cli_arg() {
        let (path, explicit) = Config::resolve_path(Some(Path::new("/custom/path.toml")));
        assert_eq!(path, PathBuf::from("/custom/path.toml"));
        assert!(explicit);
    }

    #[test]
    fn test_resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let (path, explicit) = Config::resolve_path(None);
        unsafe { remove_env("CONFIG_PATH") };
        assert_eq!(path, PathBuf::from("/env/path.toml"));
        assert!(explicit);
    }

    #[test]
    fn test_resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        let (path, explicit) = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("post-collector.toml"));
        assert!(!explicit);
    }

    #[test]
    fn test_resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let (path, _) = Config::resolve_path(Some(Path::new("/cli/wins.toml")));
        unsafe { remove_env("CONFIG_PATH") };
        assert_eq!(
            path,
            PathBuf::from("/cli/wins.toml"),
            "CLI arg must take precedence over CONFIG_PATH env var"
        );
    }

    #[test]
    fn test_invalid_urls_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CREDENTIALS_ENV) };

        let err = Config::from_toml_str("[api]\nbase_url = \"api.twitter.com/1.1\"\n").unwrap_err();
        assert!(
            err.to_string().contains("api.base_url must start with http"),
            "error message should explain the issue, got: {err}"
        );

        let err = Config::from_toml_str("[index]\nurl = \"localhost:9220\"\n").unwrap_err();
        assert!(err.to_string().contains("index.url"), "got: {err}");
    }

    #[test]
    fn test_zero_durations_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CREDENTIALS_ENV) };

        for doc in [
            "[api]\ntimeout_secs = 0\n",
            "[pool]\nbackoff_secs = 0\n",
            "[index]\ntimeout_secs = 0\n",
            "[links]\ntimeout_secs = 0\n",
        ] {
            let result = Config::from_toml_str(doc);
            assert!(result.is_err(), "must reject: {doc}");
        }
    }

    #[test]
    fn test_page_size_bounds() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CREDENTIALS_ENV) };

        assert!(Config::from_toml_str("[search]\npage_size = 0\n").is_err());
        assert!(Config::from_toml_str("[search]\npage_size = 101\n").is_err());
        assert_eq!(
            Config::from_toml_str("[search]\npage_size = 1\n")
                .unwrap()
                .search
                .page_size,
            1
        );
    }

    #[test]
    fn test_unknown_watermark_mode_rejected() {
        let result = Config::from_toml_str("[search]\nwatermark = \"sideways\"\n");
        assert!(matches!(result, Err(common::Error::Toml(_))));
    }
}
