use crate::error::{HarvestError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Configuration for the video harvester
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Remote API settings
    pub api: ApiConfig,

    /// Fixed search filter parameters sent with every search request
    pub search: SearchConfig,

    /// Keyword list and per-keyword limits
    pub harvest: HarvestConfig,

    /// Persisted state locations
    pub storage: StorageConfig,

    /// Output file and logging settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the video API (no trailing slash)
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Environment variable holding the API key
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub category_id: String,
    pub region_code: String,
    pub relevance_language: String,
    pub safe_search: String,

    /// Geographic center as "lat,lng"
    pub location: String,
    pub location_radius: String,

    /// Duration bucket: any, short, medium or long
    pub video_duration: String,
    pub order: String,

    /// Results per search request (the API accepts 1..=50)
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Ordered keyword list processed once per run
    pub keywords: Vec<String>,

    /// Hard cap on pages fetched per keyword per run
    pub max_pages_per_keyword: u32,

    /// What to do when a persisted state file cannot be parsed
    pub on_corrupt_state: CorruptStatePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding identifier set, resume marker and cursor files
    pub state_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// CSV file results are appended to
    pub csv_path: PathBuf,

    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,
}

/// Policy for malformed persisted state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CorruptStatePolicy {
    /// Abort with an error naming the broken key
    #[default]
    Fail,
    /// Log a warning and treat the state as absent
    Reset,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.googleapis.com/youtube/v3".to_string(),
            timeout_seconds: 30,
            api_key_env: "API_KEY".to_string(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            category_id: "10".to_string(), // Music
            region_code: "EG".to_string(),
            relevance_language: "ar".to_string(),
            safe_search: "none".to_string(),
            location: "26.8206,30.8025".to_string(), // Central Egypt
            location_radius: "500km".to_string(),
            video_duration: "medium".to_string(),
            order: "viewCount".to_string(),
            page_size: 50,
        }
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            keywords: ["Music", "اغاني", "مهرجانات", "rap", "Trap"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
            max_pages_per_keyword: 50,
            on_corrupt_state: CorruptStatePolicy::Fail,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("data"),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("data/youtube_music_data_egypt.csv"),
            log_level: "video_harvester=info,warn".to_string(),
        }
    }
}

impl StorageConfig {
    /// Directory holding one cursor file per keyword
    pub fn tokens_dir(&self) -> PathBuf {
        self.state_dir.join("tokens")
    }
}

impl Config {
    /// Load configuration from the first config file found, or defaults
    pub fn load() -> Result<Self> {
        Ok(Self::load_with_source()?.0)
    }

    /// Like [`Config::load`], also returning the file that was used.
    ///
    /// Nothing is logged here since this runs before the subscriber exists.
    pub fn load_with_source() -> Result<(Self, Option<PathBuf>)> {
        Self::load_first(&["video-harvester.toml", "config/video-harvester.toml"])
    }

    fn load_first<P: AsRef<Path>>(candidates: &[P]) -> Result<(Self, Option<PathBuf>)> {
        for path in candidates {
            let path = path.as_ref();
            if path.exists() {
                return Ok((Self::from_file(path)?, Some(path.to_path_buf())));
            }
        }
        Ok((Self::default(), None))
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)?;
        toml::from_str(&config_str).map_err(|e| {
            HarvestError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Apply `HARVESTER_*` overrides from the process environment
    pub fn from_env(self) -> Result<Self> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Apply overrides using an arbitrary variable lookup
    pub fn apply_env_with<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("HARVESTER_STATE_DIR") {
            self.storage.state_dir = PathBuf::from(dir);
        }

        if let Some(output) = lookup("HARVESTER_OUTPUT") {
            self.output.csv_path = PathBuf::from(output);
        }

        if let Some(pages) = lookup("HARVESTER_MAX_PAGES") {
            self.harvest.max_pages_per_keyword = pages.parse().map_err(|_| {
                HarvestError::Config(format!("HARVESTER_MAX_PAGES is not a number: {}", pages))
            })?;
        }

        if let Some(level) = lookup("HARVESTER_LOG_LEVEL") {
            self.output.log_level = level;
        }

        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.harvest.keywords.is_empty() {
            return Err(HarvestError::Config("keyword list is empty".to_string()));
        }

        if self.harvest.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(HarvestError::Config("keyword list contains a blank entry".to_string()));
        }

        if !(1..=50).contains(&self.search.page_size) {
            return Err(HarvestError::Config(format!(
                "page_size must be between 1 and 50, got {}",
                self.search.page_size
            )));
        }

        if self.harvest.max_pages_per_keyword == 0 {
            return Err(HarvestError::Config(
                "max_pages_per_keyword must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Harvester Configuration:\n\
            - Keywords: {}\n\
            - Page size: {}\n\
            - Max pages per keyword: {}\n\
            - Region / language: {} / {}\n\
            - State directory: {}\n\
            - Output: {}",
            self.harvest.keywords.join(", "),
            self.search.page_size,
            self.harvest.max_pages_per_keyword,
            self.search.region_code,
            self.search.relevance_language,
            self.storage.state_dir.display(),
            self.output.csv_path.display(),
        )
    }
}

/// API credential read from the environment
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Read the key from the named environment variable, failing if unset or blank
    pub fn from_env(var: &str) -> Result<Self> {
        Self::from_lookup(var, |name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(var: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(var) {
            Some(key) if !key.trim().is_empty() => Ok(Self(key.trim().to_string())),
            _ => Err(HarvestError::Config(format!(
                "{} environment variable is not set",
                var
            ))),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.harvest.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_pages(mut self, pages: u32) -> Self {
        self.config.harvest.max_pages_per_keyword = pages;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.config.search.page_size = page_size;
        self
    }

    pub fn with_state_dir(mut self, dir: PathBuf) -> Self {
        self.config.storage.state_dir = dir;
        self
    }

    pub fn with_output(mut self, path: PathBuf) -> Self {
        self.config.output.csv_path = path;
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api.base_url = url.into();
        self
    }

    pub fn with_corrupt_state_policy(mut self, policy: CorruptStatePolicy) -> Self {
        self.config.harvest.on_corrupt_state = policy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
