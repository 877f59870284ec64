use crate::classify::{ClassifierPolicy, ScanStrategy};
use crate::{ArticleImagesError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_FALLBACK_EXTENSION: &str = ".webp";
pub const DEFAULT_NOTE: &str = "Only images from article content (excludes navigation/footer)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingScheme {
    /// Sanitized last path segment, falling back to `{slug}-{index}`.
    #[default]
    Descriptive,
    Indexed,
}

/// Which image receives the `featured` role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeaturedPolicy {
    /// Index 0 of the content-image sequence, whether or not it downloads.
    #[default]
    FirstCandidate,
    FirstDownloaded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub classifier: ClassifierPolicy,
    pub strategy: ScanStrategy,
    pub naming: NamingScheme,
    pub featured: FeaturedPolicy,
    pub fallback_extension: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Origin prefixed to relative proxy targets; defaults to the article's origin.
    pub proxy_origin: Option<String>,
    pub note: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierPolicy::default(),
            strategy: ScanStrategy::default(),
            naming: NamingScheme::default(),
            featured: FeaturedPolicy::default(),
            fallback_extension: DEFAULT_FALLBACK_EXTENSION.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            proxy_origin: None,
            note: Some(DEFAULT_NOTE.to_string()),
        }
    }
}

impl FetchConfig {
    pub fn normalized(mut self) -> Self {
        self.classifier = self.classifier.normalized();

        let ext = self.fallback_extension.trim().to_ascii_lowercase();
        self.fallback_extension = match ext.as_str() {
            "" => DEFAULT_FALLBACK_EXTENSION.to_string(),
            e if e.starts_with('.') => e.to_string(),
            e => format!(".{e}"),
        };
        if self.user_agent.trim().is_empty() {
            self.user_agent = DEFAULT_USER_AGENT.to_string();
        }
        self.proxy_origin = self
            .proxy_origin
            .map(|origin| origin.trim().trim_end_matches('/').to_string())
            .filter(|origin| !origin.is_empty());
        self
    }
}

pub fn load_config(path: &Path) -> Result<FetchConfig> {
    let bytes = std::fs::read(path).map_err(|e| ArticleImagesError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let parsed: FetchConfig =
        serde_json::from_slice(&bytes).map_err(|e| ArticleImagesError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    Ok(parsed.normalized())
}

pub fn load_config_or_default(path: Option<&Path>) -> Result<FetchConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(FetchConfig::default()),
    }
}

pub fn save_config(path: &Path, config: &FetchConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}
