use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArticleImagesError {
    #[error("fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("no content images found in {url}")]
    NoImagesFound { url: String },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid article slug {0:?}: use a single path segment without separators")]
    InvalidSlug(String),

    #[error("invalid config at {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArticleImagesError {
    pub fn fetch(url: &str, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ArticleImagesError>;
