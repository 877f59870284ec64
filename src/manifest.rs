use crate::{ArticleImagesError, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageRole {
    #[serde(rename = "featured")]
    Featured,
    #[serde(rename = "main-content")]
    Content,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedImage {
    pub original_url: String,
    pub normalized_url: String,
    /// Relative to the asset root, `/`-separated.
    pub local_path: String,
    #[serde(rename = "type")]
    pub role: ImageRole,
    /// Position in the extracted content-image sequence.
    pub index: usize,
    pub bytes: u64,
    pub sha256: String,
}

impl AcceptedImage {
    pub fn new(
        original_url: &str,
        normalized_url: &str,
        local_path: &str,
        role: ImageRole,
        index: usize,
        data: &[u8],
    ) -> Self {
        Self {
            original_url: original_url.to_string(),
            normalized_url: normalized_url.to_string(),
            local_path: local_path.to_string(),
            role,
            index,
            bytes: data.len() as u64,
            sha256: sha256_hex(data),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadManifest {
    pub article_slug: String,
    pub article_url: String,
    pub downloaded_at: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub images: Vec<AcceptedImage>,
}

impl DownloadManifest {
    pub fn new(article_slug: &str, article_url: &str, note: Option<String>) -> Self {
        Self {
            article_slug: article_slug.to_string(),
            article_url: article_url.to_string(),
            downloaded_at: Local::now(),
            note,
            images: Vec::new(),
        }
    }

    pub fn featured(&self) -> Option<&AcceptedImage> {
        self.images
            .iter()
            .find(|image| image.role == ImageRole::Featured)
    }
}

/// Writes indented UTF-8 JSON, replacing any manifest already at `path`.
pub fn write_manifest(manifest: &DownloadManifest, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ArticleImagesError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(manifest)?;
    std::fs::write(path, format!("{json}\n")).map_err(|source| ArticleImagesError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

pub fn read_manifest(path: &Path) -> Result<DownloadManifest> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
