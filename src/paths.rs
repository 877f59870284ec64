use crate::{ArticleImagesError, Result};
use std::path::{Path, PathBuf};

pub const ARTICLES_DIR: &str = "articles";
pub const FEATURED_DIR: &str = "featured";
pub const MAIN_CONTENT_DIR: &str = "main-content";
pub const DEFAULT_ASSET_ROOT: &str = "public/assets";

#[derive(Debug, Clone)]
pub struct AssetPaths {
    pub asset_root: PathBuf,
    pub manifest_dir: PathBuf,
}

impl AssetPaths {
    pub fn new(asset_root: PathBuf, manifest_dir: PathBuf) -> Self {
        Self {
            asset_root,
            manifest_dir,
        }
    }

    pub fn articles_dir(&self) -> PathBuf {
        self.asset_root.join(ARTICLES_DIR)
    }

    pub fn featured_dir(&self) -> PathBuf {
        self.articles_dir().join(FEATURED_DIR)
    }

    pub fn main_content_dir(&self) -> PathBuf {
        self.articles_dir().join(MAIN_CONTENT_DIR)
    }

    pub fn manifest_path(&self, slug: &str) -> PathBuf {
        self.manifest_dir.join(format!("image-mapping-{slug}.json"))
    }

    /// Maps a forward-slash `local_path` onto the asset root using host separators.
    pub fn resolve(&self, local_path: &str) -> PathBuf {
        local_path
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.asset_root.clone(), |acc, part| acc.join(part))
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.featured_dir())?;
        std::fs::create_dir_all(self.main_content_dir())?;
        Ok(())
    }

    /// Writes one downloaded asset. Plain write: an interrupted run can leave a partial file.
    pub fn write_asset(&self, local_path: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.resolve(local_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ArticleImagesError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&path, data).map_err(|source| ArticleImagesError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// The slug ends up in file names, so it must stay a single path segment.
pub fn validate_slug(slug: &str) -> Result<String> {
    let trimmed = slug.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed.contains("..")
        || trimmed.contains('/')
        || trimmed.contains('\\')
        || Path::new(trimmed).is_absolute()
    {
        return Err(ArticleImagesError::InvalidSlug(slug.to_string()));
    }
    Ok(trimmed.to_string())
}
