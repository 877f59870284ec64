use crate::config::{NamingScheme, DEFAULT_FALLBACK_EXTENSION};
use crate::paths::{ARTICLES_DIR, FEATURED_DIR, MAIN_CONTENT_DIR};
use url::Url;

/// Derives asset-root-relative destinations (always `/`-separated) for one article.
#[derive(Debug, Clone)]
pub struct FileNamer {
    pub slug: String,
    pub naming: NamingScheme,
    pub fallback_extension: String,
}

impl FileNamer {
    pub fn new(slug: &str, naming: NamingScheme, fallback_extension: &str) -> Self {
        Self {
            slug: slug.to_string(),
            naming,
            fallback_extension: fallback_extension.to_string(),
        }
    }

    pub fn generate_path(&self, url: &str, index: usize, is_featured: bool) -> String {
        let ext = image_extension(url, &self.fallback_extension);
        if is_featured {
            return format!("{ARTICLES_DIR}/{FEATURED_DIR}/{}{ext}", self.slug);
        }

        let name = match self.naming {
            NamingScheme::Descriptive => descriptive_name(url),
            NamingScheme::Indexed => None,
        }
        .unwrap_or_else(|| self.indexed_name(index));
        format!("{ARTICLES_DIR}/{MAIN_CONTENT_DIR}/{name}{ext}")
    }

    /// `{slug}-{index}` destination, used when a descriptive name is already taken.
    pub fn indexed_path(&self, url: &str, index: usize) -> String {
        self.indexed_path_attempt(url, index, 0)
    }

    /// `{slug}-{index}` for attempt 0, `{slug}-{index}-{attempt}` after that.
    pub fn indexed_path_attempt(&self, url: &str, index: usize, attempt: usize) -> String {
        let ext = image_extension(url, &self.fallback_extension);
        let name = match attempt {
            0 => self.indexed_name(index),
            n => format!("{}-{n}", self.indexed_name(index)),
        };
        format!("{ARTICLES_DIR}/{MAIN_CONTENT_DIR}/{name}{ext}")
    }

    fn indexed_name(&self, index: usize) -> String {
        format!("{}-{index}", self.slug)
    }
}

pub fn generate_path(url: &str, index: usize, is_featured: bool, slug: &str) -> String {
    FileNamer::new(slug, NamingScheme::default(), DEFAULT_FALLBACK_EXTENSION)
        .generate_path(url, index, is_featured)
}

/// Lowercased extension of the URL's last path segment, `.jpg` spelled `.jpeg`.
pub fn image_extension(url: &str, fallback: &str) -> String {
    let segment = last_path_segment(url);
    let ext = match segment.rfind('.') {
        Some(pos) if pos > 0 && pos + 1 < segment.len() => segment[pos..].to_lowercase(),
        _ => fallback.to_lowercase(),
    };
    if ext == ".jpg" {
        ".jpeg".to_string()
    } else {
        ext
    }
}

/// Stem of the last path segment with everything outside `[A-Za-z0-9-]` turned into `-`.
pub fn descriptive_name(url: &str) -> Option<String> {
    let segment = last_path_segment(url);
    let stem = segment.split('.').next().unwrap_or("");
    let name: String = stem
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' {
                ch
            } else {
                '-'
            }
        })
        .collect();
    if name.chars().any(|ch| ch.is_ascii_alphanumeric()) {
        Some(name)
    } else {
        None
    }
}

fn last_path_segment(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or("");
    let path = match Url::parse(without_query) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => without_query.to_string(),
    };
    path.rsplit('/').next().unwrap_or("").to_string()
}
