use crate::classify::{Classifier, Verdict};
use crate::config::{FeaturedPolicy, FetchConfig};
use crate::fetch::{resolve_asset_url, Fetcher};
use crate::manifest::{write_manifest, AcceptedImage, DownloadManifest, ImageRole};
use crate::naming::FileNamer;
use crate::normalize::{article_origin, normalize};
use crate::paths::AssetPaths;
use crate::ArticleImagesError;
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ArticleJob {
    pub article_url: String,
    pub slug: String,
}

impl ArticleJob {
    pub fn new(article_url: &str, slug: &str) -> Self {
        Self {
            article_url: article_url.trim().to_string(),
            slug: slug.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The image loop ran; individual images may still have failed.
    Completed,
    PageUnavailable,
    NoImages,
}

#[derive(Debug, Clone)]
pub struct ImageFailure {
    pub index: usize,
    pub url: String,
    pub error: String,
}

#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub candidates: usize,
    pub manifest: DownloadManifest,
    pub manifest_path: Option<PathBuf>,
    pub failures: Vec<ImageFailure>,
}

impl RunReport {
    fn aborted(outcome: RunOutcome, manifest: DownloadManifest) -> Self {
        Self {
            outcome,
            candidates: 0,
            manifest,
            manifest_path: None,
            failures: Vec::new(),
        }
    }
}

/// Downloads the content images of one article and writes its manifest.
///
/// Only a failed page fetch aborts the run; per-image failures are logged, collected in
/// the report, and skipped.
pub fn run_article<F: Fetcher>(
    job: &ArticleJob,
    config: &FetchConfig,
    paths: &AssetPaths,
    fetcher: &F,
) -> RunReport {
    let mut manifest = DownloadManifest::new(&job.slug, &job.article_url, config.note.clone());

    tracing::info!(url = %job.article_url, slug = %job.slug, "article_page_fetch");
    let html = match fetcher.fetch(&job.article_url) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) => {
            tracing::error!(url = %job.article_url, error = %err, "article_page_fetch_failed");
            return RunReport::aborted(RunOutcome::PageUnavailable, manifest);
        }
    };

    let classifier = Classifier::new(config.classifier.clone(), config.strategy);
    let images = classifier.extract_content_images(&html);
    if images.is_empty() {
        let err = ArticleImagesError::NoImagesFound {
            url: job.article_url.clone(),
        };
        tracing::warn!(error = %err, "no_content_images");
        return RunReport::aborted(RunOutcome::NoImages, manifest);
    }
    tracing::info!(count = images.len(), "content_images_found");

    if let Err(err) = paths.ensure_dirs() {
        tracing::warn!(
            asset_root = %paths.asset_root.display(),
            error = %err,
            "asset_dirs_unavailable"
        );
    }

    let origin = config
        .proxy_origin
        .clone()
        .or_else(|| article_origin(&job.article_url))
        .unwrap_or_default();
    let namer = FileNamer::new(&job.slug, config.naming, &config.fallback_extension);
    let mut used_paths: HashSet<String> = HashSet::new();
    let mut featured_taken = false;
    let mut failures: Vec<ImageFailure> = Vec::new();

    for (index, original_url) in images.iter().enumerate() {
        tracing::info!(
            index,
            total = images.len(),
            url = %original_url,
            "image_processing"
        );

        let Some(normalized_url) = normalize(original_url, &job.article_url) else {
            record_failure(&mut failures, index, original_url, "unusable image reference");
            continue;
        };
        let asset_url = resolve_asset_url(&normalized_url, &origin);

        let is_featured = match config.featured {
            FeaturedPolicy::FirstCandidate => index == 0,
            FeaturedPolicy::FirstDownloaded => !featured_taken,
        };
        let mut local_path = namer.generate_path(&asset_url, index, is_featured);
        let mut attempt = 0;
        while used_paths.contains(&local_path) {
            local_path = namer.indexed_path_attempt(&asset_url, index, attempt);
            attempt += 1;
        }

        let data = match fetcher.fetch(&asset_url) {
            Ok(data) => data,
            Err(err) => {
                record_failure(&mut failures, index, &asset_url, &err.to_string());
                continue;
            }
        };
        if let Err(err) = paths.write_asset(&local_path, &data) {
            record_failure(&mut failures, index, &asset_url, &err.to_string());
            continue;
        }

        used_paths.insert(local_path.clone());
        if is_featured {
            featured_taken = true;
        }
        let role = if is_featured {
            ImageRole::Featured
        } else {
            ImageRole::Content
        };
        tracing::info!(index, path = %local_path, bytes = data.len(), "image_downloaded");
        manifest.images.push(AcceptedImage::new(
            original_url,
            &normalized_url,
            &local_path,
            role,
            index,
            &data,
        ));
    }

    manifest.downloaded_at = chrono::Local::now();
    let manifest_path = paths.manifest_path(&job.slug);
    let written = match write_manifest(&manifest, &manifest_path) {
        Ok(()) => {
            tracing::info!(
                path = %manifest_path.display(),
                images = manifest.images.len(),
                failed = failures.len(),
                "manifest_written"
            );
            Some(manifest_path)
        }
        Err(err) => {
            tracing::error!(path = %manifest_path.display(), error = %err, "manifest_write_failed");
            None
        }
    };

    RunReport {
        outcome: RunOutcome::Completed,
        candidates: images.len(),
        manifest,
        manifest_path: written,
        failures,
    }
}

/// Classifies without downloading; every scanned reference with its verdict.
pub fn dry_run<F: Fetcher>(
    job: &ArticleJob,
    config: &FetchConfig,
    fetcher: &F,
) -> crate::Result<Vec<(String, Verdict)>> {
    let bytes = fetcher.fetch(&job.article_url)?;
    let html = String::from_utf8_lossy(&bytes);
    let classifier = Classifier::new(config.classifier.clone(), config.strategy);
    Ok(classifier
        .review(&html)
        .into_iter()
        .map(|(candidate, verdict)| (candidate.raw_url, verdict))
        .collect())
}

fn record_failure(failures: &mut Vec<ImageFailure>, index: usize, url: &str, error: &str) {
    tracing::warn!(index, url = %url, error = %error, "image_skipped");
    failures.push(ImageFailure {
        index,
        url: url.to_string(),
        error: error.to_string(),
    });
}
