use std::cell::RefCell;
use std::collections::HashMap;

use chrono::{DateTime, Local};

use article_images::classify::ScanStrategy;
use article_images::config::{FeaturedPolicy, FetchConfig};
use article_images::fetch::Fetcher;
use article_images::manifest::{read_manifest, ImageRole};
use article_images::paths::AssetPaths;
use article_images::pipeline::{run_article, ArticleJob, RunOutcome};
use article_images::{ArticleImagesError, Result};

const ARTICLE_URL: &str = "https://example.com/articles/my-slug";
const SLUG: &str = "my-slug";

const PAGE: &str = r#"
<html><body>
  <nav><img src="/static/nav-arrow.png"></nav>
  <main>
    <img src="/uploads/hero.jpg">
    <img src="https://cdn.example.net/uploads/chart.png">
    <img src="/_next/image?url=%2Fuploads%2Fteen-map.png&amp;w=1200&amp;q=75">
    <img src="/_next/image?url=%2Fuploads%2Frelated.png&amp;w=384&amp;q=75">
  </main>
  <footer><img src="/static/social-twitter.png"></footer>
</body></html>
"#;

const HERO_URL: &str = "https://example.com/uploads/hero.jpg";
const CHART_URL: &str = "https://cdn.example.net/uploads/chart.png";
const MAP_URL: &str = "https://example.com/uploads/teen-map.png";

#[derive(Default)]
struct FakeWeb {
    bodies: HashMap<String, Vec<u8>>,
    requested: RefCell<Vec<String>>,
    last_fetch_at: RefCell<Option<DateTime<Local>>>,
}

impl FakeWeb {
    fn with(mut self, url: &str, body: &[u8]) -> Self {
        self.bodies.insert(url.to_string(), body.to_vec());
        self
    }

    fn article(page: &str) -> Self {
        Self::default().with(ARTICLE_URL, page.as_bytes())
    }
}

impl Fetcher for FakeWeb {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.requested.borrow_mut().push(url.to_string());
        *self.last_fetch_at.borrow_mut() = Some(Local::now());
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| ArticleImagesError::fetch(url, "http status 404"))
    }
}

fn workspace() -> (tempfile::TempDir, AssetPaths) {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = AssetPaths::new(dir.path().join("public").join("assets"), dir.path().join("scripts"));
    (dir, paths)
}

#[test]
fn failed_first_download_keeps_indices_and_leaves_no_featured_image() {
    let (_dir, paths) = workspace();
    let web = FakeWeb::article(PAGE)
        .with(CHART_URL, b"chart-bytes")
        .with(MAP_URL, b"map-bytes");
    let job = ArticleJob::new(ARTICLE_URL, SLUG);

    let report = run_article(&job, &FetchConfig::default(), &paths, &web);

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.candidates, 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 0);
    assert_eq!(report.failures[0].url, HERO_URL);

    let images = &report.manifest.images;
    assert_eq!(images.len(), 2);
    assert_eq!(images.iter().map(|i| i.index).collect::<Vec<_>>(), vec![1, 2]);
    assert!(images.iter().all(|i| i.role == ImageRole::Content));
    assert_eq!(images[0].local_path, "articles/main-content/chart.png");
    assert_eq!(images[1].local_path, "articles/main-content/teen-map.png");
    assert_eq!(
        images[1].original_url,
        "/_next/image?url=%2Fuploads%2Fteen-map.png&w=1200&q=75"
    );
    assert_eq!(
        images[1].normalized_url,
        "https://example.com/_next/image?url=%2Fuploads%2Fteen-map.png&w=1200&q=75"
    );

    assert_eq!(
        std::fs::read(paths.resolve("articles/main-content/teen-map.png")).expect("map"),
        b"map-bytes"
    );
    assert!(!paths.featured_dir().join("my-slug.jpeg").exists());

    let manifest_path = report.manifest_path.expect("manifest written");
    assert_eq!(manifest_path, paths.manifest_path(SLUG));
    let on_disk = read_manifest(&manifest_path).expect("manifest");
    assert_eq!(on_disk.images, report.manifest.images);
    assert_eq!(on_disk.article_url, ARTICLE_URL);
}

#[test]
fn proxy_images_are_fetched_through_their_target_and_thumbnails_skipped() {
    let (_dir, paths) = workspace();
    let web = FakeWeb::article(PAGE)
        .with(HERO_URL, b"hero")
        .with(CHART_URL, b"chart")
        .with(MAP_URL, b"map");
    let job = ArticleJob::new(ARTICLE_URL, SLUG);

    let report = run_article(&job, &FetchConfig::default(), &paths, &web);

    let requested = web.requested.borrow().clone();
    assert_eq!(requested, vec![ARTICLE_URL, HERO_URL, CHART_URL, MAP_URL]);
    assert!(report.failures.is_empty());

    let featured = report.manifest.featured().expect("featured");
    assert_eq!(featured.index, 0);
    assert_eq!(featured.local_path, "articles/featured/my-slug.jpeg");
    assert_eq!(
        report
            .manifest
            .images
            .iter()
            .filter(|i| i.role == ImageRole::Featured)
            .count(),
        1
    );
}

#[test]
fn first_downloaded_policy_promotes_next_successful_image() {
    let (_dir, paths) = workspace();
    let web = FakeWeb::article(PAGE)
        .with(CHART_URL, b"chart")
        .with(MAP_URL, b"map");
    let config = FetchConfig {
        featured: FeaturedPolicy::FirstDownloaded,
        ..FetchConfig::default()
    };
    let job = ArticleJob::new(ARTICLE_URL, SLUG);

    let report = run_article(&job, &config, &paths, &web);

    let featured = report.manifest.featured().expect("featured");
    assert_eq!(featured.index, 1);
    assert_eq!(featured.local_path, "articles/featured/my-slug.png");
    assert_eq!(report.manifest.images[1].role, ImageRole::Content);
    assert!(paths.featured_dir().join("my-slug.png").exists());
}

#[test]
fn pattern_strategy_produces_the_same_manifest_entries() {
    let (_dir, paths) = workspace();
    let web = FakeWeb::article(PAGE)
        .with(HERO_URL, b"hero")
        .with(CHART_URL, b"chart")
        .with(MAP_URL, b"map");
    let config = FetchConfig {
        strategy: ScanStrategy::Pattern,
        ..FetchConfig::default()
    };
    let job = ArticleJob::new(ARTICLE_URL, SLUG);

    let report = run_article(&job, &config, &paths, &web);

    let local_paths: Vec<&str> = report
        .manifest
        .images
        .iter()
        .map(|i| i.local_path.as_str())
        .collect();
    assert_eq!(
        local_paths,
        vec![
            "articles/featured/my-slug.jpeg",
            "articles/main-content/chart.png",
            "articles/main-content/teen-map.png",
        ]
    );
}

#[test]
fn colliding_descriptive_names_fall_back_to_slug_index() {
    let (_dir, paths) = workspace();
    let page = r#"<main>
        <img src="/uploads/cover.jpg">
        <img src="https://a.example.net/x/photo.jpg">
        <img src="https://b.example.net/y/photo.jpg">
    </main>"#;
    let web = FakeWeb::article(page)
        .with("https://example.com/uploads/cover.jpg", b"cover")
        .with("https://a.example.net/x/photo.jpg", b"a")
        .with("https://b.example.net/y/photo.jpg", b"b");
    let job = ArticleJob::new(ARTICLE_URL, SLUG);

    let report = run_article(&job, &FetchConfig::default(), &paths, &web);

    let local_paths: Vec<&str> = report
        .manifest
        .images
        .iter()
        .map(|i| i.local_path.as_str())
        .collect();
    assert_eq!(
        local_paths,
        vec![
            "articles/featured/my-slug.jpeg",
            "articles/main-content/photo.jpeg",
            "articles/main-content/my-slug-2.jpeg",
        ]
    );
    assert_eq!(
        std::fs::read(paths.resolve("articles/main-content/my-slug-2.jpeg")).expect("b"),
        b"b"
    );
}

#[test]
fn indexed_fallback_never_overwrites_an_earlier_image() {
    let (_dir, paths) = workspace();
    let page = r#"<main>
        <img src="/uploads/cover.jpg">
        <img src="https://a.example.net/x/my-slug-2.jpg">
        <img src="https://b.example.net/y/my-slug-2.jpg">
    </main>"#;
    let web = FakeWeb::article(page)
        .with("https://example.com/uploads/cover.jpg", b"cover")
        .with("https://a.example.net/x/my-slug-2.jpg", b"a")
        .with("https://b.example.net/y/my-slug-2.jpg", b"b");
    let job = ArticleJob::new(ARTICLE_URL, SLUG);

    let report = run_article(&job, &FetchConfig::default(), &paths, &web);

    let local_paths: Vec<&str> = report
        .manifest
        .images
        .iter()
        .map(|i| i.local_path.as_str())
        .collect();
    assert_eq!(
        local_paths,
        vec![
            "articles/featured/my-slug.jpeg",
            "articles/main-content/my-slug-2.jpeg",
            "articles/main-content/my-slug-2-1.jpeg",
        ]
    );
    assert_eq!(
        std::fs::read(paths.resolve("articles/main-content/my-slug-2.jpeg")).expect("a"),
        b"a"
    );
    assert_eq!(
        std::fs::read(paths.resolve("articles/main-content/my-slug-2-1.jpeg")).expect("b"),
        b"b"
    );
}

#[test]
fn unwritable_asset_root_skips_every_image_but_still_writes_the_manifest() {
    let dir = tempfile::tempdir().expect("tempdir");
    let asset_root = dir.path().join("assets");
    std::fs::write(&asset_root, b"not a directory").expect("blocker file");
    let paths = AssetPaths::new(asset_root, dir.path().join("scripts"));
    let web = FakeWeb::article(PAGE)
        .with(HERO_URL, b"hero")
        .with(CHART_URL, b"chart")
        .with(MAP_URL, b"map");
    let job = ArticleJob::new(ARTICLE_URL, SLUG);

    let report = run_article(&job, &FetchConfig::default(), &paths, &web);

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.candidates, 3);
    assert_eq!(report.failures.len(), 3);
    assert_eq!(
        report.failures.iter().map(|f| f.index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert!(report
        .failures
        .iter()
        .all(|f| f.error.starts_with("failed to write")));
    assert!(report.manifest.images.is_empty());

    let manifest_path = report.manifest_path.expect("manifest written");
    let on_disk = read_manifest(&manifest_path).expect("manifest");
    assert!(on_disk.images.is_empty());
}

#[test]
fn manifest_timestamp_is_taken_after_the_last_download() {
    let (_dir, paths) = workspace();
    let web = FakeWeb::article(PAGE)
        .with(HERO_URL, b"hero")
        .with(CHART_URL, b"chart")
        .with(MAP_URL, b"map");
    let job = ArticleJob::new(ARTICLE_URL, SLUG);

    let report = run_article(&job, &FetchConfig::default(), &paths, &web);

    let last_fetch = web.last_fetch_at.borrow().expect("fetched");
    assert!(
        report.manifest.downloaded_at >= last_fetch,
        "downloaded_at={} last_fetch={last_fetch}",
        report.manifest.downloaded_at
    );
    let on_disk = read_manifest(&report.manifest_path.expect("manifest")).expect("manifest");
    assert_eq!(on_disk.downloaded_at, report.manifest.downloaded_at);
}

#[test]
fn page_without_content_images_writes_nothing() {
    let (_dir, paths) = workspace();
    let web = FakeWeb::article(r#"<header><img src="/static/logo.svg"></header><p>text</p>"#);
    let job = ArticleJob::new(ARTICLE_URL, SLUG);

    let report = run_article(&job, &FetchConfig::default(), &paths, &web);

    assert_eq!(report.outcome, RunOutcome::NoImages);
    assert!(report.manifest.images.is_empty());
    assert!(report.manifest_path.is_none());
    assert!(!paths.manifest_path(SLUG).exists());
    assert_eq!(web.requested.borrow().len(), 1);
}
