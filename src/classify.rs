use regex::Regex;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::str::FromStr;
use std::sync::OnceLock;

/// Path marker of image-optimisation proxy URLs (`/_next/image?url=...&w=...`).
pub const PROXY_PATH_MARKER: &str = "/_next/image";
pub const PROXY_SIZE_PARAM: &str = "w";
pub const PROXY_URL_PARAM: &str = "url";

const REGION_TAGS: &[&str] = &["main", "article"];

const DEFAULT_DENYLIST: &[&str] = &[
    "nav",
    "header",
    "footer",
    "sidebar",
    "social",
    "icon",
    "logo",
    "trustpilot",
    "twitter",
    "linkedin",
    "facebook",
    "mobile",
    "menu",
    "button-icon",
];

const DEFAULT_ALLOWLIST: &[&str] = &["article", "featured", "content", "infographic"];

const DEFAULT_PROXY_THUMBNAIL_SIZES: &[u32] = &[256, 384];

const DEFAULT_PROXY_DECORATION_MARKERS: &[&str] = &["mobile", "icon", "logo"];

const DEFAULT_VECTOR_MARKERS: &[&str] = &["icon", "logo", "svg"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceContext {
    ImgTag,
    DataSrcAttr,
    InlineStyleBackground,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    pub raw_url: String,
    pub source_context: SourceContext,
    /// Whether the reference sits inside a `main` or `article` element.
    pub in_content_region: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStrategy {
    /// Full HTML parse and element-tree walk.
    #[default]
    Structural,
    /// Regex tag tokenizer; no tree construction.
    Pattern,
}

impl FromStr for ScanStrategy {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "structural" => Ok(Self::Structural),
            "pattern" => Ok(Self::Pattern),
            other => Err(format!(
                "unknown scan strategy: {other} (expected structural or pattern)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptReason {
    Allowlisted(String),
    ContentRegion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Denylisted(String),
    InlineData,
    ProxyDecoration(String),
    ProxyThumbnail(u32),
    VectorOrIcon,
    OutsideContentRegion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept(AcceptReason),
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept(_))
    }
}

/// Substring rules that separate article images from site chrome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierPolicy {
    pub denylist: BTreeSet<String>,
    /// Topical keywords that accept a URL anywhere on the page.
    pub allowlist: BTreeSet<String>,
    pub proxy_thumbnail_sizes: BTreeSet<u32>,
    pub proxy_decoration_markers: BTreeSet<String>,
    pub vector_markers: BTreeSet<String>,
    pub dedupe: bool,
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        Self {
            denylist: to_set(DEFAULT_DENYLIST),
            allowlist: to_set(DEFAULT_ALLOWLIST),
            proxy_thumbnail_sizes: DEFAULT_PROXY_THUMBNAIL_SIZES.iter().copied().collect(),
            proxy_decoration_markers: to_set(DEFAULT_PROXY_DECORATION_MARKERS),
            vector_markers: to_set(DEFAULT_VECTOR_MARKERS),
            dedupe: false,
        }
    }
}

impl ClassifierPolicy {
    /// Lowercases and trims every keyword, dropping empty ones.
    pub fn normalized(self) -> Self {
        Self {
            denylist: normalize_keywords(self.denylist),
            allowlist: normalize_keywords(self.allowlist),
            proxy_decoration_markers: normalize_keywords(self.proxy_decoration_markers),
            vector_markers: normalize_keywords(self.vector_markers),
            ..self
        }
    }

    pub fn with_allowed<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for keyword in keywords {
            let keyword = keyword.as_ref().trim().to_lowercase();
            if !keyword.is_empty() {
                self.allowlist.insert(keyword);
            }
        }
        self
    }

    pub fn classify(&self, url: &str, in_content_region: bool) -> Verdict {
        let lower = url.trim().to_lowercase();

        if let Some(marker) = first_match(&lower, &self.denylist) {
            return Verdict::Reject(RejectReason::Denylisted(marker));
        }
        if lower.starts_with("data:") {
            return Verdict::Reject(RejectReason::InlineData);
        }

        if lower.contains(PROXY_PATH_MARKER) {
            if let Some(marker) = first_match(&lower, &self.proxy_decoration_markers) {
                return Verdict::Reject(RejectReason::ProxyDecoration(marker));
            }
            if let Some(size) = proxy_size_hint(url) {
                if self.proxy_thumbnail_sizes.contains(&size) {
                    return Verdict::Reject(RejectReason::ProxyThumbnail(size));
                }
            }
        }

        if let Some(marker) = first_match(&lower, &self.allowlist) {
            return Verdict::Accept(AcceptReason::Allowlisted(marker));
        }

        if in_content_region {
            if lower.contains(".svg") || first_match(&lower, &self.vector_markers).is_some() {
                return Verdict::Reject(RejectReason::VectorOrIcon);
            }
            return Verdict::Accept(AcceptReason::ContentRegion);
        }

        Verdict::Reject(RejectReason::OutsideContentRegion)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Classifier {
    pub policy: ClassifierPolicy,
    pub strategy: ScanStrategy,
}

impl Classifier {
    pub fn new(policy: ClassifierPolicy, strategy: ScanStrategy) -> Self {
        Self { policy, strategy }
    }

    /// Every image reference in document order, before any filtering.
    pub fn scan(&self, html: &str) -> Vec<ImageCandidate> {
        match self.strategy {
            ScanStrategy::Structural => scan_structural(html),
            ScanStrategy::Pattern => scan_pattern(html),
        }
    }

    pub fn review(&self, html: &str) -> Vec<(ImageCandidate, Verdict)> {
        self.scan(html)
            .into_iter()
            .map(|candidate| {
                let verdict = self
                    .policy
                    .classify(&candidate.raw_url, candidate.in_content_region);
                (candidate, verdict)
            })
            .collect()
    }

    pub fn extract_candidates(&self, html: &str) -> Vec<ImageCandidate> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::new();
        for (candidate, verdict) in self.review(html) {
            tracing::debug!(
                url = %candidate.raw_url,
                source = ?candidate.source_context,
                in_content_region = candidate.in_content_region,
                verdict = ?verdict,
                "image_candidate_classified"
            );
            if !verdict.is_accept() {
                continue;
            }
            if self.policy.dedupe && !seen.insert(candidate.raw_url.clone()) {
                continue;
            }
            out.push(candidate);
        }
        out
    }

    pub fn extract_content_images(&self, html: &str) -> Vec<String> {
        self.extract_candidates(html)
            .into_iter()
            .map(|candidate| candidate.raw_url)
            .collect()
    }
}

pub fn is_proxy_url(url: &str) -> bool {
    url.to_lowercase().contains(PROXY_PATH_MARKER)
}

/// First value of `key` in the URL's query string, percent-decoded.
pub fn query_param(url: &str, key: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    let query = query.split('#').next().unwrap_or("");
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.into_owned())
}

fn proxy_size_hint(url: &str) -> Option<u32> {
    query_param(url, PROXY_SIZE_PARAM)?.trim().parse::<u32>().ok()
}

fn first_match(lower: &str, keywords: &BTreeSet<String>) -> Option<String> {
    keywords
        .iter()
        .find(|keyword| lower.contains(keyword.as_str()))
        .cloned()
}

fn to_set(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn normalize_keywords(values: BTreeSet<String>) -> BTreeSet<String> {
    values
        .into_iter()
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
        .collect()
}

fn is_region_tag(name: &str) -> bool {
    REGION_TAGS.iter().any(|tag| tag.eq_ignore_ascii_case(name))
}

fn scan_structural(html: &str) -> Vec<ImageCandidate> {
    let document = Html::parse_document(html);
    let mut out = Vec::new();
    let mut stack: Vec<(ElementRef<'_>, usize)> = vec![(document.root_element(), 0)];

    while let Some((element, depth)) = stack.pop() {
        let name = element.value().name();
        let depth = if is_region_tag(name) { depth + 1 } else { depth };
        collect_references(name, |attr| element.value().attr(attr), depth > 0, &mut out);

        let children: Vec<ElementRef<'_>> =
            element.children().filter_map(ElementRef::wrap).collect();
        for child in children.into_iter().rev() {
            stack.push((child, depth));
        }
    }
    out
}

fn scan_pattern(html: &str) -> Vec<ImageCandidate> {
    static COMMENT_RE: OnceLock<Regex> = OnceLock::new();
    static RAW_TEXT_RE: OnceLock<Regex> = OnceLock::new();
    static TAG_RE: OnceLock<Regex> = OnceLock::new();
    let comment_re = COMMENT_RE.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").expect("comment regex"));
    // Bodies the tree parser keeps as text: their markup never reaches the element walk.
    let raw_text_re = RAW_TEXT_RE.get_or_init(|| {
        Regex::new(
            r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>|<noscript\b[^>]*>.*?</noscript\s*>|<template\b[^>]*>.*?</template\s*>|<textarea\b[^>]*>.*?</textarea\s*>",
        )
        .expect("raw text regex")
    });
    let tag_re = TAG_RE.get_or_init(|| {
        Regex::new(r#"(?is)<(/?)([a-z][a-z0-9-]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#)
            .expect("tag regex")
    });

    let without_comments = comment_re.replace_all(html, "");
    let stripped = raw_text_re.replace_all(&without_comments, "");
    let mut out = Vec::new();
    let mut depth = 0_usize;

    for caps in tag_re.captures_iter(&stripped) {
        let closing = caps.get(1).is_some_and(|m| m.as_str() == "/");
        let name = caps
            .get(2)
            .map(|m| m.as_str().to_ascii_lowercase())
            .unwrap_or_default();
        let raw_attrs = caps.get(3).map(|m| m.as_str()).unwrap_or("");
        let region = is_region_tag(&name);

        if closing {
            if region {
                depth = depth.saturating_sub(1);
            }
            continue;
        }
        if region && !raw_attrs.trim_end().ends_with('/') {
            depth += 1;
        }

        let attrs = parse_attributes(raw_attrs);
        collect_references(
            &name,
            |key| {
                attrs
                    .iter()
                    .find(|(name, _)| name == key)
                    .map(|(_, value)| value.as_str())
            },
            depth > 0,
            &mut out,
        );
    }
    out
}

fn parse_attributes(raw: &str) -> Vec<(String, String)> {
    static ATTR_RE: OnceLock<Regex> = OnceLock::new();
    let attr_re = ATTR_RE.get_or_init(|| {
        Regex::new(r#"(?is)([a-z_:][-a-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
            .expect("attribute regex")
    });

    attr_re
        .captures_iter(raw)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str())
                .unwrap_or("");
            Some((name, decode_entities(value)))
        })
        .collect()
}

fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn collect_references<'a, F>(tag: &str, attr: F, in_content_region: bool, out: &mut Vec<ImageCandidate>)
where
    F: Fn(&str) -> Option<&'a str>,
{
    let non_empty = |key: &str| attr(key).map(str::trim).filter(|v| !v.is_empty());
    let mut push = |raw_url: &str, source_context: SourceContext| {
        out.push(ImageCandidate {
            raw_url: raw_url.to_string(),
            source_context,
            in_content_region,
        });
    };

    if tag == "img" {
        match (non_empty("src"), non_empty("data-src")) {
            // Lazy-loading placeholders carry an inline `src` and the real asset in `data-src`.
            (Some(src), Some(lazy)) if src.to_ascii_lowercase().starts_with("data:") => {
                push(lazy, SourceContext::DataSrcAttr)
            }
            (Some(src), _) => push(src, SourceContext::ImgTag),
            (None, Some(lazy)) => push(lazy, SourceContext::DataSrcAttr),
            (None, None) => {}
        }
    }

    if let Some(style) = non_empty("style") {
        for url in background_urls(style) {
            push(&url, SourceContext::InlineStyleBackground);
        }
    }
}

fn background_urls(style: &str) -> Vec<String> {
    static BG_RE: OnceLock<Regex> = OnceLock::new();
    let bg_re = BG_RE.get_or_init(|| {
        Regex::new(r#"(?i)background(?:-image)?\s*:[^;]*?url\(\s*["']?([^"')]+?)["']?\s*\)"#)
            .expect("background regex")
    });
    bg_re
        .captures_iter(style)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|url| !url.is_empty())
        .collect()
}
