use url::{Origin, Url};

/// `scheme://host[:port]` of the article, or `None` for URLs without a tuple origin.
pub fn article_origin(article_url: &str) -> Option<String> {
    let parsed = Url::parse(article_url.trim()).ok()?;
    match parsed.origin() {
        origin @ Origin::Tuple(..) => Some(origin.ascii_serialization()),
        Origin::Opaque(_) => None,
    }
}

pub fn is_absolute_http(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Turns an image reference into an absolute URL against the article's origin.
///
/// Returns `None` for empty references and when the article URL has no usable origin.
/// Paths are concatenated as-is; `..` segments and query strings are left alone.
pub fn normalize(url: &str, article_url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    if is_absolute_http(url) {
        return Some(url.to_string());
    }

    let parsed = Url::parse(article_url.trim()).ok()?;
    if let Some(rest) = url.strip_prefix("//") {
        return Some(format!("{}://{rest}", parsed.scheme()));
    }

    let base = article_origin(article_url)?;
    Some(join_origin(&base, url))
}

pub(crate) fn join_origin(origin: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("{origin}{path}")
    } else {
        format!("{origin}/{path}")
    }
}
