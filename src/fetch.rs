use crate::classify::{is_proxy_url, query_param, PROXY_URL_PARAM};
use crate::config::FetchConfig;
use crate::normalize::{is_absolute_http, join_origin};
use crate::{ArticleImagesError, Result};
use std::time::Duration;

const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// Blocking GET returning the full response body, or a `Fetch` error naming the URL.
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpFetcher {
    agent: ureq::Agent,
    user_agent: String,
    max_body_bytes: u64,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Self {
        let mut config = ureq::Agent::config_builder();
        config = config
            .http_status_as_error(false)
            .timeout_global(Some(timeout));
        let agent: ureq::Agent = config.build().into();
        Self {
            agent,
            user_agent: user_agent.to_string(),
            max_body_bytes: MAX_BODY_BYTES,
        }
    }

    /// Bodies larger than `limit` bytes fail instead of being cut short.
    pub fn with_body_limit(mut self, limit: u64) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(
            &config.user_agent,
            Duration::from_secs(config.timeout_secs.max(1)),
        )
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let mut response = self
            .agent
            .get(url)
            .header("User-Agent", self.user_agent.as_str())
            .call()
            .map_err(|err| ArticleImagesError::fetch(url, err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArticleImagesError::fetch(
                url,
                format!("http status {}", status.as_u16()),
            ));
        }

        response
            .body_mut()
            .with_config()
            .limit(self.max_body_bytes)
            .read_to_vec()
            .map_err(|err| ArticleImagesError::fetch(url, format!("body read failed: {err}")))
    }
}

/// For image-proxy URLs, the underlying asset named by the `url` query parameter.
///
/// Relative targets are prefixed with `origin`. Other URLs, and proxy URLs without a
/// target, come back unchanged.
pub fn resolve_asset_url(url: &str, origin: &str) -> String {
    if !is_proxy_url(url) {
        return url.to_string();
    }
    let Some(target) = query_param(url, PROXY_URL_PARAM)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
    else {
        return url.to_string();
    };

    if is_absolute_http(&target) {
        return target;
    }
    if let Some(rest) = target.strip_prefix("//") {
        let scheme = origin.split_once("://").map(|(s, _)| s).unwrap_or("https");
        return format!("{scheme}://{rest}");
    }
    join_origin(origin.trim_end_matches('/'), &target)
}
