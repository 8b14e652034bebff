//! Favicon resolution for feeds.
//!
//! Well-known platforms are answered from fixed rules without touching the
//! network. Everything else is probed: icons declared by the site's HTML
//! `<link rel="...icon...">` tags first, then the conventional paths.

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;
use std::time::Duration;
use url::Url;

use super::fetcher::Fetcher;
use crate::util::{base_origin, get_domain};

const PAGE_TIMEOUT: Duration = Duration::from_secs(5);
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

const YOUTUBE_FAVICON: &str = "https://www.youtube.com/favicon.ico";
const STACKOVERFLOW_FAVICON: &str = "https://cdn.sstatic.net/Sites/stackoverflow/Img/favicon.ico";
const HACKER_NEWS_FAVICON: &str = "https://news.ycombinator.com/favicon.ico";

/// Conventional icon paths, probed after any page-declared icons.
const FALLBACK_PATHS: [&str; 3] = ["/favicon.ico", "/favicon.png", "/apple-touch-icon.png"];

static GITHUB_USER_FEED_RE: OnceLock<Regex> = OnceLock::new();
static GITHUB_REPO_FEED_RE: OnceLock<Regex> = OnceLock::new();

fn github_user_feed_re() -> &'static Regex {
    GITHUB_USER_FEED_RE.get_or_init(|| {
        Regex::new(r"github\.com/([^/.]+)\.atom").unwrap_or_else(|e| unreachable!("static regex: {e}"))
    })
}

fn github_repo_feed_re() -> &'static Regex {
    GITHUB_REPO_FEED_RE.get_or_init(|| {
        Regex::new(r"github\.com/([^/]+)/").unwrap_or_else(|e| unreachable!("static regex: {e}"))
    })
}

/// Resolves icon URLs for feeds using a shared [`Fetcher`].
#[derive(Debug, Clone)]
pub struct FaviconResolver {
    fetcher: Fetcher,
}

impl FaviconResolver {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    /// Determines an icon URL for a feed. First matching rule wins:
    ///
    /// 1. GitHub user or commit feeds → the user's avatar
    /// 2. YouTube channel feeds → YouTube's favicon
    /// 3. Stack Overflow / Hacker News site links → their hosted favicons
    /// 4. Probe page-declared icons, then `/favicon.ico`, `/favicon.png`,
    ///    `/apple-touch-icon.png` on the site's origin
    ///
    /// Never fails: any problem along the way yields `None`.
    pub async fn resolve(&self, feed_url: &str, feed_link: Option<&str>) -> Option<String> {
        if let Some(icon) = known_platform_icon(feed_url, feed_link) {
            return Some(icon);
        }

        let base = feed_link.filter(|l| !l.is_empty()).unwrap_or(feed_url);
        let origin = match Url::parse(base).ok().and_then(|u| base_origin(&u)) {
            Some(origin) => origin,
            None => {
                tracing::debug!(feed = %feed_url, base = %base, "No origin to probe for favicon");
                return None;
            }
        };

        let candidates = self.candidates(base, &origin).await;
        for candidate in &candidates {
            if self.fetcher.probe(candidate, PROBE_TIMEOUT).await {
                tracing::debug!(feed = %feed_url, favicon = %candidate, "Resolved favicon");
                return Some(candidate.clone());
            }
        }

        tracing::debug!(
            feed = %feed_url,
            tried = candidates.len(),
            "No favicon candidate responded"
        );
        None
    }

    /// Builds the probe list: page-declared icons (last declared first),
    /// followed by the conventional paths.
    async fn candidates(&self, page_url: &str, origin: &str) -> Vec<String> {
        let mut candidates: Vec<String> = FALLBACK_PATHS
            .iter()
            .map(|p| resolve_url(p, origin))
            .collect();

        let attempts = self.fetcher.policy().max_attempts;
        match self
            .fetcher
            .fetch_with(page_url, PAGE_TIMEOUT, attempts)
            .await
        {
            Ok(bytes) => {
                let html = String::from_utf8_lossy(&bytes);
                for href in find_icon_links_in_html(&html) {
                    candidates.insert(0, resolve_url(&href, origin));
                }
            }
            Err(e) => {
                tracing::debug!(page = %page_url, error = %e, "Could not load page for icon links");
            }
        }

        candidates
    }
}

/// Rules 1–3: icons answered without any network access.
pub fn known_platform_icon(feed_url: &str, feed_link: Option<&str>) -> Option<String> {
    if is_github_profile_feed(feed_url) {
        if let Some(username) = extract_github_username(feed_url) {
            return Some(format!("https://github.com/{username}.png?size=50"));
        }
    }

    if is_youtube_feed(feed_url) {
        return Some(YOUTUBE_FAVICON.to_owned());
    }

    if let Some(link) = feed_link {
        let domain = get_domain(link);
        if domain.contains("stackoverflow.com") {
            return Some(STACKOVERFLOW_FAVICON.to_owned());
        }
        if domain.contains("news.ycombinator.com") {
            return Some(HACKER_NEWS_FAVICON.to_owned());
        }
    }

    None
}

fn host_is(url: &str, domain: &str) -> bool {
    let host = get_domain(url);
    let host = host.split(':').next().unwrap_or_default();
    host == domain || host.ends_with(&format!(".{domain}"))
}

/// GitHub user (`github.com/{name}.atom`) or commit (`.../commits/...`) feed.
pub fn is_github_profile_feed(feed_url: &str) -> bool {
    host_is(feed_url, "github.com") && (feed_url.contains(".atom") || feed_url.contains("/commits/"))
}

/// YouTube channel/user feed (`youtube.com/feeds/videos.xml?...`).
pub fn is_youtube_feed(feed_url: &str) -> bool {
    host_is(feed_url, "youtube.com") && feed_url.contains("feeds/videos.xml")
}

/// Extracts the account name from a GitHub `.atom` feed URL.
///
/// Commit feeds (`github.com/{name}/{repo}/commits/{branch}.atom`) use the
/// repository owner; user feeds (`github.com/{name}.atom`) use the user.
pub fn extract_github_username(feed_url: &str) -> Option<String> {
    if !feed_url.contains(".atom") {
        return None;
    }

    let re = if feed_url.contains("/commits/") {
        github_repo_feed_re()
    } else {
        github_user_feed_re()
    };

    re.captures(feed_url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
}

/// Returns the `href` of every `<link>` whose `rel` mentions "icon"
/// (`icon`, `shortcut icon`, `apple-touch-icon`, ...), in document order.
fn find_icon_links_in_html(html: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("link[rel][href]") else {
        return Vec::new();
    };

    Html::parse_document(html)
        .select(&selector)
        .filter(|link| {
            link.value()
                .attr("rel")
                .is_some_and(|rel| rel.to_ascii_lowercase().contains("icon"))
        })
        .filter_map(|link| link.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Resolves a potentially relative URL against a base URL.
fn resolve_url(href: &str, base_url: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_owned();
    }

    // Protocol-relative: use URL parser to normalize
    if href.starts_with("//") {
        let with_scheme = format!("https:{}", href);
        if let Ok(parsed) = Url::parse(&with_scheme) {
            return parsed.to_string();
        }
    }

    if let Ok(base) = Url::parse(base_url) {
        if let Ok(resolved) = base.join(href) {
            return resolved.to_string();
        }
    }

    href.to_owned()
}
