use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed as an absolute URI.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL parsed but carries no host (e.g. `mailto:` or `data:` URIs).
    #[error("URL has no host: {0}")]
    MissingHost(String),
}

/// Validates that a string is an absolute URI with both a scheme and a host.
///
/// This is the minimal well-formedness check applied to subscription URLs:
/// any scheme is accepted as long as a host is present, so `ftp://example.com`
/// passes while `example.com` (no scheme) and `mailto:a@b.c` (no host) do not.
///
/// # Examples
///
/// ```
/// use feedhub::util::validate_url;
///
/// let url = validate_url("https://example.com/feed.xml").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_url("example.com").is_err());
/// assert!(validate_url("invalid-url").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlValidationError::MissingHost(url_str.to_owned())),
    }
}

/// Extracts the network location (`host[:port]`) of a URL.
///
/// Returns an empty string when the input cannot be parsed or has no host.
/// Default ports are omitted, explicit non-default ports are kept.
pub fn get_domain(url_str: &str) -> String {
    let Ok(url) = Url::parse(url_str) else {
        return String::new();
    };

    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_owned(),
        (None, _) => String::new(),
    }
}

/// Returns `scheme://host[:port]` for a URL, or `None` if it has no host.
pub fn base_origin(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}
