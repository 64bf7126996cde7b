use thiserror::Error;
use url::Url;

/// Errors that can occur during feed URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http, https or file.
    #[error("Unsupported scheme: {0} (only http/https/file allowed)")]
    UnsupportedScheme(String),
    /// A network URL without a host.
    #[error("URL has no host")]
    MissingHost,
    /// User name or password embedded in a network URL.
    #[error("URL must not contain credentials")]
    EmbeddedCredentials,
}

/// Validate a feed source URL before it is stored.
///
/// Network feeds need an `http`/`https` URL with a host and no user info;
/// local feeds may use `file://`.
///
/// # Examples
///
/// ```
/// use feedtree::util::validate_feed_url;
///
/// assert!(validate_feed_url("https://example.com/feed.xml").is_ok());
/// assert!(validate_feed_url("ftp://example.com/feed.xml").is_err());
/// ```
pub fn validate_feed_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {
            if url.host_str().map_or(true, str::is_empty) {
                return Err(UrlValidationError::MissingHost);
            }
            if !url.username().is_empty() || url.password().is_some() {
                return Err(UrlValidationError::EmbeddedCredentials);
            }
        }
        "file" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    Ok(url)
}
