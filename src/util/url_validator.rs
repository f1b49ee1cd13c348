use thiserror::Error;
use url::Url;

/// Errors from validating a configured base URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// Plain http pointed somewhere other than the local machine.
    #[error("Insecure base URL: HTTPS required (except localhost)")]
    Insecure,
    /// Query strings and fragments would be mangled by path joining.
    #[error("Base URL must not contain a query or fragment")]
    HasQuery,
}

/// Validates the generation API base URL and normalizes it without a trailing
/// slash.
///
/// Plain `http://` is accepted only for `localhost` and `127.0.0.1`, which is
/// how the proxy runs during development and in tests.
///
/// ```
/// use bitscroll::util::validate_base_url;
///
/// assert_eq!(
///     validate_base_url("https://example.com/api/").unwrap(),
///     "https://example.com/api"
/// );
/// assert!(validate_base_url("http://localhost:8788").is_ok());
/// assert!(validate_base_url("http://example.com").is_err());
/// assert!(validate_base_url("ftp://example.com").is_err());
/// ```
pub fn validate_base_url(raw: &str) -> Result<String, UrlValidationError> {
    let url = Url::parse(raw.trim())?;

    match url.scheme() {
        "https" => {}
        "http" => {
            if !is_loopback_host(url.host_str()) {
                return Err(UrlValidationError::Insecure);
            }
        }
        other => return Err(UrlValidationError::UnsupportedScheme(other.to_string())),
    }

    if url.query().is_some() || url.fragment().is_some() {
        return Err(UrlValidationError::HasQuery);
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

fn is_loopback_host(host: Option<&str>) -> bool {
    matches!(host, Some("localhost") | Some("127.0.0.1") | Some("[::1]"))
}
