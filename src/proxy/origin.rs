//! Origin and CORS decisions for the proxy.
//!
//! The origin check only filters casual cross-site use. Headers are trivially
//! spoofed by non-browser clients.

/// Origin/Host values that count as local development.
pub fn is_local(value: &str) -> bool {
    value.contains("localhost") || value.contains("127.0.0.1")
}

/// Whether a POST may be forwarded.
///
/// Local origins are always allowed. Otherwise the production domain must
/// appear in the Origin or the Referer header.
pub fn is_allowed(origin: &str, referer: &str, allowed_domain: &str) -> bool {
    if is_local(origin) {
        return true;
    }
    if allowed_domain.is_empty() {
        return false;
    }
    origin.contains(allowed_domain) || referer.contains(allowed_domain)
}

/// Value for `Access-Control-Allow-Origin`.
///
/// `*` for local requests (judged by Origin or by the Host the proxy was
/// reached on), otherwise the configured origin, falling back to `*`.
pub fn allow_origin<'a>(origin: &str, host: &str, configured: Option<&'a str>) -> &'a str {
    if is_local(origin) || is_local(host) {
        return "*";
    }
    match configured {
        Some(value) if !value.trim().is_empty() => value,
        _ => "*",
    }
}
