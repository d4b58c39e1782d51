use std::net::{IpAddr, Ipv6Addr};
use thiserror::Error;
use url::{Host, Url};

/// Reasons a feed URL is refused by `addfeed`.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("invalid feed url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("feed url has no host")]
    MissingHost,
    #[error("feed url points to localhost")]
    Localhost,
    #[error("feed url points to a private address: {0}")]
    PrivateAddress(IpAddr),
}

/// Validates a URL before it is stored as a feed source.
///
/// The aggregator fetches every stored feed unattended, so a feed pointing at
/// loopback or an internal network would turn `agg` into a request forwarder.
/// Rejects:
/// - schemes other than `http`/`https`
/// - `localhost` and loopback addresses
/// - RFC 1918, link-local, unspecified and unique-local (fc00::/7) addresses
///
/// ```
/// use gator::util::validate_url;
///
/// assert!(validate_url("https://blog.example.com/index.xml").is_ok());
/// assert!(validate_url("http://localhost/feed").is_err());
/// assert!(validate_url("http://10.1.2.3/feed").is_err());
/// assert!(validate_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlValidationError::UnsupportedScheme(url.scheme().to_owned()));
    }

    let ip = match url.host() {
        None => return Err(UrlValidationError::MissingHost),
        Some(Host::Domain(domain)) => {
            if domain.eq_ignore_ascii_case("localhost") {
                return Err(UrlValidationError::Localhost);
            }
            None
        }
        Some(Host::Ipv4(v4)) => Some(IpAddr::V4(v4)),
        Some(Host::Ipv6(v6)) => Some(IpAddr::V6(v6)),
    };

    if let Some(ip) = ip {
        if ip.is_loopback() {
            return Err(UrlValidationError::Localhost);
        }
        if is_private(&ip) {
            return Err(UrlValidationError::PrivateAddress(ip));
        }
    }

    Ok(url)
}

fn is_private(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local() || v4.is_unspecified(),
        IpAddr::V6(v6) => v6.is_unspecified() || is_unique_local(v6) || is_unicast_link_local(v6),
    }
}

fn is_unique_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xfe00) == 0xfc00
}

fn is_unicast_link_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_feed_urls_accepted() {
        assert!(validate_url("https://www.wagslane.dev/index.xml").is_ok());
        assert!(validate_url("http://x/feed.xml").is_ok());
        assert!(validate_url("https://example.com:8443/rss").is_ok());
    }

    #[test]
    fn test_surrounding_whitespace_trimmed() {
        let url = validate_url("  https://example.com/feed  ").unwrap();
        assert_eq!(url.as_str(), "https://example.com/feed");
    }

    #[test]
    fn test_non_http_schemes_rejected() {
        assert!(matches!(
            validate_url("ftp://example.com/feed"),
            Err(UrlValidationError::UnsupportedScheme(s)) if s == "ftp"
        ));
        assert!(validate_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn test_unparseable_rejected() {
        assert!(matches!(
            validate_url("not a url"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_loopback_rejected() {
        assert!(matches!(
            validate_url("http://LOCALHOST:8080/feed"),
            Err(UrlValidationError::Localhost)
        ));
        assert!(matches!(
            validate_url("http://127.0.0.1/feed"),
            Err(UrlValidationError::Localhost)
        ));
        assert!(matches!(
            validate_url("http://[::1]/feed"),
            Err(UrlValidationError::Localhost)
        ));
    }

    #[test]
    fn test_private_ranges_rejected() {
        for url in [
            "http://192.168.1.1/feed",
            "http://10.0.0.1:3000/feed",
            "http://172.16.0.1/feed",
            "http://169.254.1.1/feed",
            "http://0.0.0.0/feed",
            "http://[fe80::1]/feed",
            "http://[fd00::1]/feed",
        ] {
            assert!(
                matches!(validate_url(url), Err(UrlValidationError::PrivateAddress(_))),
                "{url} should be rejected"
            );
        }
    }
}
