//! Target URL parsing for the control API.

use thiserror::Error;
use url::Url;

/// A dispatch target derived from a `targetUrl` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// "host:port" — the registry key and dial address. The port falls
    /// back to the scheme default (443 for https, otherwise 80).
    pub pool_key: String,
    /// `Host` header value; includes the port only when the URL does.
    pub host_header: String,
    /// URL path ("/" when absent).
    pub path: String,
    /// Query string without the leading '?'; empty when absent.
    pub query: String,
}

/// Error type for target parsing.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("targetUrl must not be empty")]
    Empty,

    #[error("invalid targetUrl: {0}")]
    Invalid(String),
}

/// Derive the dispatch target from a URL string.
pub fn parse_target(target_url: &str) -> Result<Target, TargetError> {
    let trimmed = target_url.trim();
    if trimmed.is_empty() {
        return Err(TargetError::Empty);
    }

    let url = Url::parse(trimmed).map_err(|e| TargetError::Invalid(e.to_string()))?;
    let host = url
        .host_str()
        .ok_or_else(|| TargetError::Invalid("missing host".into()))?;
    let port = match url.port_or_known_default() {
        Some(port) => port,
        None => {
            if url.scheme() == "https" {
                443
            } else {
                80
            }
        }
    };
    let host_header = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    Ok(Target {
        pool_key: format!("{host}:{port}"),
        host_header,
        path: url.path().to_string(),
        query: url.query().unwrap_or_default().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ports_by_scheme() {
        let http = parse_target("http://example.com/a").unwrap();
        assert_eq!(http.pool_key, "example.com:80");
        assert_eq!(http.host_header, "example.com");

        let https = parse_target("https://example.com").unwrap();
        assert_eq!(https.pool_key, "example.com:443");
    }

    #[test]
    fn explicit_port_wins_everywhere() {
        let target = parse_target("http://127.0.0.1:9999/echo?x=1&y=2").unwrap();
        assert_eq!(target.pool_key, "127.0.0.1:9999");
        assert_eq!(target.host_header, "127.0.0.1:9999");
        assert_eq!(target.path, "/echo");
        assert_eq!(target.query, "x=1&y=2");
    }

    #[test]
    fn bare_host_gets_root_path() {
        let target = parse_target("http://example.com").unwrap();
        assert_eq!(target.path, "/");
        assert_eq!(target.query, "");
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert!(matches!(parse_target("   "), Err(TargetError::Empty)));
        assert!(matches!(
            parse_target("not a url"),
            Err(TargetError::Invalid(_))
        ));
    }
}
