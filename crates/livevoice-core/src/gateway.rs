//! Gateway WebSocket URL derivation.
//!
//! Pure function of the configured base URL, the hosting page's origin, and
//! the socket path. No I/O.
//!
//! | base URL | page origin | result |
//! |---|---|---|
//! | `https://api.example.com` | any | `wss://api.example.com/ws` |
//! | `http://10.0.0.5:8000/api` | none | `ws://10.0.0.5:8000/api/ws` |
//! | none | `https://app.example.com` | `wss://app.example.com/ws` |
//! | none | none | `ws://localhost:3001/ws` |
//!
//! A secure page forces `wss` even for an `http` base URL, since browsers
//! refuse insecure sockets from secure pages.

use thiserror::Error;
use url::Url;

use crate::config::GatewaySettings;

/// Host used when neither a base URL nor a page origin is known.
pub const LOCAL_DEV_HOST: &str = "localhost:3001";

/// Failures deriving the gateway URL.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Invalid gateway URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unsupported gateway URL scheme '{scheme}' (expected http, https, ws or wss)")]
    UnsupportedScheme { scheme: String },
}

/// Derive the WebSocket URL for the gateway.
pub fn derive_ws_url(
    base_url: Option<&str>,
    page_origin: Option<&str>,
    socket_path: &str,
) -> Result<String, GatewayError> {
    let base = base_url
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse)
        .transpose()?;
    let page = page_origin
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse)
        .transpose()?;

    let secure = base.as_ref().is_some_and(is_secure) || page.as_ref().is_some_and(is_secure);
    let scheme = if secure { "wss" } else { "ws" };

    let (authority, prefix) = match (&base, &page) {
        (Some(url), _) => (authority(url), url.path().trim_end_matches('/').to_string()),
        (None, Some(url)) => (authority(url), String::new()),
        (None, None) => (LOCAL_DEV_HOST.to_string(), String::new()),
    };

    let path = if socket_path.starts_with('/') {
        format!("{prefix}{socket_path}")
    } else {
        format!("{prefix}/{socket_path}")
    };

    let raw = format!("{scheme}://{authority}{path}");
    let url = Url::parse(&raw).map_err(|e| GatewayError::InvalidUrl {
        url: raw.clone(),
        reason: e.to_string(),
    })?;
    Ok(url.to_string())
}

impl GatewaySettings {
    /// Derive the WebSocket URL from these settings.
    pub fn ws_url(&self) -> Result<String, GatewayError> {
        derive_ws_url(
            self.base_url.as_deref(),
            self.page_origin.as_deref(),
            &self.socket_path,
        )
    }
}

fn parse(raw: &str) -> Result<Url, GatewayError> {
    let url = Url::parse(raw).map_err(|e| GatewayError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" | "ws" | "wss" => {}
        other => {
            return Err(GatewayError::UnsupportedScheme {
                scheme: other.to_string(),
            });
        }
    }
    if url.host_str().is_none() {
        return Err(GatewayError::InvalidUrl {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(url)
}

fn is_secure(url: &Url) -> bool {
    matches!(url.scheme(), "https" | "wss")
}

fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_base_becomes_wss() {
        let url = derive_ws_url(Some("https://api.example.com"), None, "/ws").unwrap();
        assert_eq!(url, "wss://api.example.com/ws");
    }

    #[test]
    fn http_base_keeps_port_and_path_prefix() {
        let url = derive_ws_url(Some("http://10.0.0.5:8000/api/"), None, "/ws").unwrap();
        assert_eq!(url, "ws://10.0.0.5:8000/api/ws");
    }

    #[test]
    fn page_origin_used_without_base() {
        let url = derive_ws_url(None, Some("https://app.example.com"), "/ws").unwrap();
        assert_eq!(url, "wss://app.example.com/ws");
    }

    #[test]
    fn secure_page_upgrades_insecure_base() {
        let url =
            derive_ws_url(Some("http://gateway.local:9000"), Some("https://app.example.com"), "/ws")
                .unwrap();
        assert_eq!(url, "wss://gateway.local:9000/ws");
    }

    #[test]
    fn falls_back_to_local_dev_host() {
        let url = derive_ws_url(None, None, "/ws").unwrap();
        assert_eq!(url, "ws://localhost:3001/ws");
    }

    #[test]
    fn blank_values_count_as_absent() {
        let url = derive_ws_url(Some("  "), Some(""), "live").unwrap();
        assert_eq!(url, "ws://localhost:3001/live");
    }

    #[test]
    fn ws_scheme_base_is_accepted() {
        let url = derive_ws_url(Some("wss://edge.example.com:443"), None, "/ws").unwrap();
        // 443 is the default port for wss and is elided by the URL parser.
        assert_eq!(url, "wss://edge.example.com/ws");
    }

    #[test]
    fn rejects_unsupported_scheme() {
        let err = derive_ws_url(Some("ftp://example.com"), None, "/ws").unwrap_err();
        assert_eq!(
            err,
            GatewayError::UnsupportedScheme {
                scheme: "ftp".into()
            }
        );
    }

    #[test]
    fn rejects_unparseable_base() {
        let err = derive_ws_url(Some("not a url"), None, "/ws").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidUrl { .. }));
    }

    #[test]
    fn settings_helper_matches_free_function() {
        let settings = GatewaySettings {
            base_url: Some("https://api.example.com".into()),
            ..GatewaySettings::default()
        };
        assert_eq!(settings.ws_url().unwrap(), "wss://api.example.com/ws");
    }
}
