//! Session endpoint parsing.

use std::fmt;

use url::Url;

use crate::core::{DEFAULT_HTTPS_PORT, WebTransportError};

/// Target of a session: host, port and request path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
    path: String,
}

impl Endpoint {
    /// Parse an `https://host[:port]/path[?query]` URI.
    ///
    /// Only `https` is accepted; the session runs over HTTP/3.
    pub fn parse(uri: &str) -> Result<Self, WebTransportError> {
        let url = Url::parse(uri)
            .map_err(|e| WebTransportError::InvalidEndpoint(format!("{uri}: {e}")))?;

        if url.scheme() != "https" {
            return Err(WebTransportError::InvalidEndpoint(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| WebTransportError::InvalidEndpoint(format!("{uri}: missing host")))?
            .to_string();

        let port = url.port().unwrap_or(DEFAULT_HTTPS_PORT);

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Self { host, port, path })
    }

    /// Host name or address literal.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port (443 when the URI omits it).
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Request path including any query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// `host:port`, as sent in the `:authority` pseudo-header.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "https://{}:{}{}", self.host, self.port, self.path)
    }
}
