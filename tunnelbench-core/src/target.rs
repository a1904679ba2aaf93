use crate::error::{Error, Result};

/// A target URL broken into the pieces the CONNECT handshake and the
/// tunneled request line need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetUrl {
    pub host: String,
    pub port: u16,
    /// `Host` header value: `host:port` when the URL names a port, bare host otherwise.
    pub host_header: String,
    /// Path plus query string, as sent on the request line.
    pub path: String,
}

impl TargetUrl {
    /// Default port is 80 for `http` and 443 for any other scheme; the tunnel
    /// carries arbitrary bytes regardless of scheme, so no TLS is implied.
    pub fn parse(raw: &str) -> Result<Self> {
        let parsed = url::Url::parse(raw).map_err(|_| Error::InvalidUrl(raw.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::InvalidUrl(raw.to_string()))?
            .to_string();

        let default_port = if parsed.scheme() == "http" { 80 } else { 443 };
        let port = parsed.port().unwrap_or(default_port);

        let host_header = match parsed.port() {
            Some(explicit) => format!("{host}:{explicit}"),
            None => host.clone(),
        };

        let mut path = parsed.path().to_string();
        if path.is_empty() {
            path.push('/');
        }
        if let Some(query) = parsed.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Self {
            host,
            port,
            host_header,
            path,
        })
    }
}
