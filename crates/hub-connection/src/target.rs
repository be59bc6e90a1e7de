//! Stream endpoint derivation from a stored hub record.

use std::fmt;

use url::Url;

use hyperion_node_config::ServerRecord;
use hyperion_protocol::constants::{STREAM_PATH, STREAM_TOKEN_PARAM};

/// Errors deriving a stream endpoint.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("invalid hub url '{url}': {source}")]
    Parse {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported hub url scheme '{0}'")]
    Scheme(String),

    #[error("hub url '{0}' has no host")]
    MissingHost(String),
}

/// WebSocket endpoint of a hub's event stream.
///
/// `Display` omits the query string so the credential never reaches logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    uri: Url,
}

impl ConnectionTarget {
    /// Derives the stream endpoint: `http` becomes `ws`, `https` becomes
    /// `wss`, the stream path is appended to the hub's base path and the
    /// credential is passed as the `token` query parameter.
    pub fn from_record(record: &ServerRecord) -> Result<Self, TargetError> {
        let mut uri = Url::parse(&record.url).map_err(|source| TargetError::Parse {
            url: record.url.clone(),
            source,
        })?;

        let ws_scheme = match uri.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => return Err(TargetError::Scheme(other.to_string())),
        };
        if uri.host_str().is_none() {
            return Err(TargetError::MissingHost(record.url.clone()));
        }
        uri.set_scheme(ws_scheme)
            .map_err(|()| TargetError::Scheme(ws_scheme.to_string()))?;

        let base = uri.path().trim_end_matches('/').to_string();
        uri.set_path(&format!("{base}{STREAM_PATH}"));
        uri.set_fragment(None);
        uri.set_query(None);
        uri.query_pairs_mut()
            .append_pair(STREAM_TOKEN_PARAM, &record.credential);

        Ok(Self { uri })
    }

    /// Full endpoint including the credential.
    pub fn as_str(&self) -> &str {
        self.uri.as_str()
    }

    pub fn scheme(&self) -> &str {
        self.uri.scheme()
    }

    pub fn host(&self) -> Option<&str> {
        self.uri.host_str()
    }

    /// Explicit port, or the scheme's default.
    pub fn port(&self) -> Option<u16> {
        self.uri.port_or_known_default()
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Returns the credential carried in the query string.
    pub fn token(&self) -> Option<String> {
        self.uri
            .query_pairs()
            .find(|(k, _)| k == STREAM_TOKEN_PARAM)
            .map(|(_, v)| v.into_owned())
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut redacted = self.uri.clone();
        redacted.set_query(None);
        write!(f, "{redacted}")
    }
}
