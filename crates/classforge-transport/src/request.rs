//! The request target of an incoming connection.

use percent_encoding::percent_decode_str;

/// Path and query parameters a client sent when opening a connection.
///
/// Browsers cannot attach custom headers to a WebSocket upgrade, so
/// everything the server needs at connect time travels in the URL:
///
/// ```text
/// /ws/room/abc123/?token=9f2c...
///  └── path ──────┘ └─ query ─┘
/// ```
///
/// Path segments and query values are percent-decoded once, here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectRequest {
    path: String,
    query: Vec<(String, String)>,
}

impl ConnectRequest {
    /// Parses a request target such as `/ws/room/abc123/?token=xyz`.
    pub fn parse(target: &str) -> Self {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        let query = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();

        Self {
            path: path.to_string(),
            query,
        }
    }

    /// Returns the raw (undecoded) path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the decoded, non-empty path segments.
    ///
    /// `/ws/room/abc123/` yields `["ws", "room", "abc123"]`.
    pub fn path_segments(&self) -> Vec<String> {
        self.path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
            .collect()
    }

    /// Returns the first value of a query parameter, if present.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}
