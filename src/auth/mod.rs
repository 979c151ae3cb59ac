//! Session token handling for the realtime socket.
//!
//! The server authenticates the upgrade request through a `token` query
//! parameter, so the token ends up in the URL. Keep it out of logs.

use std::fmt;

use url::Url;

use crate::errors::{RealtimeError, Result};

/// Query parameter carrying the token.
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Opaque bearer token issued by the REST API at login.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wrap a token, rejecting empty or whitespace-only values.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(RealtimeError::MissingToken);
        }
        Ok(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return a copy of `endpoint` with this token as the `token` query parameter.
    ///
    /// Any `token` parameter already present is replaced; other parameters are kept.
    pub fn apply_to(&self, endpoint: &Url) -> Url {
        let mut url = endpoint.clone();
        let retained: Vec<(String, String)> = endpoint
            .query_pairs()
            .filter(|(k, _)| k != TOKEN_QUERY_PARAM)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            for (k, v) in &retained {
                pairs.append_pair(k, v);
            }
            pairs.append_pair(TOKEN_QUERY_PARAM, &self.0);
        }

        url
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

/// Strip the token from a URL so it can be logged.
pub fn redact(url: &Url) -> String {
    let mut redacted = url.clone();
    redacted.set_query(None);
    redacted.to_string()
}
