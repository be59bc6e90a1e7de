//! Enrolled-hub record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Credential issued by a hub during enrollment.
///
/// Records are never edited in place: the store only inserts and removes
/// whole records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerRecord {
    /// Unique name chosen by the enrolling user.
    pub name: String,
    /// Base HTTP(S) endpoint of the hub, without trailing slash.
    pub url: String,
    /// Device secret presented on the stream endpoint.
    pub credential: String,
    /// Unix timestamp (seconds) after which the credential is stale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<i64>,
    /// When the record was written.
    pub enrolled_at: DateTime<Utc>,
}

impl ServerRecord {
    /// Creates a record stamped with the current time.
    ///
    /// Trailing slashes are stripped from `url`.
    pub fn new(
        name: impl Into<String>,
        url: &str,
        credential: impl Into<String>,
        expiry: Option<i64>,
    ) -> Self {
        Self {
            name: name.into(),
            url: normalize_url(url),
            credential: credential.into(),
            expiry,
            enrolled_at: Utc::now(),
        }
    }

    /// Returns true if the credential carries an expiry at or before `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|exp| exp <= now.timestamp())
    }

    /// Checks the invariants a stored record must satisfy.
    pub(crate) fn validate(&self, key: &str) -> Result<(), String> {
        if self.name.is_empty() {
            return Err(format!("server '{key}' has an empty name"));
        }
        if self.name != key {
            return Err(format!("server key '{key}' does not match name '{}'", self.name));
        }
        if self.url.is_empty() || self.url.ends_with('/') {
            return Err(format!("server '{key}' has an invalid url '{}'", self.url));
        }
        if self.credential.is_empty() {
            return Err(format!("server '{key}' has an empty credential"));
        }
        Ok(())
    }
}

/// Strips every trailing `/` from a hub url.
pub fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
