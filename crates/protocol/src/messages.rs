use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Enrollment
// ---------------------------------------------------------------------------

/// Body of the one-time-password enrollment request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtpAuthenticateRequest {
    pub otp: String,
    pub name: String,
}

/// Hub reply to a successful enrollment.
///
/// Extra fields sent by the hub are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtpAuthenticateResponse {
    pub device_secret: String,
    /// Unix timestamp (seconds) after which the secret is stale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}
