//! One-time-password enrollment with a hub.
//!
//! Exchanges a name and OTP for a durable device secret and stores the
//! resulting [`ServerRecord`].

use std::sync::Arc;

use tracing::{info, warn};
use url::Url;

use hyperion_node_config::{CredentialStore, ServerRecord, StoreError, normalize_url};
use hyperion_protocol::constants::{HTTP_REQUEST_TIMEOUT, OTP_AUTHENTICATE_PATH};
use hyperion_protocol::{OtpAuthenticateRequest, OtpAuthenticateResponse};

/// Errors from enrollment.
#[derive(Debug, thiserror::Error)]
pub enum EnrollError {
    #[error("hub name must not be empty")]
    InvalidName,

    #[error("one-time password must not be empty")]
    InvalidOtp,

    #[error("invalid hub url '{0}'")]
    InvalidUrl(String),

    #[error("server '{0}' already exists")]
    AlreadyExists(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("hub rejected enrollment ({status}): {body}")]
    Hub { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("hub returned an empty device secret")]
    MissingCredential,

    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for EnrollError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AlreadyExists(name) => EnrollError::AlreadyExists(name),
            other => EnrollError::Store(other),
        }
    }
}

impl EnrollError {
    /// True for failures caused by the caller's input rather than by I/O or
    /// the hub.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EnrollError::InvalidName
                | EnrollError::InvalidOtp
                | EnrollError::InvalidUrl(_)
                | EnrollError::AlreadyExists(_)
        )
    }
}

/// Enrolls the node with hubs and records the issued credentials.
pub struct EnrollmentClient {
    http: reqwest::Client,
    store: Arc<CredentialStore>,
}

impl EnrollmentClient {
    pub fn new(store: Arc<CredentialStore>) -> Result<Self, EnrollError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_REQUEST_TIMEOUT)
            .user_agent(concat!("hyperion-node/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, store })
    }

    /// Enrolls under `name` with the hub at `url` using `otp`.
    ///
    /// The name is checked against the store before any request is made.
    /// A single request is sent; failures are not retried.
    pub async fn enroll(&self, url: &str, otp: &str, name: &str) -> Result<ServerRecord, EnrollError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EnrollError::InvalidName);
        }
        if otp.trim().is_empty() {
            return Err(EnrollError::InvalidOtp);
        }
        let base_url = normalize_url(url);
        match Url::parse(&base_url) {
            Ok(u) if matches!(u.scheme(), "http" | "https") && u.host_str().is_some() => {}
            _ => return Err(EnrollError::InvalidUrl(url.to_string())),
        }
        if self.store.contains_server(name) {
            return Err(EnrollError::AlreadyExists(name.to_string()));
        }

        info!(hub = %name, url = %base_url, "enrolling with hub");
        let request = OtpAuthenticateRequest {
            otp: otp.trim().to_string(),
            name: name.to_string(),
        };
        let resp = self
            .http
            .post(format!("{base_url}{OTP_AUTHENTICATE_PATH}"))
            .json(&request)
            .send()
            .await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(hub = %name, status = status.as_u16(), "hub rejected enrollment");
            return Err(EnrollError::Hub {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.bytes().await?;
        let reply: OtpAuthenticateResponse = serde_json::from_slice(&body)?;
        if reply.device_secret.is_empty() {
            return Err(EnrollError::MissingCredential);
        }

        let record = ServerRecord::new(name, &base_url, reply.device_secret, reply.exp);
        self.store.add_server(record.clone())?;
        info!(hub = %name, expiry = ?record.expiry, "enrolled with hub");
        Ok(record)
    }
}
