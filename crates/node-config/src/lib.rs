//! Node configuration and enrolled-hub credentials.
//!
//! A single TOML document holds the node identity, free-form node
//! settings, and one [`ServerRecord`] per enrolled hub. The
//! [`CredentialStore`] is the only writer of that document.

pub mod paths;
pub mod record;
pub mod store;

pub use paths::default_store_path;
pub use record::{ServerRecord, normalize_url};
pub use store::{CredentialStore, SCHEMA_VERSION};

/// Node setting naming the hub the worker connects to by default.
pub const PREFERRED_HUB_KEY: &str = "hub";

/// Errors from credential store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML encode error: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("TOML decode error: {0}")]
    Decode(#[from] toml::de::Error),

    #[error("unsupported store version {0} (expected {SCHEMA_VERSION})")]
    UnsupportedVersion(u32),

    #[error("invalid store entry: {0}")]
    Invalid(String),

    #[error("server '{0}' already exists")]
    AlreadyExists(String),
}
