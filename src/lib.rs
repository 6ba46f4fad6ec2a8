//! # credential-chain
//!
//! Credential resolution and refresh engine.
//!
//! This crate discovers, caches and keeps valid the access key / secret key /
//! session token triple an application needs to authenticate outbound API
//! calls. Credentials are looked up through an ordered provider chain
//! (environment, shared files, metadata endpoints, external processes and
//! assumed roles), and temporary credentials are refreshed transparently
//! without readers ever seeing a torn credential set.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use credential_chain::{Env, SessionConfig, create_credential_resolver};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), credential_chain::Error> {
//!     // Honors AWS_SHARED_CREDENTIALS_FILE, AWS_CONFIG_FILE and AWS_METADATA_SERVICE_*.
//!     let config = SessionConfig::from_env(&Env::real());
//!     let resolver = create_credential_resolver(&config);
//!     if let Some(credentials) = resolver.load_credentials().await? {
//!         let frozen = credentials.get_frozen_credentials().await?;
//!         println!("{} via {}", frozen.access_key(), credentials.method());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Custom chains
//!
//! ```rust,no_run
//! use credential_chain::providers::{EnvProvider, InstanceMetadataProvider};
//! use credential_chain::{CredentialResolver, Env};
//!
//! # fn example() -> Result<(), credential_chain::Error> {
//! let mut resolver = CredentialResolver::new(vec![]);
//! resolver.push(EnvProvider::new(Env::real()));
//! resolver.insert_after(EnvProvider::METHOD, InstanceMetadataProvider::default())?;
//! resolver.remove(EnvProvider::METHOD);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod cache;
pub mod config;
pub mod credential;
pub mod env;
pub mod factory;
pub mod provider;
pub mod providers;
pub mod refresh;
pub mod resolver;
pub mod sourcer;
pub mod sts;

pub use cache::AssumeRoleCache;
pub use config::{Profile, Profiles, SessionConfig};
pub use credential::{CredentialMetadata, Credentials, ReadOnlyCredentials};
pub use env::Env;
pub use factory::{ResolverBuilder, create_credential_resolver};
pub use provider::CredentialProvider;
pub use refresh::{RefreshFn, RefreshThresholds, RefreshableCredentials, TimeFetcher};
pub use resolver::CredentialResolver;
pub use sourcer::CanonicalNameCredentialSourcer;
pub use sts::{AssumeRoleClient, AssumeRoleRequest, TemporaryCredentials};

use std::path::PathBuf;

/// Error type for credential resolution.
///
/// "No credentials in this source" is never an error: providers return
/// `Ok(None)` for that. Every variant here aborts resolution.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Only one half of an access key / secret key pair was configured.
    #[error("Partial credentials found in {provider}, missing: {cred_var}")]
    PartialCredentials { provider: String, cred_var: String },

    /// Credential directives are contradictory or unsupported.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A `source_profile` chain revisited a profile.
    #[error(
        "Infinite loop in credential configuration detected. Attempting to load from profile {profile} which has already been visited. Visited profiles: {}",
        visited.join(" -> ")
    )]
    InfiniteLoop {
        profile: String,
        visited: Vec<String>,
    },

    /// A remote call, external process or refresh failed.
    #[error("Error when retrieving credentials from {provider}: {message}")]
    RetrievalFailure { provider: String, message: String },

    /// A resolver edit referenced a provider that is not in the chain.
    #[error("Unknown credential provider: {name}")]
    UnknownProvider { name: String },

    /// Credentials obtained with an MFA token code cannot be refreshed unattended.
    #[error("Cannot refresh credentials for profile {profile}: MFA token code required")]
    RefreshWithMfaUnsupported { profile: String },

    /// Configuration file does not exist.
    #[error("Config file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// Configuration file exists but could not be parsed.
    #[error("Unable to parse config file {}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },

    /// File system operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Network request failed.
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),
}

/// Error category for unified error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Credential configuration is wrong and will not fix itself
    Configuration,
    /// A source was reachable in principle but failed to produce credentials
    Retrieval,
    /// Misuse of the resolver API
    Programming,
    /// IO, JSON or transport errors
    Internal,
}

impl Error {
    pub fn partial(provider: impl Into<String>, cred_var: impl Into<String>) -> Self {
        Error::PartialCredentials {
            provider: provider.into(),
            cred_var: cred_var.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Error::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn retrieval(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::RetrievalFailure {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::PartialCredentials { .. }
            | Error::InvalidConfig { .. }
            | Error::InfiniteLoop { .. }
            | Error::ConfigParse { .. } => ErrorCategory::Configuration,

            Error::RetrievalFailure { .. } | Error::RefreshWithMfaUnsupported { .. } => {
                ErrorCategory::Retrieval
            }

            Error::UnknownProvider { .. } => ErrorCategory::Programming,

            Error::ConfigNotFound { .. }
            | Error::Io(_)
            | Error::Json(_)
            | Error::Network(_) => ErrorCategory::Internal,
        }
    }

    pub fn is_configuration_error(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    pub fn is_retrieval_error(&self) -> bool {
        self.category() == ErrorCategory::Retrieval
    }
}

pub type Result<T> = std::result::Result<T, Error>;
