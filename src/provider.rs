//! Credential provider trait.

use async_trait::async_trait;

use crate::Result;
use crate::credential::Credentials;

/// A single source of credentials.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Stable identifier used for resolver edits, e.g. `"env"`.
    fn method(&self) -> &str;

    /// Name used by `credential_source` in profile configuration.
    fn canonical_name(&self) -> Option<&str> {
        None
    }

    /// Try to load credentials from this source.
    ///
    /// `Ok(None)` means the source is not configured; errors abort resolution.
    async fn load(&self) -> Result<Option<Credentials>>;
}
