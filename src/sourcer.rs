//! Canonical-name lookup of credential sources.
//!
//! A profile's `credential_source = Ec2InstanceMetadata` names a provider by
//! its canonical name rather than by chain position. Only the assume-role
//! provider consults the sourcer.

use crate::credential::Credentials;
use crate::provider::CredentialProvider;
use crate::{Error, Result};

/// Providers addressable by canonical name.
#[derive(Default)]
pub struct CanonicalNameCredentialSourcer {
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl CanonicalNameCredentialSourcer {
    pub fn new(providers: Vec<Box<dyn CredentialProvider>>) -> Self {
        Self { providers }
    }

    /// Add a source. Earlier providers win on duplicate names.
    pub fn with_provider(mut self, provider: impl CredentialProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Whether `name` matches a provider, ignoring case.
    pub fn is_supported(&self, name: &str) -> bool {
        self.get_provider(name).is_some()
    }

    pub fn canonical_names(&self) -> Vec<&str> {
        self.providers
            .iter()
            .filter_map(|p| p.canonical_name())
            .collect()
    }

    /// Load credentials from the source called `name`.
    ///
    /// An unknown name is a configuration error; a known source that finds
    /// nothing is a retrieval error.
    pub async fn source_credentials(&self, name: &str) -> Result<Credentials> {
        let provider = self.get_provider(name).ok_or_else(|| {
            Error::invalid_config(format!(
                "credential_source {name:?} is not supported, expected one of: {}",
                self.canonical_names().join(", ")
            ))
        })?;
        provider.load().await?.ok_or_else(|| {
            Error::retrieval(
                name,
                "No credentials found in credential_source referenced in profile",
            )
        })
    }

    fn get_provider(&self, name: &str) -> Option<&dyn CredentialProvider> {
        self.providers
            .iter()
            .find(|p| {
                p.canonical_name()
                    .is_some_and(|canonical| canonical.eq_ignore_ascii_case(name))
            })
            .map(|p| p.as_ref())
    }
}

impl std::fmt::Debug for CanonicalNameCredentialSourcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanonicalNameCredentialSourcer")
            .field("sources", &self.canonical_names())
            .finish()
    }
}
