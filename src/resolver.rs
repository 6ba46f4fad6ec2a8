//! Ordered credential provider chain.

use crate::credential::Credentials;
use crate::provider::CredentialProvider;
use crate::{Error, Result};

/// Tries providers in order and returns the first credentials found.
///
/// Providers are addressed by their `METHOD` for edits. Any provider error
/// aborts resolution instead of falling through to the next one.
#[derive(Default)]
pub struct CredentialResolver {
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl CredentialResolver {
    pub fn new(providers: Vec<Box<dyn CredentialProvider>>) -> Self {
        Self { providers }
    }

    /// Append a provider to the end of the chain.
    pub fn push(&mut self, provider: impl CredentialProvider + 'static) {
        self.providers.push(Box::new(provider));
    }

    /// Insert `provider` immediately before the provider named `method`.
    pub fn insert_before(
        &mut self,
        method: &str,
        provider: impl CredentialProvider + 'static,
    ) -> Result<()> {
        let index = self.position(method)?;
        self.providers.insert(index, Box::new(provider));
        Ok(())
    }

    /// Insert `provider` immediately after the provider named `method`.
    pub fn insert_after(
        &mut self,
        method: &str,
        provider: impl CredentialProvider + 'static,
    ) -> Result<()> {
        let index = self.position(method)?;
        self.providers.insert(index + 1, Box::new(provider));
        Ok(())
    }

    /// Remove the provider named `method`. Removing an absent provider is a no-op.
    pub fn remove(&mut self, method: &str) {
        if let Ok(index) = self.position(method) {
            self.providers.remove(index);
        }
    }

    pub fn get_provider(&self, method: &str) -> Result<&dyn CredentialProvider> {
        let index = self.position(method)?;
        Ok(self.providers[index].as_ref())
    }

    pub fn providers(&self) -> &[Box<dyn CredentialProvider>] {
        &self.providers
    }

    pub fn methods(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.method()).collect()
    }

    /// Credentials from the first provider that has any.
    pub async fn load_credentials(&self) -> Result<Option<Credentials>> {
        for provider in &self.providers {
            tracing::debug!("Looking for credentials via: {}", provider.method());
            if let Some(creds) = provider.load().await? {
                return Ok(Some(creds));
            }
        }
        tracing::debug!("No credentials found in any provider");
        Ok(None)
    }

    fn position(&self, method: &str) -> Result<usize> {
        self.providers
            .iter()
            .position(|p| p.method() == method)
            .ok_or_else(|| Error::UnknownProvider {
                name: method.to_string(),
            })
    }
}

impl std::fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("providers", &self.methods())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        method: &'static str,
        key: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    impl Fixed {
        fn new(method: &'static str, key: Option<&'static str>) -> Self {
            Self {
                method,
                key,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl CredentialProvider for Fixed {
        fn method(&self) -> &str {
            self.method
        }

        async fn load(&self) -> Result<Option<Credentials>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.key.map(|k| Credentials::new(k, "secret", None, self.method)))
        }
    }

    struct Failing;

    #[async_trait]
    impl CredentialProvider for Failing {
        fn method(&self) -> &str {
            "failing"
        }

        async fn load(&self) -> Result<Option<Credentials>> {
            Err(Error::partial("failing", "secret_key"))
        }
    }

    fn resolver() -> CredentialResolver {
        CredentialResolver::new(vec![
            Box::new(Fixed::new("first", None)),
            Box::new(Fixed::new("second", Some("second-key"))),
            Box::new(Fixed::new("third", Some("third-key"))),
        ])
    }

    #[tokio::test]
    async fn test_first_credential_non_none_wins() {
        let creds = resolver().load_credentials().await.unwrap().unwrap();
        assert_eq!(creds.method(), "second");
    }

    #[tokio::test]
    async fn test_no_creds_loaded() {
        let resolver = CredentialResolver::new(vec![Box::new(Fixed::new("first", None))]);
        assert!(resolver.load_credentials().await.unwrap().is_none());
        assert!(CredentialResolver::default().load_credentials().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_errors_abort_the_chain() {
        let third = Fixed::new("third", Some("third-key"));
        let calls = third.calls.clone();
        let resolver = CredentialResolver::new(vec![Box::new(Failing), Box::new(third)]);

        let err = resolver.load_credentials().await.unwrap_err();
        assert!(matches!(err, Error::PartialCredentials { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_inject_additional_providers_after_existing() {
        let mut resolver = resolver();
        resolver
            .insert_after("first", Fixed::new("injected", None))
            .unwrap();
        assert_eq!(resolver.methods(), vec!["first", "injected", "second", "third"]);

        resolver.insert_after("third", Fixed::new("last", None)).unwrap();
        assert_eq!(resolver.methods().last(), Some(&"last"));
    }

    #[test]
    fn test_inject_provider_before_existing() {
        let mut resolver = resolver();
        resolver
            .insert_before("first", Fixed::new("injected", None))
            .unwrap();
        assert_eq!(resolver.methods(), vec!["injected", "first", "second", "third"]);
    }

    #[test]
    fn test_insert_relative_to_unknown_provider() {
        let mut resolver = resolver();
        let err = resolver
            .insert_after("unknown", Fixed::new("injected", None))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownProvider { ref name } if name == "unknown"));
        assert!(resolver
            .insert_before("unknown", Fixed::new("injected", None))
            .is_err());
        assert_eq!(resolver.methods().len(), 3);
    }

    #[test]
    fn test_remove_providers() {
        let mut resolver = resolver();
        resolver.remove("second");
        assert_eq!(resolver.methods(), vec!["first", "third"]);

        resolver.remove("does-not-exist");
        assert_eq!(resolver.methods(), vec!["first", "third"]);
    }

    #[test]
    fn test_get_provider_by_name() {
        let resolver = resolver();
        assert_eq!(resolver.get_provider("third").unwrap().method(), "third");
        assert!(matches!(
            resolver.get_provider("none"),
            Err(Error::UnknownProvider { .. })
        ));
        assert_eq!(resolver.providers().len(), 3);
    }
}
