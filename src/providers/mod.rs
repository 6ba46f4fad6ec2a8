//! Credential provider implementations.
//!
//! Each provider carries a `METHOD` used to edit the resolver chain, and
//! most carry a `CANONICAL_NAME` that `credential_source` can refer to.

mod assume_role;
mod boto;
mod config_file;
mod container;
mod ec2_file;
mod env;
mod http;
mod instance_metadata;
mod process;
mod shared_file;

pub use assume_role::{AssumeRoleProvider, MfaPrompter};
pub use boto::BotoProvider;
pub use config_file::ConfigProvider;
pub use container::ContainerProvider;
pub use ec2_file::OriginalEC2Provider;
pub use env::EnvProvider;
pub use instance_metadata::{
    IamRoleFetcher, InstanceMetadataFetcher, InstanceMetadataProvider, RoleMetadata,
};
pub use process::ProcessProvider;
pub use shared_file::SharedCredentialProvider;

use std::path::Path;

use crate::config::{IniParser, Profile};
use crate::credential::{Credentials, ReadOnlyCredentials};
use crate::{Error, Result};

pub(crate) const ACCESS_KEY: &str = "aws_access_key_id";
pub(crate) const SECRET_KEY: &str = "aws_secret_access_key";
pub(crate) const TOKEN_KEYS: [&str; 2] = ["aws_security_token", "aws_session_token"];

/// Pair up an access key and secret key.
///
/// Neither present is `None`; exactly one present is a partial-credentials
/// error naming the missing one.
pub(crate) fn credential_pair(
    provider: &str,
    (access_name, access): (&str, Option<String>),
    (secret_name, secret): (&str, Option<String>),
) -> Result<Option<(String, String)>> {
    match (access, secret) {
        (None, None) => Ok(None),
        (Some(_), None) => Err(Error::partial(provider, secret_name)),
        (None, Some(_)) => Err(Error::partial(provider, access_name)),
        (Some(access), Some(secret)) => Ok(Some((access, secret))),
    }
}

pub(crate) fn non_empty(section: &Profile, key: &str) -> Option<String> {
    section.get(key).filter(|v| !v.is_empty()).cloned()
}

/// Static keys of a profile section.
pub(crate) fn profile_keys(section: &Profile, provider: &str) -> Result<Option<ReadOnlyCredentials>> {
    let Some((access, secret)) = credential_pair(
        provider,
        (ACCESS_KEY, non_empty(section, ACCESS_KEY)),
        (SECRET_KEY, non_empty(section, SECRET_KEY)),
    )?
    else {
        return Ok(None);
    };
    let token = TOKEN_KEYS.iter().find_map(|key| non_empty(section, key));
    Ok(Some(ReadOnlyCredentials::new(access, secret, token)))
}

/// Static keys of a profile section, tagged with `method`.
pub(crate) fn profile_credentials(section: &Profile, method: &str) -> Result<Option<Credentials>> {
    Ok(profile_keys(section, method)?.map(|keys| Credentials::from_frozen(keys, method)))
}

/// Section `name` of the file at `path`; a missing file or section is `None`.
pub(crate) fn load_section(parser: &IniParser, path: &Path, name: &str) -> Result<Option<Profile>> {
    match parser(path) {
        Ok(mut profiles) => Ok(profiles.remove(name)),
        Err(Error::ConfigNotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(pairs: &[(&str, &str)]) -> Profile {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_profile_credentials() {
        let creds = profile_credentials(
            &section(&[
                ("aws_access_key_id", "foo"),
                ("aws_secret_access_key", "bar"),
                ("aws_session_token", "baz"),
            ]),
            "shared-credentials-file",
        )
        .unwrap()
        .unwrap();
        let frozen = creds.get_frozen_credentials().await.unwrap();
        assert_eq!(frozen.access_key(), "foo");
        assert_eq!(frozen.token(), Some("baz"));
        assert_eq!(creds.method(), "shared-credentials-file");
    }

    #[test]
    fn test_security_token_takes_precedence() {
        let section = section(&[
            ("aws_access_key_id", "foo"),
            ("aws_secret_access_key", "bar"),
            ("aws_security_token", "old"),
            ("aws_session_token", "new"),
        ]);
        let token = TOKEN_KEYS.iter().find_map(|key| non_empty(&section, key));
        assert_eq!(token.as_deref(), Some("old"));
    }

    #[test]
    fn test_partial_and_missing() {
        let err = profile_credentials(&section(&[("aws_access_key_id", "foo")]), "config-file")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::PartialCredentials { ref cred_var, .. } if cred_var == SECRET_KEY
        ));

        let empty = section(&[("aws_access_key_id", ""), ("region", "us-east-1")]);
        assert!(profile_credentials(&empty, "config-file").unwrap().is_none());
    }
}
