//! Legacy boto configuration provider.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{load_section, profile_credentials};
use crate::Result;
use crate::config::{IniParser, Profile, default_ini_parser, expand_home};
use crate::credential::Credentials;
use crate::env::Env;
use crate::provider::CredentialProvider;

const BOTO_CONFIG_ENV: &str = "BOTO_CONFIG";
const DEFAULT_CONFIG_FILENAMES: [&str; 2] = ["/etc/boto.cfg", "~/.boto"];
const SECTION: &str = "Credentials";

/// Reads the `[Credentials]` section of a boto config file.
///
/// `BOTO_CONFIG` names the only file to consult; otherwise `/etc/boto.cfg`
/// and `~/.boto` are both read, with `~/.boto` winning per key.
pub struct BotoProvider {
    env: Env,
    parser: IniParser,
}

impl BotoProvider {
    pub const METHOD: &'static str = "boto-config";
    pub const CANONICAL_NAME: &'static str = "Boto2Config";

    pub fn new(env: Env) -> Self {
        Self {
            env,
            parser: default_ini_parser(),
        }
    }

    pub fn with_parser(mut self, parser: IniParser) -> Self {
        self.parser = parser;
        self
    }

    fn candidate_paths(&self) -> Vec<PathBuf> {
        match self.env.get_non_empty(BOTO_CONFIG_ENV) {
            Some(path) => vec![expand_home(Path::new(&path), &self.env)],
            None => DEFAULT_CONFIG_FILENAMES
                .iter()
                .map(|path| expand_home(Path::new(path), &self.env))
                .collect(),
        }
    }
}

#[async_trait]
impl CredentialProvider for BotoProvider {
    fn method(&self) -> &str {
        Self::METHOD
    }

    fn canonical_name(&self) -> Option<&str> {
        Some(Self::CANONICAL_NAME)
    }

    async fn load(&self) -> Result<Option<Credentials>> {
        // Later files override earlier ones per key.
        let mut merged: Option<Profile> = None;
        for path in self.candidate_paths() {
            if let Some(section) = load_section(&self.parser, &path, SECTION)? {
                merged.get_or_insert_with(Profile::new).extend(section);
            }
        }
        let Some(section) = merged else {
            return Ok(None);
        };
        let creds = profile_credentials(&section, Self::METHOD)?;
        if creds.is_some() {
            tracing::info!("Found credentials in boto config file.");
        }
        Ok(creds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::Error;
    use crate::config::Profiles;

    fn credentials_section(pairs: &[(&str, &str)]) -> Profiles {
        let section: Profile = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Profiles::from([("Credentials".to_string(), section)])
    }

    #[tokio::test]
    async fn test_boto_config_file_exists_in_home_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".boto"),
            "[Credentials]\naws_access_key_id = a\naws_secret_access_key = b\n",
        )
        .unwrap();
        let home = dir.path().to_string_lossy().to_string();
        let provider = BotoProvider::new(Env::from_slice(&[("HOME", home.as_str())]));

        // A missing /etc/boto.cfg is skipped; when present, ~/.boto overrides it per key.
        let creds = provider.load().await.unwrap().unwrap();
        assert_eq!(creds.method(), "boto-config");
    }

    #[tokio::test]
    async fn test_boto_config_env_var_is_the_only_file() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let parser: IniParser = Arc::new(move |path: &std::path::Path| -> Result<Profiles> {
            recorder.lock().unwrap().push(path.to_path_buf());
            Ok(credentials_section(&[
                ("aws_access_key_id", "a"),
                ("aws_secret_access_key", "b"),
            ]))
        });
        let provider = BotoProvider::new(Env::from_slice(&[("BOTO_CONFIG", "/custom/boto")]))
            .with_parser(parser);

        let creds = provider.load().await.unwrap().unwrap();
        let frozen = creds.get_frozen_credentials().await.unwrap();
        assert_eq!(frozen.access_key(), "a");
        assert_eq!(*seen.lock().unwrap(), vec![PathBuf::from("/custom/boto")]);
    }

    #[tokio::test]
    async fn test_no_boto_config_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let provider = BotoProvider::new(Env::from_slice(&[(
            "BOTO_CONFIG",
            missing.to_str().unwrap(),
        )]));
        assert!(provider.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_partial_creds_is_error() {
        let parser: IniParser = Arc::new(|_: &std::path::Path| -> Result<Profiles> {
            Ok(credentials_section(&[("aws_access_key_id", "a")]))
        });
        let provider = BotoProvider::new(Env::from_slice(&[("BOTO_CONFIG", "/custom/boto")]))
            .with_parser(parser);
        assert!(matches!(
            provider.load().await.unwrap_err(),
            Error::PartialCredentials { .. }
        ));
    }

    #[tokio::test]
    async fn test_home_boto_overrides_system_config_per_key() {
        let parser: IniParser = Arc::new(|path: &std::path::Path| -> Result<Profiles> {
            if path.starts_with("/etc") {
                Ok(credentials_section(&[
                    ("aws_access_key_id", "system-key"),
                    ("aws_secret_access_key", "system-secret"),
                ]))
            } else {
                Ok(credentials_section(&[("aws_access_key_id", "user-key")]))
            }
        });
        let provider = BotoProvider::new(Env::from_slice(&[("HOME", "/home/user")]))
            .with_parser(parser);

        let creds = provider.load().await.unwrap().unwrap();
        let frozen = creds.get_frozen_credentials().await.unwrap();
        assert_eq!(frozen.access_key(), "user-key");
        assert_eq!(frozen.secret_key(), "system-secret");
    }

    #[tokio::test]
    async fn test_partial_pair_checked_after_merge() {
        let parser: IniParser = Arc::new(|path: &std::path::Path| -> Result<Profiles> {
            if path.starts_with("/etc") {
                Err(Error::ConfigNotFound {
                    path: path.to_path_buf(),
                })
            } else {
                Ok(credentials_section(&[("aws_secret_access_key", "user-secret")]))
            }
        });
        let provider = BotoProvider::new(Env::from_slice(&[("HOME", "/home/user")]))
            .with_parser(parser);
        assert!(matches!(
            provider.load().await.unwrap_err(),
            Error::PartialCredentials { .. }
        ));
    }
}
