//! Legacy EC2 tools credential file provider.

use std::path::Path;

use async_trait::async_trait;

use super::credential_pair;
use crate::config::{KeyValueParser, default_key_value_parser, expand_home};
use crate::credential::Credentials;
use crate::env::Env;
use crate::provider::CredentialProvider;
use crate::{Error, Result};

const CRED_FILE_ENV: &str = "AWS_CREDENTIAL_FILE";
const ACCESS_KEY: &str = "AWSAccessKeyId";
const SECRET_KEY: &str = "AWSSecretKey";

/// Reads the `key=value` file named by `AWS_CREDENTIAL_FILE`.
pub struct OriginalEC2Provider {
    env: Env,
    parser: KeyValueParser,
}

impl OriginalEC2Provider {
    pub const METHOD: &'static str = "ec2-credentials-file";
    pub const CANONICAL_NAME: &'static str = "Ec2CredentialsFile";

    pub fn new(env: Env) -> Self {
        Self {
            env,
            parser: default_key_value_parser(),
        }
    }

    pub fn with_parser(mut self, parser: KeyValueParser) -> Self {
        self.parser = parser;
        self
    }
}

#[async_trait]
impl CredentialProvider for OriginalEC2Provider {
    fn method(&self) -> &str {
        Self::METHOD
    }

    fn canonical_name(&self) -> Option<&str> {
        Some(Self::CANONICAL_NAME)
    }

    async fn load(&self) -> Result<Option<Credentials>> {
        let Some(raw_path) = self.env.get_non_empty(CRED_FILE_ENV) else {
            return Ok(None);
        };
        let path = expand_home(Path::new(&raw_path), &self.env);
        let mut values = match (self.parser)(&path) {
            Ok(values) => values,
            Err(Error::ConfigNotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let mut take = |key: &str| values.remove(key).filter(|v| !v.is_empty());
        let access = take(ACCESS_KEY);
        let secret = take(SECRET_KEY);
        let Some((access, secret)) =
            credential_pair(Self::METHOD, (ACCESS_KEY, access), (SECRET_KEY, secret))?
        else {
            return Ok(None);
        };
        tracing::info!(path = %path.display(), "Found credentials in AWS_CREDENTIAL_FILE");
        Ok(Some(Credentials::new(access, secret, None, Self::METHOD)))
    }
}
