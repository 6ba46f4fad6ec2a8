//! Remote role-assumption seam.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::Result;
use crate::credential::{CredentialMetadata, ReadOnlyCredentials, format_timestamp};

/// Parameters of a single assume-role call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AssumeRoleRequest {
    pub role_arn: String,
    pub role_session_name: String,
    pub external_id: Option<String>,
    /// Source identity recorded on the assumed-role session.
    pub source_identity: Option<String>,
    pub duration_seconds: Option<u32>,
    /// MFA device serial number.
    pub serial_number: Option<String>,
    #[serde(skip)]
    pub token_code: Option<String>,
}

impl AssumeRoleRequest {
    pub fn new(role_arn: impl Into<String>, role_session_name: impl Into<String>) -> Self {
        Self {
            role_arn: role_arn.into(),
            role_session_name: role_session_name.into(),
            ..Default::default()
        }
    }
}

/// Temporary credentials returned by the remote call.
#[derive(Clone)]
pub struct TemporaryCredentials {
    pub access_key_id: String,
    secret_access_key: SecretString,
    session_token: SecretString,
    pub expiration: DateTime<Utc>,
}

impl TemporaryCredentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
        expiration: DateTime<Utc>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: SecretString::from(secret_access_key.into()),
            session_token: SecretString::from(session_token.into()),
            expiration,
        }
    }

    pub fn secret_access_key(&self) -> &str {
        self.secret_access_key.expose_secret()
    }

    pub fn session_token(&self) -> &str {
        self.session_token.expose_secret()
    }

    pub fn frozen(&self) -> ReadOnlyCredentials {
        ReadOnlyCredentials::new(
            self.access_key_id.clone(),
            self.secret_access_key().to_string(),
            Some(self.session_token().to_string()),
        )
    }

    pub fn to_metadata(&self) -> CredentialMetadata {
        CredentialMetadata::new(
            self.access_key_id.clone(),
            self.secret_access_key().to_string(),
            Some(self.session_token().to_string()),
            format_timestamp(self.expiration),
        )
    }
}

impl fmt::Debug for TemporaryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemporaryCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[redacted]")
            .field("session_token", &"[redacted]")
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Performs the remote assume-role operation.
///
/// Implementations sign the call with `credentials`. A non-success response
/// should be reported as [`crate::Error::RetrievalFailure`] carrying the
/// remote message.
#[async_trait]
pub trait AssumeRoleClient: Send + Sync {
    async fn assume_role(
        &self,
        credentials: &ReadOnlyCredentials,
        request: &AssumeRoleRequest,
    ) -> Result<TemporaryCredentials>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_temporary_credentials_conversions() {
        let expiration = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let temp = TemporaryCredentials::new("AKID", "secret", "token", expiration);

        assert_eq!(
            temp.frozen(),
            ReadOnlyCredentials::new("AKID", "secret", Some("token".into()))
        );
        let meta = temp.to_metadata();
        assert_eq!(meta.expiry_time, "2030-01-01T00:00:00Z");
        assert_eq!(meta.expiry("assume-role").unwrap(), expiration);

        let debug = format!("{:?}", temp);
        assert!(!debug.contains("secret\""));
        assert!(!debug.contains("token\""));
    }

    #[test]
    fn test_request_defaults() {
        let request = AssumeRoleRequest::new("arn:aws:iam::123:role/x", "session");
        assert_eq!(request.role_session_name, "session");
        assert!(request.external_id.is_none());
        assert!(request.serial_number.is_none());
    }
}
