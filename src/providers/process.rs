//! External `credential_process` provider.

use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::config::ProfileLoader;
use crate::credential::{CredentialMetadata, Credentials};
use crate::provider::CredentialProvider;
use crate::refresh::{RefreshableCredentials, refresh_fn};
use crate::{Error, Result};

const SUPPORTED_VERSION: i64 = 1;

/// Runs an external command that prints credentials as JSON.
///
/// The command comes from the profile's `credential_process`, unless an
/// explicit command was given. It is split with shell quoting rules but not
/// run through a shell.
pub struct ProcessProvider {
    profile: String,
    loader: ProfileLoader,
    command: Option<String>,
}

impl ProcessProvider {
    pub const METHOD: &'static str = "custom-process";
    pub const CANONICAL_NAME: &'static str = "CustomProcess";

    pub fn new(profile: impl Into<String>, loader: ProfileLoader) -> Self {
        Self {
            profile: profile.into(),
            loader,
            command: None,
        }
    }

    /// Run `command` instead of the profile's `credential_process`.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    fn command(&self) -> Result<Option<String>> {
        if let Some(command) = &self.command {
            return Ok(Some(command.clone()));
        }
        let profiles = (self.loader)()?;
        Ok(profiles
            .get(&self.profile)
            .and_then(|profile| profile.get("credential_process"))
            .filter(|command| !command.trim().is_empty())
            .cloned())
    }
}

async fn run_credential_process(command: &str) -> Result<CredentialMetadata> {
    let argv = shell_words::split(command).map_err(|e| {
        Error::invalid_config(format!("invalid credential_process {command:?}: {e}"))
    })?;
    let Some((program, args)) = argv.split_first() else {
        return Err(Error::invalid_config("credential_process is empty"));
    };

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| Error::retrieval(ProcessProvider::METHOD, format!("failed to run {program}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::retrieval(ProcessProvider::METHOD, stderr.trim()));
    }
    parse_process_output(&output.stdout)
}

fn parse_process_output(stdout: &[u8]) -> Result<CredentialMetadata> {
    let retrieval = |message: String| Error::retrieval(ProcessProvider::METHOD, message);

    let parsed: Value = serde_json::from_slice(stdout)
        .map_err(|e| retrieval(format!("credential process returned invalid JSON: {e}")))?;

    let version = parsed.get("Version");
    if version.and_then(Value::as_i64) != Some(SUPPORTED_VERSION) {
        let shown = version.map_or_else(|| "<Version key not provided>".to_string(), Value::to_string);
        return Err(retrieval(format!(
            "Unsupported version '{shown}' for credential process provider, supported versions: {SUPPORTED_VERSION}"
        )));
    }

    let field = |key: &str| parsed.get(key).and_then(Value::as_str).map(str::to_string);
    let required = |key: &str| {
        field(key).ok_or_else(|| retrieval(format!("Missing required key in response: {key}")))
    };
    Ok(CredentialMetadata {
        access_key: required("AccessKeyId")?,
        secret_key: required("SecretAccessKey")?,
        token: field("SessionToken"),
        expiry_time: field("Expiration").unwrap_or_default(),
        role_name: None,
    })
}

#[async_trait]
impl CredentialProvider for ProcessProvider {
    fn method(&self) -> &str {
        Self::METHOD
    }

    fn canonical_name(&self) -> Option<&str> {
        Some(Self::CANONICAL_NAME)
    }

    async fn load(&self) -> Result<Option<Credentials>> {
        let Some(command) = self.command()? else {
            return Ok(None);
        };
        let metadata = run_credential_process(&command).await?;
        tracing::info!(profile = %self.profile, "Found credentials from credential_process");

        if metadata.expiry_time.is_empty() {
            return Ok(Some(Credentials::new(
                metadata.access_key,
                metadata.secret_key,
                metadata.token,
                Self::METHOD,
            )));
        }
        let refresh = refresh_fn(move || {
            let command = command.clone();
            async move { run_credential_process(&command).await }
        });
        let creds = RefreshableCredentials::from_metadata(metadata, refresh, Self::METHOD)?;
        Ok(Some(creds.into()))
    }
}
