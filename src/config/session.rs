//! Session-level settings that shape the default provider chain.

use std::path::PathBuf;
use std::time::Duration;

use crate::env::Env;

pub const DEFAULT_CREDENTIALS_FILE: &str = "~/.aws/credentials";
pub const DEFAULT_CONFIG_FILE: &str = "~/.aws/config";
pub const DEFAULT_METADATA_SERVICE_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_METADATA_SERVICE_NUM_ATTEMPTS: u32 = 1;

/// Settings the resolver factory reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Profile requested explicitly by the caller.
    ///
    /// An explicit profile removes the environment provider from the chain.
    pub profile: Option<String>,
    pub credentials_file: PathBuf,
    pub config_file: PathBuf,
    pub metadata_service_timeout: Duration,
    pub metadata_service_num_attempts: u32,
    /// Command used instead of the profile's `credential_process`.
    pub credential_process: Option<String>,
    /// Session name for assumed roles without a `role_session_name`.
    pub role_session_name: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            profile: None,
            credentials_file: PathBuf::from(DEFAULT_CREDENTIALS_FILE),
            config_file: PathBuf::from(DEFAULT_CONFIG_FILE),
            metadata_service_timeout: DEFAULT_METADATA_SERVICE_TIMEOUT,
            metadata_service_num_attempts: DEFAULT_METADATA_SERVICE_NUM_ATTEMPTS,
            credential_process: None,
            role_session_name: None,
        }
    }
}

impl SessionConfig {
    /// Defaults overlaid with file locations and metadata settings from `env`.
    ///
    /// Unparseable numeric values are ignored.
    pub fn from_env(env: &Env) -> Self {
        let mut config = Self::default();
        if let Some(path) = env.get_non_empty("AWS_SHARED_CREDENTIALS_FILE") {
            config.credentials_file = PathBuf::from(path);
        }
        if let Some(path) = env.get_non_empty("AWS_CONFIG_FILE") {
            config.config_file = PathBuf::from(path);
        }
        if let Some(timeout) = parse_env::<f64>(env, "AWS_METADATA_SERVICE_TIMEOUT")
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        {
            config.metadata_service_timeout = timeout;
        }
        if let Some(attempts) = parse_env::<u32>(env, "AWS_METADATA_SERVICE_NUM_ATTEMPTS") {
            config.metadata_service_num_attempts = attempts.max(1);
        }
        config
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn with_credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_file = path.into();
        self
    }

    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = path.into();
        self
    }

    pub fn with_metadata_service_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_service_timeout = timeout;
        self
    }

    pub fn with_metadata_service_num_attempts(mut self, attempts: u32) -> Self {
        self.metadata_service_num_attempts = attempts.max(1);
        self
    }

    pub fn with_credential_process(mut self, command: impl Into<String>) -> Self {
        self.credential_process = Some(command.into());
        self
    }

    pub fn with_role_session_name(mut self, name: impl Into<String>) -> Self {
        self.role_session_name = Some(name.into());
        self
    }

    /// Profile the chain resolves: explicit, then `AWS_PROFILE`, then
    /// `AWS_DEFAULT_PROFILE`, then `default`.
    pub fn effective_profile(&self, env: &Env) -> String {
        self.profile
            .clone()
            .or_else(|| env.get_with_fallbacks(&["AWS_PROFILE", "AWS_DEFAULT_PROFILE"]))
            .unwrap_or_else(|| "default".to_string())
    }
}

fn parse_env<T: std::str::FromStr>(env: &Env, key: &str) -> Option<T> {
    let raw = env.get_non_empty(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::debug!(key, value = %raw, "Ignoring unparseable environment value");
            None
        }
    }
}
