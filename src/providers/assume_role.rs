//! Assume-role provider with recursive `source_profile` resolution.
//!
//! A role profile gets its base credentials from, in order: its own static
//! keys, its `source_profile` (which may itself be a role profile), or its
//! `credential_source`. The chain is planned from the configuration first,
//! which is where cycles and contradictory directives are rejected, and then
//! executed from the innermost profile outwards, one remote call per role.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use super::{non_empty, profile_keys};
use crate::cache::AssumeRoleCache;
use crate::config::{Profile, ProfileLoader, Profiles};
use crate::credential::{Credentials, ReadOnlyCredentials};
use crate::provider::CredentialProvider;
use crate::refresh::{RefreshableCredentials, refresh_fn};
use crate::sourcer::CanonicalNameCredentialSourcer;
use crate::sts::{AssumeRoleClient, AssumeRoleRequest, TemporaryCredentials};
use crate::{Error, Result};

const ROLE_ARN: &str = "role_arn";
const SOURCE_PROFILE: &str = "source_profile";
const CREDENTIAL_SOURCE: &str = "credential_source";
const ROLE_SESSION_NAME: &str = "role_session_name";
const EXTERNAL_ID: &str = "external_id";
const SOURCE_IDENTITY: &str = "source_identity";
const DURATION_SECONDS: &str = "duration_seconds";
const MFA_SERIAL: &str = "mfa_serial";

/// Returns the current token code for an MFA device serial number.
pub type MfaPrompter = Arc<dyn Fn(&str) -> Result<String> + Send + Sync>;

enum BaseCredentials {
    Static(ReadOnlyCredentials),
    Source(String),
}

struct Plan {
    base: BaseCredentials,
    /// Role profiles to assume, innermost first.
    roles: Vec<String>,
    mfa_profile: Option<String>,
}

#[derive(Clone)]
struct RoleChain {
    loader: ProfileLoader,
    profile: String,
    session_name: String,
    client: Option<Arc<dyn AssumeRoleClient>>,
    cache: AssumeRoleCache,
    sourcer: Option<Arc<CanonicalNameCredentialSourcer>>,
    mfa_prompter: Option<MfaPrompter>,
}

fn is_role_profile(section: &Profile) -> bool {
    non_empty(section, ROLE_ARN).is_some()
}

impl RoleChain {
    fn plan(&self, profiles: &Profiles) -> Result<Plan> {
        let mut visited = vec![self.profile.clone()];
        let mut roles = Vec::new();
        let mut mfa_profile = None;
        let mut current = self.profile.clone();

        let base = loop {
            let section = profiles.get(&current).ok_or_else(|| {
                Error::invalid_config(format!("profile {current} does not exist"))
            })?;
            roles.push(current.clone());
            if mfa_profile.is_none() && non_empty(section, MFA_SERIAL).is_some() {
                mfa_profile = Some(current.clone());
            }

            let source_profile = non_empty(section, SOURCE_PROFILE);
            let credential_source = non_empty(section, CREDENTIAL_SOURCE);
            if source_profile.is_some() && credential_source.is_some() {
                return Err(Error::invalid_config(format!(
                    "profile {current} contains both source_profile and credential_source"
                )));
            }
            if let Some(creds) = static_keys(section, &current)? {
                break BaseCredentials::Static(creds);
            }

            if let Some(source) = source_profile {
                let Some(source_section) = profiles.get(&source) else {
                    return Err(Error::invalid_config(format!(
                        "source_profile {source} referenced in profile {current} does not exist"
                    )));
                };
                if visited.contains(&source) {
                    return Err(Error::InfiniteLoop {
                        profile: source,
                        visited,
                    });
                }
                visited.push(source.clone());

                if is_role_profile(source_section) {
                    current = source;
                    continue;
                }
                match static_keys(source_section, &source)? {
                    Some(creds) => break BaseCredentials::Static(creds),
                    None => {
                        return Err(Error::invalid_config(format!(
                            "source_profile {source} referenced in profile {current} has no static credentials"
                        )));
                    }
                }
            }

            if let Some(source) = credential_source {
                let supported = self
                    .sourcer
                    .as_ref()
                    .is_some_and(|sourcer| sourcer.is_supported(&source));
                if !supported {
                    return Err(Error::invalid_config(format!(
                        "credential_source {source} referenced in profile {current} is not supported"
                    )));
                }
                break BaseCredentials::Source(source);
            }

            return Err(Error::invalid_config(format!(
                "profile {current} has a role_arn but no static credentials, source_profile or credential_source"
            )));
        };

        roles.reverse();
        Ok(Plan {
            base,
            roles,
            mfa_profile,
        })
    }

    async fn resolve(&self, profiles: &Profiles) -> Result<TemporaryCredentials> {
        let plan = self.plan(profiles)?;
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| Error::invalid_config("no assume-role client configured"))?;

        let mut base = match plan.base {
            BaseCredentials::Static(creds) => creds,
            BaseCredentials::Source(name) => {
                let sourcer = self.sourcer.as_ref().ok_or_else(|| {
                    Error::invalid_config("no credential sources configured")
                })?;
                sourcer
                    .source_credentials(&name)
                    .await?
                    .get_frozen_credentials()
                    .await?
            }
        };

        let mut assumed = None;
        for role in &plan.roles {
            let section = profiles.get(role).ok_or_else(|| {
                Error::invalid_config(format!("profile {role} does not exist"))
            })?;
            let temporary = self.assume(client.as_ref(), role, section, &base).await?;
            base = temporary.frozen();
            assumed = Some(temporary);
        }
        assumed.ok_or_else(|| Error::invalid_config(format!("profile {} has no role_arn", self.profile)))
    }

    async fn assume(
        &self,
        client: &dyn AssumeRoleClient,
        profile: &str,
        section: &Profile,
        base: &ReadOnlyCredentials,
    ) -> Result<TemporaryCredentials> {
        let role_arn = non_empty(section, ROLE_ARN)
            .ok_or_else(|| Error::invalid_config(format!("profile {profile} has no role_arn")))?;
        let mut request = AssumeRoleRequest::new(
            role_arn,
            non_empty(section, ROLE_SESSION_NAME).unwrap_or_else(|| self.session_name.clone()),
        );
        request.external_id = non_empty(section, EXTERNAL_ID);
        request.source_identity = non_empty(section, SOURCE_IDENTITY);
        request.duration_seconds = non_empty(section, DURATION_SECONDS)
            .map(|raw| {
                raw.parse().map_err(|_| {
                    Error::invalid_config(format!(
                        "duration_seconds in profile {profile} is not a number: {raw}"
                    ))
                })
            })
            .transpose()?;
        request.serial_number = non_empty(section, MFA_SERIAL);

        let key = AssumeRoleCache::cache_key(profile, base.access_key(), &request)?;
        if let Some(cached) = self.cache.get_live(&key, Utc::now()).await {
            tracing::debug!(profile, "Using cached assume-role credentials");
            return Ok(cached);
        }

        if let Some(serial) = &request.serial_number {
            let prompter = self.mfa_prompter.as_ref().ok_or_else(|| {
                Error::invalid_config(format!(
                    "profile {profile} requires an MFA token code but no prompter is configured"
                ))
            })?;
            request.token_code = Some(prompter(serial)?);
        }

        tracing::debug!(profile, role_arn = %request.role_arn, "Assuming role");
        let temporary = client
            .assume_role(base, &request)
            .await
            .map_err(wrap_remote_error)?;
        self.cache.insert(key, temporary.clone()).await;
        Ok(temporary)
    }

    async fn refresh(&self) -> Result<TemporaryCredentials> {
        let profiles = (self.loader)()?;
        let plan = self.plan(&profiles)?;
        if let Some(profile) = plan.mfa_profile {
            return Err(Error::RefreshWithMfaUnsupported { profile });
        }
        self.resolve(&profiles).await
    }
}

fn static_keys(section: &Profile, profile: &str) -> Result<Option<ReadOnlyCredentials>> {
    match profile_keys(section, AssumeRoleProvider::METHOD) {
        Ok(keys) => Ok(keys),
        Err(Error::PartialCredentials { cred_var, .. }) => Err(Error::PartialCredentials {
            provider: format!("profile {profile}"),
            cred_var,
        }),
        Err(e) => Err(e),
    }
}

fn wrap_remote_error(error: Error) -> Error {
    match error {
        Error::Io(_) | Error::Json(_) | Error::Network(_) => {
            Error::retrieval(AssumeRoleProvider::METHOD, error.to_string())
        }
        other => other,
    }
}

/// Provider for profiles that assume a role.
///
/// Profiles without a `role_arn` are not handled here and give `None`.
pub struct AssumeRoleProvider {
    chain: RoleChain,
}

impl AssumeRoleProvider {
    pub const METHOD: &'static str = "assume-role";

    pub fn new(loader: ProfileLoader, profile: impl Into<String>) -> Self {
        Self {
            chain: RoleChain {
                loader,
                profile: profile.into(),
                session_name: format!("credential-chain-session-{}", Utc::now().timestamp()),
                client: None,
                cache: AssumeRoleCache::new(),
                sourcer: None,
                mfa_prompter: None,
            },
        }
    }

    pub fn with_client(mut self, client: Arc<dyn AssumeRoleClient>) -> Self {
        self.chain.client = Some(client);
        self
    }

    pub fn with_cache(mut self, cache: AssumeRoleCache) -> Self {
        self.chain.cache = cache;
        self
    }

    pub fn with_sourcer(mut self, sourcer: CanonicalNameCredentialSourcer) -> Self {
        self.chain.sourcer = Some(Arc::new(sourcer));
        self
    }

    pub fn with_mfa_prompter(mut self, prompter: MfaPrompter) -> Self {
        self.chain.mfa_prompter = Some(prompter);
        self
    }

    /// Session name for roles whose profile sets no `role_session_name`.
    pub fn with_session_name(mut self, name: impl Into<String>) -> Self {
        self.chain.session_name = name.into();
        self
    }

    pub fn session_name(&self) -> &str {
        &self.chain.session_name
    }
}

#[async_trait]
impl CredentialProvider for AssumeRoleProvider {
    fn method(&self) -> &str {
        Self::METHOD
    }

    async fn load(&self) -> Result<Option<Credentials>> {
        let profiles = (self.chain.loader)()?;
        let is_role = profiles
            .get(&self.chain.profile)
            .is_some_and(is_role_profile);
        if !is_role {
            return Ok(None);
        }

        let temporary = self.chain.resolve(&profiles).await?;
        tracing::info!(profile = %self.chain.profile, "Assumed role credentials");

        let chain = self.chain.clone();
        let refresh = refresh_fn(move || {
            let chain = chain.clone();
            async move { Ok(chain.refresh().await?.to_metadata()) }
        });
        let creds = RefreshableCredentials::from_metadata(temporary.to_metadata(), refresh, Self::METHOD)?;
        Ok(Some(creds.into()))
    }
}
