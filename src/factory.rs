//! Default provider chain assembly.
//!
//! [`ResolverBuilder`] wires every built-in provider from a [`SessionConfig`]
//! in a fixed order:
//!
//! | # | Method | Source |
//! |---|--------|--------|
//! | 1 | `custom-process` | `credential_process` command |
//! | 2 | `env` | `AWS_ACCESS_KEY_ID` and friends, skipped for an explicit profile |
//! | 3 | `shared-credentials-file` | `~/.aws/credentials` |
//! | 4 | `config-file` | `~/.aws/config` |
//! | 5 | `boto-config` | `BOTO_CONFIG`, `/etc/boto.cfg`, `~/.boto` |
//! | 6 | `ec2-credentials-file` | `AWS_CREDENTIAL_FILE` |
//! | 7 | `assume-role` | `role_arn` profiles |
//! | 8 | `iam-role` | instance metadata service |

use std::sync::Arc;

use crate::cache::AssumeRoleCache;
use crate::config::{
    self, IniParser, KeyValueParser, SessionConfig, default_config_parser, default_ini_parser,
    default_key_value_parser,
};
use crate::env::Env;
use crate::provider::CredentialProvider;
use crate::providers::{
    AssumeRoleProvider, BotoProvider, ConfigProvider, ContainerProvider, EnvProvider,
    IamRoleFetcher, InstanceMetadataFetcher, InstanceMetadataProvider, MfaPrompter,
    OriginalEC2Provider, ProcessProvider, SharedCredentialProvider,
};
use crate::resolver::CredentialResolver;
use crate::sourcer::CanonicalNameCredentialSourcer;
use crate::sts::AssumeRoleClient;

/// Builds the default [`CredentialResolver`].
///
/// Every seam has a production default; tests replace the environment,
/// parsers and remote clients.
pub struct ResolverBuilder {
    config: SessionConfig,
    env: Env,
    ini_parser: IniParser,
    config_parser: IniParser,
    key_value_parser: KeyValueParser,
    iam_role_fetcher: Option<Arc<dyn IamRoleFetcher>>,
    container_provider: Option<ContainerProvider>,
    assume_role_client: Option<Arc<dyn AssumeRoleClient>>,
    cache: AssumeRoleCache,
    mfa_prompter: Option<MfaPrompter>,
    credential_sources: Vec<Box<dyn CredentialProvider>>,
}

impl ResolverBuilder {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            env: Env::real(),
            ini_parser: default_ini_parser(),
            config_parser: default_config_parser(),
            key_value_parser: default_key_value_parser(),
            iam_role_fetcher: None,
            container_provider: None,
            assume_role_client: None,
            cache: AssumeRoleCache::new(),
            mfa_prompter: None,
            credential_sources: Vec::new(),
        }
    }

    pub fn with_env(mut self, env: Env) -> Self {
        self.env = env;
        self
    }

    /// Parser for the credentials file and the boto config.
    pub fn with_ini_parser(mut self, parser: IniParser) -> Self {
        self.ini_parser = parser;
        self
    }

    /// Parser for the config file, which understands `[profile name]` sections.
    pub fn with_config_parser(mut self, parser: IniParser) -> Self {
        self.config_parser = parser;
        self
    }

    pub fn with_key_value_parser(mut self, parser: KeyValueParser) -> Self {
        self.key_value_parser = parser;
        self
    }

    /// Instance role source shared by `iam-role` and `credential_source = Ec2InstanceMetadata`.
    pub fn with_iam_role_fetcher(mut self, fetcher: Arc<dyn IamRoleFetcher>) -> Self {
        self.iam_role_fetcher = Some(fetcher);
        self
    }

    /// Container provider used for `credential_source = EcsContainer`.
    pub fn with_container_provider(mut self, provider: ContainerProvider) -> Self {
        self.container_provider = Some(provider);
        self
    }

    pub fn with_assume_role_client(mut self, client: Arc<dyn AssumeRoleClient>) -> Self {
        self.assume_role_client = Some(client);
        self
    }

    pub fn with_cache(mut self, cache: AssumeRoleCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_mfa_prompter(mut self, prompter: MfaPrompter) -> Self {
        self.mfa_prompter = Some(prompter);
        self
    }

    /// Extra provider addressable through `credential_source` by its canonical name.
    pub fn with_credential_source(mut self, provider: impl CredentialProvider + 'static) -> Self {
        self.credential_sources.push(Box::new(provider));
        self
    }

    pub fn build(self) -> CredentialResolver {
        let profile = self.config.effective_profile(&self.env);
        let credentials_file = config::expand_home(&self.config.credentials_file, &self.env);
        let config_file = config::expand_home(&self.config.config_file, &self.env);
        let loader = config::profile_loader(
            self.config_parser.clone(),
            config_file.clone(),
            self.ini_parser.clone(),
            credentials_file.clone(),
        );
        let fetcher = self.iam_role_fetcher.unwrap_or_else(|| {
            Arc::new(InstanceMetadataFetcher::new(
                self.config.metadata_service_timeout,
                self.config.metadata_service_num_attempts,
            ))
        });
        tracing::debug!(
            profile = %profile,
            credentials_file = %credentials_file.display(),
            config_file = %config_file.display(),
            "Building credential resolver"
        );

        let mut process = ProcessProvider::new(profile.clone(), loader.clone());
        if let Some(command) = &self.config.credential_process {
            process = process.with_command(command.clone());
        }

        let mut sources: Vec<Box<dyn CredentialProvider>> = vec![
            Box::new(EnvProvider::new(self.env.clone())),
            Box::new(
                self.container_provider
                    .unwrap_or_else(|| ContainerProvider::new(self.env.clone())),
            ),
            Box::new(InstanceMetadataProvider::from_shared(fetcher.clone())),
        ];
        sources.extend(self.credential_sources);

        let mut assume_role = AssumeRoleProvider::new(loader, profile.clone())
            .with_cache(self.cache)
            .with_sourcer(CanonicalNameCredentialSourcer::new(sources));
        if let Some(client) = self.assume_role_client {
            assume_role = assume_role.with_client(client);
        }
        if let Some(prompter) = self.mfa_prompter {
            assume_role = assume_role.with_mfa_prompter(prompter);
        }
        if let Some(name) = &self.config.role_session_name {
            assume_role = assume_role.with_session_name(name.clone());
        }

        let mut resolver = CredentialResolver::default();
        resolver.push(process);
        if self.config.profile.is_none() {
            resolver.push(EnvProvider::new(self.env.clone()));
        }
        resolver.push(
            SharedCredentialProvider::new(credentials_file, profile.clone())
                .with_parser(self.ini_parser.clone()),
        );
        resolver.push(ConfigProvider::new(config_file, profile).with_parser(self.config_parser));
        resolver.push(BotoProvider::new(self.env.clone()).with_parser(self.ini_parser));
        resolver.push(OriginalEC2Provider::new(self.env).with_parser(self.key_value_parser));
        resolver.push(assume_role);
        resolver.push(InstanceMetadataProvider::from_shared(fetcher));
        resolver
    }
}

/// Default resolver for `config`, reading the process environment.
///
/// `config` is used as given. Build it with [`SessionConfig::from_env`] to pick
/// up file locations and metadata settings from environment variables.
pub fn create_credential_resolver(config: &SessionConfig) -> CredentialResolver {
    ResolverBuilder::new(config.clone()).build()
}
