//! Credential configuration.
//!
//! Providers never parse a file format themselves. They receive parser
//! functions at construction time, and the defaults in [`ini`] are used
//! when nothing else is injected.
//!
//! ```rust,no_run
//! use credential_chain::Env;
//! use credential_chain::config::{self, SessionConfig};
//!
//! # fn example() -> Result<(), credential_chain::Error> {
//! let session = SessionConfig::default();
//! let path = config::expand_home(&session.config_file, &Env::real());
//! let profiles = config::parse_config_file(&path)?;
//! println!("{:?}", profiles.get("dev"));
//! # Ok(())
//! # }
//! ```

pub mod ini;
pub mod session;

pub use ini::{parse_config_file, parse_ini_file, parse_key_value_file};
pub use session::SessionConfig;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::env::Env;
use crate::{Error, Result};

/// Settings of a single profile, keyed by lower-cased option name.
pub type Profile = HashMap<String, String>;

/// All profiles of a file, keyed by profile name.
pub type Profiles = HashMap<String, Profile>;

/// Parses an INI-style file into its sections.
///
/// A missing file must be reported as [`Error::ConfigNotFound`].
pub type IniParser = Arc<dyn Fn(&Path) -> Result<Profiles> + Send + Sync>;

/// Parses a flat `key=value` file.
pub type KeyValueParser = Arc<dyn Fn(&Path) -> Result<Profile> + Send + Sync>;

/// Returns every known profile, merged across configuration files.
pub type ProfileLoader = Arc<dyn Fn() -> Result<Profiles> + Send + Sync>;

pub fn default_ini_parser() -> IniParser {
    Arc::new(parse_ini_file)
}

pub fn default_config_parser() -> IniParser {
    Arc::new(parse_config_file)
}

pub fn default_key_value_parser() -> KeyValueParser {
    Arc::new(parse_key_value_file)
}

/// Expand a leading `~` to the home directory.
///
/// `HOME` is read through `env`; the platform home directory is used when it
/// is unset. Paths without a leading `~` are returned unchanged.
pub fn expand_home(path: &Path, env: &Env) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    let home = env.get_non_empty("HOME").map(PathBuf::from).or_else(|| {
        directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
    });
    match home {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Parse `path`, treating a missing file as empty.
pub fn parse_or_empty(parser: &IniParser, path: &Path) -> Result<Profiles> {
    match parser(path) {
        Ok(profiles) => Ok(profiles),
        Err(Error::ConfigNotFound { .. }) => Ok(Profiles::new()),
        Err(e) => Err(e),
    }
}

/// Loader merging the config file with the credentials file.
///
/// Both files are re-read on every call so a refresh sees edits. For a
/// profile present in both, credentials-file values win per key.
pub fn profile_loader(
    config_parser: IniParser,
    config_file: PathBuf,
    credentials_parser: IniParser,
    credentials_file: PathBuf,
) -> ProfileLoader {
    Arc::new(move || -> Result<Profiles> {
        let mut profiles = parse_or_empty(&config_parser, &config_file)?;
        for (name, section) in parse_or_empty(&credentials_parser, &credentials_file)? {
            profiles.entry(name).or_default().extend(section);
        }
        Ok(profiles)
    })
}

/// Loader returning a fixed set of profiles.
pub fn static_profiles(profiles: Profiles) -> ProfileLoader {
    let profiles = Arc::new(profiles);
    Arc::new(move || -> Result<Profiles> { Ok(profiles.as_ref().clone()) })
}
