//! Default INI and key=value parsers.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{Profile, Profiles};
use crate::{Error, Result};

/// Parse an INI file into sections.
///
/// Keys are lower-cased. `=` and `:` both separate keys from values, lines
/// starting with `#` or `;` are comments, and indented lines continue the
/// previous value.
pub fn parse_ini_file(path: &Path) -> Result<Profiles> {
    let contents = read_config(path)?;
    parse_ini_str(&contents).map_err(|message| Error::ConfigParse {
        path: path.to_path_buf(),
        message,
    })
}

/// Parse a config file, where sections other than `default` are written
/// `[profile name]`.
///
/// Sections without the `profile ` prefix (e.g. `[sso-session x]`) are not
/// profiles and are dropped.
pub fn parse_config_file(path: &Path) -> Result<Profiles> {
    let mut profiles = Profiles::new();
    let mut explicit_default = None;
    for (name, section) in parse_ini_file(path)? {
        if name == "default" {
            profiles.insert(name, section);
        } else if let Some(profile) = name.strip_prefix("profile ") {
            let profile = profile.trim();
            if profile.is_empty() {
                continue;
            }
            if profile == "default" {
                explicit_default = Some(section);
            } else {
                profiles.insert(profile.to_string(), section);
            }
        }
    }
    if let Some(section) = explicit_default {
        profiles.insert("default".to_string(), section);
    }
    Ok(profiles)
}

/// Parse a flat file of `key=value` lines.
///
/// Lines without `=` are ignored. Keys keep their case.
pub fn parse_key_value_file(path: &Path) -> Result<Profile> {
    let contents = read_config(path)?;
    Ok(contents
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect())
}

fn read_config(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == ErrorKind::NotFound || e.kind() == ErrorKind::NotADirectory => {
            Err(Error::ConfigNotFound {
                path: PathBuf::from(path),
            })
        }
        Err(e) => Err(e.into()),
    }
}

fn parse_ini_str(contents: &str) -> std::result::Result<Profiles, String> {
    let mut profiles = Profiles::new();
    let mut section: Option<String> = None;
    let mut last_key: Option<String> = None;

    for (index, raw) in contents.lines().enumerate() {
        let lineno = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if raw.starts_with([' ', '\t'])
            && let (Some(name), Some(key)) = (&section, &last_key)
            && let Some(value) = profiles.get_mut(name).and_then(|s| s.get_mut(key))
        {
            value.push('\n');
            value.push_str(line);
            continue;
        }

        if let Some(rest) = line.strip_prefix('[') {
            let Some(name) = rest.strip_suffix(']') else {
                return Err(format!("line {lineno}: unterminated section header"));
            };
            let name = name.trim().to_string();
            profiles.entry(name.clone()).or_default();
            section = Some(name);
            last_key = None;
            continue;
        }

        let Some(split) = line.find(['=', ':']) else {
            return Err(format!("line {lineno}: expected `key = value`"));
        };
        let Some(name) = &section else {
            return Err(format!("line {lineno}: option outside of a section"));
        };
        let key = line[..split].trim().to_lowercase();
        let value = line[split + 1..].trim().to_string();
        if let Some(section) = profiles.get_mut(name) {
            section.insert(key.clone(), value);
        }
        last_key = Some(key);
    }
    Ok(profiles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_parse_ini_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "credentials",
            "# comment\n[default]\nAWS_ACCESS_KEY_ID = foo\naws_secret_access_key: bar\n\n; other\n[dev]\naws_access_key_id=dev\n",
        );
        let profiles = parse_ini_file(&path).unwrap();
        assert_eq!(profiles["default"]["aws_access_key_id"], "foo");
        assert_eq!(profiles["default"]["aws_secret_access_key"], "bar");
        assert_eq!(profiles["dev"]["aws_access_key_id"], "dev");
    }

    #[test]
    fn test_parse_ini_continuation_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "config",
            "[default]\ns3 =\n    max_concurrent_requests = 10\n    addressing_style = path\n",
        );
        let profiles = parse_ini_file(&path).unwrap();
        assert_eq!(
            profiles["default"]["s3"],
            "\nmax_concurrent_requests = 10\naddressing_style = path"
        );
    }

    #[test]
    fn test_parse_ini_value_keeps_later_separators() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "config", "[a]\nrole_arn = arn:aws:iam::123:role/x\n");
        let profiles = parse_ini_file(&path).unwrap();
        assert_eq!(profiles["a"]["role_arn"], "arn:aws:iam::123:role/x");
    }

    #[test]
    fn test_parse_ini_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "no-section", "key = value\n");
        assert!(matches!(parse_ini_file(&path), Err(Error::ConfigParse { .. })));

        let path = write(&dir, "bad-header", "[default\n");
        let err = parse_ini_file(&path).unwrap_err();
        assert!(err.to_string().contains("line 1"));

        let missing = dir.path().join("missing");
        assert!(matches!(parse_ini_file(&missing), Err(Error::ConfigNotFound { .. })));
    }

    #[test]
    fn test_parse_config_file_profile_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "config",
            "[default]\nregion = us-west-2\n[profile dev]\nrole_arn = r\n[sso-session corp]\nsso_region = x\n[profilex]\na = b\n",
        );
        let profiles = parse_config_file(&path).unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles["default"]["region"], "us-west-2");
        assert_eq!(profiles["dev"]["role_arn"], "r");
    }

    #[test]
    fn test_parse_config_file_explicit_default_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "config",
            "[profile default]\nregion = a\n[default]\nregion = b\n",
        );
        let profiles = parse_config_file(&path).unwrap();
        assert_eq!(profiles["default"]["region"], "a");
    }

    #[test]
    fn test_parse_key_value_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "aws-credentials",
            "AWSAccessKeyId=foo\nAWSSecretKey = bar\nnot a pair\n",
        );
        let values = parse_key_value_file(&path).unwrap();
        assert_eq!(values["AWSAccessKeyId"], "foo");
        assert_eq!(values["AWSSecretKey"], "bar");
        assert_eq!(values.len(), 2);
    }
}
