//! Profile discovery from the shared AWS config files
//!
//! Reads section headers only; credentials are left to the SDK.

use crate::error::Result;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Profile the SDK falls back to without any file
pub const DEFAULT_PROFILE: &str = "default";

const CONFIG_FILE_ENV: &str = "AWS_CONFIG_FILE";
const CREDENTIALS_FILE_ENV: &str = "AWS_SHARED_CREDENTIALS_FILE";

/// `~/.aws/config` unless `AWS_CONFIG_FILE` is set
pub fn config_file_path() -> PathBuf {
    shared_file_path(CONFIG_FILE_ENV, "config")
}

/// `~/.aws/credentials` unless `AWS_SHARED_CREDENTIALS_FILE` is set
pub fn credentials_file_path() -> PathBuf {
    shared_file_path(CREDENTIALS_FILE_ENV, "credentials")
}

fn shared_file_path(env: &str, file_name: &str) -> PathBuf {
    std::env::var(env).map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".aws"))
            .unwrap_or_else(|| PathBuf::from(".aws"))
            .join(file_name)
    })
}

/// All profile names from both shared files, sorted and deduplicated
pub fn list_profiles() -> Result<Vec<String>> {
    let mut profiles = BTreeSet::new();
    profiles.extend(read_sections(&config_file_path(), FileKind::Config)?);
    profiles.extend(read_sections(&credentials_file_path(), FileKind::Credentials)?);
    Ok(profiles.into_iter().collect())
}

/// Whether `profile` can be used for an export
pub fn profile_exists(profile: &str) -> Result<bool> {
    if profile == DEFAULT_PROFILE {
        return Ok(true);
    }
    Ok(list_profiles()?.iter().any(|p| p == profile))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    /// `[default]` and `[profile name]`
    Config,
    /// `[name]`
    Credentials,
}

fn read_sections(path: &Path, kind: FileKind) -> Result<Vec<String>> {
    if !path.exists() {
        tracing::debug!("No AWS {:?} file at {}", kind, path.display());
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(parse_sections(&content, kind))
}

fn parse_sections(content: &str, kind: FileKind) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix('[')?.strip_suffix(']'))
        .filter_map(|section| {
            let section = section.trim();
            match kind {
                FileKind::Credentials => Some(section),
                FileKind::Config if section == DEFAULT_PROFILE => Some(section),
                FileKind::Config => section
                    .strip_prefix("profile")
                    .filter(|rest| rest.starts_with(char::is_whitespace))
                    .map(str::trim),
            }
        })
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const CONFIG: &str = "\
[default]
region = us-east-1

[profile production]
region = ap-southeast-1
# [profile commented]

[sso-session corp]
sso_region = us-east-1

[profile   staging  ]
output = json
";

    const CREDENTIALS: &str = "\
[default]
aws_access_key_id = AKIAEXAMPLE

[legacy]
aws_access_key_id = AKIAEXAMPLE2
";

    #[test]
    fn test_parse_config_sections() {
        let names = parse_sections(CONFIG, FileKind::Config);
        assert_eq!(names, vec!["default", "production", "staging"]);
    }

    #[test]
    fn test_parse_credentials_sections() {
        let names = parse_sections(CREDENTIALS, FileKind::Credentials);
        assert_eq!(names, vec!["default", "legacy"]);
    }

    #[test]
    fn test_profile_prefix_requires_separator() {
        let names = parse_sections("[profiler]\n[profile x]\n", FileKind::Config);
        assert_eq!(names, vec!["x"]);
    }

    #[test]
    #[serial]
    fn test_list_profiles_merges_both_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = temp_dir.path().join("config");
        let credentials = temp_dir.path().join("credentials");
        std::fs::write(&config, CONFIG).unwrap();
        std::fs::write(&credentials, CREDENTIALS).unwrap();

        temp_env::with_vars(
            [
                (CONFIG_FILE_ENV, Some(config.as_os_str())),
                (CREDENTIALS_FILE_ENV, Some(credentials.as_os_str())),
            ],
            || {
                let profiles = list_profiles().unwrap();
                assert_eq!(profiles, vec!["default", "legacy", "production", "staging"]);
                assert!(profile_exists("legacy").unwrap());
                assert!(!profile_exists("ghost").unwrap());
            },
        );
    }

    #[test]
    #[serial]
    fn test_missing_files_give_no_profiles() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("nope");

        temp_env::with_vars(
            [
                (CONFIG_FILE_ENV, Some(missing.as_os_str())),
                (CREDENTIALS_FILE_ENV, Some(missing.as_os_str())),
            ],
            || {
                assert!(list_profiles().unwrap().is_empty());
                assert!(profile_exists("default").unwrap());
            },
        );
    }
}
