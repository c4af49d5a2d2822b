use crate::config::schema::{RuleProfile, ValidationError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A rule profile that could not be read, parsed, or accepted.
///
/// `path` is `None` for profiles given as a string.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read rule profile {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("rule profile{} is not valid TOML: {source}", origin(.path))]
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },

    #[error("invalid rule profile{}: {source}", origin(.path))]
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

fn origin(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|path| format!(" ({})", path.display()))
        .unwrap_or_default()
}

fn parse(input: &str, path: Option<&Path>) -> Result<RuleProfile, ConfigError> {
    let located = || path.map(Path::to_path_buf);
    let profile: RuleProfile = toml_edit::de::from_str(input).map_err(|source| {
        ConfigError::Toml {
            path: located(),
            source,
        }
    })?;
    profile.validate().map_err(|source| ConfigError::Validation {
        path: located(),
        source,
    })?;
    Ok(profile)
}

pub fn load_from_str(input: &str) -> Result<RuleProfile, ConfigError> {
    parse(input, None)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<RuleProfile, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&contents, Some(path))
}

/// Loads the profile at `path`, or the standard profile when none is given.
pub fn load_or_standard(path: Option<&Path>) -> Result<RuleProfile, ConfigError> {
    match path {
        Some(path) => load_from_path(path),
        None => Ok(RuleProfile::standard()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_attached_to_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("rules.toml");
        fs::write(&file, "[[rules]]\ntype = \"rename-everything\"\n").unwrap();

        let err = load_from_path(&file).unwrap_err();
        assert!(matches!(err, ConfigError::Toml { path: Some(_), .. }));
        assert!(err.to_string().contains("rules.toml"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_from_path(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().starts_with("cannot read rule profile"));
    }

    #[test]
    fn string_profiles_carry_no_path() {
        let err = load_from_str("rules = []\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { path: None, .. }));
        assert_eq!(
            err.to_string(),
            "invalid rule profile: rule profile contains no rules"
        );
    }

    #[test]
    fn no_path_means_the_standard_profile() {
        assert_eq!(load_or_standard(None).unwrap(), RuleProfile::standard());
    }
}
