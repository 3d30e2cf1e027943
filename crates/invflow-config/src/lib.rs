//! invflow configuration
//!
//! The whole run is driven by one immutable [`ExportConfig`]. It is read from
//! a KDL file when one can be found, otherwise built-in defaults are used:
//!
//! ```kdl
//! profiles "default" "production"
//! common-tags "Name" "Environment" "Project"
//! workers 5
//! profile-workers 2
//! parallel-profiles #false
//! region "ap-southeast-1"
//! services "ec2" "lambda"
//!
//! output {
//!     prefix "aws_resources"
//!     dir "outputs"
//! }
//!
//! style {
//!     header-bold #true
//!     header-font-color "FFFFFF"
//!     header-font-size 12
//!     header-fill "366092"
//!     max-column-width 60
//! }
//! ```

pub mod error;
mod parser;

pub use error::*;
pub use parser::parse_config_str;

use std::path::{Path, PathBuf};

/// Environment variable that points directly at a config file
pub const CONFIG_PATH_ENV: &str = "INVFLOW_CONFIG_PATH";

const CONFIG_CANDIDATES: [&str; 4] = [
    "invflow.local.kdl",
    ".invflow.local.kdl",
    "invflow.kdl",
    ".invflow.kdl",
];

/// Run-wide export settings
#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    /// Profiles exported when none are given on the command line
    pub profiles: Vec<String>,

    /// Tag keys promoted to their own column, in column order
    pub common_tags: Vec<String>,

    /// Concurrent resource tasks within one profile
    pub max_workers: usize,

    /// Concurrent profiles when `parallel_profiles` is set
    pub max_profile_workers: usize,

    /// Export profiles concurrently instead of one after another
    pub parallel_profiles: bool,

    /// File name prefix of every output document
    pub output_prefix: String,

    /// Directory the output documents are written to
    pub output_dir: PathBuf,

    /// Region override; otherwise the profile's region is used
    pub region: Option<String>,

    /// Enabled resource category ids (empty = all)
    pub services: Vec<String>,

    pub style: StyleConfig,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            profiles: vec!["default".to_string()],
            common_tags: [
                "Name",
                "Environment",
                "Project",
                "Owner",
                "CostCenter",
                "Application",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            max_workers: 5,
            max_profile_workers: 2,
            parallel_profiles: false,
            output_prefix: "aws_resources".to_string(),
            output_dir: PathBuf::from("."),
            region: None,
            services: Vec::new(),
            style: StyleConfig::default(),
        }
    }
}

impl ExportConfig {
    /// Load the config from the first file found by [`find_config_file`],
    /// falling back to defaults when there is none.
    pub fn load() -> Result<Self> {
        match find_config_file()? {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Load the config from an explicit path
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        parse_config_str(&content)
    }

    /// Check the invariants the exporter relies on
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.max_profile_workers == 0 {
            return Err(ConfigError::Invalid(
                "profile-workers must be at least 1".into(),
            ));
        }
        if self.common_tags.iter().any(|t| t.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "common-tags must not contain empty names".into(),
            ));
        }
        if self.output_prefix.is_empty() {
            return Err(ConfigError::Invalid("output prefix must not be empty".into()));
        }
        self.style.validate()
    }

    /// Whether a resource category takes part in the export
    pub fn is_service_enabled(&self, id: &str) -> bool {
        self.services.is_empty() || self.services.iter().any(|s| s.eq_ignore_ascii_case(id))
    }
}

/// Header styling and column sizing of the output document
#[derive(Debug, Clone, PartialEq)]
pub struct StyleConfig {
    pub header_bold: bool,
    /// RGB hex, e.g. `FFFFFF`
    pub header_font_color: String,
    pub header_font_size: u32,
    /// RGB hex of the solid header fill
    pub header_fill: String,
    /// Upper bound of auto-sized column widths
    pub max_column_width: u32,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            header_bold: true,
            header_font_color: "FFFFFF".to_string(),
            header_font_size: 12,
            header_fill: "366092".to_string(),
            max_column_width: 60,
        }
    }
}

impl StyleConfig {
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("header-font-color", &self.header_font_color),
            ("header-fill", &self.header_fill),
        ] {
            if parse_rgb(value).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be 6 hex digits, got '{value}'"
                )));
            }
        }
        if self.header_font_size == 0 {
            return Err(ConfigError::Invalid("header-font-size must be positive".into()));
        }
        if self.max_column_width == 0 {
            return Err(ConfigError::Invalid("max-column-width must be positive".into()));
        }
        Ok(())
    }

    pub fn header_font_rgb(&self) -> u32 {
        parse_rgb(&self.header_font_color).unwrap_or(0xFFFFFF)
    }

    pub fn header_fill_rgb(&self) -> u32 {
        parse_rgb(&self.header_fill).unwrap_or(0x366092)
    }
}

/// Parse `RRGGBB` (optionally prefixed with `#`)
pub fn parse_rgb(value: &str) -> Option<u32> {
    let hex = value.strip_prefix('#').unwrap_or(value);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

/// Global config directory (`~/.config/invflow`)
pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("invflow"))
}

/// Find the invflow config file
///
/// Search order:
/// 1. `INVFLOW_CONFIG_PATH` environment variable
/// 2. Current directory: invflow.local.kdl, .invflow.local.kdl, invflow.kdl, .invflow.kdl
/// 3. ~/.config/invflow/invflow.kdl
///
/// Returns `Ok(None)` when no file exists; defaults apply in that case.
pub fn find_config_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::FileNotFound(path));
    }

    let current_dir = std::env::current_dir()?;
    for filename in &CONFIG_CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    if let Some(config_dir) = get_config_dir() {
        let global_config = config_dir.join("invflow.kdl");
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_default_config_is_valid() {
        let config = ExportConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.common_tags.len(), 6);
        assert_eq!(config.max_workers, 5);
        assert!(!config.parallel_profiles);
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = ExportConfig {
            max_workers: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_bad_color() {
        let mut config = ExportConfig::default();
        config.style.header_fill = "blue".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_blank_common_tag() {
        let mut config = ExportConfig::default();
        config.common_tags.push("  ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_rgb() {
        assert_eq!(parse_rgb("FFFFFF"), Some(0xFFFFFF));
        assert_eq!(parse_rgb("#366092"), Some(0x366092));
        assert_eq!(parse_rgb("12345"), None);
        assert_eq!(parse_rgb("GGGGGG"), None);
    }

    #[test]
    fn test_service_filter() {
        let mut config = ExportConfig::default();
        assert!(config.is_service_enabled("ec2"));

        config.services = vec!["EC2".to_string(), "lambda".to_string()];
        assert!(config.is_service_enabled("ec2"));
        assert!(config.is_service_enabled("lambda"));
        assert!(!config.is_service_enabled("s3"));
    }

    #[test]
    #[serial]
    fn test_find_config_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("invflow.kdl"), "workers 3").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_config_file().unwrap();
        assert!(result.unwrap().ends_with("invflow.kdl"));

        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    #[serial]
    fn test_find_config_file_local_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("invflow.kdl"), "workers 3").unwrap();
        fs::write(temp_dir.path().join("invflow.local.kdl"), "workers 4").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_config_file().unwrap().unwrap();
        assert!(result.ends_with("invflow.local.kdl"));

        let config = ExportConfig::load().unwrap();
        assert_eq!(config.max_workers, 4);

        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    #[serial]
    fn test_find_config_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.kdl");
        fs::write(&config_path, "output { prefix \"custom\"; }").unwrap();

        unsafe {
            std::env::set_var(CONFIG_PATH_ENV, config_path.to_str().unwrap());
        }

        let result = find_config_file().unwrap();
        assert_eq!(result, Some(config_path));
        let config = ExportConfig::load().unwrap();
        assert_eq!(config.output_prefix, "custom");

        unsafe {
            std::env::remove_var(CONFIG_PATH_ENV);
        }
    }

    #[test]
    #[serial]
    fn test_env_var_pointing_nowhere_is_an_error() {
        unsafe {
            std::env::set_var(CONFIG_PATH_ENV, "/nonexistent/invflow.kdl");
        }

        let result = find_config_file();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));

        unsafe {
            std::env::remove_var(CONFIG_PATH_ENV);
        }
    }

    #[test]
    fn test_from_file_missing() {
        let result = ExportConfig::from_file("/nonexistent/invflow.kdl");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }
}
