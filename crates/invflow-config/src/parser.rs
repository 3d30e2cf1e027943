//! KDL parser for `invflow.kdl`

use crate::error::{ConfigError, Result};
use crate::{ExportConfig, StyleConfig};
use kdl::{KdlDocument, KdlNode};
use std::path::PathBuf;

/// Parse a config document. Nodes that are not set keep their defaults.
pub fn parse_config_str(content: &str) -> Result<ExportConfig> {
    let doc: KdlDocument = content.parse()?;
    let mut config = ExportConfig::default();

    for node in doc.nodes() {
        match node.name().value() {
            "profiles" => config.profiles = string_args(node),
            "common-tags" => config.common_tags = string_args(node),
            "workers" => config.max_workers = usize_arg(node)?,
            "profile-workers" => config.max_profile_workers = usize_arg(node)?,
            "parallel-profiles" => config.parallel_profiles = bool_arg(node)?,
            "region" => config.region = Some(string_arg(node)?),
            "services" => config.services = string_args(node),
            "output" => {
                if let Some(children) = node.children() {
                    for child in children.nodes() {
                        match child.name().value() {
                            "prefix" => config.output_prefix = string_arg(child)?,
                            "dir" => config.output_dir = PathBuf::from(string_arg(child)?),
                            _ => {}
                        }
                    }
                }
            }
            "style" => {
                if let Some(children) = node.children() {
                    parse_style(children, &mut config.style)?;
                }
            }
            _ => {
                // Unknown nodes are ignored so newer files still load
            }
        }
    }

    Ok(config)
}

fn parse_style(doc: &KdlDocument, style: &mut StyleConfig) -> Result<()> {
    for child in doc.nodes() {
        match child.name().value() {
            "header-bold" => style.header_bold = bool_arg(child)?,
            "header-font-color" => style.header_font_color = string_arg(child)?,
            "header-font-size" => style.header_font_size = u32_arg(child)?,
            "header-fill" => style.header_fill = string_arg(child)?,
            "max-column-width" => style.max_column_width = u32_arg(child)?,
            _ => {}
        }
    }
    Ok(())
}

/// All positional string arguments of a node
fn string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(str::to_string)
        .collect()
}

fn string_arg(node: &KdlNode) -> Result<String> {
    node.entries()
        .first()
        .and_then(|e| e.value().as_string())
        .map(str::to_string)
        .ok_or_else(|| invalid(node, "a string"))
}

fn integer_arg(node: &KdlNode) -> Result<i128> {
    node.entries()
        .first()
        .and_then(|e| e.value().as_integer())
        .ok_or_else(|| invalid(node, "an integer"))
}

fn usize_arg(node: &KdlNode) -> Result<usize> {
    let value = integer_arg(node)?;
    usize::try_from(value).map_err(|_| invalid(node, "a non-negative integer"))
}

fn u32_arg(node: &KdlNode) -> Result<u32> {
    let value = integer_arg(node)?;
    u32::try_from(value).map_err(|_| invalid(node, "a non-negative integer"))
}

fn bool_arg(node: &KdlNode) -> Result<bool> {
    node.entries()
        .first()
        .and_then(|e| e.value().as_bool())
        .ok_or_else(|| invalid(node, "a boolean"))
}

fn invalid(node: &KdlNode, expected: &str) -> ConfigError {
    ConfigError::Invalid(format!("'{}' expects {}", node.name().value(), expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_document_gives_defaults() {
        let config = parse_config_str("").unwrap();
        assert_eq!(config, ExportConfig::default());
    }

    #[test]
    fn test_parse_full_document() {
        let kdl = r#"
profiles "default" "production" "staging"
common-tags "Name" "Environment"
workers 8
profile-workers 3
parallel-profiles #true
region "ap-southeast-1"
services "ec2" "s3"

output {
    prefix "inventory"
    dir "outputs"
}

style {
    header-bold #false
    header-font-color "000000"
    header-font-size 11
    header-fill "DDEBF7"
    max-column-width 80
}
"#;
        let config = parse_config_str(kdl).unwrap();

        assert_eq!(config.profiles, vec!["default", "production", "staging"]);
        assert_eq!(config.common_tags, vec!["Name", "Environment"]);
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.max_profile_workers, 3);
        assert!(config.parallel_profiles);
        assert_eq!(config.region.as_deref(), Some("ap-southeast-1"));
        assert_eq!(config.services, vec!["ec2", "s3"]);
        assert_eq!(config.output_prefix, "inventory");
        assert_eq!(config.output_dir, PathBuf::from("outputs"));
        assert!(!config.style.header_bold);
        assert_eq!(config.style.header_font_color, "000000");
        assert_eq!(config.style.header_font_size, 11);
        assert_eq!(config.style.header_fill, "DDEBF7");
        assert_eq!(config.style.max_column_width, 80);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_document_keeps_defaults() {
        let config = parse_config_str("workers 2").unwrap();
        assert_eq!(config.max_workers, 2);
        assert_eq!(config.output_prefix, "aws_resources");
        assert_eq!(config.style, StyleConfig::default());
    }

    #[test]
    fn test_parse_wrong_type() {
        let result = parse_config_str(r#"workers "many""#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_parse_negative_workers() {
        let result = parse_config_str("workers -1");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_parse_unknown_nodes_are_ignored() {
        let config = parse_config_str("future-option 1\nworkers 7").unwrap();
        assert_eq!(config.max_workers, 7);
    }

    #[test]
    fn test_parse_syntax_error() {
        let result = parse_config_str("output {");
        assert!(matches!(result, Err(ConfigError::KdlParse(_))));
    }
}
