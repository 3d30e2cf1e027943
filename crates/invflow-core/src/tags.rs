//! Tag normalization
//!
//! Services hand back tags in different shapes. [`RawTags`] names each shape,
//! [`RawTags::normalize`] turns any of them into [`TagPair`]s, and
//! [`TagNormalizer`] splits the pairs into the configured common tags and one
//! `key=value` summary of everything else.

use crate::sanitize::{NOT_AVAILABLE, sanitize};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Header of the column that folds all non-common tags
pub const ADDITIONAL_TAGS_COLUMN: &str = "Additional_Tags";

/// Header prefix of every common tag column
pub const COMMON_TAG_COLUMN_PREFIX: &str = "Tag_";

/// Canonical tag: non-empty key, possibly empty value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagPair {
    pub key: String,
    pub value: String,
}

impl TagPair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// `{"Key": ..., "Value": ...}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardTag {
    #[serde(rename = "Key", default)]
    pub key: Option<String>,
    #[serde(rename = "Value", default)]
    pub value: Option<String>,
}

/// `{"key": ..., "value": ...}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowercaseTag {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

/// Tags as a service returned them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RawTags {
    /// The resource carries no tag collection at all
    #[default]
    None,
    Standard(Vec<StandardTag>),
    /// Rendered in key order
    Map(BTreeMap<String, String>),
    LowercaseFields(Vec<LowercaseTag>),
}

impl RawTags {
    /// Convert to canonical pairs, dropping entries without a key
    pub fn normalize(&self) -> Vec<TagPair> {
        match self {
            RawTags::None => Vec::new(),
            RawTags::Standard(tags) => tags
                .iter()
                .filter_map(|t| pair(t.key.as_deref(), t.value.as_deref()))
                .collect(),
            RawTags::Map(tags) => tags
                .iter()
                .filter_map(|(k, v)| pair(Some(k.as_str()), Some(v.as_str())))
                .collect(),
            RawTags::LowercaseFields(tags) => tags
                .iter()
                .filter_map(|t| pair(t.key.as_deref(), t.value.as_deref()))
                .collect(),
        }
    }
}

impl From<HashMap<String, String>> for RawTags {
    fn from(tags: HashMap<String, String>) -> Self {
        RawTags::Map(tags.into_iter().collect())
    }
}

impl From<BTreeMap<String, String>> for RawTags {
    fn from(tags: BTreeMap<String, String>) -> Self {
        RawTags::Map(tags)
    }
}

fn pair(key: Option<&str>, value: Option<&str>) -> Option<TagPair> {
    let key = key.filter(|k| !k.is_empty())?;
    Some(TagPair::new(key, value.unwrap_or_default()))
}

/// Resolved common tags, in configured order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonTagSet {
    entries: Vec<(String, String)>,
}

impl CommonTagSet {
    /// Value of a configured common tag (`N/A` when the resource lacks it)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Splits tags into configured common columns and an additional-tags summary
#[derive(Debug, Clone)]
pub struct TagNormalizer {
    common_tags: Vec<String>,
    lowered: Vec<String>,
}

impl TagNormalizer {
    pub fn new<I, S>(common_tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let common_tags: Vec<String> = common_tags.into_iter().map(Into::into).collect();
        let lowered = common_tags.iter().map(|t| t.to_lowercase()).collect();
        Self {
            common_tags,
            lowered,
        }
    }

    pub fn common_tags(&self) -> &[String] {
        &self.common_tags
    }

    /// Tag column headers appended to every category's header row
    pub fn columns(&self) -> Vec<String> {
        self.common_tags
            .iter()
            .map(|t| format!("{}{}", COMMON_TAG_COLUMN_PREFIX, t))
            .chain(std::iter::once(ADDITIONAL_TAGS_COLUMN.to_string()))
            .collect()
    }

    /// Resolve common tags (case-insensitive, last entry wins) and render the
    /// remaining tags as `key=value, ...`
    pub fn extract(&self, tags: &[TagPair]) -> (CommonTagSet, String) {
        if tags.is_empty() {
            let entries = self
                .common_tags
                .iter()
                .map(|t| (t.clone(), NOT_AVAILABLE.to_string()))
                .collect();
            return (CommonTagSet { entries }, NOT_AVAILABLE.to_string());
        }

        let mut lookup: HashMap<String, &str> = HashMap::with_capacity(tags.len());
        for tag in tags {
            lookup.insert(tag.key.to_lowercase(), tag.value.as_str());
        }

        let entries = self
            .common_tags
            .iter()
            .zip(&self.lowered)
            .map(|(name, lowered)| {
                let value = lookup.get(lowered).copied().unwrap_or(NOT_AVAILABLE);
                (name.clone(), value.to_string())
            })
            .collect();

        let additional: Vec<String> = tags
            .iter()
            .filter(|t| !t.key.is_empty())
            .filter(|t| !self.lowered.contains(&t.key.to_lowercase()))
            .map(|t| format!("{}={}", t.key, t.value))
            .collect();

        let additional = if additional.is_empty() {
            NOT_AVAILABLE.to_string()
        } else {
            additional.join(", ")
        };

        (CommonTagSet { entries }, additional)
    }

    /// Sanitized tag cells: common values in configured order, then the
    /// additional-tags summary
    pub fn column_values(&self, tags: &[TagPair]) -> Vec<String> {
        let (common, additional) = self.extract(tags);
        common
            .iter()
            .map(|(_, value)| sanitize(value))
            .chain(std::iter::once(sanitize(additional)))
            .collect()
    }

    /// Shortcut for `column_values(&raw.normalize())`
    pub fn raw_column_values(&self, raw: &RawTags) -> Vec<String> {
        self.column_values(&raw.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> TagNormalizer {
        TagNormalizer::new(["Name", "Environment"])
    }

    #[test]
    fn test_columns() {
        assert_eq!(
            normalizer().columns(),
            vec!["Tag_Name", "Tag_Environment", "Additional_Tags"]
        );
    }

    #[test]
    fn test_empty_tags_short_circuit() {
        let (common, additional) = normalizer().extract(&[]);
        assert_eq!(common.get("Name"), Some("N/A"));
        assert_eq!(common.get("Environment"), Some("N/A"));
        assert_eq!(common.len(), 2);
        assert_eq!(additional, "N/A");
    }

    #[test]
    fn test_case_insensitive_common_match() {
        let tags = vec![TagPair::new("name", "a"), TagPair::new("ENVIRONMENT", "b")];
        let (common, additional) = normalizer().extract(&tags);
        assert_eq!(common.get("Name"), Some("a"));
        assert_eq!(common.get("Environment"), Some("b"));
        assert_eq!(additional, "N/A");
    }

    #[test]
    fn test_additional_tags_rendering() {
        let tags = vec![
            TagPair::new("Name", "web"),
            TagPair::new("Team", "data"),
            TagPair::new("Tier", ""),
        ];
        let (common, additional) = normalizer().extract(&tags);
        assert_eq!(common.get("Name"), Some("web"));
        assert_eq!(common.get("Environment"), Some("N/A"));
        assert_eq!(additional, "Team=data, Tier=");
    }

    #[test]
    fn test_empty_value_common_tag_is_kept() {
        let tags = vec![TagPair::new("Environment", "")];
        let (common, _) = normalizer().extract(&tags);
        assert_eq!(common.get("Environment"), Some(""));
    }

    #[test]
    fn test_last_entry_wins() {
        let tags = vec![TagPair::new("Name", "first"), TagPair::new("NAME", "second")];
        let (common, _) = normalizer().extract(&tags);
        assert_eq!(common.get("Name"), Some("second"));
    }

    #[test]
    fn test_malformed_tags_dropped() {
        let raw: Vec<StandardTag> = serde_json::from_str(
            r#"[{"Value": "orphan"}, {"Key": "", "Value": "x"}, {"Key": "Normal", "Value": "v"}]"#,
        )
        .unwrap();
        let pairs = RawTags::Standard(raw).normalize();
        assert_eq!(pairs, vec![TagPair::new("Normal", "v")]);

        let (_, additional) = normalizer().extract(&pairs);
        assert_eq!(additional, "Normal=v");
    }

    #[test]
    fn test_empty_key_pair_skipped_in_extract() {
        let tags = vec![TagPair::new("", "x"), TagPair::new("Owner", "me")];
        let (_, additional) = normalizer().extract(&tags);
        assert_eq!(additional, "Owner=me");
    }

    #[test]
    fn test_shapes_normalize_identically() {
        let standard: Vec<StandardTag> = serde_json::from_str(
            r#"[{"Key": "Environment", "Value": "prod"}, {"Key": "Name", "Value": "api"}, {"Key": "Team", "Value": "core"}]"#,
        )
        .unwrap();
        let map: BTreeMap<String, String> = serde_json::from_str(
            r#"{"Environment": "prod", "Name": "api", "Team": "core"}"#,
        )
        .unwrap();
        let lowercase: Vec<LowercaseTag> = serde_json::from_str(
            r#"[{"key": "Environment", "value": "prod"}, {"key": "Name", "value": "api"}, {"key": "Team", "value": "core"}]"#,
        )
        .unwrap();

        let n = normalizer();
        let a = n.extract(&RawTags::Standard(standard).normalize());
        let b = n.extract(&RawTags::Map(map).normalize());
        let c = n.extract(&RawTags::LowercaseFields(lowercase).normalize());

        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.1, "Team=core");
    }

    #[test]
    fn test_missing_value_becomes_empty() {
        let raw = RawTags::LowercaseFields(vec![LowercaseTag {
            key: Some("Flag".to_string()),
            value: None,
        }]);
        assert_eq!(raw.normalize(), vec![TagPair::new("Flag", "")]);
    }

    #[test]
    fn test_none_normalizes_to_empty() {
        assert!(RawTags::None.normalize().is_empty());
        let values = normalizer().raw_column_values(&RawTags::None);
        assert_eq!(values, vec!["N/A", "N/A", "N/A"]);
    }

    #[test]
    fn test_column_values_are_sanitized() {
        let tags = vec![TagPair::new("Name", "=cmd"), TagPair::new("Note", "a\nb")];
        let values = normalizer().column_values(&tags);
        assert_eq!(values, vec!["'=cmd", "N/A", "Note=a b"]);
    }
}
