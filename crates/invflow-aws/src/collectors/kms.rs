use super::{Flag, format_time, join, standard_tags};
use crate::error::{AwsError, Result};
use async_trait::async_trait;
use aws_sdk_kms::Client as KmsClient;
use aws_sdk_kms::types::{AliasListEntry, KeyManagerType, KeyMetadata, MultiRegionKeyType};
use invflow_core::{RawTags, ResourceCollector, RowBuilder, SheetWriter, TagNormalizer};
use std::collections::HashMap;

const COLUMNS: [&str; 15] = [
    "Key ID",
    "Key ARN",
    "Description",
    "Key Usage",
    "Key State",
    "Key Manager",
    "Customer Master Key Spec",
    "Key Origin",
    "Creation Date",
    "Deletion Date",
    "Multi-Region",
    "Multi-Region Primary",
    "Enabled",
    "Key Rotation Status",
    "Alias Names",
];

/// Customer managed KMS keys; AWS managed keys are skipped
pub struct KmsKeyCollector {
    kms: KmsClient,
}

impl KmsKeyCollector {
    pub fn new(kms: KmsClient) -> Self {
        Self { kms }
    }

    async fn run(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> Result<()> {
        let aliases = self.aliases().await;

        let mut marker: Option<String> = None;
        loop {
            let output = self
                .kms
                .list_keys()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| AwsError::api("ListKeys", e))?;

            for entry in output.keys() {
                let Some(key_id) = entry.key_id() else {
                    continue;
                };
                let metadata = match self.kms.describe_key().key_id(key_id).send().await {
                    Ok(described) => described.key_metadata().cloned(),
                    Err(e) => {
                        tracing::warn!("Could not get details for key {}: {}", key_id, e);
                        None
                    }
                };
                let Some(metadata) = metadata else {
                    continue;
                };
                if metadata.key_manager() == Some(&KeyManagerType::Aws) {
                    continue;
                }

                let rotation = self.rotation_status(key_id).await;
                let key_aliases = aliases.get(key_id).map(Vec::as_slice).unwrap_or_default();
                let raw_tags = self.tags(key_id).await;
                sheet.append_row(row(key_id, &metadata, rotation, key_aliases, &raw_tags, tags));
            }

            match output.next_marker() {
                Some(next) if output.truncated().is_set() && !next.is_empty() => {
                    marker = Some(next.to_string())
                }
                _ => break,
            }
        }
        Ok(())
    }

    /// Alias names by target key id; empty when the aliases cannot be listed
    async fn aliases(&self) -> HashMap<String, Vec<String>> {
        let mut entries: Vec<AliasListEntry> = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let output = match self.kms.list_aliases().set_marker(marker.take()).send().await {
                Ok(output) => output,
                Err(e) => {
                    tracing::debug!("ListAliases failed: {}", e);
                    break;
                }
            };
            entries.extend(output.aliases().iter().cloned());

            match output.next_marker() {
                Some(next) if output.truncated().is_set() && !next.is_empty() => {
                    marker = Some(next.to_string())
                }
                _ => break,
            }
        }
        aliases_by_key(&entries)
    }

    async fn rotation_status(&self, key_id: &str) -> Option<&'static str> {
        match self.kms.get_key_rotation_status().key_id(key_id).send().await {
            Ok(output) => Some(if output.key_rotation_enabled().is_set() {
                "Enabled"
            } else {
                "Disabled"
            }),
            // Asymmetric and imported keys do not support rotation
            Err(_) => None,
        }
    }

    async fn tags(&self, key_id: &str) -> RawTags {
        match self.kms.list_resource_tags().key_id(key_id).send().await {
            Ok(output) => standard_tags(output.tags(), |t| t.tag_key(), |t| t.tag_value()),
            Err(e) => {
                tracing::debug!("ListResourceTags failed for {}: {}", key_id, e);
                RawTags::None
            }
        }
    }
}

#[async_trait]
impl ResourceCollector for KmsKeyCollector {
    fn id(&self) -> &str {
        "kms"
    }

    fn sheet_name(&self) -> &str {
        "KMS Keys"
    }

    fn columns(&self) -> Vec<String> {
        COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    async fn collect(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> invflow_core::Result<()> {
        Ok(self.run(sheet, tags).await?)
    }
}

fn aliases_by_key(entries: &[AliasListEntry]) -> HashMap<String, Vec<String>> {
    let mut by_key: HashMap<String, Vec<String>> = HashMap::new();
    for entry in entries {
        if let (Some(key), Some(name)) = (entry.target_key_id(), entry.alias_name()) {
            by_key.entry(key.to_string()).or_default().push(name.to_string());
        }
    }
    by_key
}

fn row(
    key_id: &str,
    metadata: &KeyMetadata,
    rotation: Option<&str>,
    aliases: &[String],
    raw_tags: &RawTags,
    tags: &TagNormalizer,
) -> RowBuilder {
    let primary = metadata
        .multi_region_configuration()
        .and_then(|c| c.multi_region_key_type())
        == Some(&MultiRegionKeyType::Primary);

    RowBuilder::new()
        .cell(key_id)
        .cell(metadata.arn())
        .cell(metadata.description().filter(|d| !d.is_empty()))
        .cell(metadata.key_usage().map(|u| u.as_str()))
        .cell(metadata.key_state().map(|s| s.as_str()))
        .cell(metadata.key_manager().map(|m| m.as_str()))
        .cell(metadata.key_spec().map(|s| s.as_str()))
        .cell(metadata.origin().map(|o| o.as_str()))
        .cell(format_time(metadata.creation_date()))
        .cell(format_time(metadata.deletion_date()))
        .cell(metadata.multi_region().is_set())
        .cell(primary)
        .cell(metadata.enabled().is_set())
        .cell(rotation)
        .cell(join(aliases))
        .tags(tags, raw_tags)
}
