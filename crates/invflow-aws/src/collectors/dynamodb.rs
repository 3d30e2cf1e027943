use super::{Flag, format_time, standard_tags};
use crate::error::{AwsError, Result};
use async_trait::async_trait;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_dynamodb::types::{KeyType, PointInTimeRecoveryStatus, TableDescription};
use invflow_core::{CellValue, RawTags, ResourceCollector, RowBuilder, SheetWriter, TagNormalizer};

const COLUMNS: [&str; 17] = [
    "Table Name",
    "Status",
    "Creation Time",
    "Item Count",
    "Table Size (Bytes)",
    "Read Capacity Units",
    "Write Capacity Units",
    "Billing Mode",
    "Table Class",
    "Partition Key",
    "Sort Key",
    "Global Secondary Indexes",
    "Local Secondary Indexes",
    "Stream Enabled",
    "Point-in-time Recovery",
    "Encryption Type",
    "ARN",
];

const ON_DEMAND: &str = "On-Demand";

/// DynamoDB tables; a table that cannot be described is skipped
pub struct DynamoDbTableCollector {
    dynamodb: DynamoDbClient,
}

impl DynamoDbTableCollector {
    pub fn new(dynamodb: DynamoDbClient) -> Self {
        Self { dynamodb }
    }

    async fn run(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> Result<()> {
        let mut start: Option<String> = None;
        loop {
            let output = self
                .dynamodb
                .list_tables()
                .set_exclusive_start_table_name(start.take())
                .send()
                .await
                .map_err(|e| AwsError::api("ListTables", e))?;

            for name in output.table_names() {
                let table = match self.dynamodb.describe_table().table_name(name).send().await {
                    Ok(described) => described.table().cloned(),
                    Err(e) => {
                        tracing::warn!("Error processing table {}: {}", name, e);
                        None
                    }
                };
                let Some(table) = table else {
                    continue;
                };

                let pitr = self.point_in_time_recovery(name).await;
                let raw_tags = match table.table_arn() {
                    Some(arn) => self.tags(arn).await,
                    None => RawTags::None,
                };
                sheet.append_row(row(&table, pitr, &raw_tags, tags));
            }

            match output.last_evaluated_table_name() {
                Some(last) if !last.is_empty() => start = Some(last.to_string()),
                _ => break,
            }
        }
        Ok(())
    }

    async fn point_in_time_recovery(&self, table: &str) -> Option<bool> {
        match self
            .dynamodb
            .describe_continuous_backups()
            .table_name(table)
            .send()
            .await
        {
            Ok(output) => Some(
                output
                    .continuous_backups_description()
                    .and_then(|d| d.point_in_time_recovery_description())
                    .and_then(|p| p.point_in_time_recovery_status())
                    == Some(&PointInTimeRecoveryStatus::Enabled),
            ),
            Err(e) => {
                tracing::debug!("DescribeContinuousBackups failed for {}: {}", table, e);
                None
            }
        }
    }

    async fn tags(&self, arn: &str) -> RawTags {
        match self.dynamodb.list_tags_of_resource().resource_arn(arn).send().await {
            Ok(output) => standard_tags(output.tags(), |t| t.key(), |t| t.value()),
            Err(e) => {
                tracing::debug!("ListTagsOfResource failed for {}: {}", arn, e);
                RawTags::None
            }
        }
    }
}

#[async_trait]
impl ResourceCollector for DynamoDbTableCollector {
    fn id(&self) -> &str {
        "dynamodb"
    }

    fn sheet_name(&self) -> &str {
        "DynamoDB Tables"
    }

    fn columns(&self) -> Vec<String> {
        COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    async fn collect(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> invflow_core::Result<()> {
        Ok(self.run(sheet, tags).await?)
    }
}

/// Provisioned units, or `On-Demand` when the table reports none
fn capacity(units: Option<i64>) -> CellValue {
    match units {
        Some(units) => units.into(),
        None => ON_DEMAND.into(),
    }
}

fn key_attribute(table: &TableDescription, kind: KeyType) -> Option<&str> {
    table
        .key_schema()
        .iter()
        .find(|k| *k.key_type() == kind)
        .map(|k| k.attribute_name())
}

fn billing_mode(table: &TableDescription) -> Option<&str> {
    match table.billing_mode_summary().and_then(|s| s.billing_mode()) {
        Some(mode) => Some(mode.as_str()),
        None if table.provisioned_throughput().is_some() => Some("PROVISIONED"),
        None => None,
    }
}

fn row(
    table: &TableDescription,
    pitr: Option<bool>,
    raw_tags: &RawTags,
    tags: &TagNormalizer,
) -> RowBuilder {
    let throughput = table.provisioned_throughput();

    RowBuilder::new()
        .cell(table.table_name())
        .cell(table.table_status().map(|s| s.as_str()))
        .cell(format_time(table.creation_date_time()))
        .cell(table.item_count().unwrap_or(0))
        .cell(table.table_size_bytes().unwrap_or(0))
        .cell(capacity(throughput.and_then(|t| t.read_capacity_units())))
        .cell(capacity(throughput.and_then(|t| t.write_capacity_units())))
        .cell(billing_mode(table))
        .cell(
            table
                .table_class_summary()
                .and_then(|c| c.table_class())
                .map(|c| c.as_str())
                .unwrap_or("STANDARD"),
        )
        .cell(key_attribute(table, KeyType::Hash))
        .cell(key_attribute(table, KeyType::Range))
        .cell(table.global_secondary_indexes().len())
        .cell(table.local_secondary_indexes().len())
        .cell(
            table
                .stream_specification()
                .map(|s| s.stream_enabled().is_set())
                .unwrap_or(false),
        )
        .cell(pitr)
        .cell(
            table
                .sse_description()
                .and_then(|s| s.sse_type())
                .map(|t| t.as_str()),
        )
        .cell(table.table_arn())
        .tags(tags, raw_tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::types::{
        BillingMode, BillingModeSummary, KeySchemaElement, ProvisionedThroughputDescription,
    };

    fn key(name: &str, kind: KeyType) -> KeySchemaElement {
        KeySchemaElement::builder()
            .attribute_name(name)
            .key_type(kind)
            .build()
            .unwrap()
    }

    #[test]
    fn test_on_demand_table() {
        let table = TableDescription::builder()
            .table_name("sessions")
            .billing_mode_summary(
                BillingModeSummary::builder()
                    .billing_mode(BillingMode::PayPerRequest)
                    .build(),
            )
            .key_schema(key("user_id", KeyType::Hash))
            .build();

        let normalizer = TagNormalizer::new(["Name"]);
        let row = row(&table, Some(true), &RawTags::None, &normalizer).build();

        assert_eq!(row.len(), COLUMNS.len() + 2);
        assert_eq!(row[0], "sessions");
        assert_eq!(row[3], "0");
        assert_eq!(row[5], "On-Demand");
        assert_eq!(row[7], "PAY_PER_REQUEST");
        assert_eq!(row[8], "STANDARD");
        assert_eq!(row[9], "user_id");
        assert_eq!(row[10], "N/A");
        assert_eq!(row[13], "No");
        assert_eq!(row[14], "Yes");
    }

    #[test]
    fn test_provisioned_table() {
        let table = TableDescription::builder()
            .table_name("orders")
            .provisioned_throughput(
                ProvisionedThroughputDescription::builder()
                    .read_capacity_units(5)
                    .write_capacity_units(10)
                    .build(),
            )
            .key_schema(key("order_id", KeyType::Hash))
            .key_schema(key("created_at", KeyType::Range))
            .build();

        assert_eq!(billing_mode(&table), Some("PROVISIONED"));
        assert_eq!(key_attribute(&table, KeyType::Range), Some("created_at"));

        let normalizer = TagNormalizer::new(["Name"]);
        let row = row(&table, None, &RawTags::None, &normalizer).build();
        assert_eq!(row[5], "5");
        assert_eq!(row[6], "10");
        assert_eq!(row[14], "N/A");
    }

    #[test]
    fn test_billing_mode_unknown() {
        let table = TableDescription::builder().table_name("bare").build();
        assert_eq!(billing_mode(&table), None);
    }
}
