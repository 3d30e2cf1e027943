use super::join;
use super::network::{NetworkLookup, VpcDetails};
use crate::error::{AwsError, Result};
use async_trait::async_trait;
use aws_sdk_lambda::Client as LambdaClient;
use aws_sdk_lambda::types::FunctionConfiguration;
use invflow_core::{RawTags, ResourceCollector, RowBuilder, SheetWriter, TagNormalizer};
use std::sync::Arc;

const COLUMNS: [&str; 14] = [
    "Function Name",
    "Runtime",
    "Memory (MB)",
    "Timeout (sec)",
    "Last Modified",
    "Handler",
    "VPC ID",
    "VPC Name",
    "VPC CIDR",
    "Subnet IDs",
    "Subnet Names",
    "Security Groups",
    "ARN",
    "Create Date",
];

/// Shown in the VPC ID column of functions outside any VPC
const NO_VPC: &str = "No VPC";

/// Lambda functions with their VPC placement; tags come from `ListTags`
pub struct LambdaFunctionCollector {
    lambda: LambdaClient,
    network: Arc<NetworkLookup>,
}

impl LambdaFunctionCollector {
    pub fn new(lambda: LambdaClient, network: Arc<NetworkLookup>) -> Self {
        Self { lambda, network }
    }

    async fn run(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> Result<()> {
        let mut marker: Option<String> = None;
        loop {
            let output = self
                .lambda
                .list_functions()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| AwsError::api("ListFunctions", e))?;

            for function in output.functions() {
                let row = self.row(function, tags).await;
                sheet.append_row(row);
            }

            match output.next_marker() {
                Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                _ => break,
            }
        }
        Ok(())
    }

    async fn row(&self, function: &FunctionConfiguration, tags: &TagNormalizer) -> RowBuilder {
        let vpc_config = function.vpc_config();
        let vpc_id = vpc_config
            .and_then(|c| c.vpc_id())
            .filter(|id| !id.is_empty());
        let subnet_ids: &[String] = vpc_config.map(|c| c.subnet_ids()).unwrap_or_default();
        let security_groups: &[String] = vpc_config
            .map(|c| c.security_group_ids())
            .unwrap_or_default();

        let (vpc, subnet_names) = match vpc_id {
            Some(id) => {
                let vpc = self.network.vpc(id).await;
                let mut names = Vec::with_capacity(subnet_ids.len());
                for subnet_id in subnet_ids {
                    let subnet = self.network.subnet(subnet_id).await;
                    names.push(subnet.name.unwrap_or_else(|| "N/A".to_string()));
                }
                (vpc, names)
            }
            None => (VpcDetails::default(), Vec::new()),
        };

        let raw_tags = match function.function_arn() {
            Some(arn) => self.tags(arn).await,
            None => RawTags::None,
        };

        RowBuilder::new()
            .cell(function.function_name())
            .cell(function.runtime().map(|r| r.as_str()))
            .cell(function.memory_size())
            .cell(function.timeout())
            .cell(function.last_modified())
            .cell(function.handler())
            .cell(vpc_id.unwrap_or(NO_VPC))
            .cell(vpc.name)
            .cell(vpc.cidr)
            .cell(join(subnet_ids))
            .cell(join(&subnet_names))
            .cell(join(security_groups))
            .cell(function.function_arn())
            .cell(function.last_modified().map(create_date))
            .tags(tags, &raw_tags)
    }

    /// Function tags; a failed lookup is treated as untagged
    async fn tags(&self, arn: &str) -> RawTags {
        match self.lambda.list_tags().resource(arn).send().await {
            Ok(output) => output
                .tags()
                .map(|t| RawTags::from(t.clone()))
                .unwrap_or_default(),
            Err(e) => {
                tracing::debug!("ListTags failed for {}: {}", arn, e);
                RawTags::None
            }
        }
    }
}

#[async_trait]
impl ResourceCollector for LambdaFunctionCollector {
    fn id(&self) -> &str {
        "lambda"
    }

    fn sheet_name(&self) -> &str {
        "Lambda Functions"
    }

    fn columns(&self) -> Vec<String> {
        COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    async fn collect(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> invflow_core::Result<()> {
        Ok(self.run(sheet, tags).await?)
    }
}

/// `2024-03-05T14:07:59.000+0000` -> `2024-03-05 14:07:59.000`
fn create_date(last_modified: &str) -> String {
    if !last_modified.contains('T') {
        return last_modified.to_string();
    }
    let replaced = last_modified.replacen('T', " ", 1);
    replaced
        .split('+')
        .next()
        .unwrap_or(replaced.as_str())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_date() {
        assert_eq!(
            create_date("2024-03-05T14:07:59.000+0000"),
            "2024-03-05 14:07:59.000"
        );
        assert_eq!(create_date("2024-03-05"), "2024-03-05");
    }
}
