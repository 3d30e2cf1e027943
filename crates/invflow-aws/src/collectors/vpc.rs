use super::{name_tag, standard_tags};
use crate::error::{AwsError, Result};
use async_trait::async_trait;
use aws_sdk_ec2::Client as Ec2Client;
use invflow_core::{ResourceCollector, RowBuilder, SheetWriter, TagNormalizer};

/// One row per VPC in the region
pub struct VpcSummaryCollector {
    ec2: Ec2Client,
    region: String,
}

impl VpcSummaryCollector {
    pub fn new(ec2: Ec2Client, region: impl Into<String>) -> Self {
        Self {
            ec2,
            region: region.into(),
        }
    }

    async fn run(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> Result<()> {
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .ec2
                .describe_vpcs()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| AwsError::api("DescribeVpcs", e))?;

            for vpc in output.vpcs() {
                let vpc_tags = vpc.tags();
                sheet.append_row(
                    RowBuilder::new()
                        .cell(vpc.vpc_id())
                        .cell(name_tag(vpc_tags, |t| t.key(), |t| t.value()))
                        .cell(vpc.cidr_block())
                        .cell(vpc.state().map(|s| s.as_str()))
                        .cell(vpc.is_default().unwrap_or(false))
                        .cell(self.region.as_str())
                        .tags(tags, &standard_tags(vpc_tags, |t| t.key(), |t| t.value())),
                );
            }

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceCollector for VpcSummaryCollector {
    fn id(&self) -> &str {
        "vpc"
    }

    fn sheet_name(&self) -> &str {
        "VPC Summary"
    }

    fn columns(&self) -> Vec<String> {
        ["VPC ID", "VPC Name", "CIDR Block", "State", "Default VPC", "Region"]
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    async fn collect(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> invflow_core::Result<()> {
        Ok(self.run(sheet, tags).await?)
    }
}
