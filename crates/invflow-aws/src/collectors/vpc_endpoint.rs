use super::network::{NetworkLookup, VpcDetails};
use super::{Flag, format_time, join, standard_tags};
use crate::error::{AwsError, Result};
use async_trait::async_trait;
use aws_sdk_ec2::Client as Ec2Client;
use aws_sdk_ec2::types::VpcEndpoint;
use invflow_core::{ResourceCollector, RowBuilder, SheetWriter, TagNormalizer};
use std::sync::Arc;

/// Policy documents are cut to this many characters
const POLICY_PREVIEW_LENGTH: usize = 100;

const COLUMNS: [&str; 14] = [
    "VPC Endpoint ID",
    "VPC Endpoint Type",
    "Service Name",
    "State",
    "VPC ID",
    "VPC Name",
    "VPC CIDR",
    "Route Table IDs",
    "Subnet IDs",
    "Security Group IDs",
    "Private DNS Enabled",
    "Policy Document",
    "Creation Timestamp",
    "DNS Entries",
];

/// Gateway and interface VPC endpoints
pub struct VpcEndpointCollector {
    ec2: Ec2Client,
    network: Arc<NetworkLookup>,
}

impl VpcEndpointCollector {
    pub fn new(ec2: Ec2Client, network: Arc<NetworkLookup>) -> Self {
        Self { ec2, network }
    }

    async fn run(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> Result<()> {
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .ec2
                .describe_vpc_endpoints()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| AwsError::api("DescribeVpcEndpoints", e))?;

            for endpoint in output.vpc_endpoints() {
                let vpc = match endpoint.vpc_id() {
                    Some(id) => self.network.vpc(id).await,
                    None => VpcDetails::default(),
                };
                sheet.append_row(row(endpoint, vpc, tags));
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
impl ResourceCollector for VpcEndpointCollector {
    fn id(&self) -> &str {
        "vpc-endpoint"
    }

    fn sheet_name(&self) -> &str {
        "VPC Endpoints"
    }

    fn columns(&self) -> Vec<String> {
        COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    async fn collect(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> invflow_core::Result<()> {
        Ok(self.run(sheet, tags).await?)
    }
}

fn policy_preview(policy: &str) -> String {
    if policy.chars().count() > POLICY_PREVIEW_LENGTH {
        let mut preview: String = policy.chars().take(POLICY_PREVIEW_LENGTH).collect();
        preview.push_str("...");
        preview
    } else {
        policy.to_string()
    }
}

fn row(endpoint: &VpcEndpoint, vpc: VpcDetails, tags: &TagNormalizer) -> RowBuilder {
    RowBuilder::new()
        .cell(endpoint.vpc_endpoint_id())
        .cell(endpoint.vpc_endpoint_type().map(|t| t.as_str()))
        .cell(endpoint.service_name())
        .cell(endpoint.state().map(|s| s.as_str()))
        .cell(endpoint.vpc_id())
        .cell(vpc.name)
        .cell(vpc.cidr)
        .cell(join(endpoint.route_table_ids()))
        .cell(join(endpoint.subnet_ids()))
        .cell(join(endpoint.groups().iter().filter_map(|g| g.group_id())))
        .cell(endpoint.private_dns_enabled().is_set())
        .cell(endpoint.policy_document().map(policy_preview))
        .cell(format_time(endpoint.creation_timestamp()))
        .cell(join(endpoint.dns_entries().iter().filter_map(|d| d.dns_name())))
        .tags(tags, &standard_tags(endpoint.tags(), |t| t.key(), |t| t.value()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ec2::types::{DnsEntry, SecurityGroupIdentifier, Tag, VpcEndpointType};

    #[test]
    fn test_policy_preview() {
        assert_eq!(policy_preview("{}"), "{}");
        let long = "x".repeat(150);
        let preview = policy_preview(&long);
        assert_eq!(preview.len(), POLICY_PREVIEW_LENGTH + 3);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn test_endpoint_row() {
        let endpoint = VpcEndpoint::builder()
            .vpc_endpoint_id("vpce-1")
            .vpc_endpoint_type(VpcEndpointType::Interface)
            .service_name("com.amazonaws.us-east-1.ssm")
            .vpc_id("vpc-1")
            .subnet_ids("subnet-a")
            .groups(SecurityGroupIdentifier::builder().group_id("sg-1").build())
            .private_dns_enabled(true)
            .dns_entries(DnsEntry::builder().dns_name("vpce-1.ssm.amazonaws.com").build())
            .tags(Tag::builder().key("Name").value("ssm").build())
            .build();

        let normalizer = TagNormalizer::new(["Name"]);
        let row = row(&endpoint, VpcDetails::default(), &normalizer).build();

        assert_eq!(row.len(), COLUMNS.len() + 2);
        assert_eq!(row[1], "Interface");
        assert_eq!(row[7], "N/A");
        assert_eq!(row[8], "subnet-a");
        assert_eq!(row[9], "sg-1");
        assert_eq!(row[10], "Yes");
        assert_eq!(row[11], "N/A");
        assert_eq!(row[13], "vpce-1.ssm.amazonaws.com");
        assert_eq!(row[14], "ssm");
    }
}
