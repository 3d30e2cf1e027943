use super::network::{NetworkLookup, VpcDetails};
use super::{format_time, join};
use crate::error::{AwsError, Result};
use async_trait::async_trait;
use aws_sdk_eks::Client as EksClient;
use aws_sdk_eks::types::Cluster;
use invflow_core::{RawTags, ResourceCollector, RowBuilder, SheetWriter, TagNormalizer};
use std::sync::Arc;

const COLUMNS: [&str; 11] = [
    "Cluster Name",
    "Version",
    "Status",
    "Endpoint",
    "Created At",
    "VPC ID",
    "VPC Name",
    "VPC CIDR",
    "Subnet IDs",
    "Security Group IDs",
    "Role ARN",
];

/// EKS clusters; a cluster that cannot be described is skipped
pub struct EksClusterCollector {
    eks: EksClient,
    network: Arc<NetworkLookup>,
}

impl EksClusterCollector {
    pub fn new(eks: EksClient, network: Arc<NetworkLookup>) -> Self {
        Self { eks, network }
    }

    async fn run(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> Result<()> {
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .eks
                .list_clusters()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| AwsError::api("ListClusters", e))?;

            for name in output.clusters() {
                let described = match self.eks.describe_cluster().name(name).send().await {
                    Ok(described) => described,
                    Err(e) => {
                        tracing::warn!("DescribeCluster failed for {}: {}", name, e);
                        continue;
                    }
                };
                let Some(cluster) = described.cluster() else {
                    continue;
                };

                let vpc_id = cluster.resources_vpc_config().and_then(|c| c.vpc_id());
                let vpc = match vpc_id {
                    Some(id) => self.network.vpc(id).await,
                    None => VpcDetails::default(),
                };
                sheet.append_row(row(cluster, vpc, tags));
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
impl ResourceCollector for EksClusterCollector {
    fn id(&self) -> &str {
        "eks"
    }

    fn sheet_name(&self) -> &str {
        "EKS Clusters"
    }

    fn columns(&self) -> Vec<String> {
        COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    async fn collect(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> invflow_core::Result<()> {
        Ok(self.run(sheet, tags).await?)
    }
}

fn row(cluster: &Cluster, vpc: VpcDetails, tags: &TagNormalizer) -> RowBuilder {
    let vpc_config = cluster.resources_vpc_config();
    let subnet_ids: &[String] = vpc_config.map(|c| c.subnet_ids()).unwrap_or_default();
    let security_groups: &[String] = vpc_config
        .map(|c| c.security_group_ids())
        .unwrap_or_default();
    let raw_tags = cluster
        .tags()
        .map(|t| RawTags::from(t.clone()))
        .unwrap_or_default();

    RowBuilder::new()
        .cell(cluster.name())
        .cell(cluster.version())
        .cell(cluster.status().map(|s| s.as_str()))
        .cell(cluster.endpoint())
        .cell(format_time(cluster.created_at()))
        .cell(vpc_config.and_then(|c| c.vpc_id()))
        .cell(vpc.name)
        .cell(vpc.cidr)
        .cell(join(subnet_ids))
        .cell(join(security_groups))
        .cell(cluster.role_arn())
        .tags(tags, &raw_tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_eks::types::{ClusterStatus, VpcConfigResponse};

    #[test]
    fn test_cluster_row_with_map_tags() {
        let cluster = Cluster::builder()
            .name("platform")
            .version("1.30")
            .status(ClusterStatus::Active)
            .resources_vpc_config(
                VpcConfigResponse::builder()
                    .vpc_id("vpc-1")
                    .subnet_ids("subnet-a")
                    .subnet_ids("subnet-b")
                    .build(),
            )
            .tags("team", "platform")
            .tags("Environment", "prod")
            .build();

        let normalizer = TagNormalizer::new(["Environment"]);
        let vpc = VpcDetails {
            name: Some("main".to_string()),
            cidr: Some("10.0.0.0/16".to_string()),
        };
        let row = row(&cluster, vpc, &normalizer).build();

        assert_eq!(row.len(), COLUMNS.len() + 2);
        assert_eq!(row[0], "platform");
        assert_eq!(row[2], "ACTIVE");
        assert_eq!(row[4], "N/A");
        assert_eq!(row[5], "vpc-1");
        assert_eq!(row[6], "main");
        assert_eq!(row[8], "subnet-a, subnet-b");
        assert_eq!(row[9], "N/A");
        assert_eq!(row[11], "prod");
        assert_eq!(row[12], "team=platform");
    }
}
