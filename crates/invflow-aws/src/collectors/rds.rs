use super::network::{NetworkLookup, VpcDetails};
use super::{Flag, format_time, join, standard_tags};
use crate::error::{AwsError, Result};
use async_trait::async_trait;
use aws_sdk_rds::Client as RdsClient;
use aws_sdk_rds::types::{DbCluster, DbInstance};
use invflow_core::{ResourceCollector, RowBuilder, SheetWriter, TagNormalizer};
use std::sync::Arc;

const INSTANCE_COLUMNS: [&str; 17] = [
    "DB Identifier",
    "Engine",
    "Engine Version",
    "Instance Class",
    "Status",
    "Endpoint",
    "Port",
    "Storage (GB)",
    "Multi-AZ",
    "VPC ID",
    "VPC Name",
    "VPC CIDR",
    "Subnet Group",
    "Subnets",
    "Availability Zone",
    "ARN",
    "Create Date",
];

const CLUSTER_COLUMNS: [&str; 22] = [
    "Cluster Identifier",
    "Engine",
    "Engine Version",
    "Engine Mode",
    "Status",
    "Cluster Endpoint",
    "Reader Endpoint",
    "Port",
    "Database Name",
    "Master Username",
    "Multi-AZ",
    "Cluster Members",
    "Storage Encrypted",
    "Backup Retention (Days)",
    "VPC ID",
    "VPC Name",
    "VPC CIDR",
    "Subnet Group",
    "Availability Zones",
    "Storage Type",
    "ARN",
    "Create Date",
];

/// RDS DB instances; tags come with `DescribeDBInstances`
pub struct RdsInstanceCollector {
    rds: RdsClient,
    network: Arc<NetworkLookup>,
}

impl RdsInstanceCollector {
    pub fn new(rds: RdsClient, network: Arc<NetworkLookup>) -> Self {
        Self { rds, network }
    }

    async fn run(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> Result<()> {
        let mut marker: Option<String> = None;
        loop {
            let output = self
                .rds
                .describe_db_instances()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| AwsError::api("DescribeDBInstances", e))?;

            for db in output.db_instances() {
                let vpc_id = db.db_subnet_group().and_then(|g| g.vpc_id());
                let vpc = match vpc_id {
                    Some(id) => self.network.vpc(id).await,
                    None => VpcDetails::default(),
                };
                sheet.append_row(instance_row(db, vpc_id, vpc, tags));
            }

            match output.marker() {
                Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                _ => break,
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceCollector for RdsInstanceCollector {
    fn id(&self) -> &str {
        "rds"
    }

    fn sheet_name(&self) -> &str {
        "RDS Instances"
    }

    fn columns(&self) -> Vec<String> {
        INSTANCE_COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    async fn collect(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> invflow_core::Result<()> {
        Ok(self.run(sheet, tags).await?)
    }
}

fn instance_row(
    db: &DbInstance,
    vpc_id: Option<&str>,
    vpc: VpcDetails,
    tags: &TagNormalizer,
) -> RowBuilder {
    let subnet_group = db.db_subnet_group();
    let subnets = join(
        subnet_group
            .map(|g| g.subnets())
            .unwrap_or_default()
            .iter()
            .filter_map(|s| s.subnet_identifier()),
    );

    RowBuilder::new()
        .cell(db.db_instance_identifier())
        .cell(db.engine())
        .cell(db.engine_version())
        .cell(db.db_instance_class())
        .cell(db.db_instance_status())
        .cell(db.endpoint().and_then(|e| e.address()))
        .cell(db.endpoint().and_then(|e| e.port()))
        .cell(db.allocated_storage())
        .cell(db.multi_az().is_set())
        .cell(vpc_id)
        .cell(vpc.name)
        .cell(vpc.cidr)
        .cell(subnet_group.and_then(|g| g.db_subnet_group_name()))
        .cell(subnets)
        .cell(db.availability_zone())
        .cell(db.db_instance_arn())
        .cell(format_time(db.instance_create_time()))
        .tags(tags, &standard_tags(db.tag_list(), |t| t.key(), |t| t.value()))
}

/// Aurora and Multi-AZ DB clusters
///
/// Clusters do not report their VPC; it is taken from the first member
/// instance.
pub struct RdsClusterCollector {
    rds: RdsClient,
    network: Arc<NetworkLookup>,
}

impl RdsClusterCollector {
    pub fn new(rds: RdsClient, network: Arc<NetworkLookup>) -> Self {
        Self { rds, network }
    }

    async fn run(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> Result<()> {
        let mut marker: Option<String> = None;
        loop {
            let output = self
                .rds
                .describe_db_clusters()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| AwsError::api("DescribeDBClusters", e))?;

            for cluster in output.db_clusters() {
                let vpc_id = self.member_vpc_id(cluster).await;
                let vpc = match vpc_id.as_deref() {
                    Some(id) => self.network.vpc(id).await,
                    None => VpcDetails::default(),
                };
                sheet.append_row(cluster_row(cluster, vpc_id.as_deref(), vpc, tags));
            }

            match output.marker() {
                Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                _ => break,
            }
        }
        Ok(())
    }

    async fn member_vpc_id(&self, cluster: &DbCluster) -> Option<String> {
        let member = cluster
            .db_cluster_members()
            .first()
            .and_then(|m| m.db_instance_identifier())?;

        match self
            .rds
            .describe_db_instances()
            .db_instance_identifier(member)
            .send()
            .await
        {
            Ok(output) => output
                .db_instances()
                .first()
                .and_then(|db| db.db_subnet_group())
                .and_then(|g| g.vpc_id())
                .map(String::from),
            Err(e) => {
                tracing::debug!("DescribeDBInstances failed for member {}: {}", member, e);
                None
            }
        }
    }
}

#[async_trait]
impl ResourceCollector for RdsClusterCollector {
    fn id(&self) -> &str {
        "rds-cluster"
    }

    fn sheet_name(&self) -> &str {
        "RDS Clusters"
    }

    fn columns(&self) -> Vec<String> {
        CLUSTER_COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    async fn collect(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> invflow_core::Result<()> {
        Ok(self.run(sheet, tags).await?)
    }
}

fn cluster_row(
    cluster: &DbCluster,
    vpc_id: Option<&str>,
    vpc: VpcDetails,
    tags: &TagNormalizer,
) -> RowBuilder {
    let member_names: Vec<&str> = cluster
        .db_cluster_members()
        .iter()
        .filter_map(|m| m.db_instance_identifier())
        .collect();

    RowBuilder::new()
        .cell(cluster.db_cluster_identifier())
        .cell(cluster.engine())
        .cell(cluster.engine_version())
        .cell(cluster.engine_mode().unwrap_or("provisioned"))
        .cell(cluster.status())
        .cell(cluster.endpoint())
        .cell(cluster.reader_endpoint())
        .cell(cluster.port())
        .cell(cluster.database_name())
        .cell(cluster.master_username())
        .cell(cluster.multi_az().is_set())
        .cell(cluster_members(cluster.db_cluster_members().len(), &member_names))
        .cell(cluster.storage_encrypted().is_set())
        .cell(cluster.backup_retention_period().unwrap_or(0))
        .cell(vpc_id)
        .cell(vpc.name)
        .cell(vpc.cidr)
        .cell(cluster.db_subnet_group())
        .cell(join(cluster.availability_zones()))
        .cell(cluster.storage_type().unwrap_or("aurora"))
        .cell(cluster.db_cluster_arn())
        .cell(format_time(cluster.cluster_create_time()))
        .tags(tags, &standard_tags(cluster.tag_list(), |t| t.key(), |t| t.value()))
}

/// `2 (writer, reader)`, or just the count when no member has a name
fn cluster_members(count: usize, names: &[&str]) -> String {
    if names.is_empty() {
        count.to_string()
    } else {
        format!("{} ({})", count, names.join(", "))
    }
}
