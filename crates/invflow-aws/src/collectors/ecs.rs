use super::{TagField, join, lowercase_tags};
use crate::error::{AwsError, Result};
use async_trait::async_trait;
use aws_sdk_ecs::Client as EcsClient;
use aws_sdk_ecs::types::{Cluster, ClusterField};
use invflow_core::{ResourceCollector, RowBuilder, SheetWriter, TagNormalizer};

/// Clusters AWS Batch manages for its compute environments
pub const BATCH_CLUSTER_PREFIX: &str = "AWSBatch-";

/// DescribeClusters accepts at most this many clusters per call
const DESCRIBE_BATCH_SIZE: usize = 100;

const COLUMNS: [&str; 13] = [
    "Cluster Name",
    "Status",
    "Active Services Count",
    "Running Tasks Count",
    "Pending Tasks Count",
    "Active Container Instances",
    "Statistics",
    "Capacity Providers",
    "Default Capacity Provider Strategy",
    "Configuration",
    "Service Connect Defaults",
    "ARN",
    "Create Date",
];

/// ECS clusters, without the ones AWS Batch owns
pub struct EcsClusterCollector {
    ecs: EcsClient,
}

impl EcsClusterCollector {
    pub fn new(ecs: EcsClient) -> Self {
        Self { ecs }
    }

    async fn run(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> Result<()> {
        let arns = cluster_arns(&self.ecs).await?;
        if arns.is_empty() {
            tracing::debug!("No ECS clusters found");
            return Ok(());
        }

        for chunk in arns.chunks(DESCRIBE_BATCH_SIZE) {
            let output = self
                .ecs
                .describe_clusters()
                .set_clusters(Some(chunk.to_vec()))
                .include(ClusterField::Configurations)
                .include(ClusterField::Statistics)
                .include(ClusterField::Tags)
                .include(ClusterField::Attachments)
                .send()
                .await
                .map_err(|e| AwsError::api("DescribeClusters", e))?;

            for cluster in output.clusters() {
                let name = cluster.cluster_name().unwrap_or_default();
                if is_batch_cluster(name) {
                    tracing::debug!("Skipping AWS Batch cluster: {}", name);
                    continue;
                }
                sheet.append_row(row(cluster, tags));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceCollector for EcsClusterCollector {
    fn id(&self) -> &str {
        "ecs"
    }

    fn sheet_name(&self) -> &str {
        "ECS Clusters"
    }

    fn columns(&self) -> Vec<String> {
        COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    async fn collect(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> invflow_core::Result<()> {
        Ok(self.run(sheet, tags).await?)
    }
}

/// Every cluster ARN in the region
pub(super) async fn cluster_arns(ecs: &EcsClient) -> Result<Vec<String>> {
    let mut arns = Vec::new();
    let mut next_token: Option<String> = None;
    loop {
        let output = ecs
            .list_clusters()
            .set_next_token(next_token.take())
            .send()
            .await
            .map_err(|e| AwsError::api("ListClusters", e))?;

        arns.extend(output.cluster_arns().iter().cloned());

        match output.next_token() {
            Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
            _ => break,
        }
    }
    Ok(arns)
}

/// Literal prefix match; `AWSBatchServiceRole` or `my-batch-cluster` are kept
pub fn is_batch_cluster(name: &str) -> bool {
    name.starts_with(BATCH_CLUSTER_PREFIX)
}

fn row(cluster: &Cluster, tags: &TagNormalizer) -> RowBuilder {
    let statistics = join(
        cluster
            .statistics()
            .iter()
            .map(|s| format!("{}: {}", s.name().unwrap_or_default(), s.value().unwrap_or_default())),
    );

    let strategy = join(
        cluster
            .default_capacity_provider_strategy()
            .iter()
            .map(|s| {
                format!(
                    "{}: {}",
                    s.capacity_provider().into_field().unwrap_or_default(),
                    s.weight()
                )
            }),
    );

    let configuration = cluster
        .configuration()
        .and_then(|c| c.execute_command_configuration())
        .map(|exec| {
            format!(
                "ExecuteCommand: {}",
                exec.logging().map(|l| l.as_str()).unwrap_or("N/A")
            )
        });

    RowBuilder::new()
        .cell(cluster.cluster_name())
        .cell(cluster.status())
        .cell(cluster.active_services_count())
        .cell(cluster.running_tasks_count())
        .cell(cluster.pending_tasks_count())
        .cell(cluster.registered_container_instances_count())
        .cell(statistics)
        .cell(join(cluster.capacity_providers()))
        .cell(strategy)
        .cell(configuration)
        .cell(
            cluster
                .service_connect_defaults()
                .and_then(|d| d.namespace()),
        )
        .cell(cluster.cluster_arn())
        // ECS does not report a creation time for clusters
        .cell(None::<&str>)
        .tags(tags, &lowercase_tags(cluster.tags(), |t| t.key(), |t| t.value()))
}
