use super::ecs::cluster_arns;
use super::network::NetworkLookup;
use super::{format_time, join, lowercase_tags};
use crate::error::{AwsError, Result};
use async_trait::async_trait;
use aws_sdk_ecs::Client as EcsClient;
use aws_sdk_ecs::types::{Service, ServiceField, TaskDefinition};
use invflow_core::{ResourceCollector, RowBuilder, SheetWriter, TagNormalizer};
use std::collections::HashMap;
use std::sync::Arc;

/// DescribeServices accepts at most this many services per call
const DESCRIBE_BATCH_SIZE: usize = 10;

/// Ephemeral storage Fargate tasks get without an explicit size
const FARGATE_DEFAULT_STORAGE_GIB: i32 = 20;

const COLUMNS: [&str; 17] = [
    "Cluster Name",
    "Service Name",
    "Status",
    "Desired Count",
    "Running Count",
    "Launch Type",
    "Task Definition",
    "Storage Type",
    "Volume Size (GB)",
    "Volume Type",
    "Volume IOPS",
    "VPC ID",
    "Subnet IDs",
    "Security Groups",
    "Load Balancers",
    "ARN",
    "Create Date",
];

/// ECS services of every cluster, with the storage their task definition
/// requests
pub struct EcsServiceCollector {
    ecs: EcsClient,
    network: Arc<NetworkLookup>,
}

impl EcsServiceCollector {
    pub fn new(ecs: EcsClient, network: Arc<NetworkLookup>) -> Self {
        Self { ecs, network }
    }

    async fn run(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> Result<()> {
        let mut task_definitions: HashMap<String, Option<TaskDefinition>> = HashMap::new();

        for cluster_arn in cluster_arns(&self.ecs).await? {
            let cluster_name = resource_name(&cluster_arn).to_string();

            for chunk in self.service_arns(&cluster_arn).await?.chunks(DESCRIBE_BATCH_SIZE) {
                let output = self
                    .ecs
                    .describe_services()
                    .cluster(&cluster_arn)
                    .set_services(Some(chunk.to_vec()))
                    .include(ServiceField::Tags)
                    .send()
                    .await
                    .map_err(|e| AwsError::api("DescribeServices", e))?;

                for service in output.services() {
                    let task_definition = match service.task_definition() {
                        Some(arn) => {
                            if !task_definitions.contains_key(arn) {
                                let described = self.task_definition(arn).await;
                                task_definitions.insert(arn.to_string(), described);
                            }
                            task_definitions.get(arn).and_then(Option::as_ref)
                        }
                        None => None,
                    };
                    let storage = StorageSummary::from_task_definition(
                        task_definition,
                        service.launch_type().map(|l| l.as_str()),
                    );

                    let vpc_id = match first_subnet(service) {
                        Some(subnet) => self.network.subnet(subnet).await.vpc_id,
                        None => None,
                    };

                    sheet.append_row(service_row(&cluster_name, service, vpc_id, storage, tags));
                }
            }
        }
        Ok(())
    }

    async fn service_arns(&self, cluster_arn: &str) -> Result<Vec<String>> {
        let mut arns = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .ecs
                .list_services()
                .cluster(cluster_arn)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| AwsError::api("ListServices", e))?;

            arns.extend(output.service_arns().iter().cloned());

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }
        Ok(arns)
    }

    async fn task_definition(&self, arn: &str) -> Option<TaskDefinition> {
        match self
            .ecs
            .describe_task_definition()
            .task_definition(arn)
            .send()
            .await
        {
            Ok(output) => output.task_definition().cloned(),
            Err(e) => {
                tracing::debug!("DescribeTaskDefinition failed for {}: {}", arn, e);
                None
            }
        }
    }
}

#[async_trait]
impl ResourceCollector for EcsServiceCollector {
    fn id(&self) -> &str {
        "ecs-service"
    }

    fn sheet_name(&self) -> &str {
        "ECS Services"
    }

    fn columns(&self) -> Vec<String> {
        COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    async fn collect(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> invflow_core::Result<()> {
        Ok(self.run(sheet, tags).await?)
    }
}

/// Storage columns derived from a task definition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct StorageSummary {
    storage_type: Option<String>,
    size: Option<String>,
    volume_type: Option<String>,
    iops: Option<String>,
}

impl StorageSummary {
    /// Docker volumes with a `size` driver option count as EBS; an
    /// undescribable task definition leaves every column empty
    fn from_task_definition(task_definition: Option<&TaskDefinition>, launch_type: Option<&str>) -> Self {
        let Some(task_definition) = task_definition else {
            return Self::default();
        };

        let mut summary = Self::default();
        if let Some(ephemeral) = task_definition.ephemeral_storage() {
            summary.storage_type = Some("Ephemeral (Fargate)".to_string());
            summary.size = Some(ephemeral.size_in_gib().to_string());
        }

        let mut ebs: Vec<(&str, &str, &str)> = Vec::new();
        for volume in task_definition.volumes() {
            if volume.efs_volume_configuration().is_some() {
                summary.storage_type = Some("EFS".to_string());
            } else if let Some(opts) = volume
                .docker_volume_configuration()
                .and_then(|c| c.driver_opts())
            {
                if let Some(size) = opts.get("size") {
                    ebs.push((
                        size.as_str(),
                        opts.get("type").map(String::as_str).unwrap_or("gp3"),
                        opts.get("iops").map(String::as_str).unwrap_or("N/A"),
                    ));
                }
            }
        }

        if !ebs.is_empty() {
            summary.storage_type = Some("EBS Volume".to_string());
            summary.size = join(ebs.iter().map(|v| v.0));
            summary.volume_type = join(ebs.iter().map(|v| v.1));
            summary.iops = join(ebs.iter().map(|v| v.2));
        } else if summary.storage_type.is_none() {
            if launch_type == Some("FARGATE") {
                summary.storage_type = Some("Ephemeral (Fargate)".to_string());
                summary.size = Some(FARGATE_DEFAULT_STORAGE_GIB.to_string());
            } else {
                summary.storage_type = Some("Host/Container".to_string());
            }
        }
        summary
    }
}

fn first_subnet(service: &Service) -> Option<&str> {
    service
        .network_configuration()
        .and_then(|n| n.awsvpc_configuration())
        .and_then(|c| c.subnets().first())
        .map(String::as_str)
}

/// Last path segment of an ARN
fn resource_name(arn: &str) -> &str {
    arn.rsplit('/').next().unwrap_or(arn)
}

fn service_row(
    cluster_name: &str,
    service: &Service,
    vpc_id: Option<String>,
    storage: StorageSummary,
    tags: &TagNormalizer,
) -> RowBuilder {
    let awsvpc = service
        .network_configuration()
        .and_then(|n| n.awsvpc_configuration());
    let subnets: &[String] = awsvpc.map(|c| c.subnets()).unwrap_or_default();
    let security_groups: &[String] = awsvpc.map(|c| c.security_groups()).unwrap_or_default();
    let load_balancers = join(
        service
            .load_balancers()
            .iter()
            .filter_map(|lb| lb.target_group_arn())
            .map(resource_name),
    );

    RowBuilder::new()
        .cell(cluster_name)
        .cell(service.service_name())
        .cell(service.status())
        .cell(service.desired_count())
        .cell(service.running_count())
        .cell(service.launch_type().map(|l| l.as_str()))
        .cell(service.task_definition().map(resource_name))
        .cell(storage.storage_type)
        .cell(storage.size)
        .cell(storage.volume_type)
        .cell(storage.iops)
        .cell(vpc_id)
        .cell(join(subnets))
        .cell(join(security_groups))
        .cell(load_balancers)
        .cell(service.service_arn())
        .cell(format_time(service.created_at()))
        .tags(tags, &lowercase_tags(service.tags(), |t| t.key(), |t| t.value()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ecs::types::{DockerVolumeConfiguration, LaunchType, LoadBalancer, Tag, Volume};

    fn docker_volume(opts: &[(&str, &str)]) -> Volume {
        let mut config = DockerVolumeConfiguration::builder();
        for (key, value) in opts {
            config = config.driver_opts(*key, *value);
        }
        Volume::builder()
            .name("data")
            .docker_volume_configuration(config.build())
            .build()
    }

    #[test]
    fn test_storage_without_task_definition() {
        assert_eq!(
            StorageSummary::from_task_definition(None, Some("FARGATE")),
            StorageSummary::default()
        );
    }

    #[test]
    fn test_storage_ebs_volumes() {
        let task_definition = TaskDefinition::builder()
            .volumes(docker_volume(&[("size", "50"), ("type", "io2"), ("iops", "3000")]))
            .volumes(docker_volume(&[("size", "20")]))
            .build();

        let summary = StorageSummary::from_task_definition(Some(&task_definition), Some("EC2"));
        assert_eq!(summary.storage_type.as_deref(), Some("EBS Volume"));
        assert_eq!(summary.size.as_deref(), Some("50, 20"));
        assert_eq!(summary.volume_type.as_deref(), Some("io2, gp3"));
        assert_eq!(summary.iops.as_deref(), Some("3000, N/A"));
    }

    #[test]
    fn test_storage_defaults_by_launch_type() {
        let task_definition = TaskDefinition::builder()
            .volumes(docker_volume(&[("driver", "local")]))
            .build();

        let fargate = StorageSummary::from_task_definition(Some(&task_definition), Some("FARGATE"));
        assert_eq!(fargate.storage_type.as_deref(), Some("Ephemeral (Fargate)"));
        assert_eq!(fargate.size.as_deref(), Some("20"));

        let ec2 = StorageSummary::from_task_definition(Some(&task_definition), Some("EC2"));
        assert_eq!(ec2.storage_type.as_deref(), Some("Host/Container"));
        assert_eq!(ec2.size, None);
    }

    #[test]
    fn test_service_row() {
        let service = Service::builder()
            .service_name("api")
            .status("ACTIVE")
            .desired_count(2)
            .running_count(1)
            .launch_type(LaunchType::Fargate)
            .task_definition("arn:aws:ecs:us-east-1:123456789012:task-definition/api:7")
            .load_balancers(
                LoadBalancer::builder()
                    .target_group_arn("arn:aws:elasticloadbalancing:us-east-1:123456789012:targetgroup/api-tg/abc")
                    .build(),
            )
            .tags(Tag::builder().key("team").value("core").build())
            .build();

        let normalizer = TagNormalizer::new(["Name"]);
        let row = service_row(
            "web",
            &service,
            Some("vpc-1".to_string()),
            StorageSummary::default(),
            &normalizer,
        )
        .build();

        assert_eq!(row.len(), COLUMNS.len() + 2);
        assert_eq!(row[0], "web");
        assert_eq!(row[5], "FARGATE");
        assert_eq!(row[6], "api:7");
        assert_eq!(row[7], "N/A");
        assert_eq!(row[11], "vpc-1");
        assert_eq!(row[12], "N/A");
        assert_eq!(row[14], "abc");
        assert_eq!(row[17], "N/A");
        assert_eq!(row[18], "team=core");
    }

    #[test]
    fn test_resource_name() {
        assert_eq!(resource_name("arn:aws:ecs:us-east-1:1:cluster/web"), "web");
        assert_eq!(resource_name("plain"), "plain");
    }
}
