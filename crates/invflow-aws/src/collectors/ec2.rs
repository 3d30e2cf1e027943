use super::network::NetworkLookup;
use super::{format_time, join, name_tag, standard_tags};
use crate::error::{AwsError, Result};
use async_trait::async_trait;
use aws_sdk_ec2::Client as Ec2Client;
use aws_sdk_ec2::types::{Instance, Volume};
use invflow_core::{ResourceCollector, RowBuilder, SheetWriter, TagNormalizer};
use std::sync::Arc;

const COLUMNS: [&str; 24] = [
    "Instance ID",
    "Name",
    "Type",
    "State",
    "Private IP",
    "Public IP",
    "Launch Time",
    "Root Device Type",
    "Root Device Name",
    "Root Volume Size (GB)",
    "Total EBS Volumes",
    "Total EBS Size (GB)",
    "EBS Volume IDs",
    "EBS Volume Types",
    "EBS IOPS",
    "EBS Encrypted",
    "VPC ID",
    "VPC Name",
    "VPC CIDR",
    "Subnet ID",
    "Subnet Name",
    "Subnet CIDR",
    "Availability Zone",
    "ARN",
];

/// EC2 instances with their EBS volumes and network placement
pub struct Ec2InstanceCollector {
    ec2: Ec2Client,
    network: Arc<NetworkLookup>,
    region: String,
    account_id: String,
}

impl Ec2InstanceCollector {
    pub fn new(
        ec2: Ec2Client,
        network: Arc<NetworkLookup>,
        region: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            ec2,
            network,
            region: region.into(),
            account_id: account_id.into(),
        }
    }

    async fn run(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> Result<()> {
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .ec2
                .describe_instances()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| AwsError::api("DescribeInstances", e))?;

            for reservation in output.reservations() {
                let owner = reservation.owner_id().unwrap_or(&self.account_id);
                for instance in reservation.instances() {
                    let row = self.row(instance, owner, tags).await;
                    sheet.append_row(row);
                }
            }

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }
        Ok(())
    }

    async fn row(&self, instance: &Instance, owner: &str, tags: &TagNormalizer) -> RowBuilder {
        let instance_id = instance.instance_id().unwrap_or_default();
        let volumes = self.volumes(instance).await;

        let root_size = volumes
            .iter()
            .find(|v| v.device.is_some() && v.device.as_deref() == instance.root_device_name())
            .and_then(|v| v.size);
        let total_size: i64 = volumes.iter().filter_map(|v| v.size).map(i64::from).sum();

        let vpc_id = instance.vpc_id();
        let vpc = match vpc_id {
            Some(id) => self.network.vpc(id).await,
            None => Default::default(),
        };
        let subnet_id = instance.subnet_id();
        let subnet = match subnet_id {
            Some(id) => self.network.subnet(id).await,
            None => Default::default(),
        };

        RowBuilder::new()
            .cell(instance_id)
            .cell(name_tag(instance.tags(), |t| t.key(), |t| t.value()))
            .cell(instance.instance_type().map(|t| t.as_str()))
            .cell(
                instance
                    .state()
                    .and_then(|s| s.name())
                    .map(|n| n.as_str()),
            )
            .cell(instance.private_ip_address())
            .cell(instance.public_ip_address())
            .cell(format_time(instance.launch_time()))
            .cell(instance.root_device_type().map(|t| t.as_str()))
            .cell(instance.root_device_name())
            .cell(root_size)
            .cell(volumes.len())
            .cell(total_size)
            .cell(join(volumes.iter().map(|v| v.id.as_str())))
            .cell(join(volumes.iter().map(|v| v.kind.as_deref().unwrap_or("N/A"))))
            .cell(join(volumes.iter().map(|v| v.iops_text())))
            .cell(join(volumes.iter().map(|v| v.encrypted_text())))
            .cell(vpc_id)
            .cell(vpc.name)
            .cell(vpc.cidr)
            .cell(subnet_id)
            .cell(subnet.name)
            .cell(subnet.cidr)
            .cell(subnet.availability_zone)
            .cell(instance_arn(&self.region, owner, instance_id))
            .tags(tags, &standard_tags(instance.tags(), |t| t.key(), |t| t.value()))
    }

    /// Attached EBS volumes; details stay empty when DescribeVolumes fails
    async fn volumes(&self, instance: &Instance) -> Vec<AttachedVolume> {
        let mut attached: Vec<AttachedVolume> = instance
            .block_device_mappings()
            .iter()
            .filter_map(|mapping| {
                let id = mapping.ebs()?.volume_id()?;
                Some(AttachedVolume::new(id, mapping.device_name()))
            })
            .collect();
        if attached.is_empty() {
            return attached;
        }

        let ids: Vec<String> = attached.iter().map(|v| v.id.clone()).collect();
        match self
            .ec2
            .describe_volumes()
            .set_volume_ids(Some(ids))
            .send()
            .await
        {
            Ok(output) => {
                for volume in output.volumes() {
                    if let Some(entry) = attached
                        .iter_mut()
                        .find(|v| Some(v.id.as_str()) == volume.volume_id())
                    {
                        entry.fill(volume);
                    }
                }
            }
            Err(e) => tracing::debug!(
                "DescribeVolumes failed for {}: {}",
                instance.instance_id().unwrap_or_default(),
                e
            ),
        }
        attached
    }
}

#[async_trait]
impl ResourceCollector for Ec2InstanceCollector {
    fn id(&self) -> &str {
        "ec2"
    }

    fn sheet_name(&self) -> &str {
        "EC2 Instances"
    }

    fn columns(&self) -> Vec<String> {
        COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    async fn collect(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> invflow_core::Result<()> {
        Ok(self.run(sheet, tags).await?)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct AttachedVolume {
    id: String,
    device: Option<String>,
    kind: Option<String>,
    size: Option<i32>,
    iops: Option<i32>,
    encrypted: Option<bool>,
}

impl AttachedVolume {
    fn new(id: &str, device: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            device: device.map(String::from),
            ..Default::default()
        }
    }

    fn fill(&mut self, volume: &Volume) {
        self.kind = volume.volume_type().map(|t| t.as_str().to_string());
        self.size = volume.size();
        self.iops = volume.iops();
        self.encrypted = volume.encrypted();
    }

    fn iops_text(&self) -> String {
        self.iops.map_or_else(|| "N/A".to_string(), |i| i.to_string())
    }

    fn encrypted_text(&self) -> &'static str {
        match self.encrypted {
            Some(true) => "Yes",
            Some(false) => "No",
            None => "N/A",
        }
    }
}

fn instance_arn(region: &str, owner: &str, instance_id: &str) -> String {
    format!("arn:aws:ec2:{}:{}:instance/{}", region, owner, instance_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_arn() {
        assert_eq!(
            instance_arn("eu-west-1", "123456789012", "i-0abc"),
            "arn:aws:ec2:eu-west-1:123456789012:instance/i-0abc"
        );
    }

    #[test]
    fn test_volume_details() {
        let mut volume = AttachedVolume::new("vol-1", Some("/dev/xvda"));
        assert_eq!(volume.iops_text(), "N/A");
        assert_eq!(volume.encrypted_text(), "N/A");

        let described = Volume::builder()
            .volume_id("vol-1")
            .size(30)
            .iops(3000)
            .encrypted(true)
            .volume_type(aws_sdk_ec2::types::VolumeType::Gp3)
            .build();
        volume.fill(&described);

        assert_eq!(volume.kind.as_deref(), Some("gp3"));
        assert_eq!(volume.size, Some(30));
        assert_eq!(volume.iops_text(), "3000");
        assert_eq!(volume.encrypted_text(), "Yes");
    }
}
