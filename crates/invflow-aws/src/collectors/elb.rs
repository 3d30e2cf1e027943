use super::network::{NetworkLookup, VpcDetails};
use super::{format_time, join, standard_tags};
use crate::error::{AwsError, Result};
use async_trait::async_trait;
use aws_sdk_elasticloadbalancingv2::Client as ElbClient;
use aws_sdk_elasticloadbalancingv2::types::{Listener, LoadBalancer};
use invflow_core::{RawTags, ResourceCollector, RowBuilder, SheetWriter, TagNormalizer};
use std::collections::BTreeSet;
use std::sync::Arc;

const COLUMNS: [&str; 16] = [
    "Load Balancer Name",
    "Load Balancer ARN",
    "Type",
    "Scheme",
    "State",
    "DNS Name",
    "Created Time",
    "VPC ID",
    "VPC Name",
    "VPC CIDR",
    "Availability Zones",
    "Subnet IDs",
    "Security Groups",
    "IP Address Type",
    "TLS Certificate ARNs",
    "Security Policy",
];

/// Application, network and gateway load balancers with their listener TLS
/// settings
pub struct LoadBalancerCollector {
    elb: ElbClient,
    network: Arc<NetworkLookup>,
}

impl LoadBalancerCollector {
    pub fn new(elb: ElbClient, network: Arc<NetworkLookup>) -> Self {
        Self { elb, network }
    }

    async fn run(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> Result<()> {
        let mut marker: Option<String> = None;
        loop {
            let output = self
                .elb
                .describe_load_balancers()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| AwsError::api("DescribeLoadBalancers", e))?;

            for lb in output.load_balancers() {
                let vpc = match lb.vpc_id() {
                    Some(id) => self.network.vpc(id).await,
                    None => VpcDetails::default(),
                };
                let (listeners, raw_tags) = match lb.load_balancer_arn() {
                    Some(arn) => (self.listeners(arn).await, self.tags(arn).await),
                    None => (Vec::new(), RawTags::None),
                };
                sheet.append_row(row(lb, vpc, &listeners, &raw_tags, tags));
            }

            match output.next_marker() {
                Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                _ => break,
            }
        }
        Ok(())
    }

    async fn listeners(&self, arn: &str) -> Vec<Listener> {
        match self.elb.describe_listeners().load_balancer_arn(arn).send().await {
            Ok(output) => output.listeners().to_vec(),
            Err(e) => {
                tracing::warn!("Could not get listener details for {}: {}", arn, e);
                Vec::new()
            }
        }
    }

    async fn tags(&self, arn: &str) -> RawTags {
        match self.elb.describe_tags().resource_arns(arn).send().await {
            Ok(output) => output
                .tag_descriptions()
                .first()
                .map(|d| standard_tags(d.tags(), |t| t.key(), |t| t.value()))
                .unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Could not get tags for {}: {}", arn, e);
                RawTags::None
            }
        }
    }
}

#[async_trait]
impl ResourceCollector for LoadBalancerCollector {
    fn id(&self) -> &str {
        "elb"
    }

    fn sheet_name(&self) -> &str {
        "Load Balancers"
    }

    fn columns(&self) -> Vec<String> {
        COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    async fn collect(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> invflow_core::Result<()> {
        Ok(self.run(sheet, tags).await?)
    }
}

/// Distinct certificate ARNs and SSL policies over all listeners
fn tls_settings(listeners: &[Listener]) -> (BTreeSet<&str>, BTreeSet<&str>) {
    let certificates = listeners
        .iter()
        .flat_map(|l| l.certificates())
        .filter_map(|c| c.certificate_arn())
        .collect();
    let policies = listeners.iter().filter_map(|l| l.ssl_policy()).collect();
    (certificates, policies)
}

fn row(
    lb: &LoadBalancer,
    vpc: VpcDetails,
    listeners: &[Listener],
    raw_tags: &RawTags,
    tags: &TagNormalizer,
) -> RowBuilder {
    let zones = lb.availability_zones();
    let (certificates, policies) = tls_settings(listeners);

    RowBuilder::new()
        .cell(lb.load_balancer_name())
        .cell(lb.load_balancer_arn())
        .cell(lb.r#type().map(|t| t.as_str()))
        .cell(lb.scheme().map(|s| s.as_str()))
        .cell(lb.state().and_then(|s| s.code()).map(|c| c.as_str()))
        .cell(lb.dns_name())
        .cell(format_time(lb.created_time()))
        .cell(lb.vpc_id())
        .cell(vpc.name)
        .cell(vpc.cidr)
        .cell(join(zones.iter().filter_map(|z| z.zone_name())))
        .cell(join(zones.iter().filter_map(|z| z.subnet_id())))
        .cell(join(lb.security_groups()))
        .cell(lb.ip_address_type().map(|t| t.as_str()))
        .cell(join(certificates))
        .cell(join(policies))
        .tags(tags, raw_tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_elasticloadbalancingv2::types::{
        AvailabilityZone, Certificate, LoadBalancerSchemeEnum, LoadBalancerTypeEnum,
    };

    fn listener(certificates: &[&str], policy: Option<&str>) -> Listener {
        let mut builder = Listener::builder().set_ssl_policy(policy.map(String::from));
        for arn in certificates {
            builder = builder.certificates(Certificate::builder().certificate_arn(*arn).build());
        }
        builder.build()
    }

    #[test]
    fn test_tls_settings_are_deduplicated() {
        let listeners = vec![
            listener(&["arn:cert/b", "arn:cert/a"], Some("ELBSecurityPolicy-TLS13-1-2-2021-06")),
            listener(&["arn:cert/a"], Some("ELBSecurityPolicy-TLS13-1-2-2021-06")),
            listener(&[], None),
        ];

        let (certificates, policies) = tls_settings(&listeners);
        assert_eq!(certificates.into_iter().collect::<Vec<_>>(), vec!["arn:cert/a", "arn:cert/b"]);
        assert_eq!(policies.len(), 1);
    }

    #[test]
    fn test_load_balancer_row() {
        let lb = LoadBalancer::builder()
            .load_balancer_name("public-alb")
            .r#type(LoadBalancerTypeEnum::Application)
            .scheme(LoadBalancerSchemeEnum::InternetFacing)
            .vpc_id("vpc-1")
            .availability_zones(
                AvailabilityZone::builder()
                    .zone_name("us-east-1a")
                    .subnet_id("subnet-a")
                    .build(),
            )
            .availability_zones(
                AvailabilityZone::builder()
                    .zone_name("us-east-1b")
                    .subnet_id("subnet-b")
                    .build(),
            )
            .build();

        let normalizer = TagNormalizer::new(["Name"]);
        let row = row(&lb, VpcDetails::default(), &[], &RawTags::None, &normalizer).build();

        assert_eq!(row.len(), COLUMNS.len() + 2);
        assert_eq!(row[0], "public-alb");
        assert_eq!(row[2], "application");
        assert_eq!(row[3], "internet-facing");
        assert_eq!(row[4], "N/A");
        assert_eq!(row[10], "us-east-1a, us-east-1b");
        assert_eq!(row[11], "subnet-a, subnet-b");
        assert_eq!(row[14], "N/A");
        assert_eq!(row[16], "N/A");
        assert_eq!(row[17], "N/A");
    }
}
