//! VPC and subnet detail lookups shared by the compute collectors

use super::name_tag;
use aws_sdk_ec2::Client as Ec2Client;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use tokio::sync::Mutex;

/// Name and CIDR of a VPC
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VpcDetails {
    pub name: Option<String>,
    pub cidr: Option<String>,
}

/// Name, CIDR, VPC and availability zone of a subnet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubnetDetails {
    pub name: Option<String>,
    pub cidr: Option<String>,
    pub vpc_id: Option<String>,
    pub availability_zone: Option<String>,
}

/// Cached, soft-failing VPC/subnet lookups
///
/// A failed lookup yields empty details (rendered `N/A`) and is retried on
/// the next request; only answers from EC2 are cached.
pub struct NetworkLookup {
    ec2: Ec2Client,
    vpcs: Mutex<HashMap<String, VpcDetails>>,
    subnets: Mutex<HashMap<String, SubnetDetails>>,
}

impl NetworkLookup {
    pub fn new(ec2: Ec2Client) -> Self {
        Self {
            ec2,
            vpcs: Mutex::new(HashMap::new()),
            subnets: Mutex::new(HashMap::new()),
        }
    }

    pub async fn vpc(&self, vpc_id: &str) -> VpcDetails {
        let fetch = async {
            self.ec2
                .describe_vpcs()
                .vpc_ids(vpc_id)
                .send()
                .await
                .map(|output| {
                    output
                        .vpcs()
                        .first()
                        .map(|vpc| VpcDetails {
                            name: name_tag(vpc.tags(), |t| t.key(), |t| t.value()),
                            cidr: vpc.cidr_block().map(String::from),
                        })
                        .unwrap_or_default()
                })
        };
        cached(&self.vpcs, "VPC", vpc_id, fetch).await
    }

    pub async fn subnet(&self, subnet_id: &str) -> SubnetDetails {
        let fetch = async {
            self.ec2
                .describe_subnets()
                .subnet_ids(subnet_id)
                .send()
                .await
                .map(|output| {
                    output
                        .subnets()
                        .first()
                        .map(|subnet| SubnetDetails {
                            name: name_tag(subnet.tags(), |t| t.key(), |t| t.value()),
                            cidr: subnet.cidr_block().map(String::from),
                            vpc_id: subnet.vpc_id().map(String::from),
                            availability_zone: subnet.availability_zone().map(String::from),
                        })
                        .unwrap_or_default()
                })
        };
        cached(&self.subnets, "Subnet", subnet_id, fetch).await
    }
}

/// Serve `id` from `cache`, running `fetch` on a miss
///
/// The lock is not held across `fetch`; two concurrent misses for the same
/// id both query and the later answer wins.
async fn cached<T, E, F>(cache: &Mutex<HashMap<String, T>>, kind: &str, id: &str, fetch: F) -> T
where
    T: Clone + Default,
    E: Display,
    F: Future<Output = std::result::Result<T, E>>,
{
    if let Some(details) = cache.lock().await.get(id) {
        return details.clone();
    }

    match fetch.await {
        Ok(details) => {
            cache.lock().await.insert(id.to_string(), details.clone());
            details
        }
        Err(e) => {
            tracing::debug!("{} lookup failed for {}: {}", kind, id, e);
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(name: &str) -> VpcDetails {
        VpcDetails {
            name: Some(name.to_string()),
            cidr: Some("10.0.0.0/16".to_string()),
        }
    }

    #[tokio::test]
    async fn test_failed_lookup_is_not_cached() {
        let cache = Mutex::new(HashMap::new());

        let first = cached(&cache, "VPC", "vpc-1", async { Err::<VpcDetails, _>("throttled") }).await;
        assert_eq!(first, VpcDetails::default());
        assert!(cache.lock().await.is_empty());

        let second = cached(&cache, "VPC", "vpc-1", async { Ok::<_, &str>(details("main")) }).await;
        assert_eq!(second, details("main"));
    }

    #[tokio::test]
    async fn test_successful_lookup_is_reused() {
        let cache = Mutex::new(HashMap::new());
        cached(&cache, "VPC", "vpc-1", async { Ok::<_, &str>(details("main")) }).await;

        let again = cached(&cache, "VPC", "vpc-1", async { Err::<VpcDetails, _>("throttled") }).await;
        assert_eq!(again, details("main"));
        assert_eq!(cache.lock().await.len(), 1);
    }
}
