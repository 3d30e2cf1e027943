//! AWS account provider

use crate::collectors::{
    DynamoDbTableCollector, Ec2InstanceCollector, EcsClusterCollector, EcsServiceCollector,
    EksClusterCollector, KmsKeyCollector, LambdaFunctionCollector, LoadBalancerCollector,
    NetworkLookup, RdsClusterCollector, RdsInstanceCollector, S3BucketCollector,
    VpcEndpointCollector, VpcSummaryCollector,
};
use crate::error::{AwsError, Result};
use crate::profiles;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use invflow_core::{AccountIdentity, AccountProvider, AccountSession, ResourceCollector};
use std::sync::Arc;

/// Region used when neither the override nor the profile names one
pub const FALLBACK_REGION: &str = "us-east-1";

/// Resolves AWS profiles from the shared config files
#[derive(Debug, Clone, Default)]
pub struct AwsProvider {
    region: Option<String>,
}

impl AwsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query this region for every profile instead of the profile's own
    pub fn with_region(region: Option<String>) -> Self {
        Self { region }
    }

    async fn load_config(&self, profile: &str) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).profile_name(profile);
        if let Some(region) = &self.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let config = loader.load().await;

        if config.region().is_some() {
            config
        } else {
            tracing::debug!(
                "Profile {} has no region, using {}",
                profile,
                FALLBACK_REGION
            );
            config
                .into_builder()
                .region(Region::from_static(FALLBACK_REGION))
                .build()
        }
    }

    async fn resolve_identity(&self, profile: &str, config: &SdkConfig) -> Result<AccountIdentity> {
        let sts = aws_sdk_sts::Client::new(config);
        let caller = sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| AwsError::Identity(aws_sdk_sts::error::DisplayErrorContext(&e).to_string()))?;
        let account_id = caller
            .account()
            .map(String::from)
            .ok_or_else(|| AwsError::Identity("GetCallerIdentity returned no account".into()))?;

        let iam = aws_sdk_iam::Client::new(config);
        let account_alias = match iam.list_account_aliases().send().await {
            Ok(output) => output.account_aliases().first().cloned(),
            Err(e) => {
                tracing::debug!("ListAccountAliases failed for {}: {}", profile, e);
                None
            }
        }
        .unwrap_or_else(|| fallback_alias(&account_id));

        let region = config
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| FALLBACK_REGION.to_string());

        Ok(AccountIdentity {
            profile: profile.to_string(),
            account_id,
            account_alias,
            region,
        })
    }

    async fn open(&self, profile: &str) -> Result<AccountSession> {
        if !profiles::profile_exists(profile)? {
            return Err(AwsError::ProfileNotFound(profile.to_string()));
        }

        let config = self.load_config(profile).await;
        let identity = self.resolve_identity(profile, &config).await?;

        let collectors = collectors(&config, &identity);

        Ok(AccountSession {
            identity,
            collectors,
        })
    }
}

#[async_trait]
impl AccountProvider for AwsProvider {
    fn name(&self) -> &str {
        "aws"
    }

    async fn connect(&self, profile: &str) -> invflow_core::Result<AccountSession> {
        Ok(self.open(profile).await?)
    }
}

/// One collector per category, in sheet order
fn collectors(config: &SdkConfig, identity: &AccountIdentity) -> Vec<Arc<dyn ResourceCollector>> {
    let ec2 = aws_sdk_ec2::Client::new(config);
    let rds = aws_sdk_rds::Client::new(config);
    let ecs = aws_sdk_ecs::Client::new(config);
    let network = Arc::new(NetworkLookup::new(ec2.clone()));

    let collectors: Vec<Arc<dyn ResourceCollector>> = vec![
        Arc::new(Ec2InstanceCollector::new(
            ec2.clone(),
            Arc::clone(&network),
            identity.region.clone(),
            identity.account_id.clone(),
        )),
        Arc::new(RdsInstanceCollector::new(rds.clone(), Arc::clone(&network))),
        Arc::new(RdsClusterCollector::new(rds, Arc::clone(&network))),
        Arc::new(LambdaFunctionCollector::new(
            aws_sdk_lambda::Client::new(config),
            Arc::clone(&network),
        )),
        Arc::new(EcsServiceCollector::new(ecs.clone(), Arc::clone(&network))),
        Arc::new(EcsClusterCollector::new(ecs)),
        Arc::new(EksClusterCollector::new(
            aws_sdk_eks::Client::new(config),
            Arc::clone(&network),
        )),
        Arc::new(LoadBalancerCollector::new(
            aws_sdk_elasticloadbalancingv2::Client::new(config),
            Arc::clone(&network),
        )),
        Arc::new(DynamoDbTableCollector::new(aws_sdk_dynamodb::Client::new(config))),
        Arc::new(S3BucketCollector::new(config)),
        Arc::new(VpcEndpointCollector::new(ec2.clone(), network)),
        Arc::new(KmsKeyCollector::new(aws_sdk_kms::Client::new(config))),
        Arc::new(VpcSummaryCollector::new(ec2, identity.region.clone())),
    ];
    collectors
}

/// Alias used when the account has none or IAM denies the lookup
pub fn fallback_alias(account_id: &str) -> String {
    format!("account-{}", account_id)
}
