use super::{Flag, format_time, standard_tags};
use crate::error::{AwsError, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::types::PublicAccessBlockConfiguration;
use invflow_core::{RawTags, ResourceCollector, RowBuilder, SheetWriter, TagNormalizer};
use std::collections::HashMap;
use tokio::sync::Mutex;

const COLUMNS: [&str; 11] = [
    "Bucket Name",
    "Creation Date",
    "Region",
    "Versioning Status",
    "Encryption Type",
    "Public Access Block",
    "Lifecycle Rules",
    "Replication Status",
    "Logging Enabled",
    "Website Hosting",
    "ARN",
];

/// Region of buckets whose location constraint is empty
const LEGACY_DEFAULT_REGION: &str = "us-east-1";

const NOT_CONFIGURED: &str = "Not Configured";

/// Error codes S3 returns when a bucket has no such configuration
mod absent {
    pub const ENCRYPTION: &str = "ServerSideEncryptionConfigurationNotFoundError";
    pub const PUBLIC_ACCESS_BLOCK: &str = "NoSuchPublicAccessBlockConfiguration";
    pub const LIFECYCLE: &str = "NoSuchLifecycleConfiguration";
    pub const REPLICATION: &str = "ReplicationConfigurationNotFoundError";
    pub const WEBSITE: &str = "NoSuchWebsiteConfiguration";
    pub const TAG_SET: &str = "NoSuchTagSet";
}

/// S3 buckets with their configuration summary
///
/// The bucket list and locations come from the profile's region; every
/// other per-bucket call goes to the bucket's own region. A bucket that
/// S3 reports as unconfigured gets the default (`None`, `Disabled`, ...),
/// a call that fails for any other reason renders `N/A`.
pub struct S3BucketCollector {
    s3: S3Client,
    sdk_config: SdkConfig,
    home_region: String,
    regional: Mutex<HashMap<String, S3Client>>,
}

impl S3BucketCollector {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        let home_region = sdk_config
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| LEGACY_DEFAULT_REGION.to_string());
        Self {
            s3: S3Client::new(sdk_config),
            sdk_config: sdk_config.clone(),
            home_region,
            regional: Mutex::new(HashMap::new()),
        }
    }

    async fn run(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> Result<()> {
        let output = self
            .s3
            .list_buckets()
            .send()
            .await
            .map_err(|e| AwsError::api("ListBuckets", e))?;

        for bucket in output.buckets() {
            let Some(name) = bucket.name() else {
                continue;
            };

            let region = self.region(name).await;
            let client = self.client_for(region.as_deref()).await;

            let row = RowBuilder::new()
                .cell(name)
                .cell(format_time(bucket.creation_date()))
                .cell(region.as_deref())
                .cell(versioning(&client, name).await)
                .cell(encryption(&client, name).await)
                .cell(public_access(&client, name).await)
                .cell(lifecycle_rules(&client, name).await)
                .cell(replication(&client, name).await)
                .cell(logging(&client, name).await)
                .cell(website(&client, name).await)
                .cell(bucket_arn(name))
                .tags(tags, &bucket_tags(&client, name).await);
            sheet.append_row(row);
        }
        Ok(())
    }

    async fn region(&self, bucket: &str) -> Option<String> {
        let result = self.s3.get_bucket_location().bucket(bucket).send().await;
        match lookup(bucket, "GetBucketLocation", result, None) {
            Lookup::Found(output) => Some(location_region(
                output.location_constraint().map(|c| c.as_str()),
            )),
            Lookup::Absent | Lookup::Failed => None,
        }
    }

    /// Client for `region`; unknown regions use the profile's client
    async fn client_for(&self, region: Option<&str>) -> S3Client {
        let region = match region {
            Some(region) if region != self.home_region => region,
            _ => return self.s3.clone(),
        };

        let mut regional = self.regional.lock().await;
        regional
            .entry(region.to_string())
            .or_insert_with(|| {
                let config = aws_sdk_s3::config::Builder::from(&self.sdk_config)
                    .region(Region::new(region.to_string()))
                    .build();
                S3Client::from_conf(config)
            })
            .clone()
    }
}

#[async_trait]
impl ResourceCollector for S3BucketCollector {
    fn id(&self) -> &str {
        "s3"
    }

    fn sheet_name(&self) -> &str {
        "S3 Buckets"
    }

    fn columns(&self) -> Vec<String> {
        COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    async fn collect(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> invflow_core::Result<()> {
        Ok(self.run(sheet, tags).await?)
    }
}

/// Result of reading one bucket configuration
#[derive(Debug)]
enum Lookup<T> {
    Found(T),
    /// S3 answered that the configuration does not exist
    Absent,
    Failed,
}

fn lookup<T, E, R>(
    bucket: &str,
    operation: &str,
    result: std::result::Result<T, SdkError<E, R>>,
    absent_code: Option<&str>,
) -> Lookup<T>
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match result {
        Ok(output) => Lookup::Found(output),
        Err(e) => {
            let code = e.as_service_error().and_then(ProvideErrorMetadata::code);
            if absent_code.is_some() && code == absent_code {
                Lookup::Absent
            } else {
                tracing::debug!(
                    "{} failed for {}: {}",
                    operation,
                    bucket,
                    DisplayErrorContext(&e)
                );
                Lookup::Failed
            }
        }
    }
}

async fn versioning(client: &S3Client, bucket: &str) -> Option<String> {
    let result = client.get_bucket_versioning().bucket(bucket).send().await;
    match lookup(bucket, "GetBucketVersioning", result, None) {
        Lookup::Found(output) => Some(
            output
                .status()
                .map(|s| s.as_str().to_string())
                .unwrap_or_else(|| "Disabled".to_string()),
        ),
        Lookup::Absent | Lookup::Failed => None,
    }
}

async fn encryption(client: &S3Client, bucket: &str) -> Option<String> {
    let result = client.get_bucket_encryption().bucket(bucket).send().await;
    match lookup(bucket, "GetBucketEncryption", result, Some(absent::ENCRYPTION)) {
        Lookup::Found(output) => Some(
            output
                .server_side_encryption_configuration()
                .and_then(|c| c.rules().first())
                .and_then(|rule| rule.apply_server_side_encryption_by_default())
                .map(|default| default.sse_algorithm().as_str().to_string())
                .unwrap_or_else(|| "None".to_string()),
        ),
        Lookup::Absent => Some("None".to_string()),
        Lookup::Failed => None,
    }
}

async fn public_access(client: &S3Client, bucket: &str) -> Option<&'static str> {
    let result = client.get_public_access_block().bucket(bucket).send().await;
    match lookup(
        bucket,
        "GetPublicAccessBlock",
        result,
        Some(absent::PUBLIC_ACCESS_BLOCK),
    ) {
        Lookup::Found(output) => Some(
            output
                .public_access_block_configuration()
                .map(public_access_status)
                .unwrap_or(NOT_CONFIGURED),
        ),
        Lookup::Absent => Some(NOT_CONFIGURED),
        Lookup::Failed => None,
    }
}

async fn lifecycle_rules(client: &S3Client, bucket: &str) -> Option<usize> {
    let result = client
        .get_bucket_lifecycle_configuration()
        .bucket(bucket)
        .send()
        .await;
    match lookup(
        bucket,
        "GetBucketLifecycleConfiguration",
        result,
        Some(absent::LIFECYCLE),
    ) {
        Lookup::Found(output) => Some(output.rules().len()),
        Lookup::Absent => Some(0),
        Lookup::Failed => None,
    }
}

async fn replication(client: &S3Client, bucket: &str) -> Option<&'static str> {
    let result = client.get_bucket_replication().bucket(bucket).send().await;
    enabled_status(lookup(
        bucket,
        "GetBucketReplication",
        result,
        Some(absent::REPLICATION),
    ))
}

async fn logging(client: &S3Client, bucket: &str) -> Option<bool> {
    let result = client.get_bucket_logging().bucket(bucket).send().await;
    match lookup(bucket, "GetBucketLogging", result, None) {
        Lookup::Found(output) => Some(output.logging_enabled().is_some()),
        Lookup::Absent | Lookup::Failed => None,
    }
}

async fn website(client: &S3Client, bucket: &str) -> Option<&'static str> {
    let result = client.get_bucket_website().bucket(bucket).send().await;
    enabled_status(lookup(
        bucket,
        "GetBucketWebsite",
        result,
        Some(absent::WEBSITE),
    ))
}

async fn bucket_tags(client: &S3Client, bucket: &str) -> RawTags {
    let result = client.get_bucket_tagging().bucket(bucket).send().await;
    match lookup(bucket, "GetBucketTagging", result, Some(absent::TAG_SET)) {
        Lookup::Found(output) => standard_tags(output.tag_set(), |t| t.key(), |t| t.value()),
        Lookup::Absent | Lookup::Failed => RawTags::None,
    }
}

fn enabled_status<T>(lookup: Lookup<T>) -> Option<&'static str> {
    match lookup {
        Lookup::Found(_) => Some("Enabled"),
        Lookup::Absent => Some("Disabled"),
        Lookup::Failed => None,
    }
}

fn public_access_status(config: &PublicAccessBlockConfiguration) -> &'static str {
    let all_blocked = config.block_public_acls().is_set()
        && config.block_public_policy().is_set()
        && config.ignore_public_acls().is_set()
        && config.restrict_public_buckets().is_set();
    if all_blocked {
        "All Blocked"
    } else {
        "Partially Blocked"
    }
}

/// Empty constraint means us-east-1; `EU` is the legacy name of eu-west-1
fn location_region(constraint: Option<&str>) -> String {
    match constraint {
        None | Some("") => LEGACY_DEFAULT_REGION.to_string(),
        Some("EU") => "eu-west-1".to_string(),
        Some(region) => region.to_string(),
    }
}

fn bucket_arn(bucket: &str) -> String {
    format!("arn:aws:s3:::{}", bucket)
}
