//! Per-category AWS collectors
//!
//! Each collector lists one kind of resource, looks up optional details with
//! soft `N/A` defaults and appends one row per resource. Only the top-level
//! list call failing fails the category.

mod dynamodb;
mod ec2;
mod ecs;
mod ecs_service;
mod eks;
mod elb;
mod kms;
mod lambda;
mod network;
mod rds;
mod s3;
mod vpc;
mod vpc_endpoint;

pub use dynamodb::DynamoDbTableCollector;
pub use ec2::Ec2InstanceCollector;
pub use ecs::{BATCH_CLUSTER_PREFIX, EcsClusterCollector};
pub use ecs_service::EcsServiceCollector;
pub use eks::EksClusterCollector;
pub use elb::LoadBalancerCollector;
pub use kms::KmsKeyCollector;
pub use lambda::LambdaFunctionCollector;
pub use network::NetworkLookup;
pub use rds::{RdsClusterCollector, RdsInstanceCollector};
pub use s3::S3BucketCollector;
pub use vpc::VpcSummaryCollector;
pub use vpc_endpoint::VpcEndpointCollector;

use aws_sdk_ec2::primitives::DateTime;
use invflow_core::{LowercaseTag, RawTags, StandardTag};

/// Timestamp layout used in every sheet
pub(crate) const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Tag key/value accessors are `&str` in some SDKs and `Option<&str>` in
/// others
pub(crate) trait TagField {
    fn into_field(self) -> Option<String>;
}

impl TagField for &str {
    fn into_field(self) -> Option<String> {
        Some(self.to_string())
    }
}

impl TagField for Option<&str> {
    fn into_field(self) -> Option<String> {
        self.map(str::to_string)
    }
}

/// Boolean members are `bool` or `Option<bool>` depending on the SDK
/// release; unset counts as false
pub(crate) trait Flag {
    fn is_set(self) -> bool;
}

impl Flag for bool {
    fn is_set(self) -> bool {
        self
    }
}

impl Flag for Option<bool> {
    fn is_set(self) -> bool {
        self.unwrap_or(false)
    }
}

/// `[{Key, Value}]` tags
pub(crate) fn standard_tags<'a, T, K, V>(
    tags: &'a [T],
    key: impl Fn(&'a T) -> K,
    value: impl Fn(&'a T) -> V,
) -> RawTags
where
    K: TagField,
    V: TagField,
{
    RawTags::Standard(
        tags.iter()
            .map(|t| StandardTag {
                key: key(t).into_field(),
                value: value(t).into_field(),
            })
            .collect(),
    )
}

/// `[{key, value}]` tags
pub(crate) fn lowercase_tags<'a, T, K, V>(
    tags: &'a [T],
    key: impl Fn(&'a T) -> K,
    value: impl Fn(&'a T) -> V,
) -> RawTags
where
    K: TagField,
    V: TagField,
{
    RawTags::LowercaseFields(
        tags.iter()
            .map(|t| LowercaseTag {
                key: key(t).into_field(),
                value: value(t).into_field(),
            })
            .collect(),
    )
}

/// Value of the `Name` tag, matched exactly
pub(crate) fn name_tag<'a, T, K, V>(
    tags: &'a [T],
    key: impl Fn(&'a T) -> K,
    value: impl Fn(&'a T) -> V,
) -> Option<String>
where
    K: TagField,
    V: TagField,
{
    tags.iter()
        .find(|t| key(*t).into_field().as_deref() == Some("Name"))
        .and_then(|t| value(t).into_field())
}

pub(crate) fn format_time(time: Option<&DateTime>) -> Option<String> {
    let time = time?;
    chrono::DateTime::from_timestamp(time.secs(), 0).map(|t| t.format(TIME_FORMAT).to_string())
}

/// Comma-joined list, `None` when empty
pub(crate) fn join<I, S>(items: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let items: Vec<String> = items.into_iter().map(|s| s.as_ref().to_string()).collect();
    if items.is_empty() {
        None
    } else {
        Some(items.join(", "))
    }
}
