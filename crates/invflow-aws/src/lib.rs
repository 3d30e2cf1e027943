//! AWS provider for invflow
//!
//! Implements [`invflow_core::AccountProvider`] on top of the AWS SDK.
//! A profile is checked against the shared config files, its identity is
//! resolved through STS and IAM, and it gets one collector per resource
//! category:
//!
//! | Category       | Sheet              | Tag shape        |
//! |----------------|--------------------|------------------|
//! | `ec2`          | EC2 Instances      | `[{Key, Value}]` |
//! | `rds`          | RDS Instances      | `[{Key, Value}]` |
//! | `rds-cluster`  | RDS Clusters       | `[{Key, Value}]` |
//! | `lambda`       | Lambda Functions   | map              |
//! | `ecs-service`  | ECS Services       | `[{key, value}]` |
//! | `ecs`          | ECS Clusters       | `[{key, value}]` |
//! | `eks`          | EKS Clusters       | map              |
//! | `elb`          | Load Balancers     | `[{Key, Value}]` |
//! | `dynamodb`     | DynamoDB Tables    | `[{Key, Value}]` |
//! | `s3`           | S3 Buckets         | `[{Key, Value}]` |
//! | `vpc-endpoint` | VPC Endpoints      | `[{Key, Value}]` |
//! | `kms`          | KMS Keys           | `[{Key, Value}]` |
//! | `vpc`          | VPC Summary        | `[{Key, Value}]` |

pub mod collectors;
pub mod error;
pub mod profiles;
pub mod provider;

pub use error::{AwsError, Result};
pub use profiles::{DEFAULT_PROFILE, list_profiles};
pub use provider::AwsProvider;
