//! Account provider and resource collector traits
//!
//! A provider turns a profile name into an [`AccountSession`]: the resolved
//! account identity plus one [`ResourceCollector`] per resource category, all
//! bound to that profile's credentials and region.

use crate::document::SheetWriter;
use crate::error::Result;
use crate::tags::TagNormalizer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Who a profile resolved to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountIdentity {
    pub profile: String,
    pub account_id: String,
    pub account_alias: String,
    pub region: String,
}

/// One resource category of one account
///
/// Implementations list and describe their resources and append one row per
/// resource to the sheet they are given. Lookups of optional sub-resources
/// should fall back to `N/A` locally; returning an error marks the whole
/// category as failed.
#[async_trait]
pub trait ResourceCollector: Send + Sync {
    /// Short category id used by the `services` filter (e.g. "ec2")
    fn id(&self) -> &str;

    /// Name of the sheet this category writes to
    fn sheet_name(&self) -> &str;

    /// Category-specific column headers; tag columns are appended after them
    fn columns(&self) -> Vec<String>;

    /// Collect every resource and append its rows to `sheet`
    async fn collect(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> Result<()>;
}

/// A resolved profile ready for export
pub struct AccountSession {
    pub identity: AccountIdentity,
    pub collectors: Vec<Arc<dyn ResourceCollector>>,
}

impl std::fmt::Debug for AccountSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let categories: Vec<&str> = self.collectors.iter().map(|c| c.id()).collect();
        f.debug_struct("AccountSession")
            .field("identity", &self.identity)
            .field("collectors", &categories)
            .finish()
    }
}

/// Resolves profiles against a remote API
#[async_trait]
pub trait AccountProvider: Send + Sync {
    /// Provider name (e.g. "aws")
    fn name(&self) -> &str;

    /// Resolve a profile's identity and build its collectors
    ///
    /// Fails when the profile is unknown or its identity cannot be resolved.
    async fn connect(&self, profile: &str) -> Result<AccountSession>;
}
