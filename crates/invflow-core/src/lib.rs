//! invflow export engine
//!
//! Cloud-agnostic core of invflow. An [`AccountProvider`] resolves each
//! profile into an identity and a set of [`ResourceCollector`]s; the
//! [`ProfileExporter`] runs those collectors concurrently into one
//! [`OutputDocument`] per profile and saves it as xlsx; the [`RunController`]
//! drives the exporter over many profiles.
//!
//! Every cell goes through [`sanitize`] and every row ends with the tag
//! columns produced by [`TagNormalizer`].

pub mod document;
pub mod error;
pub mod exporter;
pub mod provider;
pub mod runner;
pub mod sanitize;
pub mod scheduler;
pub mod tags;
mod xlsx;

pub use document::{OutputDocument, RowBuilder, Sheet, SheetSummary, SheetWriter};
pub use error::{InventoryError, Result};
pub use exporter::{ExportReport, ProfileExporter, output_file_name, unknown_services};
pub use provider::{AccountIdentity, AccountProvider, AccountSession, ResourceCollector};
pub use runner::{ProfileFailure, RunController, RunSummary};
pub use sanitize::{CellValue, NOT_AVAILABLE, sanitize};
pub use scheduler::{ResourceTask, TaskOutcome, TaskScheduler};
pub use tags::{CommonTagSet, LowercaseTag, RawTags, StandardTag, TagNormalizer, TagPair};
