//! End-to-end export tests against an in-memory provider

use async_trait::async_trait;
use invflow_config::ExportConfig;
use invflow_core::{
    AccountIdentity, AccountProvider, AccountSession, InventoryError, ProfileExporter, RawTags,
    ResourceCollector, RowBuilder, RunController, SheetWriter, StandardTag, TagNormalizer,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Copy)]
enum Behavior {
    Rows(usize),
    FailBeforeRows,
    FailAfterRows(usize),
    Panic,
}

struct FakeCollector {
    id: &'static str,
    sheet: &'static str,
    behavior: Behavior,
}

#[async_trait]
impl ResourceCollector for FakeCollector {
    fn id(&self) -> &str {
        self.id
    }

    fn sheet_name(&self) -> &str {
        self.sheet
    }

    fn columns(&self) -> Vec<String> {
        vec!["Resource ID".to_string(), "Size".to_string()]
    }

    async fn collect(&self, sheet: &SheetWriter, tags: &TagNormalizer) -> invflow_core::Result<()> {
        tokio::time::sleep(Duration::from_millis(5)).await;

        let (rows, fail) = match self.behavior {
            Behavior::Rows(n) => (n, false),
            Behavior::FailBeforeRows => (0, true),
            Behavior::FailAfterRows(n) => (n, true),
            Behavior::Panic => panic!("unexpected payload from {}", self.id),
        };

        for i in 0..rows {
            let raw = RawTags::Standard(vec![
                StandardTag {
                    key: Some("Name".to_string()),
                    value: Some(format!("{}-{}", self.id, i)),
                },
                StandardTag {
                    key: Some("Team".to_string()),
                    value: Some("core".to_string()),
                },
            ]);
            sheet.append_row(
                RowBuilder::new()
                    .cell(format!("{}-{}", self.id, i))
                    .cell(i)
                    .tags(tags, &raw),
            );
        }

        if fail {
            return Err(InventoryError::Api(format!("{} access denied", self.id)));
        }
        Ok(())
    }
}

struct FakeProvider {
    categories: Vec<(&'static str, &'static str, Behavior)>,
}

impl FakeProvider {
    fn new(categories: Vec<(&'static str, &'static str, Behavior)>) -> Self {
        Self { categories }
    }
}

#[async_trait]
impl AccountProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn connect(&self, profile: &str) -> invflow_core::Result<AccountSession> {
        if profile == "missing" {
            return Err(InventoryError::ProfileNotFound(profile.to_string()));
        }

        let collectors = self
            .categories
            .iter()
            .map(|(id, sheet, behavior)| {
                Arc::new(FakeCollector {
                    id: *id,
                    sheet: *sheet,
                    behavior: *behavior,
                }) as Arc<dyn ResourceCollector>
            })
            .collect();

        Ok(AccountSession {
            identity: AccountIdentity {
                profile: profile.to_string(),
                account_id: "111122223333".to_string(),
                account_alias: format!("{}-alias", profile),
                region: "us-east-1".to_string(),
            },
            collectors,
        })
    }
}

fn config(output_dir: &Path) -> ExportConfig {
    ExportConfig {
        common_tags: vec!["Name".to_string(), "Environment".to_string()],
        max_workers: 2,
        output_prefix: "test_inventory".to_string(),
        output_dir: output_dir.to_path_buf(),
        ..Default::default()
    }
}

fn three_categories(second: Behavior) -> FakeProvider {
    FakeProvider::new(vec![
        ("alpha", "Alpha", Behavior::Rows(3)),
        ("beta", "Beta", second),
        ("gamma", "Gamma", Behavior::Rows(2)),
    ])
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_category_leaves_header_only_sheet() {
    let temp_dir = tempfile::tempdir().unwrap();
    let exporter = ProfileExporter::new(
        Arc::new(config(temp_dir.path())),
        Arc::new(three_categories(Behavior::FailBeforeRows)),
    );

    let report = exporter.export_profile("prod").await.unwrap();

    assert_eq!(report.sheets.len(), 3);
    let rows: BTreeMap<&str, usize> = report
        .sheets
        .iter()
        .map(|s| (s.name.as_str(), s.data_rows))
        .collect();
    assert_eq!(rows["Alpha"], 3);
    assert_eq!(rows["Beta"], 0);
    assert_eq!(rows["Gamma"], 2);

    // 2 category columns + Tag_Name + Tag_Environment + Additional_Tags
    assert!(report.sheets.iter().all(|s| s.columns == 5));

    assert_eq!(report.succeeded_count(), 2);
    assert_eq!(report.failed_count(), 1);
    let failure = report.failed().next().unwrap();
    assert_eq!(failure.task_name, "Beta");
    assert!(failure.error.as_deref().unwrap().contains("beta access denied"));

    assert!(report.path.exists());
    let file_name = report.path.file_name().unwrap().to_str().unwrap();
    assert!(file_name.starts_with("test_inventory_"));
    assert!(file_name.ends_with("_111122223333-prod-alias.xlsx"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_partial_rows_survive_failure() {
    let temp_dir = tempfile::tempdir().unwrap();
    let exporter = ProfileExporter::new(
        Arc::new(config(temp_dir.path())),
        Arc::new(three_categories(Behavior::FailAfterRows(4))),
    );

    let report = exporter.export_profile("prod").await.unwrap();

    let beta = report.sheets.iter().find(|s| s.name == "Beta").unwrap();
    assert_eq!(beta.data_rows, 4);
    assert_eq!(report.failed_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_panicking_category_is_isolated() {
    let temp_dir = tempfile::tempdir().unwrap();
    let exporter = ProfileExporter::new(
        Arc::new(config(temp_dir.path())),
        Arc::new(three_categories(Behavior::Panic)),
    );

    let report = exporter.export_profile("prod").await.unwrap();

    assert_eq!(report.outcomes.len(), 3);
    let failure = report.failed().next().unwrap();
    assert_eq!(failure.task_name, "Beta");
    assert!(failure.error.as_deref().unwrap().starts_with("task panicked"));
    assert!(report.path.exists());
}

#[tokio::test]
async fn test_service_filter_limits_sheets() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = ExportConfig {
        services: vec!["GAMMA".to_string()],
        ..config(temp_dir.path())
    };
    let exporter = ProfileExporter::new(
        Arc::new(config),
        Arc::new(three_categories(Behavior::Rows(1))),
    );

    let report = exporter.export_profile("prod").await.unwrap();

    assert_eq!(report.sheets.len(), 1);
    assert_eq!(report.sheets[0].name, "Gamma");
    assert_eq!(report.outcomes.len(), 1);
}

#[tokio::test]
async fn test_unknown_profile_fails_export() {
    let temp_dir = tempfile::tempdir().unwrap();
    let exporter = ProfileExporter::new(
        Arc::new(config(temp_dir.path())),
        Arc::new(three_categories(Behavior::Rows(1))),
    );

    let result = exporter.export_profile("missing").await;

    assert!(matches!(result, Err(InventoryError::ProfileNotFound(_))));
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_run_continues_after_failed_profile() {
    let temp_dir = tempfile::tempdir().unwrap();
    let controller = RunController::new(
        Arc::new(config(temp_dir.path())),
        Arc::new(three_categories(Behavior::FailBeforeRows)),
    );

    let profiles = vec!["dev".to_string(), "missing".to_string(), "prod".to_string()];
    let summary = controller.run_all(&profiles).await;

    assert_eq!(summary.succeeded, vec!["dev", "prod"]);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].profile, "missing");
    assert!(summary.failed[0].error.contains("missing"));
    assert_eq!(summary.failed_task_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_profiles_keep_input_order() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = ExportConfig {
        parallel_profiles: true,
        max_profile_workers: 2,
        ..config(temp_dir.path())
    };
    let controller = RunController::new(
        Arc::new(config),
        Arc::new(three_categories(Behavior::Rows(2))),
    );

    let profiles: Vec<String> = ["a", "b", "missing", "c"].iter().map(|p| p.to_string()).collect();
    let summary = controller.run_all(&profiles).await;

    assert_eq!(summary.succeeded, vec!["a", "b", "c"]);
    assert_eq!(summary.failed[0].profile, "missing");
    let exported: Vec<&str> = summary.reports.iter().map(|r| r.profile.as_str()).collect();
    assert_eq!(exported, vec!["a", "b", "c"]);
    assert!(summary.reports.iter().all(|r| r.path.exists()));
}

#[tokio::test]
async fn test_empty_profile_list_uses_configured_profiles() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = ExportConfig {
        profiles: vec!["staging".to_string()],
        ..config(temp_dir.path())
    };
    let controller = RunController::new(
        Arc::new(config),
        Arc::new(three_categories(Behavior::Rows(1))),
    );

    let summary = controller.run_all(&[]).await;

    assert_eq!(summary.succeeded, vec!["staging"]);
    assert!(summary.all_succeeded());
}
