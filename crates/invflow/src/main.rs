mod summary;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use invflow_aws::AwsProvider;
use invflow_config::ExportConfig;
use invflow_core::RunController;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "invflow", version)]
#[command(
    about = "Export AWS resource inventories of many profiles to xlsx, one workbook per profile",
    long_about = None
)]
struct Cli {
    /// Profiles to export (default: the configured profiles)
    profiles: Vec<String>,

    /// Config file (default: INVFLOW_CONFIG_PATH, ./invflow.kdl, ~/.config/invflow/invflow.kdl)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Concurrent resource categories per profile
    #[arg(short, long, value_name = "N")]
    workers: Option<usize>,

    /// Concurrent profiles in parallel mode
    #[arg(long, value_name = "N")]
    profile_workers: Option<usize>,

    /// Export profiles concurrently (more simultaneous API load)
    #[arg(long)]
    parallel: bool,

    /// Directory the workbooks are written to
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Query this region instead of each profile's own
    #[arg(long, value_name = "REGION")]
    region: Option<String>,

    /// Write the run summary as JSON
    #[arg(long, value_name = "PATH")]
    summary_json: Option<PathBuf>,

    /// List the AWS profiles found in the shared config files and exit
    #[arg(short, long)]
    list_profiles: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// File config with command line overrides applied
    fn export_config(&self) -> anyhow::Result<ExportConfig> {
        let mut config = match &self.config {
            Some(path) => ExportConfig::from_file(path)?,
            None => ExportConfig::load()?,
        };

        if let Some(workers) = self.workers {
            config.max_workers = workers;
        }
        if let Some(workers) = self.profile_workers {
            config.max_profile_workers = workers;
        }
        if self.parallel {
            config.parallel_profiles = true;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(region) = &self.region {
            config.region = Some(region.clone());
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn list_profiles() -> anyhow::Result<()> {
    let profiles = invflow_aws::list_profiles().context("Failed to read AWS profiles")?;

    if profiles.is_empty() {
        println!("{}", "No AWS profiles found".yellow());
        println!(
            "  Configure profiles in {} or {}",
            invflow_aws::profiles::config_file_path().display(),
            invflow_aws::profiles::credentials_file_path().display()
        );
        return Ok(());
    }

    println!("{}", "Available AWS profiles:".bold());
    for profile in profiles {
        println!("  • {}", profile.cyan());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.list_profiles {
        return list_profiles();
    }

    let config = cli
        .export_config()
        .context("Failed to load configuration")?;

    summary::print_banner(&config, &cli.profiles);

    let provider = AwsProvider::with_region(config.region.clone());
    let controller = RunController::new(Arc::new(config), Arc::new(provider));

    let run = tokio::select! {
        summary = controller.run_all(&cli.profiles) => summary,
        _ = tokio::signal::ctrl_c() => {
            eprintln!();
            eprintln!("{}", "✗ Cancelled by user".yellow().bold());
            std::process::exit(1);
        }
    };

    summary::print_summary(&run);

    if let Some(path) = &cli.summary_json {
        let json = serde_json::to_string_pretty(&run)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
        println!("Summary written to {}", path.display());
    }

    Ok(())
}
