//! Human-facing run output

use colored::Colorize;
use invflow_config::ExportConfig;
use invflow_core::{ExportReport, RunSummary};

const RULE_WIDTH: usize = 70;

pub fn print_banner(config: &ExportConfig, requested: &[String]) {
    let profiles = if requested.is_empty() {
        &config.profiles
    } else {
        requested
    };
    let mode = if config.parallel_profiles && profiles.len() > 1 {
        format!("parallel ({} at a time)", config.max_profile_workers)
    } else {
        "sequential".to_string()
    };

    println!("{}", "═".repeat(RULE_WIDTH));
    println!("{}", "AWS Multi-Profile Resource Exporter".bold());
    println!("{}", "═".repeat(RULE_WIDTH));
    println!("Profiles:    {}", profiles.join(", ").cyan());
    println!("Mode:        {}", mode);
    println!("Workers:     {} per profile", config.max_workers);
    println!("Output dir:  {}", config.output_dir.display());
    println!("Common tags: {}", config.common_tags.join(", "));
    println!();
}

pub fn print_summary(summary: &RunSummary) {
    println!();
    println!("{}", "═".repeat(RULE_WIDTH));
    println!("{}", "Export summary".bold());
    println!("{}", "═".repeat(RULE_WIDTH));

    for report in &summary.reports {
        print_report(report);
    }

    for failure in &summary.failed {
        println!(
            "{} {}: {}",
            "✗".red().bold(),
            failure.profile.bold(),
            failure.error.red()
        );
    }

    println!();
    let line = format!(
        "Exported {}/{} profiles in {:.1}s",
        summary.succeeded.len(),
        summary.total(),
        summary.elapsed.as_secs_f64()
    );
    if summary.all_succeeded() && summary.failed_task_count() == 0 {
        println!("{}", line.green().bold());
    } else {
        println!("{}", line.yellow().bold());
    }
}

fn print_report(report: &ExportReport) {
    let total = report.outcomes.len();
    let succeeded = report.succeeded_count();
    let marker = if succeeded == total {
        "✓".green().bold()
    } else {
        "⚠".yellow().bold()
    };

    println!(
        "{} {} ({} / {})",
        marker,
        report.profile.bold(),
        report.identity.account_id,
        report.identity.account_alias
    );
    println!("    File:       {}", report.path.display());
    println!(
        "    Categories: {}/{} in {:.1}s",
        succeeded,
        total,
        report.elapsed.as_secs_f64()
    );
    for sheet in &report.sheets {
        println!("      {:<20} {} rows", sheet.name, sheet.data_rows);
    }
    for outcome in report.failed() {
        println!(
            "    {} {}: {}",
            "✗".red(),
            outcome.task_name,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
}
