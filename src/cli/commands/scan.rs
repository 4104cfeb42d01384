//! Scan command.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};

use crate::config::Settings;
use crate::indexing::ScanReport;
use crate::registry::{JsonProjectRegistry, ProjectRegistry};

pub async fn run_scan(
    settings: Arc<Settings>,
    name: Option<&str>,
    path: Option<&Path>,
    active: bool,
) -> Result<()> {
    let engine = super::build_engine(Arc::clone(&settings));
    let projects = JsonProjectRegistry::new(settings.projects_path());

    if let Some(root) = path {
        let report = engine.run_scan(root, name.unwrap_or_default()).await?;
        print_report(&report);
        return Ok(());
    }

    if active {
        let root = projects
            .resolve_active()?
            .with_context(|| format!("no active project in {}", projects.path().display()))?;
        let name = projects
            .list_tracked()?
            .into_iter()
            .find(|(_, tracked)| *tracked == root)
            .map(|(name, _)| name)
            .unwrap_or_default();
        let report = engine.run_scan(&root, &name).await?;
        print_report(&report);
        return Ok(());
    }

    if let Some(name) = name {
        let root = projects
            .list_tracked()?
            .into_iter()
            .find(|(tracked, _)| tracked == name)
            .map(|(_, root)| root)
            .with_context(|| {
                format!(
                    "project '{name}' is not tracked in {}",
                    projects.path().display()
                )
            })?;
        let report = engine.run_scan(&root, name).await?;
        print_report(&report);
        return Ok(());
    }

    let outcomes = engine.scan_all(&projects).await?;
    if outcomes.is_empty() {
        println!("No tracked projects in {}", projects.path().display());
        return Ok(());
    }

    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(report) => print_report(report),
            Err(e) => {
                failed += 1;
                eprintln!("{}: scan failed: {e}", outcome.name);
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} projects failed to scan", outcomes.len());
    }
    Ok(())
}

fn print_report(report: &ScanReport) {
    println!(
        "{}: {} annotations ({} resolved) in {} files, {} parse failures",
        report.project,
        report.annotations,
        report.resolved,
        report.files_parsed,
        report.parse_failures
    );
}
