//! Daemon command: initial batch scan, then watch until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;

use crate::config::Settings;
use crate::notifications::{NotificationBroadcaster, ScanEvent};
use crate::registry::JsonProjectRegistry;
use crate::watcher::ProjectWatcher;

pub async fn run_daemon(settings: Arc<Settings>) -> Result<()> {
    let broadcaster = NotificationBroadcaster::default();
    let engine = super::build_engine(Arc::clone(&settings)).with_broadcaster(broadcaster.clone());
    let projects = JsonProjectRegistry::new(settings.projects_path());

    // Failed projects are logged by the engine; keep going
    let outcomes = engine.scan_all(&projects).await?;
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    crate::log_event!(
        "daemon",
        "initial scan",
        "{} projects, {failed} failed",
        outcomes.len()
    );

    // Subscribed after the batch so only watcher-driven passes are reported
    let printer = tokio::spawn(print_outcomes(broadcaster.subscribe()));

    let mut watcher = ProjectWatcher::builder()
        .engine(engine)
        .build()
        .context("failed to create file watcher")?;
    let watched = watcher.start(&projects)?;
    println!("Watching {watched} projects. Press Ctrl-C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    watcher.stop().await?;
    printer.abort();
    println!("Stopped.");
    Ok(())
}

async fn print_outcomes(mut events: broadcast::Receiver<ScanEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => println!("{}", describe(&event)),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("[daemon] missed {n} scan outcomes");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn describe(event: &ScanEvent) -> String {
    match event {
        ScanEvent::Completed {
            project,
            annotations,
            resolved,
            ..
        } => format!("{project}: {annotations} annotations ({resolved} resolved)"),
        ScanEvent::Failed {
            project, reason, ..
        } => format!("{project}: scan failed: {reason}"),
        ScanEvent::ProjectRemoved { project } => format!("{project}: removed"),
    }
}
