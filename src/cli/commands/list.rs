//! List and Forget commands.

use std::sync::Arc;

use anyhow::{Result, bail};

use crate::config::Settings;
use crate::storage::AnnotationStore;
use crate::types::Annotation;

pub fn run_list(settings: &Settings, project: Option<&str>) -> Result<()> {
    let store = AnnotationStore::load(&settings.store_path())?;

    if let Some(name) = project {
        let Some(annotations) = store.project(name) else {
            bail!("no annotations stored for project '{name}'");
        };
        print_project(name, annotations);
        return Ok(());
    }

    if store.is_empty() {
        println!("No projects scanned yet");
        return Ok(());
    }
    for (name, annotations) in store.projects() {
        print_project(name, annotations);
    }
    Ok(())
}

fn print_project(name: &str, annotations: &[Annotation]) {
    println!("{name} ({})", annotations.len());
    for annotation in annotations {
        let function = annotation
            .function
            .as_deref()
            .map(|f| format!(" [{f}]"))
            .unwrap_or_default();
        println!(
            "  {}:{}{function} {}",
            annotation.file_path.display(),
            annotation.line_number,
            annotation.comment
        );
    }
}

pub async fn run_forget(settings: Arc<Settings>, name: &str) -> Result<()> {
    let engine = super::build_engine(settings);
    if engine.remove_project(name).await? {
        println!("Removed {name}");
    } else {
        println!("{name} was not in the store");
    }
    Ok(())
}
