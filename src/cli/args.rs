//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Live index of TODO/FIXME annotations
#[derive(Parser, Debug)]
#[command(
    name = "todowatch",
    version = env!("CARGO_PKG_VERSION"),
    about = "Live index of TODO/FIXME annotations across tracked projects",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = "Examples:\n  todowatch init\n  todowatch scan\n  todowatch scan api\n  todowatch list --project api\n  todowatch daemon"
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true, env = "TODOWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write default settings and a sample ignore file
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Display active settings
    Config,

    /// Rescan tracked projects and update the store
    #[command(
        after_help = "Without NAME every tracked project is scanned, or only the active one with --active.\nWith --path the directory is scanned directly, NAME defaulting to its directory name."
    )]
    Scan {
        /// Tracked project to scan
        name: Option<String>,

        /// Scan this directory instead of a registered project root
        #[arg(long, value_name = "DIR", conflicts_with = "active")]
        path: Option<PathBuf>,

        /// Scan only the active project
        #[arg(long, conflicts_with = "name")]
        active: bool,
    },

    /// Print stored annotations
    List {
        /// Only this project
        #[arg(short, long)]
        project: Option<String>,
    },

    /// Drop a project's annotations from the store
    Forget {
        /// Project name as stored
        name: String,
    },

    /// Scan everything, then keep indexes current until interrupted
    Daemon,
}
