pub mod cli;
pub mod config;
pub mod filter;
pub mod indexing;
pub mod logging;
pub mod notifications;
pub mod parsing;
pub mod registry;
pub mod storage;
pub mod types;
pub mod watcher;

pub use config::Settings;
pub use filter::{IgnoreFilter, IgnoreRule};
pub use indexing::{ScanEngine, ScanError, ScanReport};
pub use notifications::{NotificationBroadcaster, ScanEvent};
pub use parsing::{Capability, ParseError, ParserDescriptor, ParserRegistry};
pub use registry::{JsonPluginRegistry, JsonProjectRegistry, PluginRegistry, ProjectRegistry};
pub use storage::{AnnotationStore, StoreError};
pub use types::Annotation;
pub use watcher::{ProjectWatcher, WatchError, WatcherState};
