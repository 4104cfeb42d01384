//! Walking project trees and rebuilding their annotation indexes.

mod error;
pub mod scan;
pub mod walker;

pub use error::{ScanError, ScanResult};
pub use scan::{ProjectOutcome, ScanEngine, ScanReport};
pub use walker::ProjectWalker;
