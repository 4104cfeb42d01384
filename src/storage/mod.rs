pub mod error;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::{AnnotationStore, ProjectIndex, resolved_since};
