// Adapters layer: concrete FileStore / WorkflowStore backends.

pub mod local;
pub mod memory;

pub use local::LocalFileStore;
pub use memory::{InMemoryFileStore, InMemoryWorkflowStore};
