pub mod engine;
pub mod input;
pub mod stage;
pub mod summary;
pub mod values;

pub use crate::domain::model::{Dataset, Task, TaskType, Workflow, WorkflowResult};
pub use crate::domain::ports::{FileStore, WorkflowStore};
pub use crate::utils::error::Result;
