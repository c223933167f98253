pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{InMemoryFileStore, InMemoryWorkflowStore, LocalFileStore};
pub use config::rules::RuleTable;
pub use config::workflow_config::WorkflowConfig;
pub use core::engine::WorkflowEngine;
pub use domain::model::{
    Dataset, ExecutionOutcome, ExecutionRequest, Task, TaskStatus, TaskType, Workflow,
    WorkflowResult, WorkflowStatus,
};
pub use utils::error::{EngineError, Result};
