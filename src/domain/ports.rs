use crate::domain::model::{Dataset, Task, Workflow, WorkflowResult, WorkflowStatus};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Source of previously parsed uploads.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// `Ok(None)` when the file does not exist or does not belong to `owner_id`.
    async fn fetch_dataset(&self, file_id: &str, owner_id: &str) -> Result<Option<Dataset>>;
}

/// Persistence for workflows and their execution history.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn get_workflow(&self, workflow_id: &str, owner_id: &str) -> Result<Workflow>;
    async fn save_tasks(&self, workflow_id: &str, tasks: &[Task]) -> Result<()>;
    async fn set_workflow_status(&self, workflow_id: &str, status: WorkflowStatus) -> Result<()>;
    async fn append_result(&self, result: WorkflowResult) -> Result<()>;
    async fn list_results(&self, workflow_id: &str) -> Result<Vec<WorkflowResult>>;
}
