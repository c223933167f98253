use crate::domain::model::{Dataset, Task, Workflow, WorkflowResult, WorkflowStatus};
use crate::domain::ports::{FileStore, WorkflowStore};
use crate::utils::error::{EngineError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Parsed uploads keyed by file id. Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFileStore {
    files: Arc<Mutex<HashMap<String, (String, Dataset)>>>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, file_id: &str, owner_id: &str, dataset: Dataset) {
        let mut files = self.files.lock().await;
        files.insert(file_id.to_string(), (owner_id.to_string(), dataset));
    }
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    async fn fetch_dataset(&self, file_id: &str, owner_id: &str) -> Result<Option<Dataset>> {
        let files = self.files.lock().await;
        Ok(files
            .get(file_id)
            .filter(|(owner, _)| owner == owner_id)
            .map(|(_, dataset)| dataset.clone()))
    }
}

/// Workflows and their results. Each call holds the lock for its whole read-modify-write.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkflowStore {
    workflows: Arc<Mutex<HashMap<String, Workflow>>>,
    results: Arc<Mutex<Vec<WorkflowResult>>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, workflow: Workflow) {
        let mut workflows = self.workflows.lock().await;
        workflows.insert(workflow.id.clone(), workflow);
    }

    /// Snapshot without the ownership check.
    pub async fn snapshot(&self, workflow_id: &str) -> Option<Workflow> {
        let workflows = self.workflows.lock().await;
        workflows.get(workflow_id).cloned()
    }

    async fn update<T>(
        &self,
        workflow_id: &str,
        apply: impl FnOnce(&mut Workflow) -> T + Send,
    ) -> Result<T> {
        let mut workflows = self.workflows.lock().await;
        let workflow = workflows
            .get_mut(workflow_id)
            .ok_or_else(|| EngineError::WorkflowNotFound {
                workflow_id: workflow_id.to_string(),
            })?;
        Ok(apply(workflow))
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn get_workflow(&self, workflow_id: &str, owner_id: &str) -> Result<Workflow> {
        let workflows = self.workflows.lock().await;
        workflows
            .get(workflow_id)
            .filter(|w| w.owner_id == owner_id)
            .cloned()
            .ok_or_else(|| EngineError::WorkflowNotFound {
                workflow_id: workflow_id.to_string(),
            })
    }

    async fn save_tasks(&self, workflow_id: &str, tasks: &[Task]) -> Result<()> {
        let tasks = tasks.to_vec();
        self.update(workflow_id, move |w| w.tasks = tasks).await
    }

    async fn set_workflow_status(&self, workflow_id: &str, status: WorkflowStatus) -> Result<()> {
        self.update(workflow_id, move |w| w.status = status).await
    }

    async fn append_result(&self, result: WorkflowResult) -> Result<()> {
        let mut results = self.results.lock().await;
        results.push(result);
        Ok(())
    }

    async fn list_results(&self, workflow_id: &str) -> Result<Vec<WorkflowResult>> {
        let results = self.results.lock().await;
        Ok(results
            .iter()
            .filter(|r| r.workflow_id == workflow_id)
            .cloned()
            .collect())
    }
}
