use crate::config::rules::RuleTable;
use crate::core::input::TaskInput;
use crate::core::stage::{stage_for, StageOptions, StageOutcome};
use crate::core::summary::latest_results;
use crate::core::{FileStore, WorkflowStore};
use crate::domain::model::{
    Dataset, ExecutionOutcome, ExecutionRequest, ResultMetrics, TaskStatus, TaskType, Workflow,
    WorkflowResult, WorkflowStatus,
};
use crate::utils::error::{EngineError, Result};
use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use std::time::Duration;

/// Progress values published while a task runs.
pub const PROGRESS_STEPS: [u8; 6] = [0, 20, 40, 60, 80, 100];

/// Runs workflow tasks one at a time against the configured stores.
pub struct WorkflowEngine<F: FileStore, W: WorkflowStore> {
    files: F,
    workflows: W,
    rules: RuleTable,
    progress_delay: Duration,
}

impl<F: FileStore, W: WorkflowStore> WorkflowEngine<F, W> {
    pub fn new(files: F, workflows: W) -> Self {
        Self {
            files,
            workflows,
            rules: RuleTable::default(),
            progress_delay: Duration::ZERO,
        }
    }

    pub fn with_rules(mut self, rules: RuleTable) -> Self {
        self.rules = rules;
        self
    }

    /// Pause between progress steps; zero publishes them back to back.
    pub fn with_progress_delay(mut self, delay: Duration) -> Self {
        self.progress_delay = delay;
        self
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn workflows(&self) -> &W {
        &self.workflows
    }

    /// Executes one task and records its result.
    ///
    /// Data-quality issues found by the stage are part of a successful result. Any
    /// error returned here has already marked the task and its workflow as failed.
    pub async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionOutcome> {
        let mut workflow = self
            .workflows
            .get_workflow(&request.workflow_id, &request.owner_id)
            .await?;
        let index = workflow
            .task_index(&request.task_id)
            .ok_or_else(|| EngineError::TaskNotFound {
                workflow_id: request.workflow_id.clone(),
                task_id: request.task_id.clone(),
            })?;

        let task_type = request
            .task_type
            .clone()
            .unwrap_or_else(|| workflow.tasks[index].task_type.clone());
        // Terminal tasks may be re-run for a fresh result but keep their recorded state.
        let tracked = !workflow.tasks[index].status.is_terminal();

        tracing::info!(
            "▶️ Executing task '{}' ({}) in workflow '{}'",
            request.task_id,
            task_type,
            workflow.id
        );

        match self
            .run_task(&mut workflow, index, tracked, &task_type, &request)
            .await
        {
            Ok(outcome) => {
                tracing::info!(
                    "✅ Task '{}' completed (records: {}, issues: {})",
                    outcome.task_id,
                    outcome.metrics.records_processed,
                    outcome.metrics.errors_found.as_ref().map_or(0, Vec::len)
                );
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!("❌ Task '{}' failed: {}", request.task_id, e);
                if tracked {
                    self.record_failure(&mut workflow, index).await;
                }
                Err(e)
            }
        }
    }

    /// Executes every pending task in order, chaining each output into the next task.
    pub async fn run_workflow(
        &self,
        workflow_id: &str,
        owner_id: &str,
    ) -> Result<Vec<ExecutionOutcome>> {
        let workflow = self.workflows.get_workflow(workflow_id, owner_id).await?;
        let history = self.workflows.list_results(workflow_id).await?;
        let latest = latest_results(&history);

        let mut input = Value::Null;
        let mut outcomes = Vec::new();

        for task in &workflow.tasks {
            if task.status.is_terminal() {
                tracing::info!("⏭️ Skipping task '{}' ({:?})", task.id, task.status);
                if let Some(previous) = latest.iter().find(|r| r.task_id == task.id) {
                    input = previous.output.clone();
                }
                continue;
            }

            let request = ExecutionRequest::new(workflow_id, owner_id, &task.id)
                .with_input(input.clone());
            let outcome = self.execute(request).await?;
            input = outcome.output.clone();
            outcomes.push(outcome);
        }

        tracing::info!(
            "🏁 Workflow '{}' finished: {} task(s) executed",
            workflow_id,
            outcomes.len()
        );
        Ok(outcomes)
    }

    async fn run_task(
        &self,
        workflow: &mut Workflow,
        index: usize,
        tracked: bool,
        task_type: &TaskType,
        request: &ExecutionRequest,
    ) -> Result<ExecutionOutcome> {
        let started_at = Utc::now();

        if tracked {
            workflow.tasks[index].status = TaskStatus::Running;
            workflow.tasks[index].progress = PROGRESS_STEPS[0];
            self.workflows
                .save_tasks(&workflow.id, &workflow.tasks)
                .await?;
            if workflow.status == WorkflowStatus::Draft {
                workflow.status = WorkflowStatus::Running;
                self.workflows
                    .set_workflow_status(&workflow.id, WorkflowStatus::Running)
                    .await?;
            }
        }

        let config = if request.config.is_null() {
            &workflow.tasks[index].config
        } else {
            &request.config
        };
        let options = StageOptions::from_config(config)?;

        let outcome = match stage_for(task_type, &self.rules, &options) {
            Some(stage) => {
                let datasets = self
                    .resolve_input(workflow, &request.owner_id, &request.input)
                    .await?;
                self.advance(workflow, index, tracked, PROGRESS_STEPS[1])
                    .await?;
                tracing::debug!(
                    "Running {} stage over {} dataset(s)",
                    stage.name(),
                    datasets.len()
                );
                let outcome = stage.run(datasets)?;
                for step in &PROGRESS_STEPS[2..5] {
                    self.advance(workflow, index, tracked, *step).await?;
                }
                outcome
            }
            None => {
                tracing::warn!("No stage for task type '{}'; echoing input", task_type);
                for step in &PROGRESS_STEPS[1..5] {
                    self.advance(workflow, index, tracked, *step).await?;
                }
                StageOutcome {
                    output: request.input.clone(),
                    records_processed: 0,
                    issues: Vec::new(),
                }
            }
        };

        if tracked {
            workflow.tasks[index].status = TaskStatus::Completed;
            workflow.tasks[index].progress = PROGRESS_STEPS[5];
            self.workflows
                .save_tasks(&workflow.id, &workflow.tasks)
                .await?;
        }

        let errors = (!outcome.issues.is_empty()).then_some(outcome.issues);
        let metrics = ResultMetrics {
            records_processed: outcome.records_processed,
            errors_found: errors.clone(),
        };

        self.workflows
            .append_result(WorkflowResult {
                workflow_id: workflow.id.clone(),
                task_id: request.task_id.clone(),
                status: TaskStatus::Completed,
                output: outcome.output.clone(),
                error: errors,
                metrics: metrics.clone(),
                started_at,
                completed_at: Utc::now(),
            })
            .await?;

        if tracked && workflow.all_tasks_completed() {
            workflow.status = WorkflowStatus::Completed;
            self.workflows
                .set_workflow_status(&workflow.id, WorkflowStatus::Completed)
                .await?;
        }

        Ok(ExecutionOutcome {
            task_id: request.task_id.clone(),
            status: TaskStatus::Completed,
            progress: PROGRESS_STEPS[5],
            output: outcome.output,
            metrics,
        })
    }

    async fn advance(
        &self,
        workflow: &mut Workflow,
        index: usize,
        tracked: bool,
        progress: u8,
    ) -> Result<()> {
        if !tracked {
            return Ok(());
        }
        if !self.progress_delay.is_zero() {
            tokio::time::sleep(self.progress_delay).await;
        }
        workflow.tasks[index].progress = progress;
        tracing::debug!("Task '{}' progress {}%", workflow.tasks[index].id, progress);
        self.workflows.save_tasks(&workflow.id, &workflow.tasks).await
    }

    async fn resolve_input(
        &self,
        workflow: &Workflow,
        owner_id: &str,
        input: &Value,
    ) -> Result<Vec<Dataset>> {
        match TaskInput::from_value(input, &workflow.file_ids)? {
            TaskInput::Files(ids) => self.fetch_all(&ids, owner_id).await,
            TaskInput::Datasets(datasets) => Ok(datasets),
        }
    }

    /// Fetches all files concurrently; unresolvable ones are dropped.
    async fn fetch_all(&self, ids: &[String], owner_id: &str) -> Result<Vec<Dataset>> {
        let results = join_all(
            ids.iter()
                .map(|id| self.files.fetch_dataset(id, owner_id)),
        )
        .await;

        let mut datasets = Vec::with_capacity(ids.len());
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(Some(mut dataset)) => {
                    dataset.normalize_rows();
                    if dataset.flag("rowCount").is_none() {
                        dataset.refresh_counts();
                    }
                    datasets.push(dataset);
                }
                Ok(None) => tracing::warn!("⚠️ File '{}' not found; skipping", id),
                Err(e) => tracing::warn!("⚠️ File '{}' could not be loaded: {}; skipping", id, e),
            }
        }

        if datasets.is_empty() {
            return Err(EngineError::InputResolutionError {
                message: format!(
                    "none of the {} referenced file(s) could be resolved",
                    ids.len()
                ),
            });
        }
        tracing::debug!("Resolved {} of {} file(s)", datasets.len(), ids.len());
        Ok(datasets)
    }

    /// Best effort: persistence errors here are logged, the original error wins.
    async fn record_failure(&self, workflow: &mut Workflow, index: usize) {
        workflow.tasks[index].status = TaskStatus::Failed;
        if let Err(e) = self
            .workflows
            .save_tasks(&workflow.id, &workflow.tasks)
            .await
        {
            tracing::warn!("Could not persist failed task state: {}", e);
        }
        workflow.status = WorkflowStatus::Failed;
        if let Err(e) = self
            .workflows
            .set_workflow_status(&workflow.id, WorkflowStatus::Failed)
            .await
        {
            tracing::warn!("Could not persist failed workflow state: {}", e);
        }
    }
}
