use crate::config::rules::RuleTable;
use crate::domain::model::{Task, TaskStatus, TaskType, Workflow, WorkflowStatus};
use crate::utils::error::{EngineError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_unique_ids, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

/// A workflow definition plus the engine settings to run it with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub workflow: WorkflowSection,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
    #[serde(default)]
    pub rules: RuleTable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSection {
    pub id: String,
    pub name: String,
    pub owner: String,
    #[serde(default)]
    pub file_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Directory the local file store reads `<file id>.json` / `<file id>.csv` from.
    pub data_dir: String,
    /// Where the result history is written; stdout when unset.
    pub output_path: Option<String>,
    pub progress_delay_ms: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            output_path: None,
            progress_delay_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub id: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub task_type: String,
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

impl WorkflowConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);
        Ok(toml::from_str(&processed_content)?)
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are left as written.
    fn substitute_env_vars(content: &str) -> String {
        static ENV_VAR: OnceLock<Regex> = OnceLock::new();
        let re = ENV_VAR.get_or_init(|| {
            Regex::new(r"\$\{([^}]+)\}").unwrap_or_else(|e| panic!("invalid env pattern: {e}"))
        });

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("workflow.id", &self.workflow.id)?;
        validate_non_empty_string("workflow.name", &self.workflow.name)?;
        validate_non_empty_string("workflow.owner", &self.workflow.owner)?;
        validate_path("engine.data_dir", &self.engine.data_dir)?;
        if let Some(output_path) = &self.engine.output_path {
            validate_path("engine.output_path", output_path)?;
        }

        if self.tasks.is_empty() {
            return Err(EngineError::MissingConfigError {
                field: "tasks".to_string(),
            });
        }
        validate_unique_ids("tasks.id", self.tasks.iter().map(|t| t.id.as_str()))?;
        for task in &self.tasks {
            validate_non_empty_string(&format!("tasks.{}.type", task.id), &task.task_type)?;
            if !task.config.is_null() && !task.config.is_object() {
                return Err(EngineError::InvalidConfigValueError {
                    field: format!("tasks.{}.config", task.id),
                    value: task.config.to_string(),
                    reason: "Task config must be a table".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn progress_delay(&self) -> Duration {
        Duration::from_millis(self.engine.progress_delay_ms)
    }

    /// A fresh draft workflow with every task pending.
    pub fn to_workflow(&self) -> Workflow {
        let tasks = self
            .tasks
            .iter()
            .map(|t| Task {
                id: t.id.clone(),
                name: t.name.clone().unwrap_or_else(|| t.id.clone()),
                task_type: TaskType::from(t.task_type.as_str()),
                agent: t.agent.clone(),
                status: TaskStatus::Pending,
                progress: 0,
                config: t.config.clone(),
            })
            .collect();

        Workflow {
            id: self.workflow.id.clone(),
            name: self.workflow.name.clone(),
            owner_id: self.workflow.owner.clone(),
            tasks,
            file_ids: self.workflow.file_ids.clone(),
            status: WorkflowStatus::Draft,
        }
    }
}

impl Validate for WorkflowConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
