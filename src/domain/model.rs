use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A single spreadsheet cell. Cells keep whatever JSON type the parser produced.
pub type Cell = Value;
pub type Row = Vec<Cell>;

/// In-memory representation of one spreadsheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Dataset {
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Self {
        let mut dataset = Self {
            headers,
            rows,
            metadata: Map::new(),
        };
        dataset.refresh_counts();
        dataset
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Row count as declared in metadata, falling back to the materialized rows.
    pub fn row_count(&self) -> usize {
        self.metadata
            .get("rowCount")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(self.rows.len())
    }

    pub fn refresh_counts(&mut self) {
        self.metadata
            .insert("rowCount".to_string(), Value::from(self.rows.len()));
        self.metadata
            .insert("columnCount".to_string(), Value::from(self.headers.len()));
    }

    /// Pads short rows with nulls and trims long ones so every row matches the headers.
    pub fn normalize_rows(&mut self) {
        let width = self.headers.len();
        for row in &mut self.rows {
            row.resize(width, Value::Null);
        }
    }

    pub fn set_flag(&mut self, key: &str, value: impl Into<Value>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    pub fn flag(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// The row as a header-keyed object, used for issue snapshots.
    pub fn row_object(&self, index: usize) -> Map<String, Value> {
        let mut object = Map::new();
        if let Some(row) = self.rows.get(index) {
            for (i, header) in self.headers.iter().enumerate() {
                object.insert(header.clone(), row.get(i).cloned().unwrap_or(Value::Null));
            }
        }
        object
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskType {
    Analyze,
    Clean,
    Merge,
    Validate,
    Report,
    Other(String),
}

impl From<String> for TaskType {
    fn from(value: String) -> Self {
        match value.to_lowercase().as_str() {
            "analyze" => TaskType::Analyze,
            "clean" => TaskType::Clean,
            "merge" => TaskType::Merge,
            "validate" => TaskType::Validate,
            "report" => TaskType::Report,
            _ => TaskType::Other(value),
        }
    }
}

impl From<&str> for TaskType {
    fn from(value: &str) -> Self {
        TaskType::from(value.to_string())
    }
}

impl From<TaskType> for String {
    fn from(value: TaskType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::Analyze => write!(f, "analyze"),
            TaskType::Clean => write!(f, "clean"),
            TaskType::Merge => write!(f, "merge"),
            TaskType::Validate => write!(f, "validate"),
            TaskType::Report => write!(f, "report"),
            TaskType::Other(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub config: Value,
}

impl Task {
    pub fn new(id: &str, name: &str, task_type: impl Into<TaskType>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            task_type: task_type.into(),
            agent: String::new(),
            status: TaskStatus::Pending,
            progress: 0,
            config: Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub file_ids: Vec<String>,
    #[serde(default)]
    pub status: WorkflowStatus,
}

impl Workflow {
    pub fn task_index(&self, task_id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == task_id)
    }

    pub fn all_tasks_completed(&self) -> bool {
        !self.tasks.is_empty()
            && self
                .tasks
                .iter()
                .all(|t| t.status == TaskStatus::Completed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetrics {
    pub records_processed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors_found: Option<Vec<String>>,
}

/// Persisted record of one task execution. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResult {
    pub workflow_id: String,
    pub task_id: String,
    pub status: TaskStatus,
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Vec<String>>,
    pub metrics: ResultMetrics,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// One call into the engine.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub workflow_id: String,
    pub owner_id: String,
    pub task_id: String,
    /// Overrides the task's declared type when set.
    pub task_type: Option<TaskType>,
    pub input: Value,
    pub config: Value,
}

impl ExecutionRequest {
    pub fn new(workflow_id: &str, owner_id: &str, task_id: &str) -> Self {
        Self {
            workflow_id: workflow_id.to_string(),
            owner_id: owner_id.to_string(),
            task_id: task_id.to_string(),
            task_type: None,
            input: Value::Null,
            config: Value::Null,
        }
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    pub fn with_task_type(mut self, task_type: impl Into<TaskType>) -> Self {
        self.task_type = Some(task_type.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    pub task_id: String,
    pub status: TaskStatus,
    pub progress: u8,
    pub output: Value,
    pub metrics: ResultMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_type_round_trips_through_strings() {
        let task: Task = serde_json::from_value(json!({
            "id": "t1",
            "name": "Clean sheets",
            "type": "clean",
            "agent": "cleaner"
        }))
        .unwrap();
        assert_eq!(task.task_type, TaskType::Clean);
        assert_eq!(task.status, TaskStatus::Pending);

        let custom = TaskType::from("summarize");
        assert_eq!(custom, TaskType::Other("summarize".to_string()));
        assert_eq!(serde_json::to_value(&custom).unwrap(), json!("summarize"));
    }

    #[test]
    fn test_normalize_rows_pads_and_trims() {
        let mut dataset = Dataset::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![json!(1)], vec![json!(1), json!(2), json!(3)]],
        );
        dataset.normalize_rows();
        assert_eq!(dataset.rows[0], vec![json!(1), Value::Null]);
        assert_eq!(dataset.rows[1].len(), 2);
        assert_eq!(dataset.row_count(), 2);
    }

    #[test]
    fn test_metrics_skip_absent_errors() {
        let metrics = ResultMetrics {
            records_processed: 3,
            errors_found: None,
        };
        assert_eq!(
            serde_json::to_value(&metrics).unwrap(),
            json!({"recordsProcessed": 3})
        );
    }
}
