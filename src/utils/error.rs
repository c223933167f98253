use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Workflow not found: {workflow_id}")]
    WorkflowNotFound { workflow_id: String },

    #[error("Task '{task_id}' not found in workflow '{workflow_id}'")]
    TaskNotFound { workflow_id: String, task_id: String },

    #[error("Input resolution failed: {message}")]
    InputResolutionError { message: String },

    #[error("Stage '{stage}' failed: {details}")]
    StageError { stage: String, details: String },

    #[error("Store error: {message}")]
    StoreError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Workflow,
    Stage,
    Storage,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EngineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::InputResolutionError { .. } | EngineError::CsvError(_) => {
                ErrorCategory::Input
            }
            EngineError::WorkflowNotFound { .. } | EngineError::TaskNotFound { .. } => {
                ErrorCategory::Workflow
            }
            EngineError::StageError { .. } | EngineError::SerializationError(_) => {
                ErrorCategory::Stage
            }
            EngineError::StoreError { .. } | EngineError::IoError(_) => ErrorCategory::Storage,
            EngineError::TomlError(_)
            | EngineError::ConfigError { .. }
            | EngineError::InvalidConfigValueError { .. }
            | EngineError::MissingConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input => ErrorSeverity::Medium,
            ErrorCategory::Workflow | ErrorCategory::Stage => ErrorSeverity::High,
            ErrorCategory::Storage | ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EngineError::WorkflowNotFound { workflow_id } => {
                format!("Workflow '{}' does not exist or is not yours", workflow_id)
            }
            EngineError::TaskNotFound { task_id, .. } => {
                format!("Task '{}' is not part of this workflow", task_id)
            }
            EngineError::InputResolutionError { message } => {
                format!("Could not load the task input: {}", message)
            }
            EngineError::StageError { stage, .. } => {
                format!("The {} stage could not process the data", stage)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Input => "Check that the referenced files were uploaded and parsed",
            ErrorCategory::Workflow => "Check the workflow and task identifiers",
            ErrorCategory::Stage => "Inspect the task input; re-run the previous task if needed",
            ErrorCategory::Storage => "Check that the store is reachable and writable",
            ErrorCategory::Configuration => "Fix the configuration file and try again",
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_and_severity() {
        let err = EngineError::TaskNotFound {
            workflow_id: "wf".to_string(),
            task_id: "t9".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Workflow);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(err.user_friendly_message().contains("t9"));

        let err = EngineError::InputResolutionError {
            message: "no files".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert!(err.to_string().contains("no files"));
    }

    #[test]
    fn test_config_errors_are_critical() {
        let err = EngineError::MissingConfigError {
            field: "workflow.id".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }
}
