use crate::domain::model::Dataset;
use crate::utils::error::{EngineError, Result};
use serde_json::Value;

/// A task's input once its shape is known.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskInput {
    /// File ids still to be fetched from the file store.
    Files(Vec<String>),
    /// Datasets already in memory, usually a previous task's output.
    Datasets(Vec<Dataset>),
}

impl TaskInput {
    /// `null` falls back to the workflow's attached files.
    pub fn from_value(input: &Value, default_files: &[String]) -> Result<Self> {
        match input {
            Value::Null => {
                if default_files.is_empty() {
                    return Err(resolution_error(
                        "no input given and the workflow has no files",
                    ));
                }
                Ok(TaskInput::Files(default_files.to_vec()))
            }
            Value::Array(items) if items.is_empty() => Err(resolution_error("input is empty")),
            Value::Array(items) => {
                if let Some(ids) = file_ids(items) {
                    return Ok(TaskInput::Files(ids));
                }
                let mut datasets = Vec::new();
                for item in items {
                    datasets.extend(datasets_from_output(item)?);
                }
                Ok(TaskInput::Datasets(datasets))
            }
            Value::Object(_) => Ok(TaskInput::Datasets(datasets_from_output(input)?)),
            other => Err(resolution_error(&format!(
                "unsupported input value {}",
                other
            ))),
        }
    }
}

/// Plain id strings, or `{ "id": ... }` objects that are not datasets.
fn file_ids(items: &[Value]) -> Option<Vec<String>> {
    items
        .iter()
        .map(|item| match item {
            Value::String(id) => Some(id.clone()),
            Value::Object(object) if !object.contains_key("headers") => object
                .get("id")
                .and_then(|id| match id {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                }),
            _ => None,
        })
        .collect()
}

/// Reads the datasets out of a dataset value or any stage output, each row fitted to its headers.
pub fn datasets_from_output(value: &Value) -> Result<Vec<Dataset>> {
    let mut datasets = read_datasets(value)?;
    for dataset in &mut datasets {
        dataset.normalize_rows();
    }
    Ok(datasets)
}

fn read_datasets(value: &Value) -> Result<Vec<Dataset>> {
    let Value::Object(object) = value else {
        return Err(resolution_error("expected a dataset object"));
    };

    if object.contains_key("headers") {
        return Ok(vec![serde_json::from_value(value.clone())?]);
    }
    if let Some(Value::Array(items)) = object.get("datasets") {
        return items
            .iter()
            .map(|item| serde_json::from_value(item.clone()).map_err(EngineError::from))
            .collect();
    }
    if let Some(dataset) = object.get("dataset") {
        return Ok(vec![serde_json::from_value(dataset.clone())?]);
    }
    Err(resolution_error(
        "input has no 'headers', 'datasets' or 'dataset' field",
    ))
}

fn resolution_error(message: &str) -> EngineError {
    EngineError::InputResolutionError {
        message: message.to_string(),
    }
}
