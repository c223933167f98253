use anyhow::Result;
use serde_json::json;
use tabular_flow::core::summary::summarize;
use tabular_flow::domain::ports::WorkflowStore;
use tabular_flow::utils::validation::Validate;
use tabular_flow::{
    InMemoryWorkflowStore, LocalFileStore, TaskStatus, WorkflowConfig, WorkflowEngine,
    WorkflowStatus,
};
use tempfile::TempDir;

fn write_uploads(dir: &std::path::Path) -> Result<()> {
    std::fs::write(
        dir.join("north.csv"),
        "Customer_ID,Region,Manager,Age,Amount,Status\n\
         c1,North,ann,34,120,shipped\n\
         c2,North,ann,17,80,shipped\n\
         c3,West,,45,60,shipped\n",
    )?;
    std::fs::write(
        dir.join("south.json"),
        json!({
            "headers": ["Customer_ID", "Region", "Manager", "Age", "Amount", "Status"],
            "rows": [
                ["c4", "South", "bo", 51, 0, "cancelled"],
                ["c1", "South", "bo", 29, 40, "shipped"]
            ],
            "metadata": {"fileName": "south.xlsx"}
        })
        .to_string(),
    )?;
    Ok(())
}

fn config_for(dir: &std::path::Path) -> Result<WorkflowConfig> {
    let data_dir = dir.to_string_lossy().replace('\\', "/");
    let config = WorkflowConfig::from_toml_str(&format!(
        r#"
[workflow]
id = "customers"
name = "Customer audit"
owner = "auditor"
file_ids = ["north", "south", "west"]

[engine]
data_dir = "{}"

[[tasks]]
id = "analyze"
type = "analyze"

[[tasks]]
id = "validate"
type = "validate"
"#,
        data_dir
    ))?;
    config.validate()?;
    Ok(config)
}

#[tokio::test]
async fn test_workflow_from_config_over_local_files() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_uploads(temp_dir.path())?;
    let config = config_for(temp_dir.path())?;

    let workflow = config.to_workflow();
    let store = InMemoryWorkflowStore::new();
    store.insert(workflow.clone()).await;
    let engine = WorkflowEngine::new(LocalFileStore::new(&config.engine.data_dir), store)
        .with_rules(config.rules.clone())
        .with_progress_delay(config.progress_delay());

    let outcomes = engine.run_workflow(&workflow.id, &workflow.owner_id).await?;
    assert_eq!(outcomes.len(), 2);

    // "west" has no file on disk and is skipped.
    assert_eq!(outcomes[0].metrics.records_processed, 5);
    assert_eq!(outcomes[0].output["datasets"].as_array().map(Vec::len), Some(2));

    let validation = &outcomes[1].output;
    assert_eq!(validation["validRecordsCount"], json!(2));
    assert_eq!(validation["invalidRecordsCount"], json!(3));

    let issues = outcomes[1].metrics.errors_found.clone().unwrap_or_default();
    assert!(issues.iter().any(|i| i.contains("Range violation: Age 17")));
    assert!(issues.iter().any(|i| i.contains("Missing value: column 'Manager'")));
    assert!(issues.iter().any(|i| i.contains("Duplicate Customer_ID: 'c1'")));

    let saved = engine
        .workflows()
        .get_workflow(&workflow.id, &workflow.owner_id)
        .await?;
    assert_eq!(saved.status, WorkflowStatus::Completed);
    assert!(saved.tasks.iter().all(|t| t.status == TaskStatus::Completed));

    let results = engine.workflows().list_results(&workflow.id).await?;
    let summary = summarize(&results);
    assert_eq!(summary.total_executions, 2);
    assert_eq!(summary.completed_tasks, 2);
    assert_eq!(summary.error_histogram.get("Range violation"), Some(&1));
    assert_eq!(summary.error_histogram.get("Duplicate Customer_ID"), Some(&1));

    Ok(())
}

#[tokio::test]
async fn test_results_serialize_with_camel_case_fields() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_uploads(temp_dir.path())?;
    let config = config_for(temp_dir.path())?;

    let workflow = config.to_workflow();
    let store = InMemoryWorkflowStore::new();
    store.insert(workflow.clone()).await;
    let engine = WorkflowEngine::new(LocalFileStore::new(&config.engine.data_dir), store);
    engine.run_workflow(&workflow.id, &workflow.owner_id).await?;

    let results = engine.workflows().list_results(&workflow.id).await?;
    let rendered = serde_json::to_value(&results)?;

    assert_eq!(rendered[0]["taskId"], json!("analyze"));
    assert_eq!(rendered[0]["status"], json!("completed"));
    assert!(rendered[0]["metrics"]["recordsProcessed"].is_u64());
    assert!(rendered[1].get("startedAt").is_some());
    assert!(rendered[1].get("completedAt").is_some());

    Ok(())
}
