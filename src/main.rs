use clap::Parser;
use tabular_flow::core::summary::summarize;
use tabular_flow::domain::ports::WorkflowStore;
use tabular_flow::utils::error::ErrorSeverity;
use tabular_flow::utils::{logger, validation::Validate};
use tabular_flow::{
    CliConfig, EngineError, InMemoryWorkflowStore, LocalFileStore, WorkflowConfig, WorkflowEngine,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting tabflow");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = run(&cli).await {
        tracing::error!(
            "❌ Workflow run failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run(cli: &CliConfig) -> Result<(), EngineError> {
    cli.validate()?;

    let mut config = WorkflowConfig::from_file(&cli.config)?;
    if let Some(dir) = &cli.data_dir {
        config.engine.data_dir = dir.clone();
    }
    if let Some(output) = &cli.output {
        config.engine.output_path = Some(output.clone());
    }
    config.validate()?;

    let workflow = config.to_workflow();
    tracing::info!(
        "📋 Loaded workflow '{}' with {} task(s) over {} file(s)",
        workflow.id,
        workflow.tasks.len(),
        workflow.file_ids.len()
    );

    let store = InMemoryWorkflowStore::new();
    store.insert(workflow.clone()).await;

    let engine = WorkflowEngine::new(LocalFileStore::new(&config.engine.data_dir), store)
        .with_rules(config.rules.clone())
        .with_progress_delay(config.progress_delay());

    let outcomes = engine.run_workflow(&workflow.id, &workflow.owner_id).await?;
    let results = engine.workflows().list_results(&workflow.id).await?;

    let summary = summarize(&results);
    tracing::info!(
        "📊 {} task(s) executed, {} record(s) processed, {} issue kind(s)",
        outcomes.len(),
        summary.records_processed,
        summary.error_histogram.len()
    );
    for (kind, count) in &summary.error_histogram {
        tracing::info!("   {}: {}", kind, count);
    }

    let rendered = serde_json::to_string_pretty(&results)?;
    match &config.engine.output_path {
        Some(path) => {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, rendered)?;
            tracing::info!("📁 Results saved to: {}", path);
            println!("✅ Workflow '{}' completed", workflow.id);
            println!("📁 Results saved to: {}", path);
        }
        None => println!("{}", rendered),
    }

    Ok(())
}
