use crate::app::stages::analyzer::{DEFAULT_MIN_OUTLIER_SAMPLES, DEFAULT_OUTLIER_SIGMA};
use crate::app::stages::{
    Analyzer, Cleaner, DatasetMerger, Reporter, SchemaHarmonizer, Validator,
};
use crate::config::rules::RuleTable;
use crate::domain::model::{Dataset, TaskType};
use crate::utils::error::{EngineError, Result};
use crate::utils::validation::{validate_range, Validate};
use serde::Deserialize;
use serde_json::{json, Value};

/// What a stage hands back to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
    pub output: Value,
    pub records_processed: usize,
    /// Data-quality findings. These never fail the task.
    pub issues: Vec<String>,
}

/// Per-task knobs read from the task's free-form `config`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StageOptions {
    pub outlier_sigma: f64,
    pub min_outlier_samples: usize,
    pub harmonize: bool,
    pub report_title: Option<String>,
}

impl Default for StageOptions {
    fn default() -> Self {
        Self {
            outlier_sigma: DEFAULT_OUTLIER_SIGMA,
            min_outlier_samples: DEFAULT_MIN_OUTLIER_SAMPLES,
            harmonize: true,
            report_title: None,
        }
    }
}

impl StageOptions {
    pub fn from_config(config: &Value) -> Result<Self> {
        if config.is_null() {
            return Ok(Self::default());
        }
        let options: Self =
            serde_json::from_value(config.clone()).map_err(|e| EngineError::ConfigError {
                message: format!("invalid task config: {}", e),
            })?;
        options.validate()?;
        Ok(options)
    }
}

impl Validate for StageOptions {
    fn validate(&self) -> Result<()> {
        validate_range("outlierSigma", self.outlier_sigma, 0.5, 10.0)?;
        validate_range("minOutlierSamples", self.min_outlier_samples, 2, usize::MAX)?;
        Ok(())
    }
}

pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;
    fn run(&self, datasets: Vec<Dataset>) -> Result<StageOutcome>;
}

/// The stage for a task type, or `None` for types the engine only echoes.
pub fn stage_for<'a>(
    task_type: &TaskType,
    rules: &'a RuleTable,
    options: &StageOptions,
) -> Option<Box<dyn Stage + 'a>> {
    match task_type {
        TaskType::Analyze => Some(Box::new(
            Analyzer::new(rules)
                .with_outlier_sigma(options.outlier_sigma)
                .with_min_outlier_samples(options.min_outlier_samples),
        )),
        TaskType::Clean => Some(Box::new(Cleaner::new(rules))),
        TaskType::Merge => Some(Box::new(MergeStage {
            rules,
            harmonize: options.harmonize,
        })),
        TaskType::Validate => Some(Box::new(Validator::new(rules))),
        TaskType::Report => {
            let reporter = Reporter::new(&rules.report);
            Some(Box::new(ReportStage {
                reporter: match &options.report_title {
                    Some(title) => reporter.with_title(title.clone()),
                    None => reporter,
                },
                rules,
            }))
        }
        TaskType::Other(_) => None,
    }
}

impl Stage for Analyzer<'_> {
    fn name(&self) -> &'static str {
        "analyze"
    }

    fn run(&self, datasets: Vec<Dataset>) -> Result<StageOutcome> {
        let records_processed = datasets.iter().map(Dataset::row_count).sum();
        let analyzed = self.analyze(&datasets);
        let issues: Vec<String> = analyzed
            .iter()
            .filter_map(|d| d.flag("analysisIssues").and_then(Value::as_array))
            .flatten()
            .filter_map(|issue| issue.as_str().map(str::to_string))
            .collect();
        Ok(StageOutcome {
            output: json!({ "datasets": analyzed, "issuesFound": issues.len() }),
            records_processed,
            issues,
        })
    }
}

impl Stage for Cleaner<'_> {
    fn name(&self) -> &'static str {
        "clean"
    }

    fn run(&self, datasets: Vec<Dataset>) -> Result<StageOutcome> {
        let records_processed = datasets.iter().map(|d| d.rows.len()).sum();
        let (cleaned, reports): (Vec<_>, Vec<_>) = self.clean(&datasets).into_iter().unzip();
        let issues = reports
            .iter()
            .flat_map(|r| r.issues.iter().cloned())
            .collect();
        Ok(StageOutcome {
            output: json!({ "datasets": cleaned, "cleaningReports": reports }),
            records_processed,
            issues,
        })
    }
}

struct MergeStage<'a> {
    rules: &'a RuleTable,
    harmonize: bool,
}

impl Stage for MergeStage<'_> {
    fn name(&self) -> &'static str {
        "merge"
    }

    fn run(&self, datasets: Vec<Dataset>) -> Result<StageOutcome> {
        let inputs = if self.harmonize {
            SchemaHarmonizer::new(self.rules).harmonize(&datasets)
        } else {
            datasets
        };
        let outcome = DatasetMerger::new().merge(&inputs);
        Ok(StageOutcome {
            records_processed: outcome.dataset.rows.len(),
            issues: outcome.merge_issues.clone(),
            output: serde_json::to_value(&outcome)?,
        })
    }
}

impl Stage for Validator<'_> {
    fn name(&self) -> &'static str {
        "validate"
    }

    fn run(&self, datasets: Vec<Dataset>) -> Result<StageOutcome> {
        let (dataset, mut issues) = single_dataset(self.name(), self.rules(), datasets)?;
        let outcome = self.validate(&dataset);
        issues.extend(outcome.issue_messages());
        Ok(StageOutcome {
            records_processed: outcome.valid_records_count + outcome.invalid_records_count,
            issues,
            output: serde_json::to_value(&outcome)?,
        })
    }
}

struct ReportStage<'a> {
    reporter: Reporter<'a>,
    rules: &'a RuleTable,
}

impl Stage for ReportStage<'_> {
    fn name(&self) -> &'static str {
        "report"
    }

    fn run(&self, datasets: Vec<Dataset>) -> Result<StageOutcome> {
        let (dataset, mut issues) = single_dataset(self.name(), self.rules, datasets)?;
        let report = self.reporter.report(&dataset);
        issues.extend(report.report_issues.iter().cloned());
        Ok(StageOutcome {
            records_processed: report.total_records,
            issues,
            output: serde_json::to_value(&report)?,
        })
    }
}

/// Single-dataset stages harmonize and merge multi-file input first; merge issues come back alongside.
fn single_dataset(
    stage: &str,
    rules: &RuleTable,
    mut datasets: Vec<Dataset>,
) -> Result<(Dataset, Vec<String>)> {
    match datasets.len() {
        0 => Err(EngineError::StageError {
            stage: stage.to_string(),
            details: "no dataset to process".to_string(),
        }),
        1 => Ok((datasets.remove(0), Vec::new())),
        _ => {
            let harmonized = SchemaHarmonizer::new(rules).harmonize(&datasets);
            let merged = DatasetMerger::new().merge(&harmonized);
            Ok((merged.dataset, merged.merge_issues))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales(headers: &[&str], rows: Vec<Vec<Value>>) -> Dataset {
        Dataset::new(headers.iter().map(|s| s.to_string()).collect(), rows)
    }

    #[test]
    fn test_unknown_types_have_no_stage() {
        let rules = RuleTable::default();
        let options = StageOptions::default();
        assert!(stage_for(&TaskType::from("summarize"), &rules, &options).is_none());
        assert_eq!(
            stage_for(&TaskType::Clean, &rules, &options).map(|s| s.name()),
            Some("clean")
        );
    }

    #[test]
    fn test_options_from_task_config() {
        let options =
            StageOptions::from_config(&json!({"outlierSigma": 2.5, "reportTitle": "Q3"})).unwrap();
        assert_eq!(options.outlier_sigma, 2.5);
        assert_eq!(options.min_outlier_samples, 10);
        assert!(options.harmonize);
        assert_eq!(options.report_title.as_deref(), Some("Q3"));

        assert!(StageOptions::from_config(&json!({"harmonize": "yes"})).is_err());
        assert!(matches!(
            StageOptions::from_config(&json!({"outlierSigma": 0})),
            Err(EngineError::InvalidConfigValueError { .. })
        ));
    }

    #[test]
    fn test_merge_stage_harmonizes_first() {
        let rules = RuleTable::default();
        let stage = stage_for(&TaskType::Merge, &rules, &StageOptions::default()).unwrap();
        let outcome = stage
            .run(vec![
                sales(&["Item", "Revenue"], vec![vec![json!("a"), json!(1)]]),
                sales(&["Product", "Total_Revenue"], vec![vec![json!("b"), json!(2)]]),
            ])
            .unwrap();

        assert_eq!(outcome.records_processed, 2);
        assert!(outcome.issues.is_empty());
        assert_eq!(
            outcome.output["dataset"]["headers"],
            json!(["Product_Name", "Revenue_Amount"])
        );
    }

    #[test]
    fn test_validate_stage_merges_multiple_inputs() {
        let rules = RuleTable::default();
        let stage = stage_for(&TaskType::Validate, &rules, &StageOptions::default()).unwrap();
        let outcome = stage
            .run(vec![
                sales(&["Age"], vec![vec![json!(30)]]),
                sales(&["Age"], vec![vec![json!(7)]]),
            ])
            .unwrap();

        assert_eq!(outcome.records_processed, 2);
        assert_eq!(outcome.output["validRecordsCount"], json!(1));
        assert_eq!(outcome.output["invalidRecordsCount"], json!(1));
        assert_eq!(outcome.issues.len(), 1);
    }

    #[test]
    fn test_report_stage_keeps_schema_mismatch_issues() {
        let rules = RuleTable::default();
        let stage = stage_for(&TaskType::Report, &rules, &StageOptions::default()).unwrap();

        let outcome = stage
            .run(vec![
                sales(&["Product", "Revenue"], vec![vec![json!("widget"), json!(10)]]),
                sales(&["Product"], vec![vec![json!("gadget")]]),
            ])
            .unwrap();

        assert_eq!(outcome.records_processed, 2);
        assert!(outcome
            .issues
            .iter()
            .any(|i| i.starts_with("Schema mismatch: dataset 2")));
    }

    #[test]
    fn test_report_stage_without_input_fails() {
        let rules = RuleTable::default();
        let stage = stage_for(&TaskType::Report, &rules, &StageOptions::default()).unwrap();
        assert!(matches!(
            stage.run(Vec::new()),
            Err(EngineError::StageError { .. })
        ));
    }
}
