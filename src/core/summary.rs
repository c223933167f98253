//! Aggregates over a workflow's result history, in the shape downstream insight
//! generation consumes.

use crate::domain::model::{TaskStatus, WorkflowResult};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSummary {
    pub total_executions: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub records_processed: usize,
    pub error_histogram: BTreeMap<String, usize>,
    pub executed_tasks: Vec<String>,
}

/// Latest result per task by `completed_at`, in order of each task's first appearance.
pub fn latest_results(results: &[WorkflowResult]) -> Vec<&WorkflowResult> {
    let mut order: Vec<&str> = Vec::new();
    let mut latest: HashMap<&str, &WorkflowResult> = HashMap::new();
    for result in results {
        match latest.get(result.task_id.as_str()) {
            Some(current) if current.completed_at > result.completed_at => {}
            Some(_) => {
                latest.insert(&result.task_id, result);
            }
            None => {
                order.push(&result.task_id);
                latest.insert(&result.task_id, result);
            }
        }
    }
    order.iter().filter_map(|id| latest.get(id).copied()).collect()
}

pub fn summarize(results: &[WorkflowResult]) -> WorkflowSummary {
    let mut summary = WorkflowSummary {
        total_executions: results.len(),
        ..WorkflowSummary::default()
    };

    for result in latest_results(results) {
        summary.executed_tasks.push(result.task_id.clone());
        match result.status {
            TaskStatus::Completed => summary.completed_tasks += 1,
            TaskStatus::Failed => summary.failed_tasks += 1,
            _ => {}
        }
        summary.records_processed += result.metrics.records_processed;
        for issue in result.metrics.errors_found.iter().flatten() {
            *summary
                .error_histogram
                .entry(issue_kind(issue).to_string())
                .or_insert(0) += 1;
        }
    }

    summary
}

/// The `Kind` of a `"Kind: detail"` issue, ignoring a leading `"Row N: "`.
pub fn issue_kind(issue: &str) -> &str {
    let issue = match issue.strip_prefix("Row ") {
        Some(rest) => match rest.split_once(": ") {
            Some((number, detail)) if number.chars().all(|c| c.is_ascii_digit()) => detail,
            _ => issue,
        },
        None => issue,
    };
    issue
        .split_once(':')
        .map(|(kind, _)| kind.trim())
        .unwrap_or("Other")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ResultMetrics;
    use chrono::{TimeZone, Utc};
    use serde_json::Value;

    fn result(task_id: &str, minute: u32, records: usize, errors: &[&str]) -> WorkflowResult {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap();
        WorkflowResult {
            workflow_id: "wf".to_string(),
            task_id: task_id.to_string(),
            status: TaskStatus::Completed,
            output: Value::Null,
            error: None,
            metrics: ResultMetrics {
                records_processed: records,
                errors_found: (!errors.is_empty())
                    .then(|| errors.iter().map(|s| s.to_string()).collect()),
            },
            started_at: at,
            completed_at: at,
        }
    }

    #[test]
    fn test_issue_kind() {
        assert_eq!(issue_kind("Missing value: row 2, column 'A'"), "Missing value");
        assert_eq!(issue_kind("Row 4: Range violation: Age 7 outside 18..100"), "Range violation");
        assert_eq!(issue_kind("something odd"), "Other");
    }

    #[test]
    fn test_latest_result_wins() {
        let results = vec![
            result("t1", 5, 10, &[]),
            result("t2", 6, 4, &["Outlier: row 1, column 'A' value 9"]),
            result("t1", 2, 99, &[]),
            result("t1", 9, 12, &["Duplicate row: row 2 duplicates row 1"]),
        ];

        let latest = latest_results(&results);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].metrics.records_processed, 12);

        let summary = summarize(&results);
        assert_eq!(summary.total_executions, 4);
        assert_eq!(summary.completed_tasks, 2);
        assert_eq!(summary.records_processed, 16);
        assert_eq!(summary.executed_tasks, vec!["t1", "t2"]);
        assert_eq!(summary.error_histogram.get("Outlier"), Some(&1));
        assert_eq!(summary.error_histogram.get("Duplicate row"), Some(&1));
    }
}
