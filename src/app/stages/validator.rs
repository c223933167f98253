use crate::config::rules::{RuleTable, ValidationRule};
use crate::core::values::{as_number, cell_to_date, cell_to_string, is_missing, NULL_CELL};
use crate::domain::model::Dataset;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowIssue {
    pub row_index: usize,
    pub issues: Vec<String>,
    pub record: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub valid_records_count: usize,
    pub invalid_records_count: usize,
    pub validation_issues: Vec<RowIssue>,
    /// The valid rows, carried on as the next task's input.
    pub dataset: Dataset,
}

impl ValidationOutcome {
    pub fn issue_messages(&self) -> Vec<String> {
        self.validation_issues
            .iter()
            .flat_map(|row| {
                row.issues
                    .iter()
                    .map(move |issue| format!("Row {}: {}", row.row_index + 1, issue))
            })
            .collect()
    }
}

/// Partitions rows into valid and invalid against the rule table.
pub struct Validator<'a> {
    rules: &'a RuleTable,
}

impl<'a> Validator<'a> {
    pub fn new(rules: &'a RuleTable) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &'a RuleTable {
        self.rules
    }

    pub fn validate(&self, dataset: &Dataset) -> ValidationOutcome {
        let mut row_issues: Vec<Vec<String>> = dataset
            .rows
            .iter()
            .map(|row| self.row_issues(dataset, row))
            .collect();

        for rule in &self.rules.validation {
            if let ValidationRule::Unique { column } = rule {
                for (row_index, issue) in unique_violations(dataset, column) {
                    row_issues[row_index].push(issue);
                }
            }
        }

        let mut valid_rows = Vec::new();
        let mut validation_issues = Vec::new();
        for (row_index, issues) in row_issues.into_iter().enumerate() {
            if issues.is_empty() {
                valid_rows.push(dataset.rows[row_index].clone());
            } else {
                validation_issues.push(RowIssue {
                    row_index,
                    issues,
                    record: dataset.row_object(row_index),
                });
            }
        }

        let mut valid = Dataset {
            headers: dataset.headers.clone(),
            rows: valid_rows,
            metadata: dataset.metadata.clone(),
        };
        valid.refresh_counts();
        valid.set_flag("validated", true);

        tracing::debug!(
            "Validated {} row(s): {} valid, {} invalid",
            dataset.rows.len(),
            valid.rows.len(),
            validation_issues.len()
        );

        ValidationOutcome {
            valid_records_count: valid.rows.len(),
            invalid_records_count: validation_issues.len(),
            validation_issues,
            dataset: valid,
        }
    }

    fn row_issues(&self, dataset: &Dataset, row: &[Value]) -> Vec<String> {
        let cell = |name: &str| dataset.column_index(name).map(|i| row.get(i).unwrap_or(&NULL_CELL));
        let mut issues = Vec::new();

        for (col, header) in dataset.headers.iter().enumerate() {
            if is_missing(row.get(col).unwrap_or(&NULL_CELL)) {
                issues.push(format!("Missing value: column '{}'", header));
            }
        }

        for rule in &self.rules.validation {
            match rule {
                ValidationRule::DateOrder { before, after } => {
                    let dates = (
                        cell(before).and_then(cell_to_date),
                        cell(after).and_then(cell_to_date),
                    );
                    if let (Some(start), Some(end)) = dates {
                        if start >= end {
                            issues.push(format!(
                                "Date order violation: {} ({}) must be before {} ({})",
                                before, start, after, end
                            ));
                        }
                    }
                }
                ValidationRule::Max { column, max } => {
                    if let Some(value) = cell(column).and_then(as_number) {
                        if value > *max {
                            issues.push(format!(
                                "Range violation: {} {} exceeds {}",
                                column, value, max
                            ));
                        }
                    }
                }
                ValidationRule::Range { column, min, max } => {
                    if let Some(value) = cell(column).and_then(as_number) {
                        if value < *min || value > *max {
                            issues.push(format!(
                                "Range violation: {} {} outside {}..{}",
                                column, value, min, max
                            ));
                        }
                    }
                }
                ValidationRule::CancelledWithAmount {
                    status_column,
                    amount_column,
                    status,
                } => {
                    if let (Some(state), Some(amount)) = (cell(status_column), cell(amount_column)) {
                        let cancelled = cell_to_string(state).trim().eq_ignore_ascii_case(status);
                        let charged = as_number(amount).is_some_and(|v| v != 0.0);
                        if cancelled && charged {
                            issues.push(format!(
                                "Cross-column violation: {} is '{}' but {} is {}",
                                status_column,
                                status,
                                amount_column,
                                cell_to_string(amount)
                            ));
                        }
                    }
                }
                ValidationRule::Reference { column, allowed } => {
                    if let Some(value) = cell(column).filter(|v| !is_missing(v)) {
                        let text = cell_to_string(value);
                        if !allowed.iter().any(|a| a.eq_ignore_ascii_case(text.trim())) {
                            issues.push(format!(
                                "Reference violation: {} '{}' is not one of [{}]",
                                column,
                                text,
                                allowed.join(", ")
                            ));
                        }
                    }
                }
                ValidationRule::RequiredWith { column, requires } => {
                    if let (Some(value), Some(required)) = (cell(column), cell(requires)) {
                        if !is_missing(value) && is_missing(required) {
                            issues.push(format!(
                                "Constraint violation: {} is set but {} is missing",
                                column, requires
                            ));
                        }
                    }
                }
                ValidationRule::Unique { .. } => {}
            }
        }

        issues
    }
}

/// Later occurrences of a repeated non-blank value, as (row index, issue).
fn unique_violations(dataset: &Dataset, column: &str) -> Vec<(usize, String)> {
    let Some(col) = dataset.column_index(column) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    let mut violations = Vec::new();
    for (row_index, row) in dataset.rows.iter().enumerate() {
        let cell = row.get(col).unwrap_or(&NULL_CELL);
        if is_missing(cell) {
            continue;
        }
        let key = cell_to_string(cell);
        if !seen.insert(key.clone()) {
            violations.push((row_index, format!("Duplicate {}: '{}'", column, key)));
        }
    }
    violations
}
