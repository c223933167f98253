use crate::config::rules::{ColumnKind, RuleTable};
use crate::core::values::{
    as_number, cell_to_date, cell_to_string, format_date, is_blank, is_missing, number_value,
};
use crate::domain::model::Dataset;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

pub const MISSING_PLACEHOLDER: &str = "N/A";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleaningReport {
    pub original_row_count: usize,
    pub cleaned_row_count: usize,
    pub total_changes: usize,
    pub changes: Vec<String>,
    pub issues: Vec<String>,
}

/// Applies the per-cell repair rules in a fixed order: text, dates, fill, numbers, countries.
pub struct Cleaner<'a> {
    rules: &'a RuleTable,
}

struct CellContext<'c> {
    row: usize,
    header: &'c str,
    kind: Option<ColumnKind>,
}

impl<'a> Cleaner<'a> {
    pub fn new(rules: &'a RuleTable) -> Self {
        Self { rules }
    }

    pub fn clean(&self, datasets: &[Dataset]) -> Vec<(Dataset, CleaningReport)> {
        datasets.iter().map(|d| self.clean_one(d)).collect()
    }

    pub fn clean_one(&self, dataset: &Dataset) -> (Dataset, CleaningReport) {
        let mut cleaned = dataset.clone();
        cleaned.normalize_rows();

        let mut report = CleaningReport {
            original_row_count: dataset.rows.len(),
            ..CleaningReport::default()
        };

        let kinds: Vec<Option<ColumnKind>> = cleaned
            .headers
            .iter()
            .map(|h| self.rules.column_kind(h))
            .collect();

        for (row_index, row) in cleaned.rows.iter_mut().enumerate() {
            for (col, cell) in row.iter_mut().enumerate() {
                let ctx = CellContext {
                    row: row_index + 1,
                    header: &cleaned.headers[col],
                    kind: kinds[col],
                };
                self.clean_cell(&ctx, cell, &mut report);
            }
        }

        report
            .issues
            .extend(duplicate_id_issues(&cleaned, &kinds));

        report.cleaned_row_count = cleaned.rows.len();
        report.total_changes = report.changes.len();

        tracing::debug!(
            "Cleaned {} row(s) with {} change(s), {} issue(s)",
            report.cleaned_row_count,
            report.total_changes,
            report.issues.len()
        );

        cleaned.refresh_counts();
        cleaned.set_flag("cleaned", true);
        cleaned.set_flag(
            "cleaningReport",
            serde_json::to_value(&report).unwrap_or(Value::Null),
        );
        (cleaned, report)
    }

    fn clean_cell(&self, ctx: &CellContext<'_>, cell: &mut Value, report: &mut CleaningReport) {
        if let Value::String(text) = &*cell {
            let normalized = text.trim().to_lowercase();
            if normalized != *text {
                report.changes.push(format!(
                    "Row {}, column '{}': normalized text '{}' to '{}'",
                    ctx.row, ctx.header, text, normalized
                ));
                *cell = Value::String(normalized);
            }
        }

        if ctx.kind == Some(ColumnKind::Date) && !is_blank(cell) {
            match cell_to_date(cell) {
                Some(date) => {
                    let formatted = Value::String(format_date(date));
                    if *cell != formatted {
                        report.changes.push(format!(
                            "Row {}, column '{}': converted date {} to {}",
                            ctx.row, ctx.header, cell, formatted
                        ));
                        *cell = formatted;
                    }
                }
                None => {
                    let message = format!(
                        "Invalid date: row {}, column '{}' value {}",
                        ctx.row, ctx.header, cell
                    );
                    report.changes.push(message.clone());
                    report.issues.push(message);
                    *cell = Value::Null;
                }
            }
        }

        if is_blank(cell) {
            report.changes.push(format!(
                "Row {}, column '{}': filled missing value with {}",
                ctx.row, ctx.header, MISSING_PLACEHOLDER
            ));
            *cell = Value::String(MISSING_PLACEHOLDER.to_string());
        }

        if ctx.kind == Some(ColumnKind::Numeric) {
            if let Value::String(text) = &*cell {
                let digits: String = text
                    .chars()
                    .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                    .collect();
                if let Ok(parsed) = digits.parse::<f64>() {
                    if as_number(cell) != Some(parsed) {
                        report.changes.push(format!(
                            "Row {}, column '{}': cleaned number '{}' to {}",
                            ctx.row, ctx.header, text, parsed
                        ));
                        *cell = number_value(parsed);
                    }
                }
            }
        }

        if ctx.kind == Some(ColumnKind::Country) {
            if let Value::String(text) = &*cell {
                if let Some(canonical) = self.rules.country_alias(text) {
                    if canonical != text.as_str() {
                        report.changes.push(format!(
                            "Row {}, column '{}': standardized country '{}' to '{}'",
                            ctx.row, ctx.header, text, canonical
                        ));
                        *cell = Value::String(canonical.to_string());
                    }
                }
            }
        }
    }
}

fn duplicate_id_issues(dataset: &Dataset, kinds: &[Option<ColumnKind>]) -> Vec<String> {
    let mut issues = Vec::new();
    for (col, kind) in kinds.iter().enumerate() {
        if *kind != Some(ColumnKind::Identifier) {
            continue;
        }
        let mut first_seen: HashMap<String, usize> = HashMap::new();
        for (row_index, row) in dataset.rows.iter().enumerate() {
            let cell = &row[col];
            if is_missing(cell) {
                continue;
            }
            let key = cell_to_string(cell);
            match first_seen.get(&key) {
                Some(first) => issues.push(format!(
                    "Duplicate ID: '{}' in column '{}' at row {} (first seen at row {})",
                    key,
                    dataset.headers[col],
                    row_index + 1,
                    first
                )),
                None => {
                    first_seen.insert(key, row_index + 1);
                }
            }
        }
    }
    issues
}
