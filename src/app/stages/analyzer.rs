use crate::config::rules::RuleTable;
use crate::core::values::{as_number, is_blank, parse_date, NULL_CELL};
use crate::domain::model::Dataset;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};

pub const DEFAULT_OUTLIER_SIGMA: f64 = 3.0;
pub const DEFAULT_MIN_OUTLIER_SAMPLES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum CellKind {
    Boolean,
    Date,
    Number,
    Text,
}

impl CellKind {
    fn name(&self) -> &'static str {
        match self {
            CellKind::Boolean => "boolean",
            CellKind::Date => "date",
            CellKind::Number => "number",
            CellKind::Text => "string",
        }
    }
}

/// Profiles datasets for missing values, header problems, mixed types, outliers and duplicates.
pub struct Analyzer<'a> {
    rules: &'a RuleTable,
    outlier_sigma: f64,
    min_outlier_samples: usize,
}

impl<'a> Analyzer<'a> {
    pub fn new(rules: &'a RuleTable) -> Self {
        Self {
            rules,
            outlier_sigma: DEFAULT_OUTLIER_SIGMA,
            min_outlier_samples: DEFAULT_MIN_OUTLIER_SAMPLES,
        }
    }

    pub fn with_outlier_sigma(mut self, sigma: f64) -> Self {
        self.outlier_sigma = sigma;
        self
    }

    /// Outlier detection runs only on columns with more than this many numeric values.
    pub fn with_min_outlier_samples(mut self, samples: usize) -> Self {
        self.min_outlier_samples = samples;
        self
    }

    pub fn analyze(&self, datasets: &[Dataset]) -> Vec<Dataset> {
        datasets.iter().map(|d| self.analyze_one(d)).collect()
    }

    pub fn analyze_one(&self, dataset: &Dataset) -> Dataset {
        let mut issues = self.header_issues(dataset);
        issues.extend(self.cell_issues(dataset));
        issues.extend(self.outlier_issues(dataset));
        issues.extend(duplicate_row_issues(dataset));

        tracing::debug!(
            "Analyzed {} row(s), found {} issue(s)",
            dataset.rows.len(),
            issues.len()
        );

        let mut analyzed = dataset.clone();
        analyzed.set_flag("analyzed", true);
        analyzed.set_flag("issuesFound", issues.len());
        analyzed.set_flag(
            "analysisIssues",
            issues.into_iter().map(Value::String).collect::<Vec<_>>(),
        );
        analyzed
    }

    fn header_issues(&self, dataset: &Dataset) -> Vec<String> {
        let mut issues = Vec::new();
        let mut seen = HashSet::new();
        for (index, header) in dataset.headers.iter().enumerate() {
            if header.trim().is_empty() {
                issues.push(format!(
                    "Invalid header: column {} has an empty name",
                    index + 1
                ));
            } else if !seen.insert(header.as_str()) {
                issues.push(format!(
                    "Duplicate header: '{}' appears more than once",
                    header
                ));
            }
        }
        issues
    }

    fn classify(&self, header: &str, cell: &Value) -> CellKind {
        match cell {
            Value::Bool(_) => CellKind::Boolean,
            Value::Number(_) if self.rules.is_date_column(header) => CellKind::Date,
            Value::Number(_) => CellKind::Number,
            Value::String(_) if as_number(cell).is_some() => CellKind::Number,
            Value::String(s) if parse_date(s).is_some() => CellKind::Date,
            _ => CellKind::Text,
        }
    }

    fn cell_issues(&self, dataset: &Dataset) -> Vec<String> {
        let mut issues = Vec::new();
        let mut kinds: Vec<BTreeSet<CellKind>> = vec![BTreeSet::new(); dataset.headers.len()];

        for (row_index, row) in dataset.rows.iter().enumerate() {
            for (col, header) in dataset.headers.iter().enumerate() {
                let cell = row.get(col).unwrap_or(&NULL_CELL);
                if is_blank(cell) {
                    issues.push(format!(
                        "Missing value: row {}, column '{}'",
                        row_index + 1,
                        header
                    ));
                    continue;
                }
                kinds[col].insert(self.classify(header, cell));
            }
        }

        for (header, found) in dataset.headers.iter().zip(&kinds) {
            if found.len() > 1 {
                let names: Vec<&str> = found.iter().map(CellKind::name).collect();
                issues.push(format!(
                    "Mixed types: column '{}' contains {}",
                    header,
                    names.join(", ")
                ));
            }
        }
        issues
    }

    fn outlier_issues(&self, dataset: &Dataset) -> Vec<String> {
        let mut issues = Vec::new();
        for (col, header) in dataset.headers.iter().enumerate() {
            let values: Vec<(usize, f64)> = dataset
                .rows
                .iter()
                .enumerate()
                .filter_map(|(i, row)| row.get(col).and_then(as_number).map(|v| (i, v)))
                .collect();
            if values.len() <= self.min_outlier_samples {
                continue;
            }

            let (mean, stddev) = sample_mean_stddev(values.iter().map(|(_, v)| *v));
            if stddev == 0.0 {
                continue;
            }
            for (row_index, value) in values {
                if (value - mean).abs() > self.outlier_sigma * stddev {
                    issues.push(format!(
                        "Outlier: row {}, column '{}' value {} (mean {:.2}, stddev {:.2})",
                        row_index + 1,
                        header,
                        value,
                        mean,
                        stddev
                    ));
                }
            }
        }
        issues
    }
}

/// Sample statistics with Bessel's correction.
fn sample_mean_stddev(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let n = values.clone().count();
    if n < 2 {
        return (values.sum::<f64>(), 0.0);
    }
    let mean = values.clone().sum::<f64>() / n as f64;
    let variance = values.map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    (mean, variance.sqrt())
}

fn duplicate_row_issues(dataset: &Dataset) -> Vec<String> {
    let mut issues = Vec::new();
    let mut first_seen: HashMap<String, usize> = HashMap::new();
    for (index, row) in dataset.rows.iter().enumerate() {
        let key = match serde_json::to_string(row) {
            Ok(key) => key,
            Err(_) => continue,
        };
        match first_seen.get(&key) {
            Some(first) => issues.push(format!(
                "Duplicate row: row {} duplicates row {}",
                index + 1,
                first + 1
            )),
            None => {
                first_seen.insert(key, index);
            }
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn issues_of(dataset: &Dataset) -> Vec<String> {
        dataset
            .flag("analysisIssues")
            .and_then(Value::as_array)
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect()
    }

    fn numeric_column(values: &[f64]) -> Dataset {
        Dataset::new(
            vec!["Score".to_string()],
            values.iter().map(|v| vec![json!(v)]).collect(),
        )
    }

    fn base_values() -> Vec<f64> {
        (0..100).map(|i| 10.0 + (i % 5) as f64).collect()
    }

    #[test]
    fn test_flags_value_four_sigma_away() {
        let rules = RuleTable::default();
        let mut values = base_values();
        let (mean, stddev) = sample_mean_stddev(values.iter().copied());
        values.push(mean + 4.0 * stddev);

        let analyzed = Analyzer::new(&rules).analyze_one(&numeric_column(&values));
        let outliers: Vec<String> = issues_of(&analyzed)
            .into_iter()
            .filter(|i| i.starts_with("Outlier"))
            .collect();

        assert_eq!(outliers.len(), 1);
        assert!(outliers[0].starts_with("Outlier: row 101,"));
    }

    #[test]
    fn test_ignores_value_two_sigma_away() {
        let rules = RuleTable::default();
        let mut values = base_values();
        let (mean, stddev) = sample_mean_stddev(values.iter().copied());
        values.push(mean + 2.0 * stddev);

        let analyzed = Analyzer::new(&rules).analyze_one(&numeric_column(&values));

        assert!(!issues_of(&analyzed).iter().any(|i| i.starts_with("Outlier")));
    }

    #[test]
    fn test_small_columns_skip_outlier_detection() {
        let rules = RuleTable::default();
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 1000.0];

        let analyzed = Analyzer::new(&rules).analyze_one(&numeric_column(&values));

        assert!(!issues_of(&analyzed).iter().any(|i| i.starts_with("Outlier")));
        assert_eq!(analyzed.flag("issuesFound"), Some(&json!(0)));
    }

    #[test]
    fn test_reports_headers_missing_values_mixed_types_and_duplicates() {
        let rules = RuleTable::default();
        let dataset = Dataset::new(
            vec![
                "Name".to_string(),
                "Price".to_string(),
                "Name".to_string(),
                "".to_string(),
            ],
            vec![
                vec![json!("a"), json!(5), json!("x"), json!(1)],
                vec![json!("b"), json!("cheap"), json!("y"), Value::Null],
                vec![json!("a"), json!(5), json!("x"), json!(1)],
            ],
        );

        let analyzed = Analyzer::new(&rules).analyze_one(&dataset);
        let issues = issues_of(&analyzed);

        assert!(issues.contains(&"Duplicate header: 'Name' appears more than once".to_string()));
        assert!(issues.contains(&"Invalid header: column 4 has an empty name".to_string()));
        assert!(issues.contains(&"Missing value: row 2, column ''".to_string()));
        assert!(issues.contains(&"Mixed types: column 'Price' contains number, string".to_string()));
        assert!(issues.contains(&"Duplicate row: row 3 duplicates row 1".to_string()));
        assert_eq!(analyzed.flag("analyzed"), Some(&json!(true)));
        assert_eq!(analyzed.flag("issuesFound"), Some(&json!(issues.len())));
    }

    #[test]
    fn test_excel_serials_and_date_strings_share_a_family() {
        let rules = RuleTable::default();
        let dataset = Dataset::new(
            vec!["Transaction_Date".to_string()],
            vec![vec![json!(44197)], vec![json!("2021-02-01")]],
        );

        let analyzed = Analyzer::new(&rules).analyze_one(&dataset);

        assert!(!issues_of(&analyzed).iter().any(|i| i.starts_with("Mixed types")));
    }
}
