use crate::domain::model::{Dataset, Row};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    pub dataset: Dataset,
    pub merge_issues: Vec<String>,
}

/// Concatenates datasets, aligning columns by name.
#[derive(Debug, Default)]
pub struct DatasetMerger;

impl DatasetMerger {
    pub fn new() -> Self {
        Self
    }

    pub fn merge(&self, datasets: &[Dataset]) -> MergeOutcome {
        let mut issues = Vec::new();

        let mut headers: Vec<String> = Vec::new();
        for dataset in datasets {
            for header in &dataset.headers {
                if !headers.contains(header) {
                    headers.push(header.clone());
                }
            }
        }

        if let Some(first) = datasets.first() {
            let reference: BTreeSet<&String> = first.headers.iter().collect();
            for (index, dataset) in datasets.iter().enumerate().skip(1) {
                let columns: BTreeSet<&String> = dataset.headers.iter().collect();
                if columns != reference {
                    let missing: Vec<&str> =
                        reference.difference(&columns).map(|s| s.as_str()).collect();
                    let extra: Vec<&str> =
                        columns.difference(&reference).map(|s| s.as_str()).collect();
                    issues.push(format!(
                        "Schema mismatch: dataset {} differs from dataset 1 (missing: [{}], extra: [{}])",
                        index + 1,
                        missing.join(", "),
                        extra.join(", ")
                    ));
                }
            }
        }

        // Each row is projected through the headers of the dataset it came from.
        let mut rows: Vec<Row> = Vec::new();
        for dataset in datasets {
            // First column wins when a header repeats, as in the harmonizer.
            let mut positions: HashMap<&str, usize> = HashMap::new();
            for (i, h) in dataset.headers.iter().enumerate() {
                positions.entry(h.as_str()).or_insert(i);
            }
            for row in &dataset.rows {
                rows.push(
                    headers
                        .iter()
                        .map(|h| {
                            positions
                                .get(h.as_str())
                                .and_then(|&i| row.get(i).cloned())
                                .unwrap_or(Value::Null)
                        })
                        .collect(),
                );
            }
        }

        let expected: usize = datasets.iter().map(Dataset::row_count).sum();
        if rows.len() != expected {
            issues.push(format!(
                "Row count mismatch: merged {} row(s) but inputs declare {}",
                rows.len(),
                expected
            ));
        }

        let mut merged = Dataset::new(headers, rows);
        merged.set_flag("merged", true);
        merged.set_flag("sourceCount", datasets.len());

        tracing::debug!(
            "Merged {} dataset(s) into {} row(s), {} column(s)",
            datasets.len(),
            merged.rows.len(),
            merged.headers.len()
        );

        MergeOutcome {
            dataset: merged,
            merge_issues: issues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset(headers: &[&str], rows: Vec<Row>) -> Dataset {
        Dataset::new(headers.iter().map(|s| s.to_string()).collect(), rows)
    }

    #[test]
    fn test_union_headers_keep_first_dataset_order() {
        let a = dataset(&["A", "B"], vec![vec![json!(1), json!(2)]]);
        let b = dataset(&["C", "A"], vec![vec![json!(3), json!(4)]]);

        let outcome = DatasetMerger::new().merge(&[a, b]);

        assert_eq!(outcome.dataset.headers, vec!["A", "B", "C"]);
        assert_eq!(
            outcome.dataset.rows,
            vec![
                vec![json!(1), json!(2), Value::Null],
                vec![json!(4), Value::Null, json!(3)],
            ]
        );
        assert_eq!(outcome.merge_issues.len(), 1);
        assert!(outcome.merge_issues[0].starts_with("Schema mismatch"));
    }

    #[test]
    fn test_identical_rows_across_inputs_keep_their_own_layout() {
        let a = dataset(&["A", "B"], vec![vec![json!("x"), json!("y")]]);
        let b = dataset(&["B", "A"], vec![vec![json!("x"), json!("y")]]);

        let outcome = DatasetMerger::new().merge(&[a, b]);

        assert_eq!(outcome.dataset.rows[0], vec![json!("x"), json!("y")]);
        assert_eq!(outcome.dataset.rows[1], vec![json!("y"), json!("x")]);
    }

    #[test]
    fn test_row_count_is_sum_of_inputs() {
        let inputs = vec![
            dataset(&["A"], vec![vec![json!(1)], vec![json!(2)]]),
            dataset(&["A"], vec![vec![json!(3)]]),
            dataset(&["A"], vec![]),
        ];

        let outcome = DatasetMerger::new().merge(&inputs);

        assert_eq!(outcome.dataset.row_count(), 3);
        assert_eq!(outcome.dataset.flag("merged"), Some(&json!(true)));
        assert!(outcome.merge_issues.is_empty());
    }

    #[test]
    fn test_stale_declared_row_count_is_reported() {
        let mut stale = dataset(&["A"], vec![vec![json!(1)]]);
        stale.set_flag("rowCount", 5);

        let outcome = DatasetMerger::new().merge(&[stale]);

        assert!(outcome
            .merge_issues
            .iter()
            .any(|i| i.starts_with("Row count mismatch")));
    }

    #[test]
    fn test_repeated_header_takes_first_column() {
        let input = dataset(&["A", "A"], vec![vec![json!("first"), json!("second")]]);

        let outcome = DatasetMerger::new().merge(&[input]);

        assert_eq!(outcome.dataset.headers, vec!["A"]);
        assert_eq!(outcome.dataset.rows, vec![vec![json!("first")]]);
    }
}
