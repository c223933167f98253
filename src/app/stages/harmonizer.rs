use crate::config::rules::RuleTable;
use crate::domain::model::Dataset;
use serde_json::Value;

/// Renames columns onto the canonical vocabulary of the rule table.
pub struct SchemaHarmonizer<'a> {
    rules: &'a RuleTable,
}

impl<'a> SchemaHarmonizer<'a> {
    pub fn new(rules: &'a RuleTable) -> Self {
        Self { rules }
    }

    pub fn harmonize(&self, datasets: &[Dataset]) -> Vec<Dataset> {
        datasets.iter().map(|d| self.harmonize_one(d)).collect()
    }

    pub fn harmonize_one(&self, dataset: &Dataset) -> Dataset {
        let mapped: Vec<&str> = dataset
            .headers
            .iter()
            .map(|h| self.rules.canonical_name(h))
            .collect();

        let mut headers: Vec<String> = Vec::with_capacity(mapped.len());
        for name in &mapped {
            if !headers.iter().any(|h| h == name) {
                headers.push(name.to_string());
            }
        }

        // For two columns collapsing onto one name, the first original column wins.
        let sources: Vec<Option<usize>> = headers
            .iter()
            .map(|h| mapped.iter().position(|m| m == h))
            .collect();

        let rows = dataset
            .rows
            .iter()
            .map(|row| {
                sources
                    .iter()
                    .map(|source| {
                        source
                            .and_then(|i| row.get(i).cloned())
                            .unwrap_or(Value::Null)
                    })
                    .collect()
            })
            .collect();

        let renamed = dataset
            .headers
            .iter()
            .zip(&mapped)
            .filter(|(original, canonical)| original.as_str() != **canonical)
            .count();
        tracing::debug!("Harmonized {} header(s)", renamed);

        let mut harmonized = Dataset {
            headers,
            rows,
            metadata: dataset.metadata.clone(),
        };
        harmonized.refresh_counts();
        harmonized.set_flag("harmonized", true);
        harmonized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_renames_through_synonyms() {
        let rules = RuleTable::default();
        let dataset = Dataset::new(
            headers(&["Item", "Sales_Date", "Units_Sold", "Region"]),
            vec![vec![json!("Widget"), json!(44197), json!(5), json!("North")]],
        );

        let harmonized = SchemaHarmonizer::new(&rules).harmonize_one(&dataset);

        assert_eq!(
            harmonized.headers,
            headers(&["Product_Name", "Transaction_Date", "Units_Count", "Region"])
        );
        assert_eq!(harmonized.rows[0][0], json!("Widget"));
        assert_eq!(harmonized.flag("harmonized"), Some(&json!(true)));
    }

    #[test]
    fn test_colliding_columns_keep_first_value() {
        let rules = RuleTable::default();
        let dataset = Dataset::new(
            headers(&["Item", "Product", "Price"]),
            vec![vec![json!("a"), json!("b"), json!(1)], vec![json!("c")]],
        );

        let harmonized = SchemaHarmonizer::new(&rules).harmonize_one(&dataset);

        assert_eq!(harmonized.headers, headers(&["Product_Name", "Price"]));
        assert_eq!(harmonized.rows[0], vec![json!("a"), json!(1)]);
        assert_eq!(harmonized.rows[1], vec![json!("c"), Value::Null]);
    }

    #[test]
    fn test_harmonizing_twice_renames_nothing() {
        let rules = RuleTable::default();
        let harmonizer = SchemaHarmonizer::new(&rules);
        let dataset = Dataset::new(
            headers(&["Product", "Date", "Quantity", "Revenue"]),
            vec![vec![json!("x"), json!("2021-02-01"), json!(3), json!(9.5)]],
        );

        let once = harmonizer.harmonize_one(&dataset);
        let twice = harmonizer.harmonize_one(&once);

        assert_eq!(once.headers, twice.headers);
        assert_eq!(once.rows, twice.rows);
    }
}
