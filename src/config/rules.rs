use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How the cleaner treats a column, keyed by column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Date,
    Numeric,
    Country,
    Identifier,
}

/// Row-level business rules evaluated by the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationRule {
    /// `before` must be strictly earlier than `after` when both parse as dates.
    DateOrder { before: String, after: String },
    /// Numeric value must not exceed `max`.
    Max { column: String, max: f64 },
    /// Numeric value must lie within `[min, max]`.
    Range { column: String, min: f64, max: f64 },
    /// A row with `status_column == status` may not carry a nonzero `amount_column`.
    CancelledWithAmount {
        status_column: String,
        amount_column: String,
        status: String,
    },
    /// Non-blank values must be one of `allowed` (case-insensitive).
    Reference { column: String, allowed: Vec<String> },
    /// When `column` is filled, `requires` must be filled too.
    RequiredWith { column: String, requires: String },
    /// Non-blank values must not repeat; the first occurrence is accepted.
    Unique { column: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportColumns {
    pub product: String,
    pub revenue: String,
    pub date: String,
}

impl Default for ReportColumns {
    fn default() -> Self {
        Self {
            product: "Product_Name".to_string(),
            revenue: "Revenue_Amount".to_string(),
            date: "Transaction_Date".to_string(),
        }
    }
}

/// Column-name driven behaviour for every stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleTable {
    pub synonyms: BTreeMap<String, String>,
    pub columns: BTreeMap<String, ColumnKind>,
    pub country_aliases: BTreeMap<String, String>,
    pub validation: Vec<ValidationRule>,
    pub report: ReportColumns,
}

impl Default for RuleTable {
    fn default() -> Self {
        let synonyms = [
            ("Item", "Product_Name"),
            ("Product", "Product_Name"),
            ("Sales_Date", "Transaction_Date"),
            ("Date", "Transaction_Date"),
            ("Quantity", "Units_Count"),
            ("Units_Sold", "Units_Count"),
            ("Total_Revenue", "Revenue_Amount"),
            ("Revenue", "Revenue_Amount"),
        ];

        let mut columns = BTreeMap::new();
        for name in ["Sales_Date", "Date", "Transaction_Date"] {
            columns.insert(name.to_string(), ColumnKind::Date);
        }
        for name in [
            "Price",
            "Total_Revenue",
            "Revenue_Amount",
            "Amount",
            "Quantity",
            "Units_Sold",
            "Units_Count",
        ] {
            columns.insert(name.to_string(), ColumnKind::Numeric);
        }
        columns.insert("Country".to_string(), ColumnKind::Country);
        columns.insert("ID".to_string(), ColumnKind::Identifier);

        let country_aliases = [("usa", "US"), ("united states", "US")];

        let validation = vec![
            ValidationRule::DateOrder {
                before: "Order_Date".to_string(),
                after: "Delivery_Date".to_string(),
            },
            ValidationRule::Max {
                column: "Salary".to_string(),
                max: 1_000_000.0,
            },
            ValidationRule::Range {
                column: "Age".to_string(),
                min: 18.0,
                max: 100.0,
            },
            ValidationRule::CancelledWithAmount {
                status_column: "Status".to_string(),
                amount_column: "Amount".to_string(),
                status: "cancelled".to_string(),
            },
            ValidationRule::Reference {
                column: "Region".to_string(),
                allowed: ["North", "South", "East", "West", "Central"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
            ValidationRule::RequiredWith {
                column: "Region".to_string(),
                requires: "Manager".to_string(),
            },
            ValidationRule::Unique {
                column: "Customer_ID".to_string(),
            },
        ];

        Self {
            synonyms: synonyms
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            columns,
            country_aliases: country_aliases
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            validation,
            report: ReportColumns::default(),
        }
    }
}

impl RuleTable {
    pub fn canonical_name<'a>(&'a self, header: &'a str) -> &'a str {
        self.synonyms.get(header).map(String::as_str).unwrap_or(header)
    }

    pub fn column_kind(&self, header: &str) -> Option<ColumnKind> {
        self.columns.get(header).copied()
    }

    pub fn is_date_column(&self, header: &str) -> bool {
        self.column_kind(header) == Some(ColumnKind::Date)
    }

    /// Canonical spelling for a country value, matched case-insensitively.
    pub fn country_alias(&self, value: &str) -> Option<&str> {
        let needle = value.trim().to_lowercase();
        self.country_aliases
            .iter()
            .find(|(alias, _)| alias.to_lowercase() == needle)
            .map(|(_, canonical)| canonical.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_covers_builtin_columns() {
        let rules = RuleTable::default();
        assert_eq!(rules.canonical_name("Item"), "Product_Name");
        assert_eq!(rules.canonical_name("Product_Name"), "Product_Name");
        assert!(rules.is_date_column("Sales_Date"));
        assert_eq!(rules.column_kind("Units_Count"), Some(ColumnKind::Numeric));
        assert_eq!(rules.country_alias("United States"), Some("US"));
        assert_eq!(rules.country_alias("canada"), None);
        assert_eq!(rules.validation.len(), 7);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let rules: RuleTable = toml::from_str(
            r#"
[columns]
Unit_Price = "numeric"

[[validation]]
kind = "range"
column = "Score"
min = 0.0
max = 10.0
"#,
        )
        .unwrap();

        assert_eq!(rules.column_kind("Unit_Price"), Some(ColumnKind::Numeric));
        assert_eq!(rules.column_kind("Price"), None);
        assert_eq!(rules.canonical_name("Revenue"), "Revenue_Amount");
        assert_eq!(
            rules.validation,
            vec![ValidationRule::Range {
                column: "Score".to_string(),
                min: 0.0,
                max: 10.0
            }]
        );
    }
}
