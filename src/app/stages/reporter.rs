use crate::config::rules::ReportColumns;
use crate::core::values::{as_number, cell_to_date, cell_to_string, format_date, is_missing, number_value};
use crate::domain::model::{Dataset, Row};
use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_REPORT_TITLE: &str = "Sales Performance Report";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    #[serde(rename = "type")]
    pub chart_type: String,
    pub title: String,
    pub data: Vec<ChartPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub title: String,
    pub date: String,
    pub summary: String,
    pub total_records: usize,
    pub total_revenue: Value,
    pub charts: Vec<Chart>,
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
    pub report_issues: Vec<String>,
}

pub struct Reporter<'a> {
    columns: &'a ReportColumns,
    title: String,
    now: DateTime<Utc>,
}

impl<'a> Reporter<'a> {
    pub fn new(columns: &'a ReportColumns) -> Self {
        Self {
            columns,
            title: DEFAULT_REPORT_TITLE.to_string(),
            now: Utc::now(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Reference time for the freshness check.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn report(&self, dataset: &Dataset) -> Report {
        let mut issues = Vec::new();
        let revenue_col = dataset.column_index(&self.columns.revenue);
        let product_col = dataset.column_index(&self.columns.product);

        let revenue_of = |row: &Row| {
            revenue_col
                .and_then(|i| row.get(i))
                .and_then(as_number)
                .unwrap_or(0.0)
        };

        let total_revenue: f64 = dataset.rows.iter().map(revenue_of).sum();

        let mut by_product: Vec<(String, f64)> = Vec::new();
        if let (Some(_), Some(product_col)) = (revenue_col, product_col) {
            for row in &dataset.rows {
                let product = row
                    .get(product_col)
                    .filter(|c| !is_missing(c))
                    .map(cell_to_string)
                    .unwrap_or_else(|| "Unknown".to_string());
                let revenue = revenue_of(row);
                match by_product.iter_mut().find(|(name, _)| *name == product) {
                    Some((_, sum)) => *sum += revenue,
                    None => by_product.push((product, revenue)),
                }
            }
        }

        if let Some(latest) = self.latest_date(dataset) {
            let cutoff = self
                .now
                .date_naive()
                .checked_sub_months(Months::new(1))
                .unwrap_or(NaiveDate::MIN);
            if latest < cutoff {
                issues.push(format!(
                    "Stale data: latest {} is {} (older than one month)",
                    self.columns.date,
                    format_date(latest)
                ));
            }
        }

        let has_positive_revenue = dataset.rows.iter().any(|row| revenue_of(row) > 0.0);
        if total_revenue == 0.0 && has_positive_revenue {
            issues.push(
                "Aggregation inconsistency: total revenue is 0 but rows contain positive revenue"
                    .to_string(),
            );
        }

        let summary = format!(
            "Processed {} records with total revenue {:.2} across {} products",
            dataset.rows.len(),
            total_revenue,
            by_product.len()
        );

        tracing::debug!("{}", summary);

        Report {
            title: self.title.clone(),
            date: format_date(self.now.date_naive()),
            summary,
            total_records: dataset.rows.len(),
            total_revenue: number_value(total_revenue),
            charts: vec![
                Chart {
                    chart_type: "bar".to_string(),
                    title: "Revenue by Product".to_string(),
                    data: by_product
                        .into_iter()
                        .map(|(name, value)| ChartPoint {
                            name,
                            value: number_value(value),
                        })
                        .collect(),
                },
                sales_channel_chart(),
            ],
            headers: dataset.headers.clone(),
            rows: dataset.rows.clone(),
            report_issues: issues,
        }
    }

    fn latest_date(&self, dataset: &Dataset) -> Option<NaiveDate> {
        let col = dataset.column_index(&self.columns.date)?;
        dataset
            .rows
            .iter()
            .filter_map(|row| row.get(col).and_then(cell_to_date))
            .max()
    }
}

/// Fixed illustrative breakdown shown next to the revenue chart.
fn sales_channel_chart() -> Chart {
    Chart {
        chart_type: "pie".to_string(),
        title: "Sales Channels".to_string(),
        data: [("Online", 45), ("Retail", 35), ("Wholesale", 20)]
            .iter()
            .map(|(name, share)| ChartPoint {
                name: name.to_string(),
                value: Value::from(*share),
            })
            .collect(),
    }
}
