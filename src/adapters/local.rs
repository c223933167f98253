use crate::domain::model::{Cell, Dataset};
use crate::domain::ports::FileStore;
use crate::utils::error::{EngineError, Result};
use async_trait::async_trait;
use serde_json::{Number, Value};
use std::path::{Path, PathBuf};

/// Reads uploads from a directory as `<file id>.json`, `<file id>.csv` or `<file id>.tsv`.
///
/// Local files carry no owner; every caller sees the same directory.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    base_path: PathBuf,
}

impl LocalFileStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn locate(&self, file_id: &str) -> Result<Option<(PathBuf, &'static str)>> {
        if file_id.is_empty()
            || file_id.contains(['/', '\\', '\0'])
            || file_id.starts_with('.')
        {
            return Err(EngineError::StoreError {
                message: format!("invalid file id '{}'", file_id),
            });
        }

        for extension in ["json", "csv", "tsv"] {
            let path = self.base_path.join(format!("{}.{}", file_id, extension));
            if path.is_file() {
                return Ok(Some((path, extension)));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn fetch_dataset(&self, file_id: &str, _owner_id: &str) -> Result<Option<Dataset>> {
        let Some((path, extension)) = self.locate(file_id)? else {
            return Ok(None);
        };
        tracing::debug!("Loading '{}' from {}", file_id, path.display());

        let data = tokio::fs::read(&path).await?;
        let mut dataset = match extension {
            "json" => serde_json::from_slice::<Dataset>(&data)?,
            "tsv" => read_delimited(&data, b'\t')?,
            _ => read_delimited(&data, b',')?,
        };
        if dataset.flag("fileName").is_none() {
            dataset.set_flag("fileName", file_name(&path));
        }
        Ok(Some(dataset))
    }
}

fn read_delimited(data: &[u8], delimiter: u8) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true)
        .from_reader(data);

    let headers = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(parse_field).collect());
    }

    Ok(Dataset::new(headers, rows))
}

/// Empty fields become null, numeric fields become numbers, everything else stays text.
fn parse_field(field: &str) -> Cell {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(integer) = trimmed.parse::<i64>() {
        return Value::Number(integer.into());
    }
    if let Some(number) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(number);
    }
    Value::String(field.to_string())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reads_csv_with_typed_cells() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("jan.csv"),
            "Product,Units_Sold,Price\nWidget,5,2.50\nGadget,,n/a\n",
        )
        .unwrap();

        let store = LocalFileStore::new(dir.path());
        let dataset = store.fetch_dataset("jan", "anyone").await.unwrap().unwrap();

        assert_eq!(dataset.headers, vec!["Product", "Units_Sold", "Price"]);
        assert_eq!(dataset.rows[0], vec![json!("Widget"), json!(5), json!(2.5)]);
        assert_eq!(dataset.rows[1], vec![json!("Gadget"), Value::Null, json!("n/a")]);
        assert_eq!(dataset.row_count(), 2);
        assert_eq!(dataset.flag("fileName"), Some(&json!("jan.csv")));
    }

    #[tokio::test]
    async fn test_reads_json_dataset() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("feb.json"),
            r#"{"headers":["A"],"rows":[[1],[2]],"metadata":{"rowCount":2,"fileName":"feb.xlsx"}}"#,
        )
        .unwrap();

        let store = LocalFileStore::new(dir.path());
        let dataset = store.fetch_dataset("feb", "anyone").await.unwrap().unwrap();

        assert_eq!(dataset.rows.len(), 2);
        assert_eq!(dataset.flag("fileName"), Some(&json!("feb.xlsx")));
    }

    #[tokio::test]
    async fn test_missing_and_invalid_ids() {
        let dir = TempDir::new().unwrap();
        let store = LocalFileStore::new(dir.path());

        assert!(store.fetch_dataset("absent", "anyone").await.unwrap().is_none());
        assert!(store.fetch_dataset("../etc/passwd", "anyone").await.is_err());

        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        assert!(matches!(
            store.fetch_dataset("broken", "anyone").await,
            Err(EngineError::SerializationError(_))
        ));
    }
}
