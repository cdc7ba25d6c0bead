//! Fetcher reading datasets from the local filesystem

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use csv::ReaderBuilder;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{normalize_records, DataFetcher, DataFormat};
use crate::DataError;

/// Resolves `file://` URLs and plain paths, relative to an optional root
#[derive(Debug, Clone, Default)]
pub struct FileFetcher {
    root: Option<PathBuf>,
}

impl FileFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, url: &str) -> PathBuf {
        let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Parse delimited text into rows of string fields
    pub fn parse_rows(text: &str, format: DataFormat) -> Result<Vec<Map<String, Value>>, DataError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(format.delimiter())
            .from_reader(text.as_bytes());
        let headers = reader.headers()?.clone();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row: Map<String, Value> = headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_string(), Value::String(v.to_string())))
                .collect();
            rows.push(row);
        }
        Ok(rows)
    }
}

#[async_trait]
impl DataFetcher for FileFetcher {
    async fn fetch(&self, url: &str, format: DataFormat) -> Result<Value, DataError> {
        let path = self.resolve(url);
        info!("Fetching {:?} data from {:?}", format, path);
        let text = tokio::fs::read_to_string(&path).await?;

        if !format.is_tabular() {
            return Ok(serde_json::from_str(&text)?);
        }
        let rows = tokio::task::spawn_blocking(move || Self::parse_rows(&text, format)).await??;
        debug!("Parsed {} rows", rows.len());
        Ok(Value::Object(normalize_records(rows)))
    }
}
