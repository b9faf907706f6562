//! CSV-backed tables with equality lookups.

use std::marker::PhantomData;
use std::path::PathBuf;

use serde::de::DeserializeOwned;

use crate::error::ContextError;

/// A CSV file whose rows deserialize into `R`.
///
/// The file is read on every lookup so edits to the data directory are
/// picked up between sessions without a restart.
#[derive(Debug, Clone)]
pub struct CsvTable<R> {
    path: PathBuf,
    _row: PhantomData<fn() -> R>,
}

impl<R: DeserializeOwned> CsvTable<R> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _row: PhantomData,
        }
    }

    /// Load every row.
    pub fn load(&self) -> Result<Vec<R>, ContextError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| ContextError::TableUnavailable {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        let headers = reader
            .headers()
            .map_err(|e| ContextError::TableUnavailable {
                path: self.path.clone(),
                reason: e.to_string(),
            })?
            .clone();

        let mut rows = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            // Header is line 1.
            let line = idx + 2;
            let malformed = |reason: String| ContextError::MalformedRow {
                path: self.path.clone(),
                row: line,
                reason,
            };
            let record = result.map_err(|e| malformed(e.to_string()))?;
            // Spreadsheet exports pad the sheet with rows of empty cells.
            if record.iter().all(str::is_empty) {
                continue;
            }
            let row = record
                .deserialize::<R>(Some(&headers))
                .map_err(|e| malformed(e.to_string()))?;
            rows.push(row);
        }
        tracing::debug!(path = %self.path.display(), rows = rows.len(), "Loaded table");
        Ok(rows)
    }

    /// Return the first row matching `predicate`, if any.
    pub fn find_first<F>(&self, predicate: F) -> Result<Option<R>, ContextError>
    where
        F: Fn(&R) -> bool,
    {
        Ok(self.load()?.into_iter().find(|row| predicate(row)))
    }
}
