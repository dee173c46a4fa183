//! JSON persistence of line data
//!
//! The data file is one JSON object mapping `data_{id}` keys to
//! [`LineSnapshot`]s. Storing a line loads the whole document, replaces that
//! line's entry and writes the document back through a temporary file, so
//! other lines (and unrelated keys) survive and a crash mid-write never
//! leaves a truncated document behind.

use super::buffer::LineSnapshot;
use crate::error::{Result, ResultExt, TimePlotError};
use crate::types::LineId;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// A whole data document
pub type Document = Map<String, Value>;

/// Line data file
#[derive(Debug, Clone)]
pub struct DataStore {
    path: PathBuf,
}

impl DataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document; a missing or empty file is an empty document
    pub fn load(&self) -> Result<Document> {
        if !self.path.exists() {
            return Ok(Document::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(TimePlotError::from)
            .with_context(|| format!("Failed to read data file {:?}", self.path))?;
        if content.trim().is_empty() {
            return Ok(Document::new());
        }

        match serde_json::from_str::<Value>(&content)
            .map_err(TimePlotError::from)
            .with_context(|| format!("Failed to parse data file {:?}", self.path))?
        {
            Value::Object(document) => Ok(document),
            other => Err(TimePlotError::InvalidData(format!(
                "data file {:?} holds {} instead of an object",
                self.path,
                json_kind(&other)
            ))),
        }
    }

    /// Overwrite the file with `document`
    pub fn save(&self, document: &Document) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string(document)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)
            .map_err(TimePlotError::from)
            .with_context(|| format!("Failed to write data file {:?}", tmp))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(TimePlotError::from)
            .with_context(|| format!("Failed to replace data file {:?}", self.path))
    }

    /// Store one line, keeping every other entry
    pub fn store_line(&self, line_id: LineId, snapshot: &LineSnapshot) -> Result<()> {
        self.store_lines([(line_id, snapshot)])
    }

    /// Store several lines with a single load/save
    pub fn store_lines<'a>(
        &self,
        lines: impl IntoIterator<Item = (LineId, &'a LineSnapshot)>,
    ) -> Result<()> {
        let mut document = self.load()?;
        let mut stored = 0usize;
        for (line_id, snapshot) in lines {
            document.insert(line_id.data_key(), serde_json::to_value(snapshot)?);
            stored += 1;
        }
        self.save(&document)?;
        tracing::trace!(path = ?self.path, lines = stored, "Stored line data");
        Ok(())
    }

    /// Stored data of one line, if any
    pub fn recall_line(&self, line_id: LineId) -> Result<Option<LineSnapshot>> {
        let mut document = self.load()?;
        match document.remove(&line_id.data_key()) {
            Some(value) => {
                let snapshot = serde_json::from_value(value)
                    .map_err(TimePlotError::from)
                    .with_context(|| format!("Malformed entry for line {}", line_id))?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
