//! JSON -> CSV normalization for downloaded charge files.
//!
//! A downloaded JSON document is classified into a [`DocumentShape`], turned
//! into a list of records, conformed to one sorted header and written next to
//! the source as `.csv`. The source is deleted only after the CSV is on disk.

use crate::domain::model::{ChargeRecord, OutputTable};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 依優先順序檢查的慣用 key
pub const KNOWN_RECORD_KEYS: [&str; 3] = ["data", "charges", "results"];

/// 純量清單使用的唯一欄位
pub const SCALAR_COLUMN: &str = "value";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// How nested objects/arrays inside a record end up in a CSV cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum NestedValues {
    /// Compact JSON text in a single cell.
    #[default]
    Stringify,
    /// Dotted column names, e.g. `payer.name` or `codes.0`.
    Flatten,
    /// Fail the conversion.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeErrorKind {
    ParseError,
    UnsupportedFormat,
    EmptyData,
    IoError,
}

impl fmt::Display for NormalizeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NormalizeErrorKind::ParseError => "ParseError",
            NormalizeErrorKind::UnsupportedFormat => "UnsupportedFormat",
            NormalizeErrorKind::EmptyData => "EmptyData",
            NormalizeErrorKind::IoError => "IOError",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unexpected JSON format: {0}")]
    UnsupportedFormat(String),

    #[error("no data found in JSON")]
    EmptyData,

    #[error("file operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),
}

impl NormalizeError {
    pub fn kind(&self) -> NormalizeErrorKind {
        match self {
            NormalizeError::Parse(_) => NormalizeErrorKind::ParseError,
            NormalizeError::UnsupportedFormat(_) => NormalizeErrorKind::UnsupportedFormat,
            NormalizeError::EmptyData => NormalizeErrorKind::EmptyData,
            NormalizeError::Io(_) | NormalizeError::Csv(_) => NormalizeErrorKind::IoError,
        }
    }
}

/// Where the records of a source document live.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentShape {
    /// Top-level array.
    Sequence(Vec<Value>),
    /// Object whose records sit under `key`: one of [`KNOWN_RECORD_KEYS`],
    /// or else the first array-valued entry in document order.
    ObjectWithKnownKey { key: String, value: Value },
    /// Object with nothing list-like inside; it is the single record.
    ObjectFallback(ChargeRecord),
    /// Anything that is neither array nor object.
    Scalar(Value),
}

impl DocumentShape {
    pub fn label(&self) -> &'static str {
        match self {
            DocumentShape::Sequence(_) => "sequence",
            DocumentShape::ObjectWithKnownKey { .. } => "object-with-key",
            DocumentShape::ObjectFallback(_) => "object-fallback",
            DocumentShape::Scalar(_) => "scalar",
        }
    }

    pub fn into_records(self) -> Result<Vec<Value>, NormalizeError> {
        match self {
            DocumentShape::Sequence(items) => Ok(items),
            DocumentShape::ObjectWithKnownKey { key, value } => match value {
                Value::Array(items) => Ok(items),
                value if is_blank(&value) => Ok(Vec::new()),
                other => Err(NormalizeError::UnsupportedFormat(format!(
                    "'{}' holds {}, expected an array of records",
                    key,
                    json_type_name(&other)
                ))),
            },
            DocumentShape::ObjectFallback(map) => Ok(vec![Value::Object(map)]),
            DocumentShape::Scalar(value) => Err(NormalizeError::UnsupportedFormat(format!(
                "top-level {} is neither an array nor an object",
                json_type_name(&value)
            ))),
        }
    }
}

/// null、false、0、空字串、空物件：視為沒有資料
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
    }
}

/// 判斷文件形狀，優先順序: array > data > charges > results > 第一個 array 欄位 > 整個物件
pub fn classify(document: Value) -> DocumentShape {
    match document {
        Value::Array(items) => DocumentShape::Sequence(items),
        Value::Object(mut map) => {
            for key in KNOWN_RECORD_KEYS {
                if let Some(value) = map.remove(key) {
                    return DocumentShape::ObjectWithKnownKey {
                        key: key.to_string(),
                        value,
                    };
                }
            }

            let first_list = map
                .iter()
                .find(|(_, value)| value.is_array())
                .map(|(key, _)| key.clone());
            if let Some(key) = first_list {
                if let Some(value) = map.remove(&key) {
                    return DocumentShape::ObjectWithKnownKey { key, value };
                }
            }

            DocumentShape::ObjectFallback(map)
        }
        other => DocumentShape::Scalar(other),
    }
}

/// Conform records to one sorted header.
///
/// Pass 1 collects the union of keys, pass 2 emits every row against it.
/// Records that are not objects are wrapped as `{"value": record}`; a list
/// mixing objects and non-objects is rejected.
pub fn build_table(records: Vec<Value>, nested: NestedValues) -> Result<OutputTable, NormalizeError> {
    let Some(first) = records.first() else {
        return Err(NormalizeError::EmptyData);
    };
    let object_rows = first.is_object();

    let mut prepared = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        let record = match record {
            Value::Object(map) if object_rows => map,
            other if !object_rows && !other.is_object() => {
                let mut wrapped = ChargeRecord::new();
                wrapped.insert(SCALAR_COLUMN.to_string(), other);
                wrapped
            }
            other => {
                return Err(NormalizeError::UnsupportedFormat(format!(
                    "record {} is {} but record 0 is {}",
                    index,
                    json_type_name(&other),
                    if object_rows { "an object" } else { "not an object" }
                )))
            }
        };
        prepared.push(apply_nested_policy(record, nested)?);
    }

    // 全部都是 `{}` 時 header 為空，仍輸出與記錄數相同的空白列
    let header: BTreeSet<&str> = prepared
        .iter()
        .flat_map(|record| record.keys().map(String::as_str))
        .collect();

    let rows: Vec<Vec<String>> = prepared
        .iter()
        .map(|record| {
            header
                .iter()
                .map(|column| record.get(*column).map(render_cell).unwrap_or_default())
                .collect::<Vec<String>>()
        })
        .collect();

    Ok(OutputTable {
        header: header.into_iter().map(str::to_string).collect(),
        rows,
    })
}

fn apply_nested_policy(
    record: ChargeRecord,
    nested: NestedValues,
) -> Result<ChargeRecord, NormalizeError> {
    match nested {
        NestedValues::Stringify => Ok(record),
        NestedValues::Flatten => {
            let mut flat = ChargeRecord::new();
            for (key, value) in record {
                flatten_into(key, value, &mut flat);
            }
            Ok(flat)
        }
        NestedValues::Reject => {
            if let Some((key, _)) = record
                .iter()
                .find(|(_, value)| value.is_array() || value.is_object())
            {
                return Err(NormalizeError::UnsupportedFormat(format!(
                    "nested value under key '{}'",
                    key
                )));
            }
            Ok(record)
        }
    }
}

fn flatten_into(prefix: String, value: Value, out: &mut ChargeRecord) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, value) in map {
                flatten_into(format!("{}.{}", prefix, key), value, out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (index, value) in items.into_iter().enumerate() {
                flatten_into(format!("{}.{}", prefix, index), value, out);
            }
        }
        other => {
            out.insert(prefix, other);
        }
    }
}

/// 儲存格文字：null 為空字串，巢狀結構輸出為 JSON
pub fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// `charges.json` -> `charges.csv`
pub fn csv_path_for(source: &Path) -> PathBuf {
    source.with_extension("csv")
}

/// Result of a successful conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub csv_path: PathBuf,
    pub rows: usize,
    pub columns: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonNormalizer {
    nested: NestedValues,
}

impl JsonNormalizer {
    pub fn new(nested: NestedValues) -> Self {
        Self { nested }
    }

    /// Convert `path` in place. On any error the source is left as it was
    /// and no CSV remains at the target path.
    pub fn convert(&self, path: &Path) -> Result<Conversion, NormalizeError> {
        let bytes = fs::read(path)?;
        let content = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);
        let document: Value = serde_json::from_slice(content)?;

        let shape = classify(document);
        tracing::debug!("Document shape for {}: {}", path.display(), shape.label());

        let table = build_table(shape.into_records()?, self.nested)?;
        let csv_path = csv_path_for(path);
        write_table(&table, &csv_path)?;

        // CSV 已寫入並關閉，才刪除原始檔
        if csv_path != path {
            if let Err(e) = fs::remove_file(path) {
                let _ = fs::remove_file(&csv_path);
                return Err(e.into());
            }
        }

        Ok(Conversion {
            csv_path,
            rows: table.row_count(),
            columns: table.header.len(),
        })
    }

    /// [`convert`](Self::convert) with progress and failure logging.
    pub fn try_normalize(&self, path: &Path) -> Result<Conversion, NormalizeError> {
        tracing::info!("  ✓ Converting JSON to CSV...");

        match self.convert(path) {
            Ok(conversion) => {
                tracing::info!(
                    "  ✓ Saved as CSV: {} ({} rows, {} columns)",
                    file_name(&conversion.csv_path),
                    conversion.rows,
                    conversion.columns
                );
                Ok(conversion)
            }
            Err(e) => {
                tracing::warn!("  ✗ JSON conversion failed [{}]: {}", e.kind(), e);
                Err(e)
            }
        }
    }

    pub fn normalize(&self, path: &Path) -> bool {
        self.try_normalize(path).is_ok()
    }
}

/// Convert with the default nested value policy; `false` on any failure.
pub fn normalize(path: &Path) -> bool {
    JsonNormalizer::default().normalize(path)
}

fn write_table(table: &OutputTable, target: &Path) -> Result<(), NormalizeError> {
    let partial = target.with_extension("csv.part");

    let result = write_partial(table, &partial)
        .and_then(|()| fs::rename(&partial, target).map_err(NormalizeError::from));
    if result.is_err() {
        let _ = fs::remove_file(&partial);
    }
    result
}

fn write_partial(table: &OutputTable, partial: &Path) -> Result<(), NormalizeError> {
    if table.header.is_empty() {
        let mut file = fs::File::create(partial)?;
        file.write_all("\n".repeat(table.row_count() + 1).as_bytes())?;
        file.sync_all()?;
        return Ok(());
    }

    let mut writer = csv::Writer::from_writer(fs::File::create(partial)?);
    writer.write_record(&table.header)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;

    let file = writer
        .into_inner()
        .map_err(|e| NormalizeError::Io(e.into_error()))?;
    file.sync_all()?;
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
