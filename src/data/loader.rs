use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Table, Value};
use crate::error::{Error, Result};

/// Signature of a user-supplied table reader.
pub type ReaderFn = fn(&Path) -> Result<Table>;

/// How a single file is turned into a [`Table`].
#[derive(Debug, Clone, Copy)]
pub enum Reader {
    /// Header row plus delimited records.
    Csv { delimiter: u8 },
    /// Pandas `records` (`[{..}, ..]`) or `columns` (`{col: {row: ..}}`) orient.
    Json,
    /// Flat Parquet file with scalar columns.
    Parquet,
    Custom(ReaderFn),
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

impl Reader {
    /// Pick a reader from the file pattern, matching on extension substrings
    /// the same way for plain and compressed files (`.csv.gz`, `.json.bz2`).
    pub fn infer(pattern: &str) -> Result<Self> {
        let lower = pattern.to_ascii_lowercase();
        if lower.contains(".csv") {
            Ok(Reader::Csv { delimiter: b',' })
        } else if lower.contains(".json") {
            Ok(Reader::Json)
        } else if lower.contains(".parquet") {
            Ok(Reader::Parquet)
        } else {
            Err(Error::NoReader(pattern.to_string()))
        }
    }

    pub fn read(&self, path: &Path) -> Result<Table> {
        match self {
            Reader::Csv { delimiter } => load_csv(path, *delimiter),
            Reader::Json => load_json(path),
            Reader::Parquet => load_parquet(path),
            Reader::Custom(read) => read(path),
        }
    }
}

/// Load a table, dispatching on the file name.
pub fn load_file(path: &Path) -> Result<Table> {
    Reader::infer(&path.to_string_lossy())?.read(path)
}

/// Open a file, transparently decompressing `*.gz` and `*.bz2`.
fn open_compressed(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
    let reader: Box<dyn Read> = match ext.as_deref() {
        Some("gz") => Box::new(BufReader::new(GzDecoder::new(file))),
        Some("bz2") => Box::new(BufReader::new(BzDecoder::new(file))),
        _ => Box::new(BufReader::new(file)),
    };
    Ok(reader)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path, delimiter: u8) -> Result<Table> {
    parse_csv(open_compressed(path)?, path, delimiter)
}

/// Every column keeps its header name; cell types are guessed per cell.
/// `path` only labels errors.
pub(crate) fn parse_csv(input: impl Read, path: &Path, delimiter: u8) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(input);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::parse(path, format!("reading CSV headers: {e}")))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut table = Table::new(headers);
    for (row_no, result) in reader.records().enumerate() {
        let record = result.map_err(|e| Error::parse(path, format!("CSV row {row_no}: {e}")))?;
        table.push_row(record.iter().map(Value::guess).collect());
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Accepts the two layouts Pandas writes most often:
///
/// ```json
/// [{"material_id": "wbm-1-1", "e_form_per_atom": -0.42}, ...]
/// {"material_id": {"0": "wbm-1-1"}, "e_form_per_atom": {"0": -0.42}}
/// ```
fn load_json(path: &Path) -> Result<Table> {
    let mut text = String::new();
    open_compressed(path)?
        .read_to_string(&mut text)
        .map_err(|e| Error::io(path, e))?;
    let root: JsonValue =
        serde_json::from_str(&text).map_err(|e| Error::parse(path, format!("parsing JSON: {e}")))?;

    match root {
        JsonValue::Array(records) => json_records(path, &records),
        JsonValue::Object(columns) => json_columns(path, &columns),
        _ => Err(Error::parse(path, "expected top-level JSON array or object")),
    }
}

fn json_records(path: &Path, records: &[JsonValue]) -> Result<Table> {
    let mut columns: Vec<String> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .ok_or_else(|| Error::parse(path, format!("row {i} is not a JSON object")))?;
        for key in obj.keys() {
            if seen.insert(key) {
                columns.push(key.clone());
            }
        }
    }

    let mut table = Table::new(columns.clone());
    for rec in records {
        let row = columns
            .iter()
            .map(|col| rec.get(col).map_or(Value::Null, json_to_value))
            .collect();
        table.push_row(row);
    }
    Ok(table)
}

fn json_columns(path: &Path, columns: &serde_json::Map<String, JsonValue>) -> Result<Table> {
    // row labels in first-seen order across all columns
    let mut row_keys: Vec<&str> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for (name, col) in columns {
        let cells = col
            .as_object()
            .ok_or_else(|| Error::parse(path, format!("column {name:?} is not a JSON object")))?;
        for key in cells.keys() {
            if seen.insert(key) {
                row_keys.push(key);
            }
        }
    }

    let mut table = Table::new(columns.keys().cloned().collect());
    for key in row_keys {
        let row = columns
            .values()
            .map(|col| col.get(key).map_or(Value::Null, json_to_value))
            .collect();
        table.push_row(row);
    }
    Ok(table)
}

fn json_to_value(val: &JsonValue) -> Value {
    match val {
        JsonValue::String(s) => Value::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Value::from_f64(f)
            } else {
                Value::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Null => Value::Null,
        // nested structures (e.g. serialized structures) are kept as raw JSON text
        other => Value::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file written by Pandas (`df.to_parquet()`) or Polars.
/// Scalar columns map onto [`Value`]; anything else is rendered as text.
fn load_parquet(path: &Path) -> Result<Table> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::parse(path, format!("reading parquet metadata: {e}")))?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder
        .build()
        .map_err(|e| Error::parse(path, format!("building parquet reader: {e}")))?;

    let mut table = Table::new(columns);
    for batch_result in reader {
        let batch =
            batch_result.map_err(|e| Error::parse(path, format!("reading record batch: {e}")))?;
        for row in 0..batch.num_rows() {
            table.push_row(
                batch
                    .columns()
                    .iter()
                    .map(|col| extract_value(col, row))
                    .collect(),
            );
        }
    }
    Ok(table)
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_value(col: &Arc<dyn Array>, row: usize) -> Value {
    if col.is_null(row) {
        return Value::Null;
    }
    match col.data_type() {
        DataType::Utf8 => Value::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Value::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => Value::Integer(col.as_primitive::<Int32Type>().value(row) as i64),
        DataType::Int64 => Value::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => Value::from_f64(col.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Float64 => Value::from_f64(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => Value::Bool(col.as_boolean().value(row)),
        other => Value::String(format!("{other:?}")),
    }
}
