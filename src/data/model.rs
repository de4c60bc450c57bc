use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Value – a single cell in a table column
// ---------------------------------------------------------------------------

/// A dynamically-typed cell mirroring the common Pandas dtypes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => Ok(()),
        }
    }
}

impl Value {
    /// Interpret the value as an `f64`. NaN floats count as missing.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) if !v.is_nan() => Some(*v),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Integer(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Missing in the Pandas sense: null or NaN.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    /// String form used as an index key. Only strings and integers make
    /// usable row identifiers.
    pub fn as_key(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            _ => None,
        }
    }

    /// Build a float cell, mapping NaN to `Null`.
    pub fn from_f64(v: f64) -> Self {
        if v.is_nan() {
            Value::Null
        } else {
            Value::Float(v)
        }
    }

    /// Guess the type of a raw text cell (CSV and similar).
    pub fn guess(s: &str) -> Self {
        if s.is_empty() {
            return Value::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return Value::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return Value::from_f64(f);
        }
        match s {
            "true" | "True" => Value::Bool(true),
            "false" | "False" => Value::Bool(false),
            _ => Value::String(s.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Table – the in-memory dataframe
// ---------------------------------------------------------------------------

/// Row-major table with ordered columns and an optional key index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    index: Option<Index>,
}

/// Lookup from a key column's values to row positions.
#[derive(Debug, Clone, PartialEq)]
struct Index {
    column: String,
    positions: HashMap<String, usize>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            index: None,
        }
    }

    /// Append a row. Short rows are padded with nulls, long rows truncated.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        if let Some(index) = &mut self.index {
            let col = self.columns.iter().position(|c| *c == index.column);
            if let Some(key) = col.and_then(|c| row[c].as_key()) {
                index.positions.entry(key).or_insert(self.rows.len());
            }
        }
        self.rows.push(row);
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::MissingColumn {
                column: name.to_string(),
                available: self.columns.clone(),
            })
    }

    /// Cell at `row` in column `name`.
    pub fn get(&self, row: usize, name: &str) -> Option<&Value> {
        let col = self.columns.iter().position(|c| c == name)?;
        self.rows.get(row).map(|r| &r[col])
    }

    /// All cells of one column in row order.
    pub fn column(&self, name: &str) -> Result<Vec<&Value>> {
        let col = self.position(name)?;
        Ok(self.rows.iter().map(|r| &r[col]).collect())
    }

    /// Numeric view of a column; non-numeric and missing cells are `None`.
    pub fn column_f64(&self, name: &str) -> Result<Vec<Option<f64>>> {
        Ok(self.column(name)?.into_iter().map(Value::as_f64).collect())
    }

    /// Replace (or append) a column. `values` must have one cell per row.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(Error::LengthMismatch {
                column: name.to_string(),
                expected: self.rows.len(),
                got: values.len(),
            });
        }
        let col = match self.columns.iter().position(|c| c == name) {
            Some(col) => col,
            None => {
                self.columns.push(name.to_string());
                for row in &mut self.rows {
                    row.push(Value::Null);
                }
                self.columns.len() - 1
            }
        };
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[col] = value;
        }
        if self.index.as_ref().is_some_and(|ix| ix.column == name) {
            self.set_index(name)?;
        }
        Ok(())
    }

    /// Index rows by the values of `name`. The first occurrence of a
    /// duplicated key wins.
    pub fn set_index(&mut self, name: &str) -> Result<()> {
        let col = self.position(name)?;
        let mut positions = HashMap::with_capacity(self.rows.len());
        for (i, row) in self.rows.iter().enumerate() {
            if let Some(key) = row[col].as_key() {
                positions.entry(key).or_insert(i);
            }
        }
        self.index = Some(Index {
            column: name.to_string(),
            positions,
        });
        Ok(())
    }

    pub fn index_column(&self) -> Option<&str> {
        self.index.as_ref().map(|ix| ix.column.as_str())
    }

    /// Row position for an index key.
    pub fn row_for_id(&self, id: &str) -> Option<usize> {
        self.index.as_ref()?.positions.get(id).copied()
    }

    /// Stack tables vertically.
    ///
    /// Columns are the union of all inputs in first-seen order; cells missing
    /// from a table are filled with nulls. Rows keep their per-table order and
    /// are not deduplicated. The result has no index.
    pub fn concat(tables: Vec<Table>) -> Table {
        let mut columns: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for t in &tables {
            for c in &t.columns {
                if seen.insert(c.clone()) {
                    columns.push(c.clone());
                }
            }
        }

        let mut out = Table::new(columns);
        for t in tables {
            let mapping: Vec<usize> = t
                .columns
                .iter()
                .map(|c| out.columns.iter().position(|o| o == c).unwrap_or_default())
                .collect();
            for row in t.rows {
                let mut full = vec![Value::Null; out.columns.len()];
                for (value, &col) in row.into_iter().zip(&mapping) {
                    full[col] = value;
                }
                out.rows.push(full);
            }
        }
        out
    }

    /// Left join of `other[value_col]` onto this table's index, keyed by
    /// `other[key_col]`, stored as column `target`.
    ///
    /// Rows of `self` without a match get nulls; rows of `other` whose key is
    /// not in the index are dropped. For duplicate keys in `other` the first
    /// occurrence wins. Requires an index on `self`.
    pub fn left_join_column(
        &mut self,
        target: &str,
        other: &Table,
        key_col: &str,
        value_col: &str,
    ) -> Result<()> {
        if self.index.is_none() {
            return Err(Error::NoIndex);
        }
        let key_pos = other.position(key_col)?;
        let value_pos = other.position(value_col)?;

        let mut joined = vec![Value::Null; self.rows.len()];
        let mut filled = vec![false; self.rows.len()];
        for row in &other.rows {
            let Some(key) = row[key_pos].as_key() else {
                continue;
            };
            if let Some(i) = self.row_for_id(&key) {
                if !filled[i] {
                    joined[i] = row[value_pos].clone();
                    filled[i] = true;
                }
            }
        }
        self.set_column(target, joined)
    }

    /// Keep rows for which `keep(row_position)` is true. The index is rebuilt.
    pub fn filter_rows(&self, mut keep: impl FnMut(usize) -> bool) -> Result<Table> {
        let rows = self
            .rows
            .iter()
            .enumerate()
            .filter(|(i, _)| keep(*i))
            .map(|(_, r)| r.clone())
            .collect();
        self.with_rows(rows)
    }

    /// Rows for the given index keys, in the order given.
    pub fn select_ids<S: AsRef<str>>(&self, ids: &[S]) -> Result<Table> {
        let mut rows = Vec::with_capacity(ids.len());
        let mut unknown = Vec::new();
        for id in ids {
            match self.row_for_id(id.as_ref()) {
                Some(i) => rows.push(self.rows[i].clone()),
                None => unknown.push(id.as_ref().to_string()),
            }
        }
        if !unknown.is_empty() {
            return Err(Error::UnknownIds(unknown));
        }
        self.with_rows(rows)
    }

    fn with_rows(&self, rows: Vec<Vec<Value>>) -> Result<Table> {
        let mut out = Table {
            columns: self.columns.clone(),
            rows,
            index: None,
        };
        if let Some(ix) = &self.index {
            out.set_index(&ix.column)?;
        }
        Ok(out)
    }

    /// Write the table as CSV with a header row. Nulls become empty cells.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path).map_err(|e| Error::parse(path, e))?;
        writer
            .write_record(&self.columns)
            .map_err(|e| Error::parse(path, e))?;
        for row in &self.rows {
            writer
                .write_record(row.iter().map(|v| v.to_string()))
                .map_err(|e| Error::parse(path, e))?;
        }
        writer.flush().map_err(|e| Error::io(path, e))
    }
}
