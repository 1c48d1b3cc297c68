//! Loading labeled data from delimited files and pandas-style JSON documents.
//!
//! The JSON layout is the one produced by `DataFrame.to_json()` with its default
//! "columns" orientation: `{"column": {"row": value, ...}, ...}`.

use flate2::read::GzDecoder;
use ndarray::Array2;
use serde_json::{Map, Number, Value};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::data::{AnnotationTable, Label, LabeledMatrix};
use crate::error::{ModulonError, Result};

/// Where a constructor input comes from.
#[derive(Debug, Clone)]
pub enum DataSource<T> {
    Value(T),
    Path(PathBuf),
    Json(String),
}

impl<T: LoadFrame> DataSource<T> {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        DataSource::Path(path.into())
    }

    pub fn json(document: impl Into<String>) -> Self {
        DataSource::Json(document.into())
    }

    pub fn resolve(self) -> Result<T> {
        match self {
            DataSource::Value(value) => Ok(value),
            DataSource::Path(path) => T::from_path(&path),
            DataSource::Json(document) => T::from_json_str(&document),
        }
    }
}

impl<T> From<T> for DataSource<T> {
    fn from(value: T) -> Self {
        DataSource::Value(value)
    }
}

/// A frame that can be read from disk or from a JSON document and written back to JSON.
pub trait LoadFrame: Sized {
    fn from_path(path: &Path) -> Result<Self>;

    fn from_json_str(document: &str) -> Result<Self>;

    fn to_json_value(&self) -> Value;

    fn to_json_string(&self) -> String {
        self.to_json_value().to_string()
    }
}

/// Opens a delimited file, inflating `.gz` files and choosing tabs for `.tsv` names.
pub(crate) fn delimited_reader(path: &Path) -> Result<csv::Reader<Box<dyn Read>>> {
    let name = path.to_string_lossy().to_lowercase();
    let file = File::open(path)?;
    let reader: Box<dyn Read> = if name.ends_with(".gz") {
        Box::new(BufReader::new(GzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    let delimiter = if name.ends_with(".tsv") || name.ends_with(".tsv.gz") {
        b'\t'
    } else {
        b','
    };
    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(false)
        .from_reader(reader))
}

pub(crate) fn read_text(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut text = String::new();
    if path.to_string_lossy().ends_with(".gz") {
        GzDecoder::new(file).read_to_string(&mut text)?;
    } else {
        BufReader::new(file).read_to_string(&mut text)?;
    }
    Ok(text)
}

/// Parses a delimited cell into a JSON value: empty is null, numbers stay numeric.
///
/// Text with a padded integer part such as `007` or `+3` stays a string.
pub(crate) fn parse_cell(text: &str) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if trimmed.starts_with('+') || has_leading_zero(trimmed) {
        return Value::String(trimmed.to_string());
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        if int.to_string() == trimmed {
            return Value::Number(int.into());
        }
    }
    if let Ok(float) = trimmed.parse::<f64>() {
        if let Some(number) = Number::from_f64(float) {
            return Value::Number(number);
        }
    }
    Value::String(trimmed.to_string())
}

fn has_leading_zero(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text).as_bytes();
    digits.len() > 1 && digits[0] == b'0' && digits[1].is_ascii_digit()
}

fn float_to_value(x: f64) -> Value {
    Number::from_f64(x).map(Value::Number).unwrap_or(Value::Null)
}

fn value_to_float(value: &Value) -> Result<f64> {
    match value {
        Value::Null => Ok(f64::NAN),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ModulonError::schema(format!("value {} is not a float", n))),
        other => Err(ModulonError::schema(format!(
            "matrix entries must be numeric, found {}",
            other
        ))),
    }
}

/// Splits a "columns" oriented document into column names, row keys and cells.
fn parse_columns_document(document: &Value) -> Result<(Vec<String>, Vec<String>, Vec<Vec<Value>>)> {
    let outer = document
        .as_object()
        .ok_or_else(|| ModulonError::schema("JSON table must be an object of columns"))?;

    let mut columns = Vec::with_capacity(outer.len());
    let mut rows: Vec<String> = Vec::new();
    let mut cells = Vec::with_capacity(outer.len());
    for (j, (name, inner)) in outer.iter().enumerate() {
        let inner = inner.as_object().ok_or_else(|| {
            ModulonError::schema(format!("column {} must map row keys to values", name))
        })?;
        if j == 0 {
            rows = inner.keys().cloned().collect();
        } else if inner.len() != rows.len() || rows.iter().any(|r| !inner.contains_key(r)) {
            return Err(ModulonError::schema(format!(
                "column {} does not share the row keys of the first column",
                name
            )));
        }
        let column = rows
            .iter()
            .map(|r| inner.get(r).cloned().unwrap_or(Value::Null))
            .collect();
        columns.push(name.clone());
        cells.push(column);
    }
    Ok((columns, rows, cells))
}

fn columns_document<'a, K: Label + 'a>(
    index: &'a [K],
    columns: impl Iterator<Item = (String, Vec<Value>)>,
) -> Value {
    let mut outer = Map::new();
    for (name, values) in columns {
        let inner: Map<String, Value> = index
            .iter()
            .zip(values)
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        outer.insert(name, Value::Object(inner));
    }
    Value::Object(outer)
}

impl<R: Label, C: Label> LoadFrame for LabeledMatrix<R, C, f64> {
    fn from_path(path: &Path) -> Result<Self> {
        let mut reader = delimited_reader(path)?;
        let headers = reader.headers()?.clone();
        let cols: Vec<C> = headers.iter().skip(1).map(C::from_text).collect();

        let mut rows = Vec::new();
        let mut flat = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut fields = record.iter();
            let label = fields
                .next()
                .ok_or_else(|| ModulonError::schema("matrix row without a label"))?;
            rows.push(R::from_text(label));
            for field in fields {
                let field = field.trim();
                let value = if field.is_empty() {
                    f64::NAN
                } else {
                    field.parse::<f64>().map_err(|_| {
                        ModulonError::schema(format!(
                            "{}: non-numeric entry '{}' in row {}",
                            path.display(),
                            field,
                            label
                        ))
                    })?
                };
                flat.push(value);
            }
        }
        let values = Array2::from_shape_vec((rows.len(), cols.len()), flat)
            .map_err(|e| ModulonError::schema(format!("{}: {}", path.display(), e)))?;
        LabeledMatrix::new(rows, cols, values)
    }

    fn from_json_str(document: &str) -> Result<Self> {
        let parsed: Value = serde_json::from_str(document)?;
        let (columns, rows, cells) = parse_columns_document(&parsed)?;
        let mut values = Array2::zeros((rows.len(), columns.len()));
        for (j, column) in cells.iter().enumerate() {
            for (i, cell) in column.iter().enumerate() {
                values[[i, j]] = value_to_float(cell)?;
            }
        }
        LabeledMatrix::new(
            rows.iter().map(|r| R::from_text(r)).collect(),
            columns.iter().map(|c| C::from_text(c)).collect(),
            values,
        )
    }

    fn to_json_value(&self) -> Value {
        let columns = self.cols().iter().enumerate().map(|(j, c)| {
            (
                c.to_string(),
                self.column(j).iter().map(|&x| float_to_value(x)).collect(),
            )
        });
        columns_document(self.rows(), columns)
    }
}

impl<K: Label> LoadFrame for AnnotationTable<K> {
    fn from_path(path: &Path) -> Result<Self> {
        let mut reader = delimited_reader(path)?;
        let headers = reader.headers()?.clone();
        let names: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

        let mut index = Vec::new();
        let mut columns: Vec<Vec<Value>> = vec![Vec::new(); names.len()];
        for record in reader.records() {
            let record = record?;
            let mut fields = record.iter();
            let key = fields
                .next()
                .ok_or_else(|| ModulonError::schema("table row without an index"))?;
            index.push(K::from_text(key));
            for (column, field) in columns.iter_mut().zip(fields) {
                column.push(parse_cell(field));
            }
        }
        AnnotationTable::from_columns(index, names.into_iter().zip(columns).collect())
    }

    fn from_json_str(document: &str) -> Result<Self> {
        let parsed: Value = serde_json::from_str(document)?;
        let (columns, rows, cells) = parse_columns_document(&parsed)?;
        AnnotationTable::from_columns(
            rows.iter().map(|r| K::from_text(r)).collect(),
            columns.into_iter().zip(cells).collect(),
        )
    }

    fn to_json_value(&self) -> Value {
        let columns = self.columns().iter().map(|name| {
            (
                name.clone(),
                self.column(name).map(|c| c.to_vec()).unwrap_or_default(),
            )
        });
        columns_document(self.index(), columns)
    }
}

/// Flat dictionaries (dataset tables, link maps) are read from a JSON file or string.
impl LoadFrame for Map<String, Value> {
    fn from_path(path: &Path) -> Result<Self> {
        Self::from_json_str(&read_text(path)?)
    }

    fn from_json_str(document: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(document)? {
            Value::Object(map) => Ok(map),
            other => Err(ModulonError::precondition(format!(
                "expected a JSON object, found {}",
                other
            ))),
        }
    }

    fn to_json_value(&self) -> Value {
        Value::Object(self.clone())
    }
}
