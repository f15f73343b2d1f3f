use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use crate::error::{Result, ScoringError};

use super::model::{Column, Table, Value};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Serialized table body plus the content type it should be stored with.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub body: Vec<u8>,
    pub content_type: &'static str,
}

/// Serialize a table for an object key.  Dispatch by extension.
///
/// * `.parquet` / `.pq` – Parquet, one row group
/// * anything else     – comma-separated text with a header row
pub fn encode_for_key(table: &Table, key: &str) -> Result<Encoded> {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "parquet" | "pq" => Ok(Encoded {
            body: to_parquet(table)?,
            content_type: "application/vnd.apache.parquet",
        }),
        _ => Ok(Encoded {
            body: to_csv(table)?,
            content_type: "text/csv",
        }),
    }
}

// ---------------------------------------------------------------------------
// CSV writer
// ---------------------------------------------------------------------------

/// Header row of column names, then one record per row. Quoting follows the
/// `csv` crate defaults (fields containing delimiters, quotes or newlines are
/// quoted, embedded quotes doubled). Cells render the way pandas writes them:
/// missing values empty, whole floats as `1.0`, booleans as `True`/`False`.
pub fn to_csv(table: &Table) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(table.column_names())
        .map_err(|e| ScoringError::write("csv", e))?;

    for row in table.rows() {
        writer
            .write_record(row.into_iter().map(csv_field))
            .map_err(|e| ScoringError::write("csv", e))?;
    }

    writer
        .into_inner()
        .map_err(|e| ScoringError::write("csv", e.error()))
}

fn csv_field(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Float(v) if v.is_nan() => String::new(),
        Value::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 => format!("{v:.1}"),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Parquet writer
// ---------------------------------------------------------------------------

/// Write the table as a single Parquet row group into memory.
pub fn to_parquet(table: &Table) -> Result<Vec<u8>> {
    let batch = to_record_batch(table)?;
    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), None)
        .map_err(|e| ScoringError::write("parquet", e))?;
    writer.write(&batch).map_err(|e| ScoringError::write("parquet", e))?;
    writer.close().map_err(|e| ScoringError::write("parquet", e))?;
    Ok(buffer)
}

/// Convert a table into an Arrow record batch, inferring one type per column.
pub fn to_record_batch(table: &Table) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(table.width());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.width());

    for column in table.columns() {
        let data_type = infer_arrow_type(column);
        arrays.push(build_array(column, &data_type));
        fields.push(Field::new(&column.name, data_type, true));
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
        .map_err(|e| ScoringError::write("parquet", e))
}

fn infer_arrow_type(column: &Column) -> DataType {
    let mut saw_int = false;
    let mut saw_float = false;
    let mut saw_bool = false;
    let mut saw_other = false;

    for value in &column.values {
        match value {
            Value::Integer(_) => saw_int = true,
            Value::Float(_) => saw_float = true,
            Value::Bool(_) => saw_bool = true,
            Value::Null => {}
            Value::String(_) | Value::Date(_) => saw_other = true,
        }
    }

    match (saw_int, saw_float, saw_bool, saw_other) {
        (_, _, _, true) => DataType::Utf8,
        (false, false, true, false) => DataType::Boolean,
        (_, _, true, false) => DataType::Utf8,
        (_, true, false, false) => DataType::Float64,
        (true, false, false, false) => DataType::Int64,
        // all null
        (false, false, false, false) => DataType::Utf8,
    }
}

fn build_array(column: &Column, data_type: &DataType) -> ArrayRef {
    let values = &column.values;
    match data_type {
        DataType::Int64 => Arc::new(Int64Array::from(
            values
                .iter()
                .map(|v| match v {
                    Value::Integer(i) => Some(*i),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        DataType::Float64 => Arc::new(Float64Array::from(
            values.iter().map(Value::as_f64).collect::<Vec<_>>(),
        )),
        DataType::Boolean => Arc::new(BooleanArray::from(
            values
                .iter()
                .map(|v| match v {
                    Value::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        _ => Arc::new(StringArray::from(
            values
                .iter()
                .map(|v| (!v.is_null()).then(|| v.to_string()))
                .collect::<Vec<_>>(),
        )),
    }
}
