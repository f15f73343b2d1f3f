use crate::error::{Result, ScoringError};

use super::model::{Table, Value};

/// Suffix of the derived column written by [`normalize_column`].
pub const NORMALIZED_SUFFIX: &str = "_normalized";

/// Min-max scale `column_name` into `[0, 1]`, writing `<column_name>_normalized`.
///
/// The source column is left untouched; a previous derived column of the same
/// name is overwritten in place. Null cells are ignored for min/max and come out
/// as NaN. A constant column divides by zero and yields non-finite values; this
/// is not clamped.
pub fn normalize_column<'a>(table: &'a mut Table, column_name: &str) -> Result<&'a mut Table> {
    let column = table.column(column_name).ok_or_else(|| ScoringError::TypeMismatch {
        column: column_name.to_string(),
        found: "no such column".to_string(),
    })?;

    let numbers = numeric_values(column_name, &column.values)?;

    let min_val = numbers.iter().flatten().copied().fold(f64::INFINITY, f64::min);
    let max_val = numbers.iter().flatten().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max_val - min_val;

    let scaled: Vec<Value> = numbers
        .iter()
        .map(|v| match v {
            Some(v) => Value::Float((v - min_val) / range),
            None => Value::Float(f64::NAN),
        })
        .collect();

    let derived = format!("{column_name}{NORMALIZED_SUFFIX}");
    log::debug!("normalized '{column_name}' into '{derived}' (min={min_val}, max={max_val})");
    table.set_column(&derived, scaled)?;
    Ok(table)
}

/// Numeric view of a column; `None` marks a null cell.
fn numeric_values(column_name: &str, values: &[Value]) -> Result<Vec<Option<f64>>> {
    values
        .iter()
        .map(|v| match v {
            Value::Null => Ok(None),
            other => other.as_f64().map(Some).ok_or_else(|| ScoringError::TypeMismatch {
                column: column_name.to_string(),
                found: format!("{} '{other}'", other.type_name()),
            }),
        })
        .collect()
}
