use model::{core::value::Value, records::row::RowData};

pub const TRIM_STRINGS: &str = "builtin.trim_strings";
pub const EMPTY_STRINGS_TO_NULL: &str = "builtin.empty_strings_to_null";
pub const DROP_NULL_COLUMNS: &str = "builtin.drop_null_columns";

pub fn trim_strings(mut rows: Vec<RowData>) -> Result<Vec<RowData>, String> {
    for row in &mut rows {
        for field in &mut row.field_values {
            if let Value::String(s) = &mut field.value {
                let trimmed = s.trim();
                if trimmed.len() != s.len() {
                    *s = trimmed.to_string();
                }
            }
        }
    }
    Ok(rows)
}

pub fn empty_strings_to_null(mut rows: Vec<RowData>) -> Result<Vec<RowData>, String> {
    for row in &mut rows {
        for field in &mut row.field_values {
            if matches!(&field.value, Value::String(s) if s.is_empty()) {
                field.value = Value::Null;
            }
        }
    }
    Ok(rows)
}

/// Removes columns that are NULL in every row of the batch.
pub fn drop_null_columns(mut rows: Vec<RowData>) -> Result<Vec<RowData>, String> {
    let Some(first) = rows.first() else {
        return Ok(rows);
    };
    let all_null: Vec<String> = first
        .columns()
        .into_iter()
        .filter(|col| rows.iter().all(|row| row.get_value(col).is_null()))
        .map(str::to_string)
        .collect();

    for row in &mut rows {
        for col in &all_null {
            row.remove(col);
        }
    }
    Ok(rows)
}
