use model::core::value::Value;

/// Provides database-specific CSV encoding for COPY/LOAD style ingestion.
pub trait CopyValueEncoder {
    /// Encodes a concrete value into the backend's CSV representation.
    fn encode_value(&self, value: &Value) -> String;

    /// Encodes a SQL NULL into its CSV literal form (e.g. `\N`).
    fn encode_null(&self) -> String;

    /// Helper that encodes an optional value, delegating NULL handling.
    fn encode_optional(&self, value: Option<&Value>) -> String {
        match value {
            Some(v) if !v.is_null() => self.encode_value(v),
            _ => self.encode_null(),
        }
    }

    /// One CSV line, terminated by `\n`, with `columns` taken from `row` in order.
    fn encode_row(&self, row: &model::records::row::RowData, columns: &[String]) -> String {
        let mut line = String::new();
        for (i, col) in columns.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            let field = row.get(col).map(|f| &f.value);
            line.push_str(&self.encode_optional(field));
        }
        line.push('\n');
        line
    }
}
