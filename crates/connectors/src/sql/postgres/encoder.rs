use crate::sql::base::encoder::CopyValueEncoder;
use chrono::SecondsFormat;
use model::core::{
    utils::{encode_bytea, escape_csv_string},
    value::Value,
};

/// `COPY ... (FORMAT csv, NULL '\N')` field encoding.
#[derive(Debug, Default)]
pub struct PgCopyValueEncoder;

impl PgCopyValueEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl CopyValueEncoder for PgCopyValueEncoder {
    fn encode_value(&self, value: &Value) -> String {
        match value {
            Value::Null => self.encode_null(),
            Value::String(s) => escape_csv_string(s),
            Value::Json(v) => escape_csv_string(&v.to_string()),
            Value::Bytes(bytes) => {
                let hex = encode_bytea(bytes);
                escape_csv_string(&hex)
            }
            Value::Boolean(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Uint(v) => v.to_string(),
            Value::Float(v) if v.is_nan() => "NaN".to_string(),
            Value::Float(v) if v.is_infinite() => {
                if v.is_sign_positive() { "Infinity" } else { "-Infinity" }.to_string()
            }
            Value::Float(v) => ryu::Buffer::new().format(*v).to_string(),
            Value::Decimal(v) => v.to_string(),
            Value::Uuid(v) => v.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Time(t) => t.format("%H:%M:%S%.f").to_string(),
            Value::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            Value::TimestampTz(ts) => ts.to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }

    fn encode_null(&self) -> String {
        "\\N".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::records::row::RowData;

    #[test]
    fn encodes_a_row_in_column_order() {
        let row = RowData::from_pairs(
            "t",
            [
                ("name", Value::from("O\"Neil, Pat")),
                ("id", Value::Int(7)),
                ("note", Value::Null),
            ],
        );
        let cols = vec!["id".to_string(), "name".to_string(), "note".to_string(), "gone".to_string()];
        assert_eq!(
            PgCopyValueEncoder.encode_row(&row, &cols),
            "7,\"O\"\"Neil, Pat\",\\N,\\N\n"
        );
    }

    #[test]
    fn empty_string_is_not_null() {
        assert_eq!(PgCopyValueEncoder.encode_value(&Value::from("")), "\"\"");
    }

    #[test]
    fn bytes_and_floats() {
        assert_eq!(
            PgCopyValueEncoder.encode_value(&Value::Bytes(vec![0x0a, 0xff])),
            "\"\\x0aff\""
        );
        assert_eq!(PgCopyValueEncoder.encode_value(&Value::Float(1.5)), "1.5");
        assert_eq!(PgCopyValueEncoder.encode_value(&Value::Float(f64::NAN)), "NaN");
    }
}
