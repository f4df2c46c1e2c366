use crate::sql::base::utils::temporal_from_text;
use bigdecimal::ToPrimitive;
use model::core::value::Value;
use rust_decimal::Decimal as RustDecimal;
use std::{borrow::Cow, str::FromStr};
use tiberius::Query;

/// Keyset positions come back from the checkpoint file as text. Temporal
/// text is bound as a typed value: an nvarchar with more fractional digits
/// than `datetime` or `datetime2` accept fails conversion (error 241).
fn typed(value: &Value) -> Cow<'_, Value> {
    match value {
        Value::String(text) => temporal_from_text(text)
            .map(Cow::Owned)
            .unwrap_or(Cow::Borrowed(value)),
        other => Cow::Borrowed(other),
    }
}

/// Binds `value` as the closest TDS type.
pub fn bind_value(query: &mut Query<'_>, value: &Value) {
    match typed(value).as_ref() {
        Value::Int(v) => query.bind(*v),
        Value::Uint(v) => match i64::try_from(*v) {
            Ok(v) => query.bind(v),
            Err(_) => query.bind(v.to_string()),
        },
        Value::Float(v) => query.bind(*v),
        Value::Decimal(v) => match RustDecimal::from_str(&v.to_string()) {
            Ok(d) => query.bind(d),
            Err(_) => query.bind(v.to_f64().unwrap_or_default()),
        },
        Value::String(v) => query.bind(v.clone()),
        Value::Boolean(v) => query.bind(*v),
        Value::Json(v) => query.bind(v.to_string()),
        Value::Uuid(v) => query.bind(*v),
        Value::Bytes(v) => query.bind(v.clone()),
        Value::Date(v) => query.bind(*v),
        Value::Time(v) => query.bind(*v),
        Value::Timestamp(v) => query.bind(*v),
        Value::TimestampTz(v) => query.bind(*v),
        Value::Null => query.bind(Option::<String>::None),
    }
}

pub fn bind_all(query: &mut Query<'_>, values: &[Value]) {
    for value in values {
        bind_value(query, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn checkpointed_datetime_binds_as_timestamp() {
        // One `datetime` tick past 10:00, as tiberius reads it.
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_nano_opt(10, 0, 0, 3_333_333)
            .unwrap();
        let stored = Value::from_json(&Value::Timestamp(ts).to_json());
        assert_eq!(stored, Value::from("2024-01-01T10:00:00.003333333"));

        assert_eq!(typed(&stored).into_owned(), Value::Timestamp(ts));

        let mut query = Query::new("SELECT 1 WHERE @P1 > @P2");
        bind_all(&mut query, &[stored, Value::Int(7)]);
    }

    #[test]
    fn plain_text_stays_text() {
        let name = Value::from("Acme Ltd");
        assert!(matches!(typed(&name), Cow::Borrowed(Value::String(_))));
        assert!(matches!(typed(&Value::Int(3)), Cow::Borrowed(Value::Int(3))));
    }
}
