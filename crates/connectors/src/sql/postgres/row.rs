use crate::sql::base::error::DbError;
use model::{
    core::value::Value,
    records::row::{FieldValue, RowData},
};
use rust_decimal::Decimal as RustDecimal;
use tokio_postgres::{
    Row,
    types::{FromSql, Json as PgJson, Type},
};

fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize) -> Result<Option<T>, DbError> {
    Ok(row.try_get::<_, Option<T>>(idx)?)
}

pub fn pg_row_to_data(entity: &str, row: &Row) -> Result<RowData, DbError> {
    let fields = row
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| -> Result<FieldValue, DbError> {
            let value = pg_value(row, idx, col.type_()).map_err(|err| match err {
                DbError::Postgres(_) => DbError::UnsupportedType {
                    column: col.name().to_string(),
                    type_name: col.type_().name().to_string(),
                },
                other => other,
            })?;
            Ok(FieldValue::new(col.name(), value))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RowData::new(entity, fields))
}

fn pg_value(row: &Row, idx: usize, ty: &Type) -> Result<Value, DbError> {
    let value = match *ty {
        Type::BOOL => get::<bool>(row, idx)?.map(Value::Boolean),
        Type::CHAR => get::<i8>(row, idx)?.map(|v| Value::Int(v.into())),
        Type::INT2 => get::<i16>(row, idx)?.map(|v| Value::Int(v.into())),
        Type::INT4 => get::<i32>(row, idx)?.map(|v| Value::Int(v.into())),
        Type::INT8 => get::<i64>(row, idx)?.map(Value::Int),
        Type::OID => get::<u32>(row, idx)?.map(|v| Value::Uint(v.into())),
        Type::FLOAT4 => get::<f32>(row, idx)?.map(|v| Value::Float(v.into())),
        Type::FLOAT8 => get::<f64>(row, idx)?.map(Value::Float),
        Type::NUMERIC => get::<RustDecimal>(row, idx)?
            .and_then(|d| Value::parse_decimal(&d.to_string())),
        Type::UUID => get::<uuid::Uuid>(row, idx)?.map(Value::Uuid),
        Type::BYTEA => get::<Vec<u8>>(row, idx)?.map(Value::Bytes),
        Type::DATE => get::<chrono::NaiveDate>(row, idx)?.map(Value::Date),
        Type::TIME => get::<chrono::NaiveTime>(row, idx)?.map(Value::Time),
        Type::TIMESTAMP => get::<chrono::NaiveDateTime>(row, idx)?.map(Value::Timestamp),
        Type::TIMESTAMPTZ => {
            get::<chrono::DateTime<chrono::Utc>>(row, idx)?.map(Value::TimestampTz)
        }
        Type::JSON | Type::JSONB => {
            get::<PgJson<serde_json::Value>>(row, idx)?.map(|json| Value::Json(json.0))
        }
        // TEXT, VARCHAR, BPCHAR, NAME, and anything else with a text decoding.
        _ => get::<String>(row, idx)?.map(Value::String),
    };
    Ok(value.unwrap_or(Value::Null))
}
