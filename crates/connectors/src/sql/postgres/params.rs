use crate::sql::base::{
    error::DbError,
    utils::{parse_date, parse_datetime_utc, parse_naive_datetime, parse_time},
};
use model::core::value::Value;
use rust_decimal::Decimal as RustDecimal;
use std::str::FromStr;
use tokio_postgres::types::{Json as PgJson, ToSql, Type};
use uuid::Uuid;

pub struct PgParam(Box<dyn ToSql + Sync + Send>);

impl PgParam {
    /// Converts `value` to the Rust type tokio-postgres accepts for `ty`.
    ///
    /// Keyset positions come back from the checkpoint file as JSON scalars,
    /// so text has to be parsed into temporal and numeric types here.
    pub fn for_type(index: usize, value: Value, ty: &Type) -> Result<Self, DbError> {
        let mismatch = |value: &Value| DbError::ParamType {
            index: index + 1,
            expected: ty.name().to_string(),
            value: value.to_string(),
        };

        if value.is_null() {
            return Ok(Self::null_for(ty));
        }

        let param = match *ty {
            Type::BOOL => match &value {
                Value::Boolean(b) => PgParam(Box::new(*b)),
                other => PgParam(Box::new(other.as_i64().ok_or_else(|| mismatch(other))? != 0)),
            },
            Type::INT2 => {
                let v = value.as_i64().and_then(|v| i16::try_from(v).ok());
                PgParam(Box::new(v.ok_or_else(|| mismatch(&value))?))
            }
            Type::INT4 => {
                let v = value.as_i64().and_then(|v| i32::try_from(v).ok());
                PgParam(Box::new(v.ok_or_else(|| mismatch(&value))?))
            }
            Type::INT8 => PgParam(Box::new(value.as_i64().ok_or_else(|| mismatch(&value))?)),
            Type::FLOAT4 => {
                PgParam(Box::new(value.as_f64().ok_or_else(|| mismatch(&value))? as f32))
            }
            Type::FLOAT8 => PgParam(Box::new(value.as_f64().ok_or_else(|| mismatch(&value))?)),
            Type::NUMERIC => {
                let decimal = value
                    .as_string()
                    .and_then(|s| RustDecimal::from_str(&s).ok())
                    .ok_or_else(|| mismatch(&value))?;
                PgParam(Box::new(decimal))
            }
            Type::UUID => {
                let uuid = match &value {
                    Value::Uuid(u) => Some(*u),
                    other => other.as_str().and_then(|s| Uuid::parse_str(s).ok()),
                };
                PgParam(Box::new(uuid.ok_or_else(|| mismatch(&value))?))
            }
            Type::DATE => {
                let date = match &value {
                    Value::Date(d) => Some(*d),
                    Value::Timestamp(ts) => Some(ts.date()),
                    other => other.as_str().and_then(parse_date),
                };
                PgParam(Box::new(date.ok_or_else(|| mismatch(&value))?))
            }
            Type::TIME => {
                let time = match &value {
                    Value::Time(t) => Some(*t),
                    other => other.as_str().and_then(parse_time),
                };
                PgParam(Box::new(time.ok_or_else(|| mismatch(&value))?))
            }
            Type::TIMESTAMP => {
                let ts = match &value {
                    Value::Timestamp(ts) => Some(*ts),
                    Value::TimestampTz(ts) => Some(ts.naive_utc()),
                    other => other.as_str().and_then(parse_naive_datetime),
                };
                PgParam(Box::new(ts.ok_or_else(|| mismatch(&value))?))
            }
            Type::TIMESTAMPTZ => {
                let ts = match &value {
                    Value::TimestampTz(ts) => Some(*ts),
                    Value::Timestamp(ts) => Some(ts.and_utc()),
                    other => other.as_str().and_then(parse_datetime_utc),
                };
                PgParam(Box::new(ts.ok_or_else(|| mismatch(&value))?))
            }
            Type::BYTEA => match value {
                Value::Bytes(b) => PgParam(Box::new(b)),
                other => return Err(mismatch(&other)),
            },
            Type::JSON | Type::JSONB => match value {
                Value::Json(j) => PgParam(Box::new(PgJson(j))),
                other => PgParam(Box::new(PgJson(other.to_json()))),
            },
            _ => PgParam(Box::new(value.as_string().ok_or_else(|| mismatch(&value))?)),
        };

        Ok(param)
    }

    fn null_for(ty: &Type) -> Self {
        match *ty {
            Type::BOOL => PgParam(Box::new(None::<bool>)),
            Type::INT2 => PgParam(Box::new(None::<i16>)),
            Type::INT4 => PgParam(Box::new(None::<i32>)),
            Type::INT8 => PgParam(Box::new(None::<i64>)),
            Type::FLOAT4 => PgParam(Box::new(None::<f32>)),
            Type::FLOAT8 => PgParam(Box::new(None::<f64>)),
            Type::NUMERIC => PgParam(Box::new(None::<RustDecimal>)),
            Type::UUID => PgParam(Box::new(None::<Uuid>)),
            Type::DATE => PgParam(Box::new(None::<chrono::NaiveDate>)),
            Type::TIME => PgParam(Box::new(None::<chrono::NaiveTime>)),
            Type::TIMESTAMP => PgParam(Box::new(None::<chrono::NaiveDateTime>)),
            Type::TIMESTAMPTZ => PgParam(Box::new(None::<chrono::DateTime<chrono::Utc>>)),
            Type::BYTEA => PgParam(Box::new(None::<Vec<u8>>)),
            Type::JSON | Type::JSONB => PgParam(Box::new(None::<PgJson<serde_json::Value>>)),
            _ => PgParam(Box::new(None::<String>)),
        }
    }
}

impl AsRef<dyn ToSql + Sync> for PgParam {
    fn as_ref(&self) -> &(dyn ToSql + Sync + 'static) {
        &*self.0
    }
}

pub struct PgParamStore {
    pub params: Vec<PgParam>,
}

impl PgParamStore {
    /// Binds `values` against the parameter types of a prepared statement.
    pub fn for_statement(values: &[Value], types: &[Type]) -> Result<Self, DbError> {
        if values.len() != types.len() {
            return Err(DbError::Unknown(format!(
                "statement expects {} parameters, {} supplied",
                types.len(),
                values.len()
            )));
        }
        let params = values
            .iter()
            .cloned()
            .zip(types)
            .enumerate()
            .map(|(i, (value, ty))| PgParam::for_type(i, value, ty))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { params })
    }

    pub fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|param| param.as_ref())
            .collect::<Vec<_>>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrows_integers() {
        assert!(PgParam::for_type(0, Value::Int(12), &Type::INT4).is_ok());
        assert!(PgParam::for_type(0, Value::Int(i64::MAX), &Type::INT4).is_err());
    }

    #[test]
    fn parses_checkpointed_text() {
        assert!(PgParam::for_type(0, Value::from("2024-01-02T03:04:05"), &Type::TIMESTAMP).is_ok());
        assert!(PgParam::for_type(0, Value::from("12.50"), &Type::NUMERIC).is_ok());
        assert!(PgParam::for_type(0, Value::from("not a date"), &Type::DATE).is_err());
    }

    #[test]
    fn counts_must_match() {
        let err = PgParamStore::for_statement(&[Value::Int(1)], &[Type::INT8, Type::INT8]);
        assert!(err.is_err());
    }
}
