use crate::sql::base::error::DbError;
use chrono::{NaiveDate, NaiveTime};
use model::{
    core::value::Value,
    records::row::{FieldValue, RowData},
};
use mysql_async::{Column, Row, Value as MySqlValue, consts::ColumnType};

const BINARY_CHARSET: u16 = 63;

/// Catalog-style type name for a result column.
pub fn mysql_type_name(col: &Column) -> &'static str {
    let binary = col.character_set() == BINARY_CHARSET;
    match col.column_type() {
        ColumnType::MYSQL_TYPE_TINY => "tinyint",
        ColumnType::MYSQL_TYPE_SHORT | ColumnType::MYSQL_TYPE_YEAR => "smallint",
        ColumnType::MYSQL_TYPE_INT24 => "mediumint",
        ColumnType::MYSQL_TYPE_LONG => "int",
        ColumnType::MYSQL_TYPE_LONGLONG => "bigint",
        ColumnType::MYSQL_TYPE_FLOAT => "real",
        ColumnType::MYSQL_TYPE_DOUBLE => "double",
        ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => "decimal",
        ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE => "date",
        ColumnType::MYSQL_TYPE_TIME | ColumnType::MYSQL_TYPE_TIME2 => "time",
        ColumnType::MYSQL_TYPE_DATETIME
        | ColumnType::MYSQL_TYPE_DATETIME2
        | ColumnType::MYSQL_TYPE_TIMESTAMP
        | ColumnType::MYSQL_TYPE_TIMESTAMP2 => "datetime",
        ColumnType::MYSQL_TYPE_JSON => "json",
        ColumnType::MYSQL_TYPE_VARCHAR
        | ColumnType::MYSQL_TYPE_VAR_STRING
        | ColumnType::MYSQL_TYPE_STRING => {
            if binary {
                "varbinary"
            } else {
                "varchar"
            }
        }
        ColumnType::MYSQL_TYPE_TINY_BLOB
        | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
        | ColumnType::MYSQL_TYPE_LONG_BLOB
        | ColumnType::MYSQL_TYPE_BLOB => {
            if binary {
                "blob"
            } else {
                "text"
            }
        }
        _ => "text",
    }
}

pub fn mysql_row_to_data(entity: &str, row: &Row) -> Result<RowData, DbError> {
    let fields = row
        .columns_ref()
        .iter()
        .enumerate()
        .map(|(idx, col)| -> Result<FieldValue, DbError> {
            let value = match row.as_ref(idx) {
                Some(raw) => mysql_value(col, raw)?,
                None => Value::Null,
            };
            Ok(FieldValue::new(&col.name_str(), value))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RowData::new(entity, fields))
}

fn mysql_value(col: &Column, raw: &MySqlValue) -> Result<Value, DbError> {
    let value = match raw {
        MySqlValue::NULL => Value::Null,
        MySqlValue::Int(i) => Value::Int(*i),
        MySqlValue::UInt(u) => Value::Uint(*u),
        MySqlValue::Float(f) => Value::Float((*f).into()),
        MySqlValue::Double(d) => Value::Float(*d),
        MySqlValue::Date(y, m, d, h, mi, s, us) => {
            // Zero dates ('0000-00-00') have no chrono equivalent.
            let Some(date) = NaiveDate::from_ymd_opt((*y).into(), (*m).into(), (*d).into()) else {
                return Ok(Value::Null);
            };
            match mysql_type_name(col) {
                "date" => Value::Date(date),
                _ => date
                    .and_hms_micro_opt((*h).into(), (*mi).into(), (*s).into(), *us)
                    .map(Value::Timestamp)
                    .unwrap_or(Value::Null),
            }
        }
        MySqlValue::Time(neg, days, h, m, s, us) => {
            if !*neg && *days == 0 {
                NaiveTime::from_hms_micro_opt((*h).into(), (*m).into(), (*s).into(), *us)
                    .map(Value::Time)
                    .unwrap_or(Value::Null)
            } else {
                // Durations outside a day are kept as text.
                let sign = if *neg { "-" } else { "" };
                let hours = u64::from(*days) * 24 + u64::from(*h);
                Value::String(format!("{sign}{hours:02}:{m:02}:{s:02}.{us:06}"))
            }
        }
        MySqlValue::Bytes(bytes) => match mysql_type_name(col) {
            "decimal" => {
                let text = String::from_utf8(bytes.clone())?;
                Value::parse_decimal(&text).unwrap_or(Value::String(text))
            }
            "json" => match serde_json::from_slice(bytes) {
                Ok(json) => Value::Json(json),
                Err(_) => Value::String(String::from_utf8(bytes.clone())?),
            },
            "varbinary" | "blob" => Value::Bytes(bytes.clone()),
            _ => Value::String(String::from_utf8(bytes.clone())?),
        },
    };
    Ok(value)
}
