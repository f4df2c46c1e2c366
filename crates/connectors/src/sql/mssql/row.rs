use crate::sql::base::error::DbError;
use model::{
    core::value::Value,
    records::row::{FieldValue, RowData},
};
use rust_decimal::Decimal as RustDecimal;
use tiberius::{ColumnData, FromSql, Row};

pub fn mssql_row_to_data(entity: &str, row: Row) -> Result<RowData, DbError> {
    let names: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();

    let fields = names
        .into_iter()
        .zip(row)
        .map(|(name, data)| -> Result<FieldValue, DbError> {
            let value = column_value(&data).map_err(|err| match err {
                DbError::SqlServer(_) => DbError::UnsupportedType {
                    column: name.clone(),
                    type_name: type_label(&data).to_string(),
                },
                other => other,
            })?;
            Ok(FieldValue { name, value })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RowData::new(entity, fields))
}

fn column_value(data: &ColumnData<'static>) -> Result<Value, DbError> {
    let value = match data {
        ColumnData::U8(v) => v.map(|v| Value::Int(v.into())),
        ColumnData::I16(v) => v.map(|v| Value::Int(v.into())),
        ColumnData::I32(v) => v.map(|v| Value::Int(v.into())),
        ColumnData::I64(v) => v.map(Value::Int),
        ColumnData::F32(v) => v.map(|v| Value::Float(v.into())),
        ColumnData::F64(v) => v.map(Value::Float),
        ColumnData::Bit(v) => v.map(Value::Boolean),
        ColumnData::String(v) => v.as_ref().map(|s| Value::String(s.to_string())),
        ColumnData::Guid(v) => v.map(Value::Uuid),
        ColumnData::Binary(v) => v.as_ref().map(|b| Value::Bytes(b.to_vec())),
        ColumnData::Xml(v) => v
            .as_ref()
            .map(|x| Value::String(x.clone().into_owned().into_string())),
        ColumnData::Numeric(_) => RustDecimal::from_sql(data)?
            .and_then(|d| Value::parse_decimal(&d.to_string())),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            chrono::NaiveDateTime::from_sql(data)?.map(Value::Timestamp)
        }
        ColumnData::Date(_) => chrono::NaiveDate::from_sql(data)?.map(Value::Date),
        ColumnData::Time(_) => chrono::NaiveTime::from_sql(data)?.map(Value::Time),
        ColumnData::DateTimeOffset(_) => chrono::DateTime::<chrono::Utc>::from_sql(data)?
            .map(Value::TimestampTz),
    };
    Ok(value.unwrap_or(Value::Null))
}

fn type_label(data: &ColumnData<'static>) -> &'static str {
    match data {
        ColumnData::U8(_) => "tinyint",
        ColumnData::I16(_) => "smallint",
        ColumnData::I32(_) => "int",
        ColumnData::I64(_) => "bigint",
        ColumnData::F32(_) => "real",
        ColumnData::F64(_) => "float",
        ColumnData::Bit(_) => "bit",
        ColumnData::String(_) => "nvarchar",
        ColumnData::Guid(_) => "uniqueidentifier",
        ColumnData::Binary(_) => "varbinary",
        ColumnData::Xml(_) => "xml",
        ColumnData::Numeric(_) => "numeric",
        ColumnData::DateTime(_) => "datetime",
        ColumnData::SmallDateTime(_) => "smalldatetime",
        ColumnData::DateTime2(_) => "datetime2",
        ColumnData::Date(_) => "date",
        ColumnData::Time(_) => "time",
        ColumnData::DateTimeOffset(_) => "datetimeoffset",
    }
}
