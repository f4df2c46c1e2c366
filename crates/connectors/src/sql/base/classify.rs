//! Sorts driver errors into what the engine does with them.

use crate::sql::base::error::{ConnectorError, DbError};
use mysql_async::Error as MySqlError;
use tiberius::error::Error as TdsError;
use tokio_postgres::{Error as PgError, error::SqlState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Worth repeating after a pause.
    Transient,
    /// The rows or statement do not fit the relation they target.
    SchemaMismatch,
    /// Repeating cannot help.
    Fatal,
}

pub fn classify_db_error(err: &DbError) -> FailureKind {
    match err {
        DbError::Io(_) => FailureKind::Transient,
        DbError::Postgres(pg_err) => classify_pg_error(pg_err),
        DbError::MySql(mysql_err) => classify_mysql_error(mysql_err),
        DbError::SqlServer(tds_err) => classify_tds_error(tds_err),
        DbError::UnsupportedType { .. } => FailureKind::SchemaMismatch,
        DbError::ParamType { .. } => FailureKind::Fatal,
        DbError::Utf8(_) => FailureKind::Fatal,
        DbError::Write(_) => FailureKind::Transient,
        DbError::Unknown(_) => FailureKind::Fatal,
    }
}

pub fn classify_connector_error(err: &ConnectorError) -> FailureKind {
    match err {
        ConnectorError::InvalidUrl(_) => FailureKind::Fatal,
        ConnectorError::Postgres(pg_err) => classify_pg_error(pg_err),
        ConnectorError::MySql(mysql_err) => classify_mysql_error(mysql_err),
        ConnectorError::SqlServer(tds_err) => classify_tds_error(tds_err),
        ConnectorError::TlsConfig(_) => FailureKind::Fatal,
        ConnectorError::Io(_) => FailureKind::Transient,
    }
}

fn classify_pg_error(err: &PgError) -> FailureKind {
    if err.is_closed() {
        return FailureKind::Transient;
    }

    match err.code() {
        Some(code) if is_pg_shape_code(code) => FailureKind::SchemaMismatch,
        // Remaining syntax and access-rule violations.
        Some(code) if code.code().starts_with("42") => FailureKind::Fatal,
        _ => FailureKind::Transient,
    }
}

fn is_pg_shape_code(code: &SqlState) -> bool {
    matches!(
        *code,
        SqlState::UNDEFINED_COLUMN
            | SqlState::UNDEFINED_TABLE
            | SqlState::DATATYPE_MISMATCH
            | SqlState::INVALID_TEXT_REPRESENTATION
            | SqlState::BAD_COPY_FILE_FORMAT
            | SqlState::STRING_DATA_RIGHT_TRUNCATION
            | SqlState::NUMERIC_VALUE_OUT_OF_RANGE
            | SqlState::INVALID_DATETIME_FORMAT
            | SqlState::DATETIME_FIELD_OVERFLOW
            | SqlState::NOT_NULL_VIOLATION
    )
}

fn classify_mysql_error(err: &MySqlError) -> FailureKind {
    match err {
        MySqlError::Server(server_err) => match server_err.code {
            // ER_BAD_FIELD_ERROR, ER_NO_SUCH_TABLE
            1054 | 1146 => FailureKind::SchemaMismatch,
            // ER_PARSE_ERROR, ER_ACCESS_DENIED_ERROR, ER_TABLEACCESS_DENIED_ERROR
            1064 | 1045 | 1142 => FailureKind::Fatal,
            _ => FailureKind::Transient,
        },
        MySqlError::Url(_) => FailureKind::Fatal,
        _ => FailureKind::Transient,
    }
}

fn classify_tds_error(err: &TdsError) -> FailureKind {
    match err {
        TdsError::Server(token) => match token.code() {
            // Invalid column name, invalid object name.
            207 | 208 => FailureKind::SchemaMismatch,
            // Syntax errors, login failure, permission denied.
            102 | 156 | 18456 | 229 => FailureKind::Fatal,
            _ => FailureKind::Transient,
        },
        TdsError::Conversion(_) | TdsError::Utf8 | TdsError::Utf16 | TdsError::ParseInt(_) => {
            FailureKind::Fatal
        }
        _ => FailureKind::Transient,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_is_transient() {
        let err = DbError::Io(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"));
        assert_eq!(classify_db_error(&err), FailureKind::Transient);
    }

    #[test]
    fn unsupported_column_type_is_a_mismatch() {
        let err = DbError::UnsupportedType {
            column: "geo".into(),
            type_name: "geography".into(),
        };
        assert_eq!(classify_db_error(&err), FailureKind::SchemaMismatch);
    }

    #[test]
    fn bad_locator_is_fatal() {
        let err = ConnectorError::InvalidUrl("nope".into());
        assert_eq!(classify_connector_error(&err), FailureKind::Fatal);
    }
}
