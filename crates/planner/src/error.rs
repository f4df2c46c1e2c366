use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("Requested column '{0}' does not exist in the source")]
    UnknownColumn(String),

    #[error("Column '{0}' normalizes to an empty identifier")]
    EmptyIdentifier(String),

    #[error("Columns '{first}' and '{second}' both normalize to '{normalized}'")]
    DuplicateColumn {
        first: String,
        second: String,
        normalized: String,
    },

    #[error("GROUP BY needs an explicit column list")]
    GroupByWithoutColumns,

    #[error("Source relation has no columns")]
    NoColumns,

    #[error("{mode} pagination needs {needed} sort column(s), {given} configured")]
    SortColumns {
        mode: &'static str,
        needed: &'static str,
        given: usize,
    },

    #[error("Stored {found} position cannot resume {mode} pagination")]
    PositionMismatch {
        mode: &'static str,
        found: &'static str,
    },

    #[error("Keyset column '{0}' is missing from the fetched row")]
    MissingKeysetColumn(String),

    #[error("Keyset column '{0}' is NULL in the last fetched row")]
    NullKeysetValue(String),

    #[error("Keyset column '{0}' is {1} in the last fetched row and cannot be stored")]
    NonFiniteKeysetValue(String, f64),

    #[error("Unknown sort order '{0}', expected 'asc' or 'desc'")]
    SortOrder(String),

    #[error("Unknown pagination mode '{0}'")]
    PaginationMode(String),
}
