//! Source type names to PostgreSQL column types.

/// Fallback for any type the table below does not know.
pub const UNBOUNDED_TEXT: &str = "text";

const CHARACTER_TYPES: &[&str] = &[
    "varchar",
    "nvarchar",
    "char",
    "nchar",
    "character varying",
    "character",
    "bpchar",
];

const TYPE_MAP: &[(&str, &str)] = &[
    // SQL Server
    ("int", "integer"),
    ("bigint", "bigint"),
    ("smallint", "smallint"),
    ("tinyint", "smallint"),
    ("bit", "boolean"),
    ("decimal", "numeric"),
    ("numeric", "numeric"),
    ("money", "numeric"),
    ("float", "double precision"),
    ("real", "real"),
    ("uniqueidentifier", "uuid"),
    ("varbinary", "bytea"),
    ("binary", "bytea"),
    ("datetime", "timestamptz"),
    ("datetime2", "timestamptz"),
    ("smalldatetime", "timestamptz"),
    ("datetimeoffset", "timestamptz"),
    ("date", "date"),
    ("time", "time"),
    // PostgreSQL
    ("integer", "integer"),
    ("int2", "smallint"),
    ("int4", "integer"),
    ("int8", "bigint"),
    ("boolean", "boolean"),
    ("bool", "boolean"),
    ("double precision", "double precision"),
    ("float4", "real"),
    ("float8", "double precision"),
    ("uuid", "uuid"),
    ("bytea", "bytea"),
    ("timestamp", "timestamptz"),
    ("timestamp without time zone", "timestamptz"),
    ("timestamp with time zone", "timestamptz"),
    ("timestamptz", "timestamptz"),
    ("json", "jsonb"),
    ("jsonb", "jsonb"),
    // MySQL
    ("mediumint", "integer"),
    ("double", "double precision"),
    ("blob", "bytea"),
    ("longblob", "bytea"),
];

/// Maps a source type name to a target column type.
///
/// Character types become `varchar(n)` when a positive length is known and
/// `text` otherwise. Unknown types map to `text`.
pub fn map_type(source_type: &str, max_length: Option<i64>) -> String {
    let t = source_type.trim().to_ascii_lowercase();

    if CHARACTER_TYPES.contains(&t.as_str()) {
        return match max_length {
            Some(n) if n > 0 => format!("varchar({n})"),
            _ => UNBOUNDED_TEXT.to_string(),
        };
    }

    TYPE_MAP
        .iter()
        .find(|(src, _)| *src == t)
        .map(|(_, target)| target.to_string())
        .unwrap_or_else(|| UNBOUNDED_TEXT.to_string())
}

/// Splits a rendered type such as `nvarchar(50)` or `decimal(18,2)` into its
/// base name and character length. `max` and multi-argument precisions yield
/// no length.
pub fn split_type_name(rendered: &str) -> (String, Option<i64>) {
    let rendered = rendered.trim();
    match rendered.split_once('(') {
        Some((base, args)) => {
            let args = args.trim_end_matches(')');
            let len = if args.contains(',') {
                None
            } else {
                args.trim().parse::<i64>().ok()
            };
            (base.trim().to_ascii_lowercase(), len)
        }
        None => (rendered.to_ascii_lowercase(), None),
    }
}
