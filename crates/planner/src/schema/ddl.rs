use crate::{
    error::PlanError,
    query::dialect::{Dialect, Postgres},
    schema::{ident::normalize_identifier, typemap::map_type},
};
use model::core::{column::ColumnDescriptor, entity::TableName};
use std::collections::HashMap;

pub const DEFAULT_TARGET_SCHEMA: &str = "public";

/// A translated target column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
}

/// Keeps only `requested` (matched case-insensitively) in the requested
/// order. An empty request keeps every column in catalog order.
pub fn select_columns(
    available: Vec<ColumnDescriptor>,
    requested: &[String],
) -> Result<Vec<ColumnDescriptor>, PlanError> {
    if available.is_empty() {
        return Err(PlanError::NoColumns);
    }
    if requested.is_empty() {
        return Ok(available);
    }

    let mut by_name: HashMap<String, ColumnDescriptor> = available
        .into_iter()
        .map(|c| (c.name.to_lowercase(), c))
        .collect();

    requested
        .iter()
        .map(|name| {
            by_name
                .remove(&name.to_lowercase())
                .ok_or_else(|| PlanError::UnknownColumn(name.clone()))
        })
        .collect()
}

/// Normalizes names and maps types; two source columns landing on the same
/// target name is an error rather than a silently broken table.
pub fn translate_columns(columns: &[ColumnDescriptor]) -> Result<Vec<ColumnDef>, PlanError> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    let mut defs = Vec::with_capacity(columns.len());

    for col in columns {
        let name = normalize_identifier(&col.name)?;
        if let Some(first) = seen.insert(name.clone(), &col.name) {
            return Err(PlanError::DuplicateColumn {
                first: first.to_string(),
                second: col.name.clone(),
                normalized: name,
            });
        }
        defs.push(ColumnDef {
            name,
            data_type: map_type(&col.data_type, col.char_max_length),
            is_nullable: col.is_nullable,
        });
    }

    Ok(defs)
}

/// Normalized `schema.table` for a destination, defaulting the schema to
/// `public`.
pub fn target_table(dest: &TableName) -> Result<TableName, PlanError> {
    let schema = match &dest.schema {
        Some(s) => normalize_identifier(s)?,
        None => DEFAULT_TARGET_SCHEMA.to_string(),
    };
    Ok(TableName {
        schema: Some(schema),
        name: normalize_identifier(&dest.name)?,
    })
}

pub fn create_table_sql(table: &TableName, columns: &[ColumnDef]) -> String {
    let dialect = Postgres;
    let body = columns
        .iter()
        .map(|c| {
            let mut line = format!("    {} {}", dialect.quote_identifier(&c.name), c.data_type);
            if !c.is_nullable {
                line.push_str(" NOT NULL");
            }
            line
        })
        .collect::<Vec<_>>()
        .join(",\n");
    format!("CREATE TABLE {} (\n{body}\n);", dialect.qualified(table))
}

pub fn drop_table_sql(table: &TableName) -> String {
    format!("DROP TABLE IF EXISTS {} CASCADE;", Postgres.qualified(table))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("User Id", "int").not_null(),
            ColumnDescriptor::new("Full-Name", "varchar").with_max_length(50),
            ColumnDescriptor::new("Notes", "ntext"),
        ]
    }

    #[test]
    fn translates_names_and_types() {
        let defs = translate_columns(&sample()[..2]).unwrap();
        let rendered: Vec<String> = defs
            .iter()
            .map(|d| format!("{} {}", d.name, d.data_type))
            .collect();
        assert_eq!(rendered, vec!["user_id integer", "full_name varchar(50)"]);
    }

    #[test]
    fn renders_create_and_drop() {
        let table = target_table(&TableName::parse("Staging.Customer List")).unwrap();
        let defs = translate_columns(&sample()).unwrap();
        assert_eq!(
            create_table_sql(&table, &defs),
            "CREATE TABLE \"staging\".\"customer_list\" (\n    \"user_id\" integer NOT NULL,\n    \"full_name\" varchar(50),\n    \"notes\" text\n);"
        );
        assert_eq!(
            drop_table_sql(&table),
            "DROP TABLE IF EXISTS \"staging\".\"customer_list\" CASCADE;"
        );
    }

    #[test]
    fn destination_defaults_to_public() {
        let t = target_table(&TableName::parse("Orders")).unwrap();
        assert_eq!(t.to_string(), "public.orders");
    }

    #[test]
    fn subset_is_case_insensitive_and_ordered() {
        let picked = select_columns(sample(), &["notes".into(), "USER ID".into()]).unwrap();
        let names: Vec<&str> = picked.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Notes", "User Id"]);
    }

    #[test]
    fn unknown_requested_column_fails() {
        assert_eq!(
            select_columns(sample(), &["Email".into()]),
            Err(PlanError::UnknownColumn("Email".into()))
        );
    }

    #[test]
    fn colliding_names_fail() {
        let cols = vec![
            ColumnDescriptor::new("Order Id", "int"),
            ColumnDescriptor::new("order_id", "int"),
        ];
        assert!(matches!(
            translate_columns(&cols),
            Err(PlanError::DuplicateColumn { .. })
        ));
    }
}
