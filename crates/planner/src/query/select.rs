use crate::{error::PlanError, query::dialect::Dialect};
use model::core::entity::SourceEntity;

/// Everything that shapes the unpaginated source relation of a job.
#[derive(Debug, Clone)]
pub struct RelationSpec<'a> {
    pub entity: &'a SourceEntity,
    /// Explicit projection; empty means all columns.
    pub columns: &'a [String],
    /// Raw predicate text, inserted verbatim.
    pub filter: Option<&'a str>,
    pub group_by: &'a [String],
}

/// Renders `SELECT <cols|*> FROM <table|(query) AS q_base> [WHERE ..] [GROUP BY ..]`.
///
/// Pagination strategies wrap the result as a derived table, so it never
/// carries an `ORDER BY` of its own.
pub fn base_relation(dialect: &dyn Dialect, relation: &RelationSpec<'_>) -> Result<String, PlanError> {
    if !relation.group_by.is_empty() && relation.columns.is_empty() {
        return Err(PlanError::GroupByWithoutColumns);
    }

    let projection = if relation.columns.is_empty() {
        "*".to_string()
    } else {
        quote_list(dialect, relation.columns)
    };

    let from = match relation.entity {
        SourceEntity::Table(table) => dialect.qualified(table),
        SourceEntity::Query(sql) => format!("({sql}) AS q_base"),
    };

    let mut sql = format!("SELECT {projection} FROM {from}");

    if let Some(filter) = relation.filter.map(str::trim).filter(|f| !f.is_empty()) {
        sql.push_str(&format!(" WHERE {filter}"));
    }

    if !relation.group_by.is_empty() {
        sql.push_str(&format!(" GROUP BY {}", quote_list(dialect, relation.group_by)));
    }

    Ok(sql)
}

pub fn quote_list(dialect: &dyn Dialect, idents: &[String]) -> String {
    idents
        .iter()
        .map(|c| dialect.quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ")
}
