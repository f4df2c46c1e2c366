//! Defines the `Dialect` trait for database-specific SQL syntax.

use model::core::entity::TableName;

pub trait Dialect: Send + Sync {
    /// Wraps an identifier (like a table or column name) in the correct
    /// quotation marks for the dialect, escaping embedded quote characters.
    ///
    /// - SQL Server uses brackets: `[my_column]`
    /// - PostgreSQL uses double quotes: `"my_column"`
    /// - MySQL uses backticks: `` `my_column` ``
    fn quote_identifier(&self, ident: &str) -> String;

    /// Returns the placeholder for the zero-based `index`-th bound parameter.
    fn get_placeholder(&self, index: usize) -> String;

    /// Skip-and-take clause appended after `ORDER BY`.
    fn page_clause(&self, offset: &str, limit: &str) -> String;

    /// Take-only clause appended after `ORDER BY`.
    fn limit_clause(&self, limit: &str) -> String;

    /// Returns the name of the dialect (e.g., "PostgreSQL", "MySQL").
    fn name(&self) -> String;

    /// `schema.table` with each part quoted; an unqualified name stays
    /// unqualified so the server resolves it against its default schema.
    fn qualified(&self, table: &TableName) -> String {
        match &table.schema {
            Some(schema) => format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(&table.name)
            ),
            None => self.quote_identifier(&table.name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqlServer;

impl Dialect for SqlServer {
    fn quote_identifier(&self, ident: &str) -> String {
        format!("[{}]", ident.replace(']', "]]"))
    }

    fn get_placeholder(&self, index: usize) -> String {
        format!("@P{}", index + 1)
    }

    fn page_clause(&self, offset: &str, limit: &str) -> String {
        format!("OFFSET {offset} ROWS FETCH NEXT {limit} ROWS ONLY")
    }

    fn limit_clause(&self, limit: &str) -> String {
        // OFFSET/FETCH is the only parameterizable row limit after ORDER BY.
        format!("OFFSET 0 ROWS FETCH NEXT {limit} ROWS ONLY")
    }

    fn name(&self) -> String {
        "SQL Server".into()
    }
}

#[derive(Debug, Clone)]
pub struct Postgres;

impl Dialect for Postgres {
    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn get_placeholder(&self, index: usize) -> String {
        // PostgreSQL uses $1, $2, etc.
        format!("${}", index + 1)
    }

    fn page_clause(&self, offset: &str, limit: &str) -> String {
        format!("OFFSET {offset} ROWS FETCH NEXT {limit} ROWS ONLY")
    }

    fn limit_clause(&self, limit: &str) -> String {
        format!("LIMIT {limit}")
    }

    fn name(&self) -> String {
        "PostgreSQL".into()
    }
}

#[derive(Debug, Clone)]
pub struct MySql;

impl Dialect for MySql {
    fn quote_identifier(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn get_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn page_clause(&self, offset: &str, limit: &str) -> String {
        format!("LIMIT {offset}, {limit}")
    }

    fn limit_clause(&self, limit: &str) -> String {
        format!("LIMIT {limit}")
    }

    fn name(&self) -> String {
        "MySQL".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_and_escapes() {
        assert_eq!(SqlServer.quote_identifier("a]b"), "[a]]b]");
        assert_eq!(Postgres.quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(MySql.quote_identifier("a`b"), "`a``b`");
    }

    #[test]
    fn placeholders_are_one_based() {
        assert_eq!(SqlServer.get_placeholder(0), "@P1");
        assert_eq!(Postgres.get_placeholder(2), "$3");
        assert_eq!(MySql.get_placeholder(5), "?");
    }

    #[test]
    fn qualifies_only_when_schema_known() {
        let t = TableName::parse("dbo.Orders");
        assert_eq!(SqlServer.qualified(&t), "[dbo].[Orders]");
        assert_eq!(Postgres.qualified(&TableName::parse("orders")), "\"orders\"");
    }
}
