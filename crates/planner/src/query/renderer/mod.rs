//! Accumulates SQL text and bound parameters for a single statement.

use model::core::value::Value;

use crate::query::dialect::Dialect;

/// A context that holds the state during the rendering process.
///
/// It accumulates the SQL string and the parameters, and provides
/// access to the dialect for syntax-specific details.
pub struct Renderer<'a> {
    pub sql: String,
    pub params: Vec<Value>,
    pub dialect: &'a dyn Dialect,
}

impl<'a> Renderer<'a> {
    pub fn new(dialect: &'a dyn Dialect) -> Self {
        Self {
            sql: String::new(),
            params: Vec::new(),
            dialect,
        }
    }

    /// Consumes the renderer and returns the final SQL string and parameters.
    pub fn finish(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }

    pub fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    pub fn push_ident(&mut self, ident: &str) {
        let quoted = self.dialect.quote_identifier(ident);
        self.sql.push_str(&quoted);
    }

    pub fn add_param(&mut self, value: Value) {
        let placeholder = self.param(value);
        self.sql.push_str(&placeholder);
    }

    /// Registers a parameter and returns its placeholder without writing it,
    /// for clauses the dialect lays out itself.
    pub fn param(&mut self, value: Value) -> String {
        self.params.push(value);
        self.dialect.get_placeholder(self.params.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::dialect::{MySql, SqlServer};

    #[test]
    fn numbers_placeholders_in_binding_order() {
        let mut r = Renderer::new(&SqlServer);
        r.push("SELECT * FROM t WHERE ");
        r.push_ident("a");
        r.push(" > ");
        r.add_param(Value::Int(1));
        let (sql, params) = r.finish();
        assert_eq!(sql, "SELECT * FROM t WHERE [a] > @P1");
        assert_eq!(params, vec![Value::Int(1)]);
    }

    #[test]
    fn param_does_not_write() {
        let mut r = Renderer::new(&MySql);
        let p = r.param(Value::Int(3));
        assert_eq!(p, "?");
        assert!(r.sql.is_empty());
        assert_eq!(r.params.len(), 1);
    }
}
