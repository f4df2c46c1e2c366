use crate::error::EngineError;
use model::records::row::RowData;
use std::sync::Arc;

/// A row-batch mutation. May reshape, drop, or add rows.
pub trait Transform: Send + Sync {
    fn apply(&self, rows: Vec<RowData>) -> Result<Vec<RowData>, String>;
}

impl<F> Transform for F
where
    F: Fn(Vec<RowData>) -> Result<Vec<RowData>, String> + Send + Sync,
{
    fn apply(&self, rows: Vec<RowData>) -> Result<Vec<RowData>, String> {
        self(rows)
    }
}

/// Resolved transforms for one job, applied in configured order.
#[derive(Clone, Default)]
pub struct TransformChain {
    steps: Vec<(String, Arc<dyn Transform>)>,
}

impl TransformChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, name: &str, transform: Arc<dyn Transform>) -> Self {
        self.steps.push((name.to_string(), transform));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn apply(&self, rows: Vec<RowData>) -> Result<Vec<RowData>, EngineError> {
        self.steps.iter().try_fold(rows, |acc, (name, transform)| {
            transform.apply(acc).map_err(|message| EngineError::Transform {
                plugin: name.clone(),
                message,
            })
        })
    }
}

impl std::fmt::Debug for TransformChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::value::Value;

    fn rows() -> Vec<RowData> {
        vec![RowData::from_pairs("t", [("n", Value::Int(1))])]
    }

    #[test]
    fn applies_in_order() {
        let double = |rows: Vec<RowData>| -> Result<Vec<RowData>, String> {
            Ok(rows
                .into_iter()
                .map(|mut r| {
                    let n = r.get_value("n").as_i64().unwrap_or_default();
                    r.set("n", Value::Int(n * 2));
                    r
                })
                .collect())
        };
        let add_one = |rows: Vec<RowData>| -> Result<Vec<RowData>, String> {
            Ok(rows
                .into_iter()
                .map(|mut r| {
                    let n = r.get_value("n").as_i64().unwrap_or_default();
                    r.set("n", Value::Int(n + 1));
                    r
                })
                .collect())
        };

        let chain = TransformChain::new()
            .push("double", Arc::new(double))
            .push("add_one", Arc::new(add_one));
        let out = chain.apply(rows()).unwrap();
        assert_eq!(out[0].get_value("n"), Value::Int(3));
    }

    #[test]
    fn failure_names_the_transform() {
        let boom = |_: Vec<RowData>| -> Result<Vec<RowData>, String> { Err("bad row".into()) };
        let chain = TransformChain::new().push("acme.boom", Arc::new(boom));
        match chain.apply(rows()) {
            Err(EngineError::Transform { plugin, message }) => {
                assert_eq!(plugin, "acme.boom");
                assert_eq!(message, "bad row");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
