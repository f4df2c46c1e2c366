use crate::{
    error::EngineError,
    transform::{
        builtin,
        pipeline::{Transform, TransformChain},
    },
};
use std::{collections::HashMap, sync::Arc};

/// Named transforms available to jobs, populated before the run starts.
#[derive(Clone)]
pub struct TransformRegistry {
    transforms: HashMap<String, Arc<dyn Transform>>,
}

impl TransformRegistry {
    pub fn empty() -> Self {
        Self {
            transforms: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(builtin::TRIM_STRINGS, builtin::trim_strings);
        registry.register(builtin::EMPTY_STRINGS_TO_NULL, builtin::empty_strings_to_null);
        registry.register(builtin::DROP_NULL_COLUMNS, builtin::drop_null_columns);
        registry
    }

    /// Adds or replaces the transform stored under `name`.
    pub fn register<T: Transform + 'static>(&mut self, name: &str, transform: T) {
        self.transforms.insert(name.to_string(), Arc::new(transform));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.transforms.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolves every reference or none.
    pub fn resolve<S: AsRef<str>>(&self, refs: &[S]) -> Result<TransformChain, EngineError> {
        refs.iter().try_fold(TransformChain::new(), |chain, name| {
            let name = name.as_ref();
            let transform = self
                .transforms
                .get(name)
                .ok_or_else(|| EngineError::PluginResolution(name.to_string()))?;
            Ok(chain.push(name, transform.clone()))
        })
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{core::value::Value, records::row::RowData};

    #[test]
    fn resolves_builtins_in_order() {
        let registry = TransformRegistry::default();
        let chain = registry
            .resolve(&["builtin.empty_strings_to_null", "builtin.trim_strings"])
            .unwrap();
        assert_eq!(chain.names(), vec!["builtin.empty_strings_to_null", "builtin.trim_strings"]);

        // Null conversion runs before trimming, so a blank ends up as "".
        let rows = vec![RowData::from_pairs("t", [("a", Value::from("  "))])];
        assert_eq!(chain.apply(rows).unwrap()[0].get_value("a"), Value::from(""));
    }

    #[test]
    fn unknown_reference_fails_whole_chain() {
        let registry = TransformRegistry::default();
        let err = registry
            .resolve(&["builtin.trim_strings", "acme.missing"])
            .unwrap_err();
        assert!(matches!(err, EngineError::PluginResolution(name) if name == "acme.missing"));
    }

    #[test]
    fn registers_custom_transforms() {
        let mut registry = TransformRegistry::empty();
        registry.register("acme.noop", |rows: Vec<RowData>| -> Result<Vec<RowData>, String> {
            Ok(rows)
        });
        assert!(registry.contains("acme.noop"));
        assert_eq!(registry.names(), vec!["acme.noop"]);
    }
}
