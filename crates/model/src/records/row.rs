use crate::core::value::Value;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub name: String,
    pub value: Value,
}

impl FieldValue {
    pub fn new(name: &str, value: Value) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}

/// One row as an ordered column-name → value mapping.
///
/// Column order is the order the source returned them in, which is also the
/// order used for generated DDL and COPY column lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowData {
    pub entity: String,
    pub field_values: Vec<FieldValue>,
}

impl RowData {
    pub fn new(entity: &str, field_values: Vec<FieldValue>) -> Self {
        RowData {
            entity: entity.to_string(),
            field_values,
        }
    }

    pub fn from_pairs<I, S>(entity: &str, pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: AsRef<str>,
    {
        let field_values = pairs
            .into_iter()
            .map(|(name, value)| FieldValue::new(name.as_ref(), value))
            .collect();
        Self::new(entity, field_values)
    }

    /// Exact name match first, then a case-insensitive one.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.field_values
            .iter()
            .find(|f| f.name == field)
            .or_else(|| {
                self.field_values
                    .iter()
                    .find(|f| f.name.eq_ignore_ascii_case(field))
            })
    }

    pub fn get_value(&self, field: &str) -> Value {
        self.get(field)
            .map(|f| f.value.clone())
            .unwrap_or(Value::Null)
    }

    /// Replaces the value of an existing column in place, or appends a new one.
    pub fn set(&mut self, field: &str, value: Value) {
        match self.field_values.iter_mut().find(|f| f.name == field) {
            Some(existing) => existing.value = value,
            None => self.field_values.push(FieldValue::new(field, value)),
        }
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        let idx = self.field_values.iter().position(|f| f.name == field)?;
        Some(self.field_values.remove(idx).value)
    }

    pub fn columns(&self) -> Vec<&str> {
        self.field_values.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.field_values.iter().map(|f| &f.value)
    }

    pub fn len(&self) -> usize {
        self.field_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.field_values.is_empty()
    }
}
