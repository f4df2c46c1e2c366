use serde::{Deserialize, Serialize};

/// Source column metadata, only needed while translating a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Type name as the source catalog reports it (`nvarchar`, `int`, ...).
    pub data_type: String,
    pub is_nullable: bool,
    /// Maximum length for character types; `None` or `<= 0` means unbounded.
    pub char_max_length: Option<i64>,
}

impl ColumnDescriptor {
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_string(),
            is_nullable: true,
            char_max_length: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    pub fn with_max_length(mut self, len: i64) -> Self {
        self.char_max_length = Some(len);
        self
    }
}
