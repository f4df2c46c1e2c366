use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

/// Stable identity of a migration job inside the checkpoint store.
///
/// Derived from the source locator, target locator, source entity and
/// destination table. Locators carry credentials, so only their digest ends
/// up in the key; the destination name is kept readable as a prefix.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobKey(Arc<str>);

impl JobKey {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Arc::from(id.into()))
    }

    pub fn derive(source_locator: &str, target_locator: &str, source_entity: &str, dest: &str) -> Self {
        let mut h = blake3::Hasher::new();
        for part in [source_locator, target_locator, source_entity, dest] {
            // Length-prefix each part so ("ab", "c") and ("a", "bc") differ.
            h.update(&(part.len() as u64).to_le_bytes());
            h.update(part.as_bytes());
        }
        Self::new(format!("{dest}@{}", &h.finalize().to_hex()[..16]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for JobKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
