use crate::core::value::Value;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};
use std::fmt;

/// How far a job has progressed.
///
/// `Offset(0)` doubles as "never started" and "finished": both mean the next
/// run starts from scratch (and recreates the target table).
#[derive(Debug, Clone, PartialEq)]
pub enum ResumePosition {
    /// Number of source rows already committed, for offset pagination.
    Offset(u64),

    /// Sort and tiebreak values of the last committed row, for keyset pagination.
    Keyset { sort: Value, unique: Value },
}

impl ResumePosition {
    pub const FRESH: ResumePosition = ResumePosition::Offset(0);

    pub fn is_fresh(&self) -> bool {
        matches!(self, ResumePosition::Offset(0))
    }

    pub fn offset(&self) -> Option<u64> {
        match self {
            ResumePosition::Offset(n) => Some(*n),
            ResumePosition::Keyset { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ResumePosition::Offset(_) => "offset",
            ResumePosition::Keyset { .. } => "keyset",
        }
    }
}

impl Default for ResumePosition {
    fn default() -> Self {
        Self::FRESH
    }
}

impl fmt::Display for ResumePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResumePosition::Offset(n) => write!(f, "offset={n}"),
            ResumePosition::Keyset { sort, unique } => {
                write!(f, "keyset=({}, {})", sort.to_json(), unique.to_json())
            }
        }
    }
}

// On disk: `<int>` or `{"sort": <scalar>, "unique": <scalar>}`.
impl Serialize for ResumePosition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ResumePosition::Offset(n) => serializer.serialize_u64(*n),
            ResumePosition::Keyset { sort, unique } => serde_json::json!({
                "sort": sort.to_json(),
                "unique": unique.to_json(),
            })
            .serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ResumePosition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        match &raw {
            serde_json::Value::Number(n) => n
                .as_u64()
                .map(ResumePosition::Offset)
                .ok_or_else(|| D::Error::custom(format!("offset must be a non-negative integer, got {n}"))),
            serde_json::Value::Object(map) => {
                let sort = map
                    .get("sort")
                    .ok_or_else(|| D::Error::missing_field("sort"))?;
                let unique = map
                    .get("unique")
                    .ok_or_else(|| D::Error::missing_field("unique"))?;
                Ok(ResumePosition::Keyset {
                    sort: Value::from_json(sort),
                    unique: Value::from_json(unique),
                })
            }
            other => Err(D::Error::custom(format!(
                "expected an integer offset or a keyset object, got {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_a_bare_integer() {
        let json = serde_json::to_string(&ResumePosition::Offset(1500)).unwrap();
        assert_eq!(json, "1500");
        let back: ResumePosition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ResumePosition::Offset(1500));
    }

    #[test]
    fn keyset_is_a_sort_unique_object() {
        let pos = ResumePosition::Keyset {
            sort: Value::from("2024-01-02T00:00:00"),
            unique: Value::Int(42),
        };
        let json = serde_json::to_value(&pos).unwrap();
        assert_eq!(json, serde_json::json!({"sort": "2024-01-02T00:00:00", "unique": 42}));
        let back: ResumePosition = serde_json::from_value(json).unwrap();
        assert_eq!(back, pos);
    }

    #[test]
    fn negative_offsets_are_rejected() {
        assert!(serde_json::from_str::<ResumePosition>("-3").is_err());
        assert!(serde_json::from_str::<ResumePosition>("\"abc\"").is_err());
    }

    #[test]
    fn zero_is_fresh() {
        assert!(ResumePosition::default().is_fresh());
        assert!(!ResumePosition::Offset(2).is_fresh());
    }
}
