use crate::{
    error::PlanError,
    query::{dialect::Dialect, renderer::Renderer},
};
use model::{core::value::Value, pagination::position::ResumePosition, records::row::RowData};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    fn after_op(self) -> &'static str {
        match self {
            SortOrder::Asc => ">",
            SortOrder::Desc => "<",
        }
    }
}

impl FromStr for SortOrder {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(PlanError::SortOrder(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationMode {
    Offset,
    Keyset,
    SingleShot,
}

impl PaginationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PaginationMode::Offset => "offset",
            PaginationMode::Keyset => "keyset",
            PaginationMode::SingleShot => "single_shot",
        }
    }
}

impl fmt::Display for PaginationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaginationMode {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "offset" => Ok(PaginationMode::Offset),
            "keyset" => Ok(PaginationMode::Keyset),
            "single_shot" | "single-shot" => Ok(PaginationMode::SingleShot),
            other => Err(PlanError::PaginationMode(other.to_string())),
        }
    }
}

/// The row window a fetch asks for, independent of its SQL rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchWindow {
    Offset {
        offset: u64,
        limit: usize,
    },
    /// `after` is `None` on the first page.
    Keyset {
        after: Option<(Value, Value)>,
        limit: usize,
    },
    All,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchQuery {
    pub sql: String,
    pub params: Vec<Value>,
    pub window: FetchWindow,
}

pub trait PaginationStrategy: Send + Sync {
    fn mode(&self) -> PaginationMode;

    /// Whether a position returned by `next_position` is worth persisting.
    fn is_resumable(&self) -> bool {
        true
    }

    /// Rejects a stored position this strategy cannot continue from.
    fn check_position(&self, position: &ResumePosition) -> Result<(), PlanError>;

    /// Builds the next page over `base`, a complete unordered `SELECT`.
    fn fetch_query(
        &self,
        dialect: &dyn Dialect,
        base: &str,
        position: &ResumePosition,
        limit: usize,
    ) -> Result<FetchQuery, PlanError>;

    /// Position after `fetched` has been durably written.
    fn next_position(
        &self,
        position: &ResumePosition,
        fetched: &[RowData],
    ) -> Result<ResumePosition, PlanError>;

    /// Clones the boxed trait object.
    fn clone_box(&self) -> Box<dyn PaginationStrategy>;
}

impl Clone for Box<dyn PaginationStrategy> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Skip-count paging ordered by every configured sort column.
#[derive(Debug, Clone)]
pub struct OffsetPagination {
    pub sort_columns: Vec<String>,
    pub order: SortOrder,
}

/// `(sort, unique) > (last_sort, last_unique)` paging.
#[derive(Debug, Clone)]
pub struct KeysetPagination {
    pub sort_column: String,
    pub unique_column: String,
    pub order: SortOrder,
}

/// One unordered read of the whole relation.
#[derive(Debug, Clone, Default)]
pub struct SingleShot;

fn order_by(dialect: &dyn Dialect, columns: &[&str], order: SortOrder) -> String {
    columns
        .iter()
        .map(|c| format!("{} {}", dialect.quote_identifier(c), order.keyword()))
        .collect::<Vec<_>>()
        .join(", ")
}

impl PaginationStrategy for OffsetPagination {
    fn mode(&self) -> PaginationMode {
        PaginationMode::Offset
    }

    fn check_position(&self, position: &ResumePosition) -> Result<(), PlanError> {
        match position {
            ResumePosition::Offset(_) => Ok(()),
            other => Err(PlanError::PositionMismatch {
                mode: "offset",
                found: other.kind(),
            }),
        }
    }

    fn fetch_query(
        &self,
        dialect: &dyn Dialect,
        base: &str,
        position: &ResumePosition,
        limit: usize,
    ) -> Result<FetchQuery, PlanError> {
        self.check_position(position)?;
        let offset = position.offset().unwrap_or(0);

        let columns: Vec<&str> = self.sort_columns.iter().map(String::as_str).collect();
        let mut r = Renderer::new(dialect);
        r.push(&format!(
            "SELECT * FROM ({base}) AS src ORDER BY {} ",
            order_by(dialect, &columns, self.order)
        ));
        let offset_ph = r.param(Value::Int(offset as i64));
        let limit_ph = r.param(Value::Int(limit as i64));
        r.push(&dialect.page_clause(&offset_ph, &limit_ph));

        let (sql, params) = r.finish();
        Ok(FetchQuery {
            sql,
            params,
            window: FetchWindow::Offset { offset, limit },
        })
    }

    fn next_position(
        &self,
        position: &ResumePosition,
        fetched: &[RowData],
    ) -> Result<ResumePosition, PlanError> {
        self.check_position(position)?;
        let offset = position.offset().unwrap_or(0);
        Ok(ResumePosition::Offset(offset + fetched.len() as u64))
    }

    fn clone_box(&self) -> Box<dyn PaginationStrategy> {
        Box::new(self.clone())
    }
}

impl KeysetPagination {
    fn key_value(&self, row: &RowData, column: &str) -> Result<Value, PlanError> {
        match row.get(column) {
            None => Err(PlanError::MissingKeysetColumn(column.to_string())),
            Some(field) if field.value.is_null() => {
                Err(PlanError::NullKeysetValue(column.to_string()))
            }
            Some(field) => match &field.value {
                Value::Float(f) if !f.is_finite() => {
                    Err(PlanError::NonFiniteKeysetValue(column.to_string(), *f))
                }
                value => Ok(value.clone()),
            },
        }
    }
}

impl PaginationStrategy for KeysetPagination {
    fn mode(&self) -> PaginationMode {
        PaginationMode::Keyset
    }

    fn check_position(&self, position: &ResumePosition) -> Result<(), PlanError> {
        match position {
            ResumePosition::Keyset { .. } => Ok(()),
            p if p.is_fresh() => Ok(()),
            other => Err(PlanError::PositionMismatch {
                mode: "keyset",
                found: other.kind(),
            }),
        }
    }

    fn fetch_query(
        &self,
        dialect: &dyn Dialect,
        base: &str,
        position: &ResumePosition,
        limit: usize,
    ) -> Result<FetchQuery, PlanError> {
        self.check_position(position)?;

        let mut r = Renderer::new(dialect);
        r.push(&format!("SELECT * FROM ({base}) AS src"));

        let after = match position {
            ResumePosition::Keyset { sort, unique } => {
                let op = self.order.after_op();
                let s = dialect.quote_identifier(&self.sort_column);
                let u = dialect.quote_identifier(&self.unique_column);

                r.push(&format!(" WHERE (({s} {op} "));
                r.add_param(sort.clone());
                r.push(&format!(") OR ({s} = "));
                r.add_param(sort.clone());
                r.push(&format!(" AND {u} {op} "));
                r.add_param(unique.clone());
                r.push("))");

                Some((sort.clone(), unique.clone()))
            }
            _ => None,
        };

        let columns = [self.sort_column.as_str(), self.unique_column.as_str()];
        r.push(&format!(" ORDER BY {} ", order_by(dialect, &columns, self.order)));
        let limit_ph = r.param(Value::Int(limit as i64));
        r.push(&dialect.limit_clause(&limit_ph));

        let (sql, params) = r.finish();
        Ok(FetchQuery {
            sql,
            params,
            window: FetchWindow::Keyset { after, limit },
        })
    }

    fn next_position(
        &self,
        position: &ResumePosition,
        fetched: &[RowData],
    ) -> Result<ResumePosition, PlanError> {
        let Some(last) = fetched.last() else {
            return Ok(position.clone());
        };
        Ok(ResumePosition::Keyset {
            sort: self.key_value(last, &self.sort_column)?,
            unique: self.key_value(last, &self.unique_column)?,
        })
    }

    fn clone_box(&self) -> Box<dyn PaginationStrategy> {
        Box::new(self.clone())
    }
}

impl PaginationStrategy for SingleShot {
    fn mode(&self) -> PaginationMode {
        PaginationMode::SingleShot
    }

    fn is_resumable(&self) -> bool {
        false
    }

    fn check_position(&self, _position: &ResumePosition) -> Result<(), PlanError> {
        Ok(())
    }

    fn fetch_query(
        &self,
        _dialect: &dyn Dialect,
        base: &str,
        _position: &ResumePosition,
        _limit: usize,
    ) -> Result<FetchQuery, PlanError> {
        Ok(FetchQuery {
            sql: base.to_string(),
            params: Vec::new(),
            window: FetchWindow::All,
        })
    }

    fn next_position(
        &self,
        _position: &ResumePosition,
        _fetched: &[RowData],
    ) -> Result<ResumePosition, PlanError> {
        Ok(ResumePosition::FRESH)
    }

    fn clone_box(&self) -> Box<dyn PaginationStrategy> {
        Box::new(SingleShot)
    }
}

/// Picks the strategy for a job.
///
/// Two or more sort columns select keyset on the first two, one selects
/// offset, none selects single-shot. An explicit `mode` wins when the
/// columns can support it.
pub fn select_strategy(
    sort_columns: &[String],
    order: SortOrder,
    mode: Option<PaginationMode>,
) -> Result<Box<dyn PaginationStrategy>, PlanError> {
    let mode = mode.unwrap_or(match sort_columns.len() {
        0 => PaginationMode::SingleShot,
        1 => PaginationMode::Offset,
        _ => PaginationMode::Keyset,
    });

    match mode {
        PaginationMode::Offset => {
            if sort_columns.is_empty() {
                return Err(PlanError::SortColumns {
                    mode: "offset",
                    needed: "at least 1",
                    given: 0,
                });
            }
            Ok(Box::new(OffsetPagination {
                sort_columns: sort_columns.to_vec(),
                order,
            }))
        }
        PaginationMode::Keyset => {
            let [sort, unique, rest @ ..] = sort_columns else {
                return Err(PlanError::SortColumns {
                    mode: "keyset",
                    needed: "at least 2",
                    given: sort_columns.len(),
                });
            };
            if !rest.is_empty() {
                warn!(
                    sort = %sort,
                    unique = %unique,
                    ignored = ?rest,
                    "Keyset pagination uses the first two sort columns only"
                );
            }
            Ok(Box::new(KeysetPagination {
                sort_column: sort.clone(),
                unique_column: unique.clone(),
                order,
            }))
        }
        PaginationMode::SingleShot => Ok(Box::new(SingleShot)),
    }
}
