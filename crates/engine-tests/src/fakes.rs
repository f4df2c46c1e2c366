//! In-memory stand-ins for the source database, the target database and the
//! checkpoint file.

use async_trait::async_trait;
use connectors::sql::base::{
    adapter::{DatabaseKind, SourceStore, TargetStore},
    error::DbError,
    utils::temporal_from_text,
};
use engine_core::{
    error::{CheckpointError, EngineError},
    state::{CheckpointStore, MemoryCheckpointStore},
};
use engine_runtime::factory::StoreFactory;
use model::{
    core::{
        column::ColumnDescriptor,
        entity::TableName,
        identifiers::JobKey,
        value::Value,
    },
    pagination::position::ResumePosition,
    records::row::RowData,
};
use planner::query::pagination::{FetchQuery, FetchWindow};
use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering as AtomicOrdering},
    },
    time::Duration,
};

/// A source table held in memory, already sorted by its keyset columns.
pub struct MemorySource {
    kind: DatabaseKind,
    columns: Vec<ColumnDescriptor>,
    rows: Vec<RowData>,
    key_columns: Option<(String, String)>,
    windows: Mutex<Vec<FetchWindow>>,
    failing_fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new(columns: Vec<ColumnDescriptor>, rows: Vec<RowData>) -> Self {
        Self {
            kind: DatabaseKind::Mssql,
            columns,
            rows,
            key_columns: None,
            windows: Mutex::new(Vec::new()),
            failing_fetches: AtomicUsize::new(0),
        }
    }

    /// Columns keyset windows compare on.
    pub fn with_keyset(mut self, sort: &str, unique: &str) -> Self {
        self.key_columns = Some((sort.to_string(), unique.to_string()));
        self
    }

    /// Makes the next `n` fetches fail with a connection reset.
    pub fn fail_next_fetches(&self, n: usize) {
        self.failing_fetches.store(n, AtomicOrdering::SeqCst);
    }

    /// Every window requested so far, in order.
    pub fn windows(&self) -> Vec<FetchWindow> {
        self.windows.lock().unwrap().clone()
    }

    fn key(&self, row: &RowData) -> (Value, Value) {
        let (sort, unique) = self
            .key_columns
            .as_ref()
            .expect("keyset window on a source without key columns");
        (row.get_value(sort), row.get_value(unique))
    }

    fn after(&self, row: &RowData, last: &(Value, Value)) -> bool {
        let (sort, unique) = self.key(row);
        match sort.compare(&bound_as(&last.0, &sort)) {
            Some(Ordering::Greater) => true,
            Some(Ordering::Equal) => {
                unique.compare(&bound_as(&last.1, &unique)) == Some(Ordering::Greater)
            }
            _ => false,
        }
    }
}

/// Keys read back from a checkpoint file are text; a database converts them
/// to the column's type before comparing, and so does this fake.
fn bound_as(bound: &Value, column: &Value) -> Value {
    match (bound, column) {
        (Value::String(_), Value::String(_)) => bound.clone(),
        (Value::String(text), _) => temporal_from_text(text).unwrap_or_else(|| bound.clone()),
        _ => bound.clone(),
    }
}

#[async_trait]
impl SourceStore for MemorySource {
    fn kind(&self) -> DatabaseKind {
        self.kind
    }

    async fn table_columns(&self, _table: &TableName) -> Result<Vec<ColumnDescriptor>, DbError> {
        Ok(self.columns.clone())
    }

    async fn query_columns(&self, _sql: &str) -> Result<Vec<ColumnDescriptor>, DbError> {
        Ok(self.columns.clone())
    }

    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<RowData>, DbError> {
        self.windows.lock().unwrap().push(query.window.clone());

        let pending = self.failing_fetches.load(AtomicOrdering::SeqCst);
        if pending > 0 {
            self.failing_fetches.store(pending - 1, AtomicOrdering::SeqCst);
            return Err(DbError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "source connection reset",
            )));
        }

        let rows = match &query.window {
            FetchWindow::All => self.rows.clone(),
            FetchWindow::Offset { offset, limit } => self
                .rows
                .iter()
                .skip(*offset as usize)
                .take(*limit)
                .cloned()
                .collect(),
            FetchWindow::Keyset { after, limit } => self
                .rows
                .iter()
                .filter(|row| after.as_ref().is_none_or(|last| self.after(row, last)))
                .take(*limit)
                .cloned()
                .collect(),
        };
        Ok(rows)
    }
}

/// How the target reacts to inserts.
#[derive(Debug, Clone, Copy, Default)]
pub enum InsertFaults {
    #[default]
    None,
    /// Insert calls from the given one (1-based) onwards fail.
    FailFrom(usize),
    /// The given number of upcoming insert calls fail, then inserts succeed.
    Flaky(usize),
}

#[derive(Default)]
pub struct MemoryTarget {
    tables: Mutex<HashMap<String, Vec<RowData>>>,
    ddl: Mutex<Vec<String>>,
    scripts: Mutex<Vec<String>>,
    insert_calls: AtomicUsize,
    faults: Mutex<InsertFaults>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_faults(&self, faults: InsertFaults) {
        *self.faults.lock().unwrap() = faults;
    }

    pub fn rows(&self, table: &str) -> Vec<RowData> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn ddl(&self) -> Vec<String> {
        self.ddl.lock().unwrap().clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(AtomicOrdering::SeqCst)
    }

    fn should_fail(&self, call: usize) -> bool {
        let mut faults = self.faults.lock().unwrap();
        match *faults {
            InsertFaults::None => false,
            InsertFaults::FailFrom(n) => call >= n,
            InsertFaults::Flaky(0) => false,
            InsertFaults::Flaky(n) => {
                *faults = InsertFaults::Flaky(n - 1);
                true
            }
        }
    }
}

#[async_trait]
impl TargetStore for MemoryTarget {
    async fn execute_script(&self, sql: &str) -> Result<(), DbError> {
        self.scripts.lock().unwrap().push(sql.trim().to_string());
        Ok(())
    }

    async fn replace_table(&self, drop_sql: &str, create_sql: &str) -> Result<(), DbError> {
        let table = create_sql
            .strip_prefix("CREATE TABLE ")
            .and_then(|rest| rest.split_once(' '))
            .map(|(name, _)| name.replace('"', ""))
            .ok_or_else(|| DbError::Unknown(format!("unexpected DDL: {create_sql}")))?;

        let mut ddl = self.ddl.lock().unwrap();
        ddl.push(drop_sql.to_string());
        ddl.push(create_sql.to_string());
        self.tables.lock().unwrap().insert(table, Vec::new());
        Ok(())
    }

    async fn copy_rows(
        &self,
        table: &TableName,
        _columns: &[String],
        rows: &[RowData],
    ) -> Result<u64, DbError> {
        let call = self.insert_calls.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        if self.should_fail(call) {
            return Err(DbError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("target write {call} failed"),
            )));
        }

        let mut tables = self.tables.lock().unwrap();
        let stored = tables
            .get_mut(&table.to_string())
            .ok_or_else(|| DbError::Unknown(format!("relation {table} does not exist")))?;
        stored.extend_from_slice(rows);
        Ok(rows.len() as u64)
    }
}

/// Hands every job the same source and target.
pub struct MemoryFactory {
    pub source: Arc<MemorySource>,
    pub target: Arc<MemoryTarget>,
    connects: AtomicUsize,
    connect_delay: Duration,
}

impl MemoryFactory {
    pub fn new(source: Arc<MemorySource>, target: Arc<MemoryTarget>) -> Self {
        Self {
            source,
            target,
            connects: AtomicUsize::new(0),
            connect_delay: Duration::ZERO,
        }
    }

    /// Every connection takes this long to open.
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    async fn open(&self) {
        self.connects.fetch_add(1, AtomicOrdering::SeqCst);
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait]
impl StoreFactory for MemoryFactory {
    async fn source(
        &self,
        _locator: &str,
        _kind: DatabaseKind,
    ) -> Result<Arc<dyn SourceStore>, EngineError> {
        self.open().await;
        Ok(self.source.clone())
    }

    async fn target(&self, _locator: &str) -> Result<Arc<dyn TargetStore>, EngineError> {
        self.open().await;
        Ok(self.target.clone())
    }
}

/// Checkpoint store that remembers every write.
#[derive(Default)]
pub struct RecordingCheckpoints {
    inner: MemoryCheckpointStore,
    history: Mutex<Vec<(String, ResumePosition)>>,
}

impl RecordingCheckpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<ResumePosition> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn clear_history(&self) {
        self.history.lock().unwrap().clear();
    }
}

#[async_trait]
impl CheckpointStore for RecordingCheckpoints {
    async fn get(&self, key: &JobKey) -> ResumePosition {
        self.inner.get(key).await
    }

    async fn set(&self, key: &JobKey, position: &ResumePosition) -> Result<(), CheckpointError> {
        self.history
            .lock()
            .unwrap()
            .push((key.as_str().to_string(), position.clone()));
        self.inner.set(key, position).await
    }

    async fn entries(&self) -> Result<BTreeMap<String, ResumePosition>, CheckpointError> {
        self.inner.entries().await
    }
}
