//! The transactional store.
//!
//! [`Store`] is the seam between the engine and storage: a batch of
//! [`Command`]s is applied all-or-nothing. [`TableStore`] is the embedded
//! implementation, holding tables in memory behind a `parking_lot` lock and,
//! when opened on a directory, journaling every committed batch to a WAL.
//!
//! # Files
//!
//! A durable store directory contains:
//! - `snapshot.json`: every table as of the last checkpoint
//! - `wal.log`: batches committed since that checkpoint

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};

use crate::config::StoreConfig;
use crate::error::{StorageError, StorageResult};
use crate::ident::Ident;
use crate::storage::command::{Command, Condition, Outcome};
use crate::storage::table::{RowId, Table};
use crate::storage::wal::{Wal, WalEntry, WalEntryKind};
use crate::value::Value;

const SNAPSHOT_FILE: &str = "snapshot.json";
const WAL_FILE: &str = "wal.log";

/// A transactional store driven by [`Command`]s.
pub trait Store: Send + Sync {
    /// Applies `commands` in order as one transaction.
    ///
    /// Either every command takes effect and one outcome per command is
    /// returned, or none does and the first failure is returned.
    fn transact(&self, commands: &[Command]) -> StorageResult<Vec<Outcome>>;

    /// Reports whether the store can serve requests.
    fn health(&self) -> StorageResult<()>;

    /// Persists everything committed so far. No-op for volatile stores.
    fn checkpoint(&self) -> StorageResult<()> {
        Ok(())
    }

    /// Closes the store. Later calls fail with [`StorageError::Closed`].
    fn close(&self) -> StorageResult<()>;
}

struct Journal {
    dir: PathBuf,
    wal: Wal,
    next_seq: u64,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    last_seq: u64,
    tables: Vec<&'a Table>,
}

#[derive(Deserialize)]
struct Snapshot {
    last_seq: u64,
    tables: Vec<Table>,
}

/// How to reverse one applied command.
enum Undo {
    Created(Ident),
    Dropped(Table),
    Inserted { table: Ident, row_id: RowId },
    Deleted { table: Ident, rows: Vec<(RowId, Vec<Value>)> },
}

/// Embedded in-memory store with optional WAL durability.
///
/// # Example
///
/// ```
/// use vectorbase_core::storage::{Command, Store, TableStore};
/// use vectorbase_core::StoreConfig;
///
/// let store = TableStore::in_memory(StoreConfig::default());
/// let outcomes = store.transact(&[Command::ListTables]).unwrap();
/// assert_eq!(outcomes.len(), 1);
/// ```
pub struct TableStore {
    tables: RwLock<BTreeMap<Ident, Table>>,
    journal: Option<Mutex<Journal>>,
    config: StoreConfig,
    closed: AtomicBool,
}

impl TableStore {
    /// Creates a store that lives only in memory.
    pub fn in_memory(config: StoreConfig) -> Self {
        Self {
            tables: RwLock::new(BTreeMap::new()),
            journal: None,
            config,
            closed: AtomicBool::new(false),
        }
    }

    /// Opens or creates a durable store in `dir`.
    ///
    /// Loads the last snapshot and replays the WAL on top of it. If the WAL
    /// held anything, a checkpoint follows so the log starts clean.
    pub fn open<P: AsRef<Path>>(dir: P, config: StoreConfig) -> StorageResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| StorageError::Io(format!("create {} failed: {}", dir.display(), e)))?;

        let (mut tables, last_seq) = load_snapshot(&dir.join(SNAPSHOT_FILE))?;

        let wal_path = dir.join(WAL_FILE);
        let entries = Wal::read_all(&wal_path)?;
        let wal_dirty = !entries.is_empty()
            || fs::metadata(&wal_path).map(|m| m.len() > 0).unwrap_or(false);

        let mut next_seq = last_seq + 1;
        let mut replayed = 0usize;
        for entry in entries {
            if entry.kind != WalEntryKind::Commit || entry.seq <= last_seq {
                continue;
            }
            let mut undo = Vec::new();
            for (index, command) in entry.commands.iter().enumerate() {
                apply(&mut tables, index, command, &mut undo).map_err(|e| {
                    StorageError::WalCorrupted(format!("replay of batch {} failed: {}", entry.seq, e))
                })?;
            }
            next_seq = entry.seq + 1;
            replayed += 1;
        }

        tracing::info!(
            path = %dir.display(),
            tables = tables.len(),
            replayed,
            "opened store"
        );

        let wal = Wal::open(&wal_path, config.sync_mode)?;
        let store = Self {
            tables: RwLock::new(tables),
            journal: Some(Mutex::new(Journal { dir, wal, next_seq })),
            config,
            closed: AtomicBool::new(false),
        };

        if wal_dirty {
            store.write_checkpoint()?;
        }

        Ok(store)
    }

    /// Returns true if the store writes a WAL.
    pub fn is_durable(&self) -> bool {
        self.journal.is_some()
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }

    fn read_tables(&self) -> StorageResult<RwLockReadGuard<'_, BTreeMap<Ident, Table>>> {
        self.tables
            .try_read_for(self.config.lock_timeout)
            .ok_or(StorageError::LockTimeout)
    }

    fn write_tables(&self) -> StorageResult<RwLockWriteGuard<'_, BTreeMap<Ident, Table>>> {
        self.tables
            .try_write_for(self.config.lock_timeout)
            .ok_or(StorageError::LockTimeout)
    }

    fn write_checkpoint(&self) -> StorageResult<()> {
        let Some(journal) = &self.journal else {
            return Ok(());
        };

        // Holding the read lock keeps writers out between snapshot and truncate.
        let tables = self.read_tables()?;
        let mut journal = journal.lock();
        let last_seq = journal.next_seq - 1;

        write_snapshot(&journal.dir, last_seq, &tables)?;
        journal.wal.checkpoint()?;

        tracing::info!(
            path = %journal.dir.display(),
            tables = tables.len(),
            last_seq,
            "checkpoint written"
        );
        Ok(())
    }

    fn transact_read(&self, commands: &[Command]) -> StorageResult<Vec<Outcome>> {
        let tables = self.read_tables()?;
        commands
            .iter()
            .enumerate()
            .map(|(index, command)| read(&tables, index, command))
            .collect()
    }

    fn transact_write(&self, commands: &[Command]) -> StorageResult<Vec<Outcome>> {
        let mut tables = self.write_tables()?;
        let mut undo = Vec::new();
        let mut outcomes = Vec::with_capacity(commands.len());

        for (index, command) in commands.iter().enumerate() {
            match apply(&mut tables, index, command, &mut undo) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    rollback(&mut tables, undo);
                    return Err(e);
                }
            }
        }

        if let Some(journal) = &self.journal {
            let mut journal = journal.lock();
            let mutating: Vec<Command> = commands
                .iter()
                .filter(|c| !c.is_read_only())
                .cloned()
                .collect();
            let entry = WalEntry::commit(journal.next_seq, mutating);
            if let Err(e) = journal.wal.append(&entry) {
                tracing::warn!(error = %e, "WAL append failed, rolling back");
                rollback(&mut tables, undo);
                return Err(e);
            }
            journal.next_seq += 1;
        }

        Ok(outcomes)
    }
}

impl Store for TableStore {
    fn transact(&self, commands: &[Command]) -> StorageResult<Vec<Outcome>> {
        self.ensure_open()?;
        for command in commands {
            tracing::debug!(sql = %command, "executing");
        }

        if commands.iter().all(Command::is_read_only) {
            self.transact_read(commands)
        } else {
            self.transact_write(commands)
        }
    }

    fn health(&self) -> StorageResult<()> {
        self.ensure_open()?;
        if let Some(journal) = &self.journal {
            let journal = journal.lock();
            if !journal.dir.is_dir() {
                return Err(StorageError::Io(format!(
                    "store directory {} is gone",
                    journal.dir.display()
                )));
            }
        }
        Ok(())
    }

    fn checkpoint(&self) -> StorageResult<()> {
        self.ensure_open()?;
        self.write_checkpoint()
    }

    fn close(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(());
        }
        self.write_checkpoint()?;
        if let Some(journal) = &self.journal {
            journal.lock().wal.sync()?;
        }
        self.closed.store(true, Ordering::Release);
        tracing::info!("store closed");
        Ok(())
    }
}

fn rollback(tables: &mut BTreeMap<Ident, Table>, undo: Vec<Undo>) {
    for step in undo.into_iter().rev() {
        match step {
            Undo::Created(name) => {
                tables.remove(&name);
            }
            Undo::Dropped(table) => {
                tables.insert(table.def().name.clone(), table);
            }
            Undo::Inserted { table, row_id } => {
                if let Some(t) = tables.get_mut(&table) {
                    t.remove_row(row_id);
                }
            }
            Undo::Deleted { table, rows } => {
                if let Some(t) = tables.get_mut(&table) {
                    for (row_id, row) in rows {
                        t.restore_row(row_id, row);
                    }
                }
            }
        }
    }
}

fn apply(
    tables: &mut BTreeMap<Ident, Table>,
    index: usize,
    command: &Command,
    undo: &mut Vec<Undo>,
) -> StorageResult<Outcome> {
    match command {
        Command::CreateTable { def, if_not_exists } => {
            if let Some(existing) = tables.get(&def.name) {
                return if *if_not_exists {
                    Ok(Outcome::Existing(existing.def().clone()))
                } else {
                    Err(StorageError::TableExists(def.name.to_string()))
                };
            }

            let mut names: Vec<&str> = def.columns.iter().map(|c| c.name.as_str()).collect();
            names.sort_unstable();
            if names.windows(2).any(|w| w[0] == w[1]) {
                return Err(StorageError::MalformedCommand(format!(
                    "duplicate column in `{}`",
                    def.name
                )));
            }
            if def.columns.iter().filter(|c| c.primary_key).count() > 1 {
                return Err(StorageError::MalformedCommand(format!(
                    "more than one primary key in `{}`",
                    def.name
                )));
            }

            tables.insert(def.name.clone(), Table::new(def.clone()));
            undo.push(Undo::Created(def.name.clone()));
            Ok(Outcome::Created)
        }
        Command::DropTable { name, if_exists } => match tables.remove(name) {
            Some(table) => {
                undo.push(Undo::Dropped(table));
                Ok(Outcome::Dropped(true))
            }
            None if *if_exists => Ok(Outcome::Dropped(false)),
            None => Err(StorageError::NoSuchTable(name.to_string())),
        },
        Command::Insert {
            table,
            columns,
            values,
        } => {
            if columns.len() != values.len() {
                return Err(StorageError::MalformedCommand(format!(
                    "{} columns but {} values",
                    columns.len(),
                    values.len()
                )));
            }
            let t = tables
                .get_mut(table)
                .ok_or_else(|| StorageError::NoSuchTable(table.to_string()))?;
            let cells = columns
                .iter()
                .zip(values)
                .map(|(column, value)| Ok((position(t, column)?, value.clone())))
                .collect::<StorageResult<Vec<_>>>()?;
            let row_id = t
                .insert(cells)
                .map_err(|cause| StorageError::Rejected { index, cause })?;
            undo.push(Undo::Inserted {
                table: table.clone(),
                row_id,
            });
            Ok(Outcome::Inserted(row_id))
        }
        Command::Delete { table, conditions } => {
            let t = tables
                .get_mut(table)
                .ok_or_else(|| StorageError::NoSuchTable(table.to_string()))?;
            let resolved = resolve_conditions(t, index, conditions)?;
            let rows = t.delete_where(&resolved);
            let deleted = rows.len() as u64;
            if !rows.is_empty() {
                undo.push(Undo::Deleted {
                    table: table.clone(),
                    rows,
                });
            }
            Ok(Outcome::Deleted(deleted))
        }
        read_only => read(tables, index, read_only),
    }
}

fn read(tables: &BTreeMap<Ident, Table>, index: usize, command: &Command) -> StorageResult<Outcome> {
    match command {
        Command::Describe { table } => Ok(Outcome::Table(tables.get(table).map(|t| t.def().clone()))),
        Command::ListTables => Ok(Outcome::Tables(tables.keys().cloned().collect())),
        Command::Count { table } => {
            let t = tables
                .get(table)
                .ok_or_else(|| StorageError::NoSuchTable(table.to_string()))?;
            Ok(Outcome::Count(t.len() as u64))
        }
        Command::Select {
            table,
            conditions,
            nearest,
            limit,
        } => {
            let t = tables
                .get(table)
                .ok_or_else(|| StorageError::NoSuchTable(table.to_string()))?;
            let resolved = resolve_conditions(t, index, conditions)?;

            let nearest = match nearest {
                Some(n) => {
                    let column = position(t, &n.column)?;
                    let dimension = t.def().columns[column]
                        .ty
                        .dimension()
                        .ok_or_else(|| StorageError::NotAVectorColumn(n.column.to_string()))?;
                    Value::vector(n.column.as_str(), n.query.clone(), dimension)
                        .and_then(|v| v.check_fits(n.column.as_str(), &t.def().columns[column].ty))
                        .map_err(|cause| StorageError::Rejected { index, cause })?;
                    Some((column, n.metric, n.query.as_slice()))
                }
                None => None,
            };

            Ok(Outcome::Rows(t.select(&resolved, nearest, *limit)))
        }
        other => Err(StorageError::MalformedCommand(format!(
            "`{other}` is not a read-only command"
        ))),
    }
}

fn position(table: &Table, column: &Ident) -> StorageResult<usize> {
    table
        .def()
        .column(column.as_str())
        .map(|(position, _)| position)
        .ok_or_else(|| StorageError::NoSuchColumn {
            table: table.def().name.to_string(),
            column: column.to_string(),
        })
}

fn resolve_conditions(
    table: &Table,
    index: usize,
    conditions: &[Condition],
) -> StorageResult<Vec<(usize, Value)>> {
    conditions
        .iter()
        .map(|condition| {
            let column = position(table, &condition.column)?;
            condition
                .value
                .check_fits(condition.column.as_str(), &table.def().columns[column].ty)
                .map_err(|cause| StorageError::Rejected { index, cause })?;
            Ok((column, condition.value.clone()))
        })
        .collect()
}

fn load_snapshot(path: &Path) -> StorageResult<(BTreeMap<Ident, Table>, u64)> {
    if !path.exists() {
        return Ok((BTreeMap::new(), 0));
    }

    let content = fs::read(path)
        .map_err(|e| StorageError::Snapshot(format!("read {} failed: {}", path.display(), e)))?;
    let snapshot: Snapshot = serde_json::from_slice(&content)
        .map_err(|e| StorageError::Snapshot(format!("parse {} failed: {}", path.display(), e)))?;

    let tables = snapshot
        .tables
        .into_iter()
        .map(|mut table| {
            table.rebuild_keys();
            (table.def().name.clone(), table)
        })
        .collect();
    Ok((tables, snapshot.last_seq))
}

fn write_snapshot(dir: &Path, last_seq: u64, tables: &BTreeMap<Ident, Table>) -> StorageResult<()> {
    let snapshot = SnapshotRef {
        last_seq,
        tables: tables.values().collect(),
    };
    let data = serde_json::to_vec(&snapshot)
        .map_err(|e| StorageError::Snapshot(format!("serialize failed: {}", e)))?;

    let tmp_path = dir.join(format!("{SNAPSHOT_FILE}.tmp"));
    let mut file = fs::File::create(&tmp_path)
        .map_err(|e| StorageError::Snapshot(format!("create snapshot failed: {}", e)))?;
    file.write_all(&data)
        .and_then(|_| file.sync_all())
        .map_err(|e| StorageError::Snapshot(format!("write snapshot failed: {}", e)))?;
    fs::rename(&tmp_path, dir.join(SNAPSHOT_FILE))
        .map_err(|e| StorageError::Snapshot(format!("rename snapshot failed: {}", e)))?;
    Ok(())
}
