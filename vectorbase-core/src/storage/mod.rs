//! The embedded storage layer.
//!
//! - [`Command`] / [`Outcome`]: the SQL-equivalent command interface
//! - [`Store`]: transactional execution of command batches
//! - [`TableStore`]: in-memory typed tables with optional WAL durability

pub mod command;
pub mod store;
pub mod table;
pub mod wal;

pub use command::{Command, Condition, Nearest, Outcome};
pub use store::{Store, TableStore};
pub use table::{ColumnDef, RowId, SelectedRow, TableDef};
pub use wal::{SyncMode, Wal, WalEntry, WalEntryKind};
