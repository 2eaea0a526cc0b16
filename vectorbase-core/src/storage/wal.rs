//! Write-Ahead Log (WAL) for committed transactions.
//!
//! Every committed transaction that changes state is appended as a single
//! entry, so a transaction is either fully present in the log or absent. On
//! open, the store replays the log on top of the last snapshot.
//!
//! # Format
//!
//! Each WAL entry has the format:
//! ```text
//! [checksum:u32][length:u32][data:json]
//! ```
//!
//! A final entry cut short by a crash is ignored; a checksum mismatch on a
//! complete entry is reported as corruption.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};
use crate::storage::command::Command;

/// Sync mode for WAL writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Sync after every write (safest, slowest).
    Immediate,
    /// Sync after a batch of writes.
    #[default]
    Batched,
    /// Don't sync (fastest, risk of data loss on crash).
    NoSync,
}

/// The kind of WAL entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalEntryKind {
    /// A committed transaction.
    Commit,
    /// Checkpoint marker (everything before it is in the snapshot).
    Checkpoint,
}

/// A single WAL entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    pub kind: WalEntryKind,
    /// Commit sequence number. Snapshots record the last one they cover.
    #[serde(default)]
    pub seq: u64,
    /// The mutating commands of the transaction, in order.
    pub commands: Vec<Command>,
}

impl WalEntry {
    /// Creates a commit entry.
    pub fn commit(seq: u64, commands: Vec<Command>) -> Self {
        Self {
            kind: WalEntryKind::Commit,
            seq,
            commands,
        }
    }

    /// Creates a checkpoint entry.
    pub fn checkpoint() -> Self {
        Self {
            kind: WalEntryKind::Checkpoint,
            seq: 0,
            commands: Vec::new(),
        }
    }

    fn to_bytes(&self) -> StorageResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| StorageError::WalCorrupted(format!("serialization failed: {}", e)))
    }

    fn from_bytes(bytes: &[u8]) -> StorageResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| StorageError::WalCorrupted(format!("deserialization failed: {}", e)))
    }
}

/// Write-Ahead Log for durable transactions.
pub struct Wal {
    path: PathBuf,
    writer: BufWriter<File>,
    sync_mode: SyncMode,
    entries_since_sync: usize,
    batch_size: usize,
}

impl Wal {
    /// Opens or creates a WAL file.
    pub fn open<P: AsRef<Path>>(path: P, sync_mode: SyncMode) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| StorageError::Io(format!("failed to open WAL: {}", e)))?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            sync_mode,
            entries_since_sync: 0,
            batch_size: 100,
        })
    }

    /// Appends an entry to the WAL.
    pub fn append(&mut self, entry: &WalEntry) -> StorageResult<()> {
        let data = entry.to_bytes()?;
        let checksum = crc32fast::hash(&data);
        let length = u32::try_from(data.len())
            .map_err(|_| StorageError::Io("WAL entry larger than 4 GiB".into()))?;

        let mut frame = Vec::with_capacity(8 + data.len());
        frame.extend_from_slice(&checksum.to_le_bytes());
        frame.extend_from_slice(&length.to_le_bytes());
        frame.extend_from_slice(&data);

        self.writer
            .write_all(&frame)
            .map_err(|e| StorageError::Io(format!("write WAL entry failed: {}", e)))?;

        self.entries_since_sync += 1;

        match self.sync_mode {
            SyncMode::Immediate => self.sync()?,
            SyncMode::Batched if self.entries_since_sync >= self.batch_size => self.sync()?,
            // Hand the bytes to the OS so a process crash does not lose them.
            _ => self
                .writer
                .flush()
                .map_err(|e| StorageError::Io(format!("flush failed: {}", e)))?,
        }

        Ok(())
    }

    /// Forces a sync to disk.
    pub fn sync(&mut self) -> StorageResult<()> {
        self.writer
            .flush()
            .map_err(|e| StorageError::Io(format!("flush failed: {}", e)))?;
        self.writer
            .get_ref()
            .sync_all()
            .map_err(|e| StorageError::Io(format!("sync failed: {}", e)))?;
        self.entries_since_sync = 0;
        Ok(())
    }

    /// Writes a checkpoint and truncates the WAL.
    ///
    /// Callers must have persisted a snapshot covering every entry first.
    pub fn checkpoint(&mut self) -> StorageResult<()> {
        self.append(&WalEntry::checkpoint())?;
        self.sync()?;

        let truncated = File::create(&self.path)
            .map_err(|e| StorageError::Io(format!("truncate failed: {}", e)))?;
        truncated
            .sync_all()
            .map_err(|e| StorageError::Io(format!("sync failed: {}", e)))?;
        drop(std::mem::replace(
            &mut self.writer,
            BufWriter::new(
                OpenOptions::new()
                    .append(true)
                    .open(&self.path)
                    .map_err(|e| StorageError::Io(format!("reopen WAL failed: {}", e)))?,
            ),
        ));
        self.entries_since_sync = 0;

        Ok(())
    }

    /// Reads all complete entries from the WAL for recovery.
    pub fn read_all<P: AsRef<Path>>(path: P) -> StorageResult<Vec<WalEntry>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(path)
            .map_err(|e| StorageError::Io(format!("failed to open WAL for read: {}", e)))?;
        let mut reader = BufReader::new(file);
        let mut entries = Vec::new();

        loop {
            let mut header = [0u8; 8];
            match read_full(&mut reader, &mut header) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => return Err(StorageError::Io(format!("read header failed: {}", e))),
            }
            let expected_checksum = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let length = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;

            let mut data = vec![0u8; length];
            match read_full(&mut reader, &mut data) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(path = %path.display(), "ignoring torn WAL tail");
                    break;
                }
                Err(e) => return Err(StorageError::Io(format!("read data failed: {}", e))),
            }

            let actual_checksum = crc32fast::hash(&data);
            if actual_checksum != expected_checksum {
                return Err(StorageError::WalCorrupted(format!(
                    "checksum mismatch: expected {}, got {}",
                    expected_checksum, actual_checksum
                )));
            }

            entries.push(WalEntry::from_bytes(&data)?);
        }

        Ok(entries)
    }

    /// Returns the path to the WAL file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Fills `buf`, returning false if the input ended first.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}
