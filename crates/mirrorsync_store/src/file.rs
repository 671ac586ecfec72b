//! File-backed local store.
//!
//! Each collection lives in its own directory entry:
//!
//! ```text
//! <store_dir>/
//! ├─ <collection>.cbor      # Committed collection (CBOR)
//! ├─ <collection>.cbor.tmp  # Commit in progress
//! └─ <collection>.lock      # Advisory lock for single-writer
//! ```
//!
//! Commits use the write-then-rename pattern so a crash leaves either the
//! previous or the new collection on disk, never a partial file.

use crate::change_feed::ChangeEvent;
use crate::entity::{Record, Syncable, SyncableDto};
use crate::error::{StoreError, StoreResult};
use crate::reconcile::ReconcileReport;
use crate::state::Collection;
use crate::store::LocalStore;
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use tracing::debug;

/// Current on-disk format version.
pub const FORMAT_VERSION: u16 = 1;

#[derive(Serialize)]
struct StoreFileRef<'a, E> {
    version: u16,
    collection: &'a str,
    sequence: u64,
    records: &'a [Record<E>],
}

#[derive(Deserialize)]
struct StoreFile<E> {
    version: u16,
    collection: String,
    sequence: u64,
    records: Vec<Record<E>>,
}

/// A local store persisted as one CBOR file per collection.
///
/// # Thread Safety
///
/// The store holds an exclusive lock on `<collection>.lock` for its whole
/// lifetime; a second `FileStore` for the same collection and directory
/// fails with [`StoreError::Locked`], in this or any other process.
pub struct FileStore<E> {
    dir: PathBuf,
    collection: Collection<E>,
    _lock_file: File,
}

impl<E> FileStore<E>
where
    E: Syncable + Serialize + DeserializeOwned,
{
    /// Opens or creates the store for `E` inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another store holds the lock (returns `Locked`)
    /// - The collection file is corrupted or has an unknown format version
    pub fn open(dir: &Path, create_if_missing: bool) -> StoreResult<Self> {
        if !dir.exists() {
            if create_if_missing {
                fs::create_dir_all(dir)?;
            } else {
                return Err(StoreError::MissingDirectory {
                    path: dir.display().to_string(),
                });
            }
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(format!("{}.lock", E::COLLECTION)))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked);
        }

        let data_path = Self::data_path_in(dir);
        let (sequence, records) = if data_path.exists() {
            Self::load(&data_path)?
        } else {
            (0, Vec::new())
        };

        debug!(
            collection = E::COLLECTION,
            path = %data_path.display(),
            sequence,
            records = records.len(),
            "opened file store"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            collection: Collection::new(sequence, records),
            _lock_file: lock_file,
        })
    }

    /// Returns the store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path of the committed collection file.
    pub fn data_path(&self) -> PathBuf {
        Self::data_path_in(&self.dir)
    }

    /// Returns the sequence number of the latest commit.
    pub fn sequence(&self) -> u64 {
        self.collection.sequence()
    }

    /// Subscribes to committed changes.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        self.collection.subscribe()
    }

    fn data_path_in(dir: &Path) -> PathBuf {
        dir.join(format!("{}.cbor", E::COLLECTION))
    }

    fn load(path: &Path) -> StoreResult<(u64, Vec<Record<E>>)> {
        let reader = BufReader::new(File::open(path)?);
        let file: StoreFile<E> = ciborium::de::from_reader(reader)
            .map_err(|e| StoreError::corrupted(format!("{}: {e}", path.display())))?;

        if file.version != FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: file.version,
                expected: FORMAT_VERSION,
            });
        }
        if file.collection != E::COLLECTION {
            return Err(StoreError::corrupted(format!(
                "file holds collection {:?}, expected {:?}",
                file.collection,
                E::COLLECTION
            )));
        }

        Ok((file.sequence, file.records))
    }

    /// Writes a new collection version to disk atomically.
    ///
    /// 1. Write to temporary file
    /// 2. Sync temporary file to disk
    /// 3. Rename temporary file over the data file
    /// 4. Fsync the directory so the rename is durable
    fn persist(dir: &Path, sequence: u64, records: &[Record<E>]) -> StoreResult<()> {
        let data_path = Self::data_path_in(dir);
        let temp_path = dir.join(format!("{}.cbor.tmp", E::COLLECTION));

        let file = StoreFileRef {
            version: FORMAT_VERSION,
            collection: E::COLLECTION,
            sequence,
            records,
        };

        let mut writer = BufWriter::new(File::create(&temp_path)?);
        ciborium::ser::into_writer(&file, &mut writer)
            .map_err(|e| StoreError::Codec(e.to_string()))?;
        writer.flush()?;
        let out = writer
            .into_inner()
            .map_err(|e| StoreError::Io(e.into_error()))?;
        out.sync_all()?;
        drop(out);

        fs::rename(&temp_path, &data_path)?;
        sync_directory(dir)?;
        Ok(())
    }
}

impl<E> LocalStore<E> for FileStore<E>
where
    E: Syncable + Serialize + DeserializeOwned,
{
    fn reconcile<D: SyncableDto<E>>(&self, snapshot: &[D]) -> StoreResult<ReconcileReport> {
        let dir = self.dir.as_path();
        self.collection
            .reconcile_and_commit(snapshot, |sequence, records| {
                Self::persist(dir, sequence, records)
            })
    }

    fn records(&self) -> StoreResult<Vec<Record<E>>> {
        Ok(self.collection.records().as_ref().clone())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.collection.records().len())
    }
}

impl<E: Syncable> std::fmt::Debug for FileStore<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("dir", &self.dir)
            .field("collection", &E::COLLECTION)
            .field("sequence", &self.collection.sequence())
            .finish_non_exhaustive()
    }
}

/// Syncs a directory so that renames inside it are durable.
#[cfg(unix)]
fn sync_directory(dir: &Path) -> StoreResult<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

/// NTFS journaling covers metadata durability; directories can't be fsynced.
#[cfg(not(unix))]
fn sync_directory(_dir: &Path) -> StoreResult<()> {
    Ok(())
}
