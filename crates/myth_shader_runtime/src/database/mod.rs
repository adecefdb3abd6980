//! Shader Database
//!
//! Persistent cache of compiled permutations keyed by [`ShaderKey`].
//!
//! # Lifecycle
//!
//! ```text
//! Unloaded ──load(path)──▶ Loaded ──close()──▶ Unloaded
//!                            │
//!                            └─invalidate()─▶ Loaded (empty, file rewritten)
//! ```
//!
//! A file whose magic, platform or version does not match is discarded as a
//! whole: `load` rewrites it empty and reports the mismatch, and every key is
//! recompiled from source on demand.
//!
//! # Concurrency
//!
//! The entry map sits behind a `parking_lot::RwLock`. Lookups from the render
//! thread take the read lock and clone an `Arc` to the entry; appends from the
//! compiler worker take the write lock and write through to the backing file
//! before releasing it.

pub mod codec;
pub mod entry;
pub mod format;

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use myth_shader_core::ShaderKey;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tempfile::NamedTempFile;

use crate::errors::{Result, ShaderRuntimeError};
use codec::ByteReader;
pub use entry::{ShaderEntrySet, ShaderLookup};
use format::{
    DATABASE_VERSION, DatabaseHeader, HIGH_MAGIC, LOW_MAGIC, PLATFORM_ID, ShaderEntriesHeader,
};

#[derive(Debug, Default)]
struct DatabaseState {
    path: Option<PathBuf>,
    entries: FxHashMap<ShaderKey, Arc<ShaderEntrySet>>,
    /// Entry records in the backing file; exceeds `entries.len()` when a key
    /// was appended more than once.
    records_in_file: u32,
}

/// Thread-safe shader cache. See the module documentation.
#[derive(Debug, Default)]
pub struct ShaderDatabase {
    state: RwLock<DatabaseState>,
}

impl ShaderDatabase {
    /// An unloaded, memory-only database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `path`, returning the number of entries read.
    ///
    /// A missing file is created empty. A file that fails validation is
    /// rewritten empty and the validation error is returned; the database is
    /// loaded (and empty) in that case. Any other failure leaves it unloaded.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let mut state = self.state.write();
        state.path = None;
        state.entries.clear();
        state.records_in_file = 0;

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::info!("Shader database {} not found, creating it", path.display());
                write_database_file(path, &state.entries)?;
                state.path = Some(path.to_path_buf());
                return Ok(0);
            }
            Err(err) => return Err(err.into()),
        };

        let records = match decode_database(&bytes) {
            Ok(records) => records,
            Err(err) => {
                log::warn!(
                    "Discarding shader database {}: {err}",
                    path.display()
                );
                write_database_file(path, &state.entries)?;
                state.path = Some(path.to_path_buf());
                return Err(err);
            }
        };

        let record_count = records.len();
        let mut entries = FxHashMap::default();
        for (key, entry) in records {
            entries.insert(key, Arc::new(entry));
        }

        if entries.len() != record_count {
            log::debug!(
                "Compacting shader database {} ({record_count} records, {} keys)",
                path.display(),
                entries.len()
            );
            write_database_file(path, &entries)?;
        }

        log::debug!("Loaded {} shader entries from {}", entries.len(), path.display());
        state.records_in_file = entries.len() as u32;
        state.entries = entries;
        state.path = Some(path.to_path_buf());
        Ok(state.entries.len())
    }

    /// Drops every entry and detaches from the backing file.
    pub fn close(&self) {
        let mut state = self.state.write();
        if let Some(path) = state.path.take() {
            log::debug!("Closed shader database {}", path.display());
        }
        state.entries.clear();
        state.records_in_file = 0;
    }

    /// Drops every entry and rewrites the backing file empty, forcing every
    /// key to be recompiled.
    pub fn invalidate(&self) -> Result<()> {
        let mut state = self.state.write();
        state.entries.clear();
        state.records_in_file = 0;
        if let Some(path) = &state.path {
            log::info!("Invalidating shader database {}", path.display());
            write_database_file(path, &state.entries)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.state.read().path.is_some()
    }

    #[must_use]
    pub fn path(&self) -> Option<PathBuf> {
        self.state.read().path.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// Every cached key, ascending.
    #[must_use]
    pub fn keys(&self) -> Vec<ShaderKey> {
        let mut keys: Vec<_> = self.state.read().entries.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    #[must_use]
    pub fn get(&self, key: ShaderKey) -> Option<Arc<ShaderEntrySet>> {
        self.state.read().entries.get(&key).cloned()
    }

    /// Looks `key` up; the entry is stale when it was compiled from a source
    /// older than `timestamp`.
    #[must_use]
    pub fn retrieve(&self, key: ShaderKey, timestamp: u64) -> ShaderLookup {
        match self.state.read().entries.get(&key) {
            None => ShaderLookup::Missing,
            Some(entry) if entry.timestamp() < timestamp => ShaderLookup::Stale(Arc::clone(entry)),
            Some(entry) => ShaderLookup::Fresh(Arc::clone(entry)),
        }
    }

    /// Inserts or replaces the entry of `key` and appends it to the backing
    /// file.
    ///
    /// The in-memory entry is updated even when the file write fails.
    pub fn append(&self, key: ShaderKey, entry: ShaderEntrySet) -> Result<Arc<ShaderEntrySet>> {
        let entry = Arc::new(entry);
        let mut state = self.state.write();
        state.entries.insert(key, Arc::clone(&entry));

        if let Some(path) = state.path.clone() {
            let mut record = Vec::new();
            codec::encode_entry(&mut record, key, &entry)?;
            append_record(&path, &record, state.records_in_file + 1)?;
            state.records_in_file += 1;
        }

        log::debug!("Stored {key} (timestamp {})", entry.timestamp());
        Ok(entry)
    }

    /// Removes `key`, rewriting the backing file. Returns whether it existed.
    pub fn remove(&self, key: ShaderKey) -> Result<bool> {
        let mut state = self.state.write();
        if state.entries.remove(&key).is_none() {
            return Ok(false);
        }

        if let Some(path) = &state.path {
            write_database_file(path, &state.entries)?;
        }
        state.records_in_file = state.entries.len() as u32;

        log::debug!("Removed {key} from the shader database");
        Ok(true)
    }

    /// Reads a database file without loading or repairing it.
    pub fn read_file(path: impl AsRef<Path>) -> Result<Vec<(ShaderKey, ShaderEntrySet)>> {
        let bytes = std::fs::read(path)?;
        decode_database(&bytes)
    }
}

// ─── File I/O ──────────────────────────────────────────────────────────────

/// Decodes a whole file into its records, in file order.
fn decode_database(bytes: &[u8]) -> Result<Vec<(ShaderKey, ShaderEntrySet)>> {
    let mut reader = ByteReader::new(bytes);

    let header: DatabaseHeader = reader.pod()?;
    if header.low_magic != LOW_MAGIC || header.high_magic != HIGH_MAGIC {
        return Err(ShaderRuntimeError::MagicMismatch {
            low: header.low_magic,
            high: header.high_magic,
        });
    }
    if header.platform != PLATFORM_ID {
        return Err(ShaderRuntimeError::PlatformMismatch {
            expected: PLATFORM_ID,
            found: header.platform,
        });
    }
    if header.version != DATABASE_VERSION {
        return Err(ShaderRuntimeError::VersionMismatch {
            expected: DATABASE_VERSION,
            found: header.version,
        });
    }

    let entries_header: ShaderEntriesHeader = reader.pod()?;
    let mut records = Vec::with_capacity(entries_header.num_shader_entries.min(4096) as usize);
    for _ in 0..entries_header.num_shader_entries {
        records.push(codec::decode_entry(&mut reader)?);
    }

    Ok(records)
}

/// Encodes a complete database with keys in ascending order.
pub fn encode_database(entries: &FxHashMap<ShaderKey, Arc<ShaderEntrySet>>) -> Result<Vec<u8>> {
    let mut keys: Vec<_> = entries.keys().copied().collect();
    keys.sort_unstable();

    let mut bytes = Vec::new();
    bytes.extend_from_slice(bytemuck::bytes_of(&DatabaseHeader::current()));
    bytes.extend_from_slice(bytemuck::bytes_of(&ShaderEntriesHeader {
        num_shader_entries: keys.len() as u32,
    }));
    for key in keys {
        codec::encode_entry(&mut bytes, key, &entries[&key])?;
    }
    Ok(bytes)
}

/// Replaces `path` atomically through a temporary file in the same
/// directory.
fn write_database_file(path: &Path, entries: &FxHashMap<ShaderKey, Arc<ShaderEntrySet>>) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let bytes = encode_database(entries)?;
    let mut file = NamedTempFile::new_in(parent)?;
    file.write_all(&bytes)?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

fn append_record(path: &Path, record: &[u8], new_record_count: u32) -> Result<()> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    file.seek(SeekFrom::End(0))?;
    file.write_all(record)?;
    file.seek(SeekFrom::Start(ShaderEntriesHeader::OFFSET as u64))?;
    file.write_all(bytemuck::bytes_of(&ShaderEntriesHeader {
        num_shader_entries: new_record_count,
    }))?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource_binder::ShaderBindingLayout;
    use crate::stage::ShaderStage;
    use crate::state_block::render_state::RenderStateBlock;

    fn entry(timestamp: u64, vertex: &[u8]) -> ShaderEntrySet {
        let mut raw: [Vec<u8>; ShaderStage::COUNT] = Default::default();
        raw[ShaderStage::Vertex.index()] = vertex.to_vec();
        ShaderEntrySet::new(timestamp, raw, RenderStateBlock::default(), ShaderBindingLayout::default())
    }

    #[test]
    fn test_missing_file_is_created_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("shaders.bin");

        let db = ShaderDatabase::new();
        assert_eq!(db.load(&path).unwrap(), 0);
        assert!(path.exists());
        assert!(db.is_loaded());
    }

    #[test]
    fn test_retrieve_reports_staleness() {
        let db = ShaderDatabase::new();
        let key = ShaderKey::from_raw(1);
        db.append(key, entry(100, b"vs")).unwrap();

        assert!(db.retrieve(key, 100).is_fresh());
        assert!(db.retrieve(key, 50).is_fresh());
        assert!(matches!(db.retrieve(key, 101), ShaderLookup::Stale(_)));
        assert!(matches!(db.retrieve(ShaderKey::from_raw(2), 0), ShaderLookup::Missing));
    }

    #[test]
    fn test_reappended_key_is_compacted_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shaders.bin");
        let key = ShaderKey::from_raw(1);

        let db = ShaderDatabase::new();
        db.load(&path).unwrap();
        db.append(key, entry(1, b"old")).unwrap();
        db.append(key, entry(2, b"new")).unwrap();
        assert_eq!(ShaderDatabase::read_file(&path).unwrap().len(), 2);

        let reloaded = ShaderDatabase::new();
        assert_eq!(reloaded.load(&path).unwrap(), 1);
        assert_eq!(reloaded.get(key).unwrap().timestamp(), 2);
        assert_eq!(ShaderDatabase::read_file(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_garbage_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shaders.bin");
        std::fs::write(&path, b"not a shader database at all").unwrap();

        let db = ShaderDatabase::new();
        assert!(matches!(db.load(&path), Err(ShaderRuntimeError::MagicMismatch { .. })));
        assert!(db.is_empty());
        assert_eq!(ShaderDatabase::read_file(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_tmp_extension_path_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shaders.tmp");
        let key = ShaderKey::from_raw(7);

        let db = ShaderDatabase::new();
        db.load(&path).unwrap();
        db.append(key, entry(3, b"vs")).unwrap();
        db.remove(ShaderKey::from_raw(8)).unwrap();
        db.invalidate().unwrap();
        db.append(key, entry(4, b"vs")).unwrap();

        let records = ShaderDatabase::read_file(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1.timestamp(), 4);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
