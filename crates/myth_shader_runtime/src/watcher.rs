//! Shader Watcher
//!
//! Tracks, per family, the newest modification time of its source file and
//! of every file it includes (transitively). Change detection runs on a
//! `notify::PollWatcher` polling at the configured interval; its events are
//! forwarded to a worker thread that refreshes the changed files and
//! republishes the family table.
//!
//! The published table is an immutable [`WatcherSnapshot`] swapped in as a
//! whole after each update, so readers on the render thread never see a
//! half-updated scan and only hold the lock for a pointer read.
//!
//! A family's timestamp never decreases, and the Error family is never
//! tracked (its timestamp stays 0).

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::UNIX_EPOCH;

use myth_shader_core::{MAX_SHADER_FAMILIES, ShaderKey, ShaderSchema};
use notify::{EventKind, PollWatcher, RecursiveMode, Watcher};
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use walkdir::WalkDir;

use crate::compiler::source::include_directives;
use crate::errors::{Result, ShaderRuntimeError};
use crate::settings::WatcherSettings;

const THREAD_NAME: &str = "shader-watcher";

/// A tracked source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderFile {
    /// Path relative to the shader directory, lowercase, `/`-separated.
    pub filename: String,
    /// Modification time in nanoseconds since the Unix epoch.
    pub last_write_timestamp: u64,
}

/// Result of one update.
#[derive(Debug, Clone)]
pub struct WatcherSnapshot {
    family_timestamps: Vec<u64>,
    files: FxHashMap<String, u64>,
}

impl Default for WatcherSnapshot {
    fn default() -> Self {
        Self {
            family_timestamps: vec![0; MAX_SHADER_FAMILIES],
            files: FxHashMap::default(),
        }
    }
}

impl WatcherSnapshot {
    #[inline]
    #[must_use]
    pub fn family_timestamp(&self, family_index: usize) -> u64 {
        self.family_timestamps.get(family_index).copied().unwrap_or(0)
    }
}

#[derive(Debug)]
struct SourceFile {
    path: PathBuf,
    timestamp: u64,
}

/// Include targets of one file, cached until its modification time changes.
#[derive(Debug)]
struct CachedIncludes {
    timestamp: u64,
    includes: Vec<String>,
}

#[derive(Debug, Default)]
struct ScanState {
    files: FxHashMap<String, SourceFile>,
    include_cache: FxHashMap<String, CachedIncludes>,
}

#[derive(Debug)]
struct WatcherShared {
    shader_directory: PathBuf,
    settings: WatcherSettings,
    schema: Arc<ShaderSchema>,
    snapshot: RwLock<Arc<WatcherSnapshot>>,
    scan_state: Mutex<ScanState>,
}

/// What the poll watcher hands to the worker thread.
#[derive(Debug)]
enum WatcherMessage {
    Event(notify::Event),
    Error(notify::Error),
    Stop,
}

struct WatcherThread {
    poll_watcher: PollWatcher,
    message_tx: flume::Sender<WatcherMessage>,
    handle: JoinHandle<()>,
}

impl fmt::Debug for WatcherThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherThread")
            .field("thread", &self.handle.thread().name())
            .finish_non_exhaustive()
    }
}

/// Source timestamp tracker. See the module documentation.
#[derive(Debug)]
pub struct ShaderWatcher {
    shared: Arc<WatcherShared>,
    thread: Mutex<Option<WatcherThread>>,
}

impl ShaderWatcher {
    /// Creates an idle watcher; nothing is scanned until [`start`](Self::start)
    /// or [`scan_now`](Self::scan_now).
    #[must_use]
    pub fn new(
        shader_directory: impl Into<PathBuf>,
        settings: WatcherSettings,
        schema: Arc<ShaderSchema>,
    ) -> Self {
        Self {
            shared: Arc::new(WatcherShared {
                shader_directory: shader_directory.into(),
                settings,
                schema,
                snapshot: RwLock::new(Arc::new(WatcherSnapshot::default())),
                scan_state: Mutex::new(ScanState::default()),
            }),
            thread: Mutex::new(None),
        }
    }

    /// Scans once on the calling thread, then starts polling when enabled in
    /// the settings.
    pub fn start(&self) -> Result<()> {
        if !self.shared.settings.enabled {
            self.scan_now();
            log::info!("Shader watcher polling is disabled");
            return Ok(());
        }

        let mut thread = self.thread.lock();
        if thread.is_some() {
            self.scan_now();
            return Ok(());
        }

        let (message_tx, message_rx) = flume::unbounded();
        let event_tx = message_tx.clone();
        let config = notify::Config::default().with_poll_interval(self.shared.settings.poll_interval());
        let mut poll_watcher = PollWatcher::new(
            move |result: notify::Result<notify::Event>| {
                let message = match result {
                    Ok(event) => WatcherMessage::Event(event),
                    Err(err) => WatcherMessage::Error(err),
                };
                let _ = event_tx.send(message);
            },
            config,
        )?;
        // Watch before the initial scan so no change falls between the two.
        poll_watcher.watch(&self.shared.shader_directory, RecursiveMode::Recursive)?;
        self.scan_now();

        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name(THREAD_NAME.to_owned())
            .spawn(move || watcher_thread(&shared, &message_rx))
            .map_err(|source| ShaderRuntimeError::ThreadSpawn {
                name: THREAD_NAME,
                source,
            })?;

        *thread = Some(WatcherThread {
            poll_watcher,
            message_tx,
            handle,
        });

        log::info!(
            "Shader watcher started on {} (every {} ms)",
            self.shared.shader_directory.display(),
            self.shared.settings.poll_interval_ms
        );
        Ok(())
    }

    /// Stops polling and joins the worker thread. Safe to call repeatedly.
    pub fn stop_thread(&self) {
        let Some(thread) = self.thread.lock().take() else {
            return;
        };

        drop(thread.poll_watcher);
        let _ = thread.message_tx.send(WatcherMessage::Stop);
        if thread.handle.join().is_err() {
            log::error!("Shader watcher thread panicked");
        }
        log::info!("Shader watcher stopped");
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.thread.lock().is_some()
    }

    /// Rescans the whole directory synchronously. Returns the number of
    /// families whose timestamp moved.
    pub fn scan_now(&self) -> usize {
        scan(&self.shared)
    }

    /// Newest source timestamp of the key's family, 0 when never seen.
    #[must_use]
    pub fn timestamp_for_shader_key(&self, key: ShaderKey) -> u64 {
        self.shared
            .snapshot
            .read()
            .family_timestamp(key.family().as_usize())
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<WatcherSnapshot> {
        Arc::clone(&self.shared.snapshot.read())
    }

    /// Every tracked file of the last update, sorted by name.
    #[must_use]
    pub fn watched_files(&self) -> Vec<ShaderFile> {
        let snapshot = self.snapshot();
        let mut files: Vec<_> = snapshot
            .files
            .iter()
            .map(|(filename, &last_write_timestamp)| ShaderFile {
                filename: filename.clone(),
                last_write_timestamp,
            })
            .collect();
        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        files
    }

    #[must_use]
    pub fn shader_directory(&self) -> &Path {
        &self.shared.shader_directory
    }
}

impl Drop for ShaderWatcher {
    fn drop(&mut self) {
        self.stop_thread();
    }
}

/// Drains poll events in batches until told to stop.
fn watcher_thread(shared: &WatcherShared, message_rx: &flume::Receiver<WatcherMessage>) {
    while let Ok(first) = message_rx.recv() {
        let mut changed_paths = Vec::new();
        let mut rescan = false;

        for message in std::iter::once(first).chain(message_rx.drain()) {
            match message {
                WatcherMessage::Stop => return,
                WatcherMessage::Event(event) if event.need_rescan() => rescan = true,
                WatcherMessage::Event(event) => {
                    if matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    ) {
                        changed_paths.extend(event.paths);
                    }
                }
                WatcherMessage::Error(err) => {
                    log::warn!("Shader watcher error: {err}");
                    rescan = true;
                }
            }
        }

        if rescan {
            scan(shared);
        } else if !changed_paths.is_empty() {
            refresh(shared, &changed_paths);
        }
    }
}

// ─── Scanning ──────────────────────────────────────────────────────────────

fn scan(shared: &WatcherShared) -> usize {
    let mut state = shared.scan_state.lock();
    state.files = collect_source_files(&shared.shader_directory, &shared.settings);
    publish(shared, &mut state)
}

/// Re-reads the files behind `paths` only, falling back to a full rescan
/// for paths outside the shader directory.
fn refresh(shared: &WatcherShared, paths: &[PathBuf]) -> usize {
    let mut state = shared.scan_state.lock();

    for path in paths {
        let Ok(relative) = path.strip_prefix(&shared.shader_directory) else {
            state.files = collect_source_files(&shared.shader_directory, &shared.settings);
            break;
        };
        let name = normalize_relative(relative);

        match std::fs::metadata(path) {
            Ok(metadata) if metadata.is_file() => {
                if is_tracked(path, &shared.settings) {
                    state.files.insert(
                        name,
                        SourceFile {
                            path: path.clone(),
                            timestamp: modified_nanos(&metadata),
                        },
                    );
                }
            }
            Ok(_) => {}
            Err(_) => {
                let directory_prefix = format!("{name}/");
                state
                    .files
                    .retain(|file, _| *file != name && !file.starts_with(&directory_prefix));
            }
        }
    }

    publish(shared, &mut state)
}

/// Recomputes every family timestamp from the tracked files and swaps in a
/// new snapshot. Returns the number of families whose timestamp moved.
fn publish(shared: &WatcherShared, state: &mut ScanState) -> usize {
    let ScanState {
        files,
        include_cache,
    } = state;

    let previous = Arc::clone(&shared.snapshot.read());
    let mut snapshot = WatcherSnapshot {
        family_timestamps: previous.family_timestamps.clone(),
        files: files
            .iter()
            .map(|(name, file)| (name.clone(), file.timestamp))
            .collect(),
    };

    let error_family = shared.schema.error_family();
    let mut changed = 0;

    for (family, desc) in shared.schema.families() {
        if family == error_family {
            continue;
        }

        let source_key = normalize_relative(Path::new(desc.source_file()));
        let Some(newest) = newest_timestamp(&source_key, files, include_cache) else {
            continue;
        };

        let slot = &mut snapshot.family_timestamps[family.as_usize()];
        if newest > *slot {
            if *slot == 0 {
                log::debug!("Tracking shader family '{}' ({})", desc.name(), desc.source_file());
            } else {
                log::info!("Shader family '{}' changed on disk", desc.name());
            }
            *slot = newest;
            changed += 1;
        }
    }

    // Forget include lists of deleted files.
    include_cache.retain(|name, _| files.contains_key(name));

    *shared.snapshot.write() = Arc::new(snapshot);
    changed
}

fn is_tracked(path: &Path, settings: &WatcherSettings) -> bool {
    path.extension().and_then(|e| e.to_str()).is_some_and(|ext| {
        ext.eq_ignore_ascii_case(&settings.family_extension)
            || ext.eq_ignore_ascii_case(&settings.include_extension)
    })
}

fn modified_nanos(metadata: &std::fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_nanos() as u64)
}

/// Every family / include file under `root`, keyed by normalized relative
/// path.
fn collect_source_files(root: &Path, settings: &WatcherSettings) -> FxHashMap<String, SourceFile> {
    let mut files = FxHashMap::default();

    for dir_entry in WalkDir::new(root).follow_links(true).into_iter().flatten() {
        if !dir_entry.file_type().is_file() || !is_tracked(dir_entry.path(), settings) {
            continue;
        }
        let Ok(metadata) = dir_entry.metadata() else {
            continue;
        };
        let Ok(relative) = dir_entry.path().strip_prefix(root) else {
            continue;
        };

        files.insert(
            normalize_relative(relative),
            SourceFile {
                path: dir_entry.path().to_path_buf(),
                timestamp: modified_nanos(&metadata),
            },
        );
    }

    files
}

/// Newest timestamp of `name` and everything it includes, `None` when the
/// file itself does not exist.
fn newest_timestamp(
    name: &str,
    files: &FxHashMap<String, SourceFile>,
    include_cache: &mut FxHashMap<String, CachedIncludes>,
) -> Option<u64> {
    files.get(name)?;

    let mut newest = 0;
    let mut visited = FxHashSet::default();
    let mut pending = vec![name.to_owned()];

    while let Some(current) = pending.pop() {
        if !visited.insert(current.clone()) {
            continue;
        }
        let Some(file) = files.get(&current) else {
            continue;
        };
        newest = newest.max(file.timestamp);

        let includes = cached_includes(&current, file, include_cache);
        let directory = current.rsplit_once('/').map_or("", |(dir, _)| dir);
        for include in includes {
            let sibling = normalize_relative(&Path::new(directory).join(include));
            if files.contains_key(&sibling) {
                pending.push(sibling);
            } else {
                pending.push(normalize_relative(Path::new(include)));
            }
        }
    }

    Some(newest)
}

fn cached_includes<'a>(
    name: &str,
    file: &SourceFile,
    cache: &'a mut FxHashMap<String, CachedIncludes>,
) -> &'a [String] {
    let cached = cache
        .entry(name.to_owned())
        .or_insert_with(|| CachedIncludes {
            timestamp: u64::MAX,
            includes: Vec::new(),
        });

    if cached.timestamp != file.timestamp {
        cached.includes = std::fs::read_to_string(&file.path)
            .map(|content| {
                include_directives(&content)
                    .into_iter()
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        cached.timestamp = file.timestamp;
    }

    &cached.includes
}

/// Lowercase, `/`-separated form of a relative path with `.` and `..`
/// resolved.
fn normalize_relative(path: &Path) -> String {
    let mut parts: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().to_ascii_lowercase()),
            Component::ParentDir => {
                parts.pop();
            }
            _ => {}
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_relative() {
        assert_eq!(normalize_relative(Path::new("Common/../Generic.FX")), "generic.fx");
        assert_eq!(normalize_relative(Path::new("./lib/Lighting.hlsl")), "lib/lighting.hlsl");
    }

    #[test]
    fn test_include_cycles_terminate() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.hlsl"), "#include \"b.hlsl\"\n").unwrap();
        std::fs::write(dir.path().join("b.hlsl"), "#include \"a.hlsl\"\n").unwrap();

        let files = collect_source_files(dir.path(), &WatcherSettings::default());
        let mut include_cache = FxHashMap::default();
        let newest = newest_timestamp("a.hlsl", &files, &mut include_cache).unwrap();

        assert_eq!(newest, files["a.hlsl"].timestamp.max(files["b.hlsl"].timestamp));
        assert_eq!(newest_timestamp("missing.fx", &files, &mut include_cache), None);
    }
}
