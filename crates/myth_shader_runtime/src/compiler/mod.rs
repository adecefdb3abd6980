//! Shader Compiler
//!
//! Owns the compiler worker thread. Requests arrive over a channel, either
//! for a single key or for every valid permutation of a family; duplicates of
//! a request that is still pending are dropped.
//!
//! Results never cross the thread boundary as errors. Each key's latest
//! outcome is kept as a [`CompiledShaderKeyEntry`] and read back by the
//! handler manager through [`ShaderCompiler::get_raw_shaders_for_shader_key`];
//! successful entries are also appended to the [`ShaderDatabase`].

pub mod pipeline;
pub mod source;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use myth_shader_core::{ShaderFamily, ShaderKey, ShaderKeyGroups, ShaderVariationSetManager};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::backend::NativeShaderCompiler;
use crate::database::{ShaderDatabase, ShaderEntrySet};
use crate::errors::{Result, ShaderRuntimeError};
use crate::input_provider::ShaderInputProviderRegistry;
use crate::settings::CompilerSettings;
use crate::watcher::ShaderWatcher;

use self::pipeline::{CompilationContext, FamilySource, compile_shader_key, load_family_source};

const THREAD_NAME: &str = "shader-compiler";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompilerMessage {
    CompileKey(ShaderKey),
    CompileFamily(ShaderFamily),
    Shutdown,
}

/// Latest compilation outcome of one key.
#[derive(Debug, Clone)]
pub struct CompiledShaderKeyEntry {
    pub key: ShaderKey,
    /// Watcher timestamp sampled before the attempt.
    pub source_timestamp: u64,
    /// `None` when the attempt failed.
    pub entry: Option<Arc<ShaderEntrySet>>,
    pub error: Option<String>,
    /// Set by every successful compile, cleared when the result is read.
    pub got_recompiled_since_last_access: bool,
}

impl CompiledShaderKeyEntry {
    #[inline]
    #[must_use]
    pub fn has_compilation_error(&self) -> bool {
        self.entry.is_none()
    }
}

/// What the compiler knows about a key.
#[derive(Debug, Clone)]
pub enum RawShaderStatus {
    /// A request covering the key is queued or being compiled.
    Pending,
    /// Never requested.
    Missing,
    /// The last attempt failed on a source with this timestamp.
    Failed { source_timestamp: u64 },
    Ready {
        entry: Arc<ShaderEntrySet>,
        /// First read since the entry was produced.
        recompiled: bool,
    },
}

#[derive(Debug, Default)]
struct RequestState {
    pending_keys: FxHashSet<ShaderKey>,
    pending_families: FxHashSet<ShaderFamily>,
}

impl RequestState {
    fn covers(&self, key: ShaderKey) -> bool {
        self.pending_keys.contains(&key) || self.pending_families.contains(&key.family())
    }
}

struct CompilerShared {
    shader_directory: PathBuf,
    settings: CompilerSettings,
    variations: Arc<ShaderVariationSetManager>,
    backend: Arc<dyn NativeShaderCompiler>,
    providers: Arc<ShaderInputProviderRegistry>,
    database: Arc<ShaderDatabase>,
    watcher: Arc<ShaderWatcher>,
    requests: Mutex<RequestState>,
    compiled: Mutex<FxHashMap<ShaderKey, CompiledShaderKeyEntry>>,
    running: AtomicBool,
}

impl CompilerShared {
    fn groups(&self) -> &ShaderKeyGroups {
        self.variations.key_groups()
    }

    fn context(&self) -> CompilationContext<'_> {
        CompilationContext {
            groups: self.groups(),
            backend: self.backend.as_ref(),
            providers: &self.providers,
            settings: &self.settings,
            shader_directory: &self.shader_directory,
        }
    }

    fn record(
        &self,
        key: ShaderKey,
        source_timestamp: u64,
        outcome: std::result::Result<Arc<ShaderEntrySet>, String>,
    ) {
        let (entry, error) = match outcome {
            Ok(entry) => (Some(entry), None),
            Err(error) => (None, Some(error)),
        };
        let record = CompiledShaderKeyEntry {
            key,
            source_timestamp,
            got_recompiled_since_last_access: entry.is_some(),
            entry,
            error,
        };
        self.compiled.lock().insert(key, record);
    }

    /// Compiles `key` from an already loaded source and publishes the result.
    fn compile_and_publish(&self, source: &FamilySource, key: ShaderKey, source_timestamp: u64) {
        let outcome = match compile_shader_key(&self.context(), source, key, source_timestamp) {
            Ok(entry) => match self.database.append(key, entry) {
                Ok(entry) => Ok(entry),
                Err(err) => {
                    log::warn!("Could not persist {}: {err}", self.groups().describe_key(key));
                    self.database.get(key).ok_or_else(|| err.to_string())
                }
            },
            Err(err) => {
                log::error!("{} failed: {err}", self.groups().describe_key(key));
                Err(err.to_string())
            }
        };
        self.record(key, source_timestamp, outcome);
    }

    fn record_source_failure(&self, keys: &[ShaderKey], source_timestamp: u64, err: &ShaderRuntimeError) {
        log::error!("{err}");
        for &key in keys {
            self.record(key, source_timestamp, Err(err.to_string()));
        }
    }

    fn process_key(&self, key: ShaderKey) {
        log::debug!("Compiling {}", self.groups().describe_key(key));
        let source_timestamp = self.watcher.timestamp_for_shader_key(key);

        match load_family_source(&self.context(), key.family()) {
            Ok(source) => self.compile_and_publish(&source, key, source_timestamp),
            Err(err) => self.record_source_failure(&[key], source_timestamp, &err),
        }

        self.requests.lock().pending_keys.remove(&key);
    }

    fn process_family(&self, family: ShaderFamily) {
        let keys = self.variations.every_valid_shader_key_for_family(family);
        log::debug!(
            "Compiling {} permutations of family '{}'",
            keys.len(),
            self.groups().schema().family_name(family)
        );
        let source_timestamp = self.watcher.timestamp_for_shader_key(ShaderKey::new(family));

        match load_family_source(&self.context(), family) {
            Ok(source) => {
                for key in keys {
                    if !self.running.load(Ordering::Acquire) {
                        break;
                    }
                    self.compile_and_publish(&source, key, source_timestamp);
                }
            }
            Err(err) => self.record_source_failure(&keys, source_timestamp, &err),
        }

        self.requests.lock().pending_families.remove(&family);
    }
}

/// Background shader compiler. See the module documentation.
pub struct ShaderCompiler {
    shared: Arc<CompilerShared>,
    request_tx: flume::Sender<CompilerMessage>,
    request_rx: Mutex<Option<flume::Receiver<CompilerMessage>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ShaderCompiler {
    /// Creates the compiler without starting its thread. Requests made before
    /// [`start`](Self::start) stay queued.
    pub fn new(
        shader_directory: impl Into<PathBuf>,
        settings: CompilerSettings,
        variations: Arc<ShaderVariationSetManager>,
        backend: Arc<dyn NativeShaderCompiler>,
        providers: Arc<ShaderInputProviderRegistry>,
        database: Arc<ShaderDatabase>,
        watcher: Arc<ShaderWatcher>,
    ) -> Self {
        let (request_tx, request_rx) = flume::unbounded();
        Self {
            shared: Arc::new(CompilerShared {
                shader_directory: shader_directory.into(),
                settings,
                variations,
                backend,
                providers,
                database,
                watcher,
                requests: Mutex::new(RequestState::default()),
                compiled: Mutex::new(FxHashMap::default()),
                running: AtomicBool::new(true),
            }),
            request_tx,
            request_rx: Mutex::new(Some(request_rx)),
            thread: Mutex::new(None),
        }
    }

    /// Spawns the worker thread. Calling it again is a no-op.
    pub fn start(&self) -> Result<()> {
        let mut thread = self.thread.lock();
        if thread.is_some() {
            return Ok(());
        }
        let Some(request_rx) = self.request_rx.lock().take() else {
            return Ok(());
        };

        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name(THREAD_NAME.to_owned())
            .spawn(move || compiler_thread(&shared, &request_rx))
            .map_err(|source| ShaderRuntimeError::ThreadSpawn {
                name: THREAD_NAME,
                source,
            })?;

        *thread = Some(handle);
        log::info!("Shader compiler started");
        Ok(())
    }

    /// Stops the worker after the key it is compiling and joins it. Queued
    /// requests are dropped.
    pub fn stop_thread(&self) {
        self.shared.running.store(false, Ordering::Release);
        let _ = self.request_tx.send(CompilerMessage::Shutdown);

        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                log::error!("Shader compiler thread panicked");
            }
            log::info!("Shader compiler stopped");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.thread.lock().is_some()
    }

    /// Queues `key`. Returns `false` when a pending request already covers it.
    pub fn add_compilation_request_for_shader_key(&self, key: ShaderKey) -> bool {
        {
            let mut requests = self.shared.requests.lock();
            if requests.covers(key) {
                return false;
            }
            requests.pending_keys.insert(key);
        }

        log::trace!("Queued {}", self.shared.groups().describe_key(key));
        self.send(CompilerMessage::CompileKey(key))
    }

    /// Queues every valid permutation of `family`.
    pub fn add_compilation_request_for_shader_family(&self, family: ShaderFamily) -> bool {
        if !self.shared.requests.lock().pending_families.insert(family) {
            return false;
        }

        log::trace!(
            "Queued family '{}'",
            self.shared.groups().schema().family_name(family)
        );
        self.send(CompilerMessage::CompileFamily(family))
    }

    fn send(&self, message: CompilerMessage) -> bool {
        if self.request_tx.send(message).is_err() {
            log::warn!("Shader compiler queue is closed, dropping {message:?}");
            return false;
        }
        true
    }

    /// Whether a queued or running request covers `key`.
    #[must_use]
    pub fn is_pending(&self, key: ShaderKey) -> bool {
        self.shared.requests.lock().covers(key)
    }

    /// Non-blocking status of `key`. Reading a `Ready` result clears its
    /// recompiled flag.
    pub fn get_raw_shaders_for_shader_key(&self, key: ShaderKey) -> RawShaderStatus {
        if self.is_pending(key) {
            return RawShaderStatus::Pending;
        }

        let mut compiled = self.shared.compiled.lock();
        let Some(record) = compiled.get_mut(&key) else {
            return RawShaderStatus::Missing;
        };

        match &record.entry {
            Some(entry) => {
                let recompiled = std::mem::take(&mut record.got_recompiled_since_last_access);
                RawShaderStatus::Ready {
                    entry: Arc::clone(entry),
                    recompiled,
                }
            }
            None => RawShaderStatus::Failed {
                source_timestamp: record.source_timestamp,
            },
        }
    }

    /// Latest outcome of `key`, if it was ever compiled.
    #[must_use]
    pub fn compiled_entry(&self, key: ShaderKey) -> Option<CompiledShaderKeyEntry> {
        self.shared.compiled.lock().get(&key).cloned()
    }

    /// Compiles `key` on the calling thread. The outcome is recorded like a
    /// worker result but nothing is written to the database.
    pub fn compile_now(&self, key: ShaderKey) -> Result<Arc<ShaderEntrySet>> {
        let shared = &self.shared;
        let source_timestamp = shared.watcher.timestamp_for_shader_key(key);

        let result = load_family_source(&shared.context(), key.family())
            .and_then(|source| compile_shader_key(&shared.context(), &source, key, source_timestamp))
            .map(Arc::new);

        let outcome = match &result {
            Ok(entry) => Ok(Arc::clone(entry)),
            Err(err) => Err(err.to_string()),
        };
        shared.record(key, source_timestamp, outcome);
        result
    }

    #[must_use]
    pub fn key_groups(&self) -> &Arc<ShaderKeyGroups> {
        self.shared.variations.key_groups()
    }

    #[must_use]
    pub fn variations(&self) -> &Arc<ShaderVariationSetManager> {
        &self.shared.variations
    }
}

impl Drop for ShaderCompiler {
    fn drop(&mut self) {
        self.stop_thread();
    }
}

fn compiler_thread(shared: &CompilerShared, request_rx: &flume::Receiver<CompilerMessage>) {
    while shared.running.load(Ordering::Acquire) {
        let Ok(message) = request_rx.recv() else {
            break;
        };

        match message {
            CompilerMessage::CompileKey(key) => shared.process_key(key),
            CompilerMessage::CompileFamily(family) => shared.process_family(family),
            CompilerMessage::Shutdown => break,
        }
    }
}
