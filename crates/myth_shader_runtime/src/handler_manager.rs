//! Shader Handler Manager
//!
//! The render-thread facade. [`ShaderHandlerManager::get_shader_handler_for_shader_key`]
//! is called per draw and per frame, so the common case (cached, not stale,
//! handler up to date) is one database lookup, one timestamp comparison and
//! a handler lookup.
//!
//! Anything else never blocks: stale entries are evicted and requeued,
//! missing ones are requested, and until the compiler delivers the caller
//! gets the Error shader. Keys the variation sets reject are never compiled
//! and always resolve to the Error shader.

use std::sync::Arc;

use myth_shader_core::{ShaderFamily, ShaderKey, ShaderKeyValidation};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::backend::RenderDevice;
use crate::compiler::{RawShaderStatus, ShaderCompiler};
use crate::database::{ShaderDatabase, ShaderEntrySet, ShaderLookup};
use crate::errors::{Result, ShaderRuntimeError};
use crate::handler::ShaderHandler;
use crate::watcher::ShaderWatcher;

/// Owns every [`ShaderHandler`] and the device that created their GPU
/// objects.
pub struct ShaderHandlerManager<D: RenderDevice> {
    device: D,
    database: Arc<ShaderDatabase>,
    watcher: Arc<ShaderWatcher>,
    compiler: Arc<ShaderCompiler>,
    handlers: FxHashMap<ShaderKey, ShaderHandler>,
    /// Bytecode hash per key that the device refused, so it is not retried
    /// every frame.
    rejected: FxHashMap<ShaderKey, u64>,
    /// Keys that failed variation-set validation.
    invalid: FxHashSet<ShaderKey>,
    error_key: ShaderKey,
}

impl<D: RenderDevice> ShaderHandlerManager<D> {
    pub fn new(
        device: D,
        database: Arc<ShaderDatabase>,
        watcher: Arc<ShaderWatcher>,
        compiler: Arc<ShaderCompiler>,
    ) -> Self {
        let error_key = ShaderKey::new(compiler.key_groups().schema().error_family());
        Self {
            device,
            database,
            watcher,
            compiler,
            handlers: FxHashMap::default(),
            rejected: FxHashMap::default(),
            invalid: FxHashSet::default(),
            error_key,
        }
    }

    /// Makes every valid key of the Error family and of `mandatory_families`
    /// available, compiling on the calling thread whatever the database lacks,
    /// then creates the Error handler.
    ///
    /// Fails with [`ShaderRuntimeError::ErrorShaderUnavailable`] when any of
    /// those keys cannot be built.
    pub fn initialize(&mut self, mandatory_families: &[ShaderFamily]) -> Result<()> {
        let error_family = self.error_key.family();
        let mut families = vec![error_family];
        families.extend(mandatory_families.iter().filter(|&&f| f != error_family));

        for family in families {
            for key in self.compiler.variations().every_valid_shader_key_for_family(family) {
                self.ensure_compiled(key)?;
            }
        }

        let Some(entry) = self.database.get(self.error_key) else {
            return Err(ShaderRuntimeError::ErrorShaderUnavailable(self.error_key));
        };
        let handler = ShaderHandler::create(&self.device, self.error_key, entry).map_err(|err| {
            log::error!("Could not create the Error shader: {err}");
            ShaderRuntimeError::ErrorShaderUnavailable(self.error_key)
        })?;
        if let Some(mut previous) = self.handlers.insert(self.error_key, handler) {
            previous.destroy(&self.device);
        }

        log::info!(
            "Shader handler manager initialized ({} cached shaders)",
            self.database.len()
        );
        Ok(())
    }

    fn ensure_compiled(&self, key: ShaderKey) -> Result<()> {
        let timestamp = self.watcher.timestamp_for_shader_key(key);
        if self.database.retrieve(key, timestamp).is_fresh() {
            return Ok(());
        }

        let entry = self.compiler.compile_now(key).map_err(|err| {
            log::error!(
                "Mandatory shader {} did not compile: {err}",
                self.compiler.key_groups().describe_key(key)
            );
            ShaderRuntimeError::ErrorShaderUnavailable(key)
        })?;
        self.database.append(key, Arc::unwrap_or_clone(entry))?;
        Ok(())
    }

    /// Handler for `key`, or the Error handler while `key` is unavailable.
    ///
    /// # Panics
    ///
    /// When called before a successful [`initialize`](Self::initialize).
    pub fn get_shader_handler_for_shader_key(&mut self, key: ShaderKey) -> &ShaderHandler {
        let usable = self.is_valid(key)
            && match self.resolve_entry(key) {
                Some(entry) => self.install(key, entry),
                None => false,
            };

        let key = if usable { key } else { self.error_key };
        match self.handlers.get(&key) {
            Some(handler) => handler,
            None => panic!("Error shader handler is missing; ShaderHandlerManager::initialize must succeed first"),
        }
    }

    /// Whether `key` is a permutation the variation sets allow. Keys with a
    /// handler already passed.
    fn is_valid(&mut self, key: ShaderKey) -> bool {
        if self.handlers.contains_key(&key) {
            return true;
        }
        if self.invalid.contains(&key) {
            return false;
        }

        let valid = self
            .compiler
            .variations()
            .validate_shader_key(key, ShaderKeyValidation::DontAssertOnError);
        if !valid {
            log::warn!(
                "{} is not a valid permutation, using the Error shader",
                self.compiler.key_groups().describe_key(key)
            );
            self.invalid.insert(key);
        }
        valid
    }

    /// Up-to-date entry of `key`, requesting compilation when there is none.
    fn resolve_entry(&self, key: ShaderKey) -> Option<Arc<ShaderEntrySet>> {
        let timestamp = self.watcher.timestamp_for_shader_key(key);

        match self.database.retrieve(key, timestamp) {
            ShaderLookup::Fresh(entry) => Some(entry),
            ShaderLookup::Stale(entry) => {
                log::debug!(
                    "{key} is stale (cached {} < source {timestamp}), recompiling",
                    entry.timestamp()
                );
                if let Err(err) = self.database.remove(key) {
                    log::warn!("Could not evict {key}: {err}");
                }
                self.compiler.add_compilation_request_for_shader_key(key);
                None
            }
            ShaderLookup::Missing => self.resolve_from_compiler(key, timestamp),
        }
    }

    fn resolve_from_compiler(&self, key: ShaderKey, timestamp: u64) -> Option<Arc<ShaderEntrySet>> {
        match self.compiler.get_raw_shaders_for_shader_key(key) {
            RawShaderStatus::Pending => None,
            RawShaderStatus::Missing => {
                self.compiler.add_compilation_request_for_shader_key(key);
                None
            }
            RawShaderStatus::Failed { source_timestamp } => {
                if timestamp > source_timestamp {
                    self.compiler.add_compilation_request_for_shader_key(key);
                }
                None
            }
            RawShaderStatus::Ready { entry, .. } if entry.timestamp() < timestamp => {
                self.compiler.add_compilation_request_for_shader_key(key);
                None
            }
            RawShaderStatus::Ready { entry, .. } => {
                match self.database.append(key, ShaderEntrySet::clone(&entry)) {
                    Ok(stored) => Some(stored),
                    Err(err) => {
                        log::warn!("Could not store {key}: {err}");
                        Some(entry)
                    }
                }
            }
        }
    }

    /// Creates or refreshes the handler of `key`. Returns `false` when the
    /// device rejected the bytecode.
    fn install(&mut self, key: ShaderKey, entry: Arc<ShaderEntrySet>) -> bool {
        if let Some(handler) = self.handlers.get_mut(&key) {
            if Arc::ptr_eq(handler.entry(), &entry) {
                return true;
            }
            if self.rejected.get(&key) == Some(&entry.content_hash()) {
                return false;
            }
            return match handler.refresh(&self.device, Arc::clone(&entry)) {
                Ok(()) => {
                    self.rejected.remove(&key);
                    true
                }
                Err(err) => {
                    log::warn!("Could not recreate GPU shaders for {key}: {err}");
                    self.rejected.insert(key, entry.content_hash());
                    false
                }
            };
        }

        if self.rejected.get(&key) == Some(&entry.content_hash()) {
            return false;
        }
        match ShaderHandler::create(&self.device, key, Arc::clone(&entry)) {
            Ok(handler) => {
                log::debug!("Created shader handler for {key}");
                self.rejected.remove(&key);
                self.handlers.insert(key, handler);
                true
            }
            Err(err) => {
                log::warn!("Could not create GPU shaders for {key}: {err}");
                self.rejected.insert(key, entry.content_hash());
                false
            }
        }
    }

    #[must_use]
    pub fn error_key(&self) -> ShaderKey {
        self.error_key
    }

    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Destroys every GPU object. Called on drop.
    pub fn destroy_all(&mut self) {
        for handler in self.handlers.values_mut() {
            handler.destroy(&self.device);
        }
        self.handlers.clear();
        self.rejected.clear();
    }
}

impl<D: RenderDevice> Drop for ShaderHandlerManager<D> {
    fn drop(&mut self) {
        self.destroy_all();
    }
}
