//! Shader System
//!
//! Application context owning the shader services. Construction order is
//! database, watcher, compiler, handler manager; teardown runs in reverse.
//!
//! ```rust,ignore
//! let settings = ShaderSystemSettings::from_json_file("shaders.json")?;
//! let mut shaders = ShaderSystem::initialize(settings, variations, backend, providers, device)?;
//!
//! let handler = shaders.get_shader_handler_for_shader_key(key);
//! ```

use std::sync::Arc;

use myth_shader_core::{ShaderError, ShaderKey, ShaderVariationSetManager};

use crate::backend::{NativeShaderCompiler, RenderDevice};
use crate::compiler::ShaderCompiler;
use crate::database::ShaderDatabase;
use crate::errors::Result;
use crate::handler::ShaderHandler;
use crate::handler_manager::ShaderHandlerManager;
use crate::input_provider::ShaderInputProviderRegistry;
use crate::settings::ShaderSystemSettings;
use crate::watcher::ShaderWatcher;

pub struct ShaderSystem<D: RenderDevice> {
    settings: ShaderSystemSettings,
    // Field order is drop order.
    handler_manager: Option<ShaderHandlerManager<D>>,
    compiler: Arc<ShaderCompiler>,
    watcher: Arc<ShaderWatcher>,
    database: Arc<ShaderDatabase>,
}

impl<D: RenderDevice> ShaderSystem<D> {
    /// Builds and starts every service.
    ///
    /// A database that fails validation is discarded and rebuilt; every other
    /// failure, including a mandatory shader that does not compile, aborts
    /// initialization.
    pub fn initialize(
        settings: ShaderSystemSettings,
        variations: Arc<ShaderVariationSetManager>,
        backend: Arc<dyn NativeShaderCompiler>,
        providers: Arc<ShaderInputProviderRegistry>,
        device: D,
    ) -> Result<Self> {
        let schema = Arc::clone(variations.key_groups().schema());

        let mandatory_families = settings
            .mandatory_families
            .iter()
            .map(|name| {
                schema
                    .find_family(name)
                    .ok_or_else(|| ShaderError::UnknownFamilyName(name.clone()))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // =========================================================
        // 1. Database
        // =========================================================
        let database = Arc::new(ShaderDatabase::new());
        match database.load(&settings.database_path) {
            Ok(count) => log::info!(
                "Shader database {} loaded ({count} entries)",
                settings.database_path.display()
            ),
            Err(err) if database.is_loaded() => {
                log::warn!("Shader database rebuilt from scratch: {err}");
            }
            Err(err) => return Err(err),
        }

        // =========================================================
        // 2. Watcher
        // =========================================================
        let watcher = Arc::new(ShaderWatcher::new(
            &settings.shader_directory,
            settings.watcher.clone(),
            Arc::clone(&schema),
        ));
        watcher.start()?;

        // =========================================================
        // 3. Compiler
        // =========================================================
        let compiler = Arc::new(ShaderCompiler::new(
            &settings.shader_directory,
            settings.compiler.clone(),
            variations,
            backend,
            providers,
            Arc::clone(&database),
            Arc::clone(&watcher),
        ));
        compiler.start()?;

        // =========================================================
        // 4. Handler manager
        // =========================================================
        let mut handler_manager = ShaderHandlerManager::new(
            device,
            Arc::clone(&database),
            Arc::clone(&watcher),
            Arc::clone(&compiler),
        );
        handler_manager.initialize(&mandatory_families)?;

        Ok(Self {
            settings,
            handler_manager: Some(handler_manager),
            compiler,
            watcher,
            database,
        })
    }

    /// See [`ShaderHandlerManager::get_shader_handler_for_shader_key`].
    ///
    /// # Panics
    ///
    /// After [`shutdown`](Self::shutdown).
    pub fn get_shader_handler_for_shader_key(&mut self, key: ShaderKey) -> &ShaderHandler {
        match self.handler_manager.as_mut() {
            Some(manager) => manager.get_shader_handler_for_shader_key(key),
            None => panic!("ShaderSystem used after shutdown"),
        }
    }

    /// Stops the threads and releases GPU objects, in reverse construction
    /// order. Called on drop.
    pub fn shutdown(&mut self) {
        let Some(mut handler_manager) = self.handler_manager.take() else {
            return;
        };
        handler_manager.destroy_all();
        drop(handler_manager);

        self.compiler.stop_thread();
        self.watcher.stop_thread();
        self.database.close();
        log::info!("Shader system shut down");
    }

    #[must_use]
    pub fn settings(&self) -> &ShaderSystemSettings {
        &self.settings
    }

    #[must_use]
    pub fn database(&self) -> &Arc<ShaderDatabase> {
        &self.database
    }

    #[must_use]
    pub fn watcher(&self) -> &Arc<ShaderWatcher> {
        &self.watcher
    }

    #[must_use]
    pub fn compiler(&self) -> &Arc<ShaderCompiler> {
        &self.compiler
    }

    #[must_use]
    pub fn handler_manager(&self) -> Option<&ShaderHandlerManager<D>> {
        self.handler_manager.as_ref()
    }
}

impl<D: RenderDevice> Drop for ShaderSystem<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
