//! Session orchestrator

use crate::bridge::HostBridge;
use crate::catalog::Catalog;
use crate::error::{ResolveError, Result, SessionError};
use crate::host::{HostRuntime, ModPartitions, ModsLoadedEvent};
use crate::mod_runtime::{Mod, StageOutcome};
use crate::module::{ModContext, ModuleLoader};
use crate::resolver::DependencyResolver;
use crate::source::AssetSource;
use crate::store::KeyValueStore;
use crate::versions::establish_host_version;
use crate::SessionPhase;
use modboot_config::{validate_config, LoaderConfig};
use modboot_package::{Stage, Version};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// One mod loading session against one host
pub struct ModLoader {
    config: LoaderConfig,
    source: Arc<dyn AssetSource>,
    store: Arc<dyn KeyValueStore>,
    host: Arc<dyn HostRuntime>,
    modules: Arc<dyn ModuleLoader>,
    bridge: HostBridge,
    phase: watch::Sender<SessionPhase>,
    host_version: Option<Version>,
    catalog: Option<Catalog>,
    load_order: Vec<String>,
    mods: Vec<Mod>,
}

impl fmt::Debug for ModLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModLoader")
            .field("phase", &self.phase())
            .field("host_version", &self.host_version)
            .field("load_order", &self.load_order)
            .field("bridge", &self.bridge)
            .finish()
    }
}

impl ModLoader {
    /// Create a new loader builder
    pub fn builder() -> ModLoaderBuilder {
        ModLoaderBuilder::new()
    }

    /// Current phase
    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    /// Subscribe to phase changes
    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    /// Configuration the session runs with
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Host version, once established
    pub fn host_version(&self) -> Option<&Version> {
        self.host_version.as_ref()
    }

    /// Package catalog, once gathered
    pub fn catalog(&self) -> Option<&Catalog> {
        self.catalog.as_ref()
    }

    /// Resolved load order
    pub fn load_order(&self) -> &[String] {
        &self.load_order
    }

    /// Constructed mods in load order
    pub fn mods(&self) -> &[Mod] {
        &self.mods
    }

    /// The host bridge
    pub fn bridge(&self) -> &HostBridge {
        &self.bridge
    }

    /// Run the whole session.
    ///
    /// Fails on the first fatal error: an invalid package, an unsatisfiable
    /// or circular mod set, or a failed host takeover. Mod stage failures
    /// are logged and never fail the session.
    pub async fn start(&mut self) -> Result<()> {
        if self.phase() != SessionPhase::Idle {
            return Err(SessionError::AlreadyStarted);
        }

        match self.run().await {
            Ok(()) => {
                self.enter(SessionPhase::Completed);
                info!(mods = self.mods.len(), "Mod loading complete");
                Ok(())
            }
            Err(e) => {
                error!(phase = %self.phase(), error = %e, "Mod loading failed");
                self.enter(SessionPhase::Failed);
                Err(e)
            }
        }
    }

    async fn run(&mut self) -> Result<()> {
        self.enter(SessionPhase::Versioning);
        let host_version = establish_host_version(
            self.source.as_ref(),
            self.store.as_ref(),
            &self.config.paths.changelog,
        )
        .await;
        info!(version = %host_version, "Host version established");

        self.enter(SessionPhase::Gathering);
        let catalog = Catalog::gather(self.source.as_ref(), &self.config, &host_version).await?;
        self.host_version = Some(host_version);

        self.enter(SessionPhase::Resolving);
        let order = DependencyResolver::new(catalog.packages())
            .priority(self.config.packages.priority_mod.as_deref())
            .max_passes(self.config.packages.max_resolve_passes)
            .order(catalog.mod_ids())?;
        info!(order = ?order, "Load order resolved");

        self.enter(SessionPhase::Constructing);
        self.mods = self.construct_mods(&catalog, &order)?;
        self.load_order = order;
        self.register_mods();
        self.host.expose_versions(catalog.versions());
        self.catalog = Some(catalog);

        self.enter(SessionPhase::Bootstrapping);
        self.bridge.initialize().await?;

        self.run_stage(SessionPhase::PluginStage, Stage::Plugin).await;
        self.run_stage(SessionPhase::PreloadStage, Stage::Preload).await;

        self.enter(SessionPhase::ActivatingHost);
        let loading = self.config.bootstrap.loading_status.clone();
        self.bridge.set_status(&loading);
        self.bridge.activate_host().await?;

        self.run_stage(SessionPhase::PostloadStage, Stage::Postload).await;

        self.enter(SessionPhase::AwaitingReadiness);
        self.bridge.await_readiness().await?;

        self.run_stage(SessionPhase::MainStage, Stage::Main).await;

        self.host.dispatch_event(&ModsLoadedEvent::default());
        self.bridge.teardown();
        Ok(())
    }

    fn construct_mods(&self, catalog: &Catalog, order: &[String]) -> Result<Vec<Mod>> {
        order
            .iter()
            .map(|id| -> Result<Mod> {
                let descriptor = catalog
                    .get(id)
                    .cloned()
                    .ok_or_else(|| ResolveError::UnknownPackage(id.clone()))?;
                let context = ModContext::new(id, descriptor, self.config.paths.mod_base(id));
                Ok(Mod::new(
                    context,
                    self.store.as_ref(),
                    Arc::clone(&self.modules),
                ))
            })
            .collect()
    }

    fn register_mods(&self) {
        let mut registered = self.host.registered_mods();
        let previous = registered.len();

        let (active, inactive): (Vec<&Mod>, Vec<&Mod>) =
            self.mods.iter().partition(|m| m.is_enabled());
        registered.merge(ModPartitions {
            active: active.iter().map(|m| m.summary()).collect(),
            inactive: inactive.iter().map(|m| m.summary()).collect(),
        });

        info!(
            active = active.len(),
            inactive = inactive.len(),
            previous,
            "Mods registered"
        );
        self.host.set_registered_mods(registered);
    }

    async fn run_stage(&mut self, phase: SessionPhase, stage: Stage) {
        self.enter(phase);

        let mut completed = 0usize;
        let mut failed = 0usize;
        for m in &mut self.mods {
            match m.run_stage(stage).await {
                StageOutcome::Completed => completed += 1,
                StageOutcome::Failed(_) => failed += 1,
                StageOutcome::Skipped => {}
            }
        }

        info!(stage = %stage, completed, failed, "Stage finished");
    }

    fn enter(&self, phase: SessionPhase) {
        let previous = self.phase.send_replace(phase);
        tracing::debug!(from = %previous, to = %phase, "Session phase changed");
    }
}

/// Builder for [`ModLoader`]
#[derive(Debug, Default)]
pub struct ModLoaderBuilder {
    config: Option<LoaderConfig>,
    source: Option<Arc<dyn AssetSource>>,
    store: Option<Arc<dyn KeyValueStore>>,
    host: Option<Arc<dyn HostRuntime>>,
    modules: Option<Arc<dyn ModuleLoader>>,
}

impl ModLoaderBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set configuration; defaults apply when unset
    pub fn config(mut self, config: LoaderConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the asset source packages and the entrypoint are read from
    pub fn source(mut self, source: Arc<dyn AssetSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the persisted key-value store
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the host runtime
    pub fn host(mut self, host: Arc<dyn HostRuntime>) -> Self {
        self.host = Some(host);
        self
    }

    /// Set the loader executing mod code
    pub fn modules(mut self, modules: Arc<dyn ModuleLoader>) -> Self {
        self.modules = Some(modules);
        self
    }

    /// Build the loader
    pub fn build(self) -> Result<ModLoader> {
        let config = self.config.unwrap_or_default();
        validate_config(&config)?;

        let source = self
            .source
            .ok_or(SessionError::MissingCollaborator("asset source"))?;
        let store = self
            .store
            .ok_or(SessionError::MissingCollaborator("key-value store"))?;
        let host = self
            .host
            .ok_or(SessionError::MissingCollaborator("host runtime"))?;
        let modules = self
            .modules
            .ok_or(SessionError::MissingCollaborator("module loader"))?;

        let bridge = HostBridge::new(Arc::clone(&host), Arc::clone(&source), &config);
        let (phase, _) = watch::channel(SessionPhase::Idle);

        Ok(ModLoader {
            config,
            source,
            store,
            host,
            modules,
            bridge,
            phase,
            host_version: None,
            catalog: None,
            load_order: Vec::new(),
            mods: Vec::new(),
        })
    }
}
