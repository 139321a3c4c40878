//! Mod runtime
//!
//! A [`Mod`] wraps one resolved package and drives it through the
//! lifecycle stages. Stage failures never leave this module: they are
//! logged, recorded on the mod and the stage counts as done, so later
//! stages of the same mod and every other mod still run.

use crate::error::StageError;
use crate::host::ModSummary;
use crate::module::{ModContext, ModPlugin, ModuleLoader};
use crate::store::KeyValueStore;
use modboot_package::{PackageDescriptor, Stage};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Lifecycle position of a mod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModState {
    /// Created, no stage attempted
    Constructed,
    /// Plugin stage done
    PluginLoaded,
    /// Preload stage done
    Preloaded,
    /// Postload stage done
    Postloaded,
    /// Main stage done
    MainExecuted,
    /// Disabled; no stage will run
    Skipped,
}

impl ModState {
    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            ModState::Constructed => "constructed",
            ModState::PluginLoaded => "plugin-loaded",
            ModState::Preloaded => "preloaded",
            ModState::Postloaded => "postloaded",
            ModState::MainExecuted => "main-executed",
            ModState::Skipped => "skipped",
        }
    }

    /// State a scheduled stage starts from and the state it leads to
    fn transition(stage: Stage) -> Option<(ModState, ModState)> {
        match stage {
            Stage::Plugin => Some((ModState::Constructed, ModState::PluginLoaded)),
            Stage::Preload => Some((ModState::PluginLoaded, ModState::Preloaded)),
            Stage::Postload => Some((ModState::Preloaded, ModState::Postloaded)),
            Stage::Main => Some((ModState::Postloaded, ModState::MainExecuted)),
            Stage::Prestart => None,
        }
    }
}

impl fmt::Display for ModState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of attempting one stage
#[derive(Debug, Clone)]
pub enum StageOutcome {
    /// The stage ran without error (or had nothing to run)
    Completed,
    /// The stage ran and failed; the failure was logged
    Failed(StageError),
    /// The stage did not run
    Skipped,
}

impl StageOutcome {
    /// Whether the stage failed
    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutcome::Failed(_))
    }
}

/// A recorded stage failure
#[derive(Debug, Clone)]
pub struct StageFailure {
    /// Stage that failed
    pub stage: Stage,
    /// What went wrong
    pub error: StageError,
}

/// One mod of the session
pub struct Mod {
    context: ModContext,
    enabled: bool,
    state: ModState,
    prestarted: bool,
    plugin: Option<Box<dyn ModPlugin>>,
    failures: Vec<StageFailure>,
    modules: Arc<dyn ModuleLoader>,
}

impl Mod {
    /// Construct a mod; its enabled flag is read from the store once, here
    pub fn new(
        context: ModContext,
        store: &dyn KeyValueStore,
        modules: Arc<dyn ModuleLoader>,
    ) -> Self {
        let enabled = store.is_mod_enabled(context.id());
        let state = if enabled {
            ModState::Constructed
        } else {
            ModState::Skipped
        };

        debug!(mod_id = %context.id(), enabled, "Mod constructed");

        Self {
            context,
            enabled,
            state,
            prestarted: false,
            plugin: None,
            failures: Vec::new(),
            modules,
        }
    }

    /// Mod id
    pub fn id(&self) -> &str {
        self.context.id()
    }

    /// Descriptor
    pub fn descriptor(&self) -> &PackageDescriptor {
        self.context.descriptor()
    }

    /// Context handed to the plugin
    pub fn context(&self) -> &ModContext {
        &self.context
    }

    /// Whether the mod runs any stage
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current lifecycle state
    pub fn state(&self) -> ModState {
        self.state
    }

    /// Whether a plugin instance was constructed
    pub fn has_plugin(&self) -> bool {
        self.plugin.is_some()
    }

    /// Every stage failure so far, in order
    pub fn failures(&self) -> &[StageFailure] {
        &self.failures
    }

    /// The path, if the descriptor declares it as an asset
    pub fn asset<'a>(&self, path: &'a str) -> Option<&'a str> {
        self.descriptor()
            .assets()
            .filter(|assets| assets.iter().any(|asset| asset == path))
            .map(|_| path)
    }

    /// The mod as the host registries list it
    pub fn summary(&self) -> ModSummary {
        ModSummary {
            id: self.id().to_string(),
            name: self.context.name().to_string(),
            version: self.context.version().clone(),
            base_directory: self.context.base_directory().to_string(),
        }
    }

    /// Run one lifecycle stage.
    ///
    /// Scheduled stages must run in order and at most once; prestart may run
    /// once at any point after construction without moving the state.
    pub async fn run_stage(&mut self, stage: Stage) -> StageOutcome {
        if !self.enabled {
            return StageOutcome::Skipped;
        }

        let next = match ModState::transition(stage) {
            Some((expected, next)) if self.state == expected => Some(next),
            Some((expected, _)) => {
                warn!(
                    mod_id = %self.id(),
                    stage = %stage,
                    expected = %expected,
                    state = %self.state,
                    "Stage out of order, skipping"
                );
                return StageOutcome::Skipped;
            }
            None if self.prestarted => {
                warn!(mod_id = %self.id(), stage = %stage, "Stage already ran, skipping");
                return StageOutcome::Skipped;
            }
            None => None,
        };

        let result = match stage {
            Stage::Plugin => self.load_plugin().await,
            _ => self.run_entry(stage).await,
        };

        match next {
            Some(next) => self.state = next,
            None => self.prestarted = true,
        }

        match result {
            Ok(()) => StageOutcome::Completed,
            Err(e) => {
                error!(
                    mod_id = %self.id(),
                    name = %self.context.name(),
                    stage = %stage,
                    error = %e,
                    "Mod stage failed"
                );
                self.failures.push(StageFailure {
                    stage,
                    error: e.clone(),
                });
                StageOutcome::Failed(e)
            }
        }
    }

    async fn load_plugin(&mut self) -> Result<(), StageError> {
        let Some(entry) = self.descriptor().entry_point(Stage::Plugin) else {
            return Ok(());
        };
        let path = self.context.resolve(entry);

        let module = self.modules.load_module(&path).await?;
        let Some(factory) = module.default_export.as_ref().and_then(|e| e.as_factory()) else {
            debug!(mod_id = %self.id(), path = %path, "Plugin export is not constructible");
            return Ok(());
        };

        self.plugin = Some(factory.construct(&self.context)?);
        debug!(mod_id = %self.id(), path = %path, "Plugin instantiated");
        Ok(())
    }

    async fn run_entry(&mut self, stage: Stage) -> Result<(), StageError> {
        if let Some(plugin) = self.plugin.as_mut() {
            match stage {
                Stage::Preload => plugin.preload().await?,
                Stage::Postload => plugin.postload().await?,
                Stage::Prestart => plugin.prestart().await?,
                Stage::Main => plugin.main().await?,
                Stage::Plugin => {}
            }
        }

        let Some(entry) = self.descriptor().entry_point(stage) else {
            return Ok(());
        };
        let path = self.context.resolve(entry);
        let is_module = self.descriptor().is_module();

        self.modules.run_script(&path, is_module).await?;
        debug!(mod_id = %self.id(), stage = %stage, path = %path, "Stage script ran");
        Ok(())
    }
}

impl fmt::Debug for Mod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mod")
            .field("id", &self.id())
            .field("enabled", &self.enabled)
            .field("state", &self.state)
            .field("has_plugin", &self.plugin.is_some())
            .field("failures", &self.failures.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{mod_enabled_key, MemoryStore};
    use crate::testing::{Journal, RecordingPluginFactory, ScriptedModules};
    use serde_json::json;

    fn descriptor(value: serde_json::Value) -> Arc<PackageDescriptor> {
        Arc::new(PackageDescriptor::from_value(value).unwrap())
    }

    fn build(
        id: &str,
        value: serde_json::Value,
        modules: &ScriptedModules,
        store: &MemoryStore,
    ) -> Mod {
        let context = ModContext::new(id, descriptor(value), format!("/mods/{id}/"));
        Mod::new(context, store, Arc::new(modules.clone()))
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let journal = Journal::new();
        let modules = ScriptedModules::new(journal.clone());
        let store = MemoryStore::new();
        let mut m = build(
            "demo",
            json!({
                "name": "demo",
                "version": "1.0.0",
                "preload": "pre.js",
                "postload": "post.js",
                "main": "main.js"
            }),
            &modules,
            &store,
        );

        for stage in Stage::SCHEDULED {
            assert!(matches!(m.run_stage(stage).await, StageOutcome::Completed));
        }

        assert_eq!(m.state(), ModState::MainExecuted);
        assert_eq!(
            journal.entries(),
            vec![
                "run:/mods/demo/pre.js",
                "run:/mods/demo/post.js",
                "run:/mods/demo/main.js"
            ]
        );
    }

    #[tokio::test]
    async fn test_stage_runs_at_most_once() {
        let journal = Journal::new();
        let modules = ScriptedModules::new(journal.clone());
        let store = MemoryStore::new();
        let mut m = build(
            "demo",
            json!({ "name": "demo", "version": "1.0.0", "preload": "pre.js" }),
            &modules,
            &store,
        );

        m.run_stage(Stage::Plugin).await;
        m.run_stage(Stage::Preload).await;
        assert!(matches!(m.run_stage(Stage::Preload).await, StageOutcome::Skipped));
        assert!(matches!(m.run_stage(Stage::Plugin).await, StageOutcome::Skipped));
        assert_eq!(journal.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_out_of_order_stage_skipped() {
        let modules = ScriptedModules::new(Journal::new());
        let store = MemoryStore::new();
        let mut m = build(
            "demo",
            json!({ "name": "demo", "version": "1.0.0", "main": "main.js" }),
            &modules,
            &store,
        );

        assert!(matches!(m.run_stage(Stage::Main).await, StageOutcome::Skipped));
        assert_eq!(m.state(), ModState::Constructed);
    }

    #[tokio::test]
    async fn test_failure_recorded_and_later_stages_run() {
        let journal = Journal::new();
        let modules = ScriptedModules::new(journal.clone()).fail("/mods/demo/pre.js");
        let store = MemoryStore::new();
        let mut m = build(
            "demo",
            json!({
                "name": "demo",
                "version": "1.0.0",
                "preload": "pre.js",
                "postload": "post.js"
            }),
            &modules,
            &store,
        );

        m.run_stage(Stage::Plugin).await;
        assert!(m.run_stage(Stage::Preload).await.is_failed());
        assert!(matches!(m.run_stage(Stage::Postload).await, StageOutcome::Completed));

        assert_eq!(m.state(), ModState::Postloaded);
        assert_eq!(m.failures().len(), 1);
        assert_eq!(m.failures()[0].stage, Stage::Preload);
        assert!(journal.entries().contains(&"run:/mods/demo/post.js".to_string()));
    }

    #[tokio::test]
    async fn test_disabled_mod_runs_nothing() {
        let journal = Journal::new();
        let modules = ScriptedModules::new(journal.clone());
        let store = MemoryStore::from_entries([(mod_enabled_key("Demo"), "false")]);
        let mut m = build(
            "Demo",
            json!({ "name": "Demo", "version": "1.0.0", "plugin": "plugin.js", "main": "main.js" }),
            &modules,
            &store,
        );

        assert!(!m.is_enabled());
        for stage in Stage::SCHEDULED {
            assert!(matches!(m.run_stage(stage).await, StageOutcome::Skipped));
        }
        assert_eq!(m.state(), ModState::Skipped);
        assert!(journal.entries().is_empty());
    }

    #[tokio::test]
    async fn test_plugin_hook_runs_before_script() {
        let journal = Journal::new();
        let factory = RecordingPluginFactory::new(journal.clone());
        let modules = ScriptedModules::new(journal.clone())
            .export_plugin("/mods/demo/plugin.js", Arc::new(factory));
        let store = MemoryStore::new();
        let mut m = build(
            "demo",
            json!({
                "name": "demo",
                "version": "1.0.0",
                "plugin": "plugin.js",
                "preload": "pre.js"
            }),
            &modules,
            &store,
        );

        m.run_stage(Stage::Plugin).await;
        assert!(m.has_plugin());
        m.run_stage(Stage::Preload).await;

        assert_eq!(
            journal.entries(),
            vec![
                "load:/mods/demo/plugin.js",
                "construct:demo",
                "hook:demo:preload",
                "run:/mods/demo/pre.js"
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_hook_skips_script() {
        let journal = Journal::new();
        let factory = RecordingPluginFactory::new(journal.clone()).fail_on(Stage::Preload);
        let modules = ScriptedModules::new(journal.clone())
            .export_plugin("/mods/demo/plugin.js", Arc::new(factory));
        let store = MemoryStore::new();
        let mut m = build(
            "demo",
            json!({
                "name": "demo",
                "version": "1.0.0",
                "plugin": "plugin.js",
                "preload": "pre.js"
            }),
            &modules,
            &store,
        );

        m.run_stage(Stage::Plugin).await;
        assert!(m.run_stage(Stage::Preload).await.is_failed());
        assert!(!journal.entries().contains(&"run:/mods/demo/pre.js".to_string()));
        assert_eq!(m.state(), ModState::Preloaded);
    }

    #[tokio::test]
    async fn test_non_constructible_export_is_noop() {
        let journal = Journal::new();
        let modules = ScriptedModules::new(journal.clone());
        let store = MemoryStore::new();
        let mut m = build(
            "demo",
            json!({ "name": "demo", "version": "1.0.0", "plugin": "plugin.js" }),
            &modules,
            &store,
        );

        assert!(matches!(m.run_stage(Stage::Plugin).await, StageOutcome::Completed));
        assert!(!m.has_plugin());
        assert_eq!(m.state(), ModState::PluginLoaded);
    }

    fn with_plugin(name: &str) -> serde_json::Value {
        json!({
            "name": name,
            "version": "1.0.0",
            "plugin": "plugin.js",
            "preload": "pre.js",
            "postload": "post.js",
            "main": "main.js"
        })
    }

    #[tokio::test]
    async fn test_plugin_import_failure_keeps_later_stages() {
        let journal = Journal::new();
        let modules = ScriptedModules::new(journal.clone()).fail("/mods/demo/plugin.js");
        let store = MemoryStore::new();
        let mut m = build("demo", with_plugin("demo"), &modules, &store);

        assert!(m.run_stage(Stage::Plugin).await.is_failed());
        assert!(!m.has_plugin());
        assert_eq!(m.state(), ModState::PluginLoaded);
        assert_eq!(m.failures().len(), 1);
        assert_eq!(m.failures()[0].stage, Stage::Plugin);

        for stage in [Stage::Preload, Stage::Postload, Stage::Main] {
            assert!(matches!(m.run_stage(stage).await, StageOutcome::Completed));
        }
        assert_eq!(m.state(), ModState::MainExecuted);
        assert_eq!(
            journal.entries(),
            vec![
                "load:/mods/demo/plugin.js",
                "run:/mods/demo/pre.js",
                "run:/mods/demo/post.js",
                "run:/mods/demo/main.js"
            ]
        );
    }

    #[tokio::test]
    async fn test_plugin_construct_failure_keeps_later_stages() {
        let journal = Journal::new();
        let factory = RecordingPluginFactory::new(journal.clone()).fail_construct();
        let modules = ScriptedModules::new(journal.clone())
            .export_plugin("/mods/demo/plugin.js", Arc::new(factory));
        let store = MemoryStore::new();
        let mut m = build("demo", with_plugin("demo"), &modules, &store);

        assert!(m.run_stage(Stage::Plugin).await.is_failed());
        assert!(!m.has_plugin());
        assert_eq!(m.state(), ModState::PluginLoaded);
        assert_eq!(m.failures()[0].stage, Stage::Plugin);

        for stage in [Stage::Preload, Stage::Postload, Stage::Main] {
            m.run_stage(stage).await;
        }
        assert_eq!(m.state(), ModState::MainExecuted);
        assert_eq!(m.failures().len(), 1);
        assert!(!journal.contains("construct:demo"));
        assert!(journal.contains("run:/mods/demo/main.js"));
        assert!(!journal.entries().iter().any(|e| e.starts_with("hook:")));
    }

    #[tokio::test]
    async fn test_value_export_is_not_a_plugin() {
        let journal = Journal::new();
        let modules = ScriptedModules::new(journal.clone())
            .export_value("/mods/demo/plugin.js", json!({ "default": 42 }));
        let store = MemoryStore::new();
        let mut m = build("demo", with_plugin("demo"), &modules, &store);

        assert!(matches!(m.run_stage(Stage::Plugin).await, StageOutcome::Completed));
        assert!(!m.has_plugin());
        assert!(m.failures().is_empty());

        m.run_stage(Stage::Preload).await;
        assert_eq!(
            journal.entries(),
            vec!["load:/mods/demo/plugin.js", "run:/mods/demo/pre.js"]
        );
    }

    #[tokio::test]
    async fn test_prestart_runs_once_without_state_change() {
        let journal = Journal::new();
        let modules = ScriptedModules::new(journal.clone());
        let store = MemoryStore::new();
        let mut m = build(
            "demo",
            json!({ "name": "demo", "version": "1.0.0", "prestart": "prestart.js" }),
            &modules,
            &store,
        );

        assert!(matches!(m.run_stage(Stage::Prestart).await, StageOutcome::Completed));
        assert!(matches!(m.run_stage(Stage::Prestart).await, StageOutcome::Skipped));
        assert_eq!(m.state(), ModState::Constructed);
        assert_eq!(journal.entries(), vec!["run:/mods/demo/prestart.js"]);
    }

    #[test]
    fn test_assets_and_summary() {
        let modules = ScriptedModules::new(Journal::new());
        let store = MemoryStore::new();
        let m = build(
            "demo",
            json!({
                "name": "demo",
                "ccmodHumanName": "Demo Mod",
                "version": "2.1.0",
                "assets": ["data/maps/test.json"]
            }),
            &modules,
            &store,
        );

        assert_eq!(m.asset("data/maps/test.json"), Some("data/maps/test.json"));
        assert_eq!(m.asset("data/maps/other.json"), None);

        let summary = m.summary();
        assert_eq!(summary.name, "Demo Mod");
        assert_eq!(summary.base_directory, "/mods/demo/");
    }
}
