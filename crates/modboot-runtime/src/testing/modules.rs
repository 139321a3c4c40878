//! Scripted module loader and recording plugins

use super::Journal;
use crate::error::StageError;
use crate::module::{
    LoadedModule, ModContext, ModPlugin, ModuleExport, ModuleLoader, PluginFactory,
};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use modboot_package::Stage;
use std::sync::Arc;

/// Module loader whose scripts succeed unless told otherwise
///
/// Records `run:{path}` for every script and `load:{path}` for every
/// module import.
#[derive(Debug, Clone)]
pub struct ScriptedModules {
    journal: Journal,
    failing: Arc<DashSet<String>>,
    exports: Arc<DashMap<String, ModuleExport>>,
}

impl ScriptedModules {
    /// Create a loader recording into `journal`
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            failing: Arc::new(DashSet::new()),
            exports: Arc::new(DashMap::new()),
        }
    }

    /// Make the script or module at `path` fail
    pub fn fail(self, path: impl Into<String>) -> Self {
        self.failing.insert(path.into());
        self
    }

    /// Make the module at `path` export a plugin factory
    pub fn export_plugin(self, path: impl Into<String>, factory: Arc<dyn PluginFactory>) -> Self {
        self.exports.insert(path.into(), ModuleExport::Plugin(factory));
        self
    }

    /// Make the module at `path` export a plain value
    pub fn export_value(self, path: impl Into<String>, value: serde_json::Value) -> Self {
        self.exports.insert(path.into(), ModuleExport::Value(value));
        self
    }

    /// The journal this loader records into
    pub fn journal(&self) -> &Journal {
        &self.journal
    }
}

#[async_trait]
impl ModuleLoader for ScriptedModules {
    async fn load_module(&self, path: &str) -> Result<LoadedModule, StageError> {
        self.journal.push(format!("load:{path}"));
        if self.failing.contains(path) {
            return Err(StageError::module(path, "scripted failure"));
        }

        Ok(LoadedModule {
            default_export: self.exports.get(path).map(|e| e.value().clone()),
        })
    }

    async fn run_script(&self, path: &str, _is_module: bool) -> Result<(), StageError> {
        self.journal.push(format!("run:{path}"));
        if self.failing.contains(path) {
            return Err(StageError::script(path, "scripted failure"));
        }
        Ok(())
    }
}

/// Factory building [`RecordingPlugin`]s
///
/// Records `construct:{id}` for every instance.
#[derive(Debug, Clone)]
pub struct RecordingPluginFactory {
    journal: Journal,
    fail_on: Arc<DashSet<Stage>>,
    fail_construct: bool,
}

impl RecordingPluginFactory {
    /// Create a factory recording into `journal`
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            fail_on: Arc::new(DashSet::new()),
            fail_construct: false,
        }
    }

    /// Make the hook for `stage` fail
    pub fn fail_on(self, stage: Stage) -> Self {
        self.fail_on.insert(stage);
        self
    }

    /// Make construction itself fail
    pub fn fail_construct(mut self) -> Self {
        self.fail_construct = true;
        self
    }
}

impl PluginFactory for RecordingPluginFactory {
    fn construct(&self, context: &ModContext) -> Result<Box<dyn ModPlugin>, StageError> {
        if self.fail_construct {
            return Err(StageError::hook("scripted constructor failure"));
        }

        self.journal.push(format!("construct:{}", context.id()));
        Ok(Box::new(RecordingPlugin {
            id: context.id().to_string(),
            journal: self.journal.clone(),
            fail_on: Arc::clone(&self.fail_on),
        }))
    }
}

/// Plugin recording `hook:{id}:{stage}` for every hook call
#[derive(Debug)]
pub struct RecordingPlugin {
    id: String,
    journal: Journal,
    fail_on: Arc<DashSet<Stage>>,
}

impl RecordingPlugin {
    fn hook(&self, stage: Stage) -> Result<(), StageError> {
        self.journal.push(format!("hook:{}:{}", self.id, stage));
        if self.fail_on.contains(&stage) {
            return Err(StageError::hook(format!("scripted {stage} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl ModPlugin for RecordingPlugin {
    async fn preload(&mut self) -> Result<(), StageError> {
        self.hook(Stage::Preload)
    }

    async fn postload(&mut self) -> Result<(), StageError> {
        self.hook(Stage::Postload)
    }

    async fn prestart(&mut self) -> Result<(), StageError> {
        self.hook(Stage::Prestart)
    }

    async fn main(&mut self) -> Result<(), StageError> {
        self.hook(Stage::Main)
    }
}
