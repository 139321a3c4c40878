//! Mod code boundary
//!
//! Stage scripts and plugin modules are executed by the host; the loader
//! only asks a [`ModuleLoader`] to run a script or import a module and
//! inspects the module's default export. A default export that can be
//! constructed is a [`PluginFactory`]; its instance receives lifecycle
//! hooks before each stage script runs.

use crate::error::StageError;
use async_trait::async_trait;
use modboot_package::{PackageDescriptor, Version};
use std::fmt;
use std::sync::Arc;

/// What a plugin instance is constructed with
#[derive(Debug, Clone)]
pub struct ModContext {
    id: String,
    descriptor: Arc<PackageDescriptor>,
    base_directory: String,
}

impl ModContext {
    /// Create a context for a mod rooted at `base_directory`
    pub fn new(
        id: impl Into<String>,
        descriptor: Arc<PackageDescriptor>,
        base_directory: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            descriptor,
            base_directory: base_directory.into(),
        }
    }

    /// Mod id (directory name)
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Validated descriptor
    pub fn descriptor(&self) -> &PackageDescriptor {
        &self.descriptor
    }

    /// Display name from the descriptor
    pub fn name(&self) -> &str {
        self.descriptor.display_name()
    }

    /// Declared version
    pub fn version(&self) -> &Version {
        self.descriptor.version()
    }

    /// Directory the mod's files live in, with a trailing slash
    pub fn base_directory(&self) -> &str {
        &self.base_directory
    }

    /// Resolve a path relative to the mod's base directory
    pub fn resolve(&self, entry: &str) -> String {
        let mut relative = entry;
        while let Some(rest) = relative.strip_prefix("./") {
            relative = rest;
        }
        let relative = relative.trim_start_matches('/');

        if self.base_directory.ends_with('/') {
            format!("{}{}", self.base_directory, relative)
        } else {
            format!("{}/{}", self.base_directory, relative)
        }
    }
}

/// A constructed plugin instance
///
/// Every hook is optional; the default does nothing. A hook that fails
/// prevents the matching stage script from running for that mod.
#[async_trait]
pub trait ModPlugin: Send + Sync + fmt::Debug {
    /// Runs before the preload script
    async fn preload(&mut self) -> Result<(), StageError> {
        Ok(())
    }

    /// Runs before the postload script
    async fn postload(&mut self) -> Result<(), StageError> {
        Ok(())
    }

    /// Runs before the prestart script
    async fn prestart(&mut self) -> Result<(), StageError> {
        Ok(())
    }

    /// Runs before the main script
    async fn main(&mut self) -> Result<(), StageError> {
        Ok(())
    }
}

/// Constructible default export of a plugin module
pub trait PluginFactory: Send + Sync + fmt::Debug {
    /// Construct the plugin instance for a mod
    fn construct(&self, context: &ModContext) -> Result<Box<dyn ModPlugin>, StageError>;
}

/// Default export of an imported module
#[derive(Debug, Clone)]
pub enum ModuleExport {
    /// A constructible plugin class
    Plugin(Arc<dyn PluginFactory>),
    /// Any other value; ignored by the loader
    Value(serde_json::Value),
}

impl ModuleExport {
    /// Factory if the export is constructible
    pub fn as_factory(&self) -> Option<&Arc<dyn PluginFactory>> {
        match self {
            ModuleExport::Plugin(factory) => Some(factory),
            ModuleExport::Value(_) => None,
        }
    }
}

/// Result of importing a module
#[derive(Debug, Clone, Default)]
pub struct LoadedModule {
    /// The module's default export, if it has one
    pub default_export: Option<ModuleExport>,
}

impl LoadedModule {
    /// Module exporting a plugin factory
    pub fn plugin(factory: Arc<dyn PluginFactory>) -> Self {
        Self {
            default_export: Some(ModuleExport::Plugin(factory)),
        }
    }

    /// Module without a default export
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Executes mod code inside the host
#[async_trait]
pub trait ModuleLoader: Send + Sync + fmt::Debug {
    /// Import a module and return its exports
    async fn load_module(&self, path: &str) -> Result<LoadedModule, StageError>;

    /// Run a script; completes when the host reports it loaded.
    ///
    /// `is_module` selects module semantics instead of a classic script.
    async fn run_script(&self, path: &str, is_module: bool) -> Result<(), StageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(base: &str) -> ModContext {
        ModContext::new(
            "demo",
            Arc::new(PackageDescriptor::pseudo("Demo", Version::new(1, 0, 0))),
            base,
        )
    }

    #[test]
    fn test_resolve_relative_paths() {
        let ctx = context("/mods/demo/");
        assert_eq!(ctx.resolve("main.js"), "/mods/demo/main.js");
        assert_eq!(ctx.resolve("./lib/plugin.js"), "/mods/demo/lib/plugin.js");
        assert_eq!(ctx.resolve("/postload.js"), "/mods/demo/postload.js");
    }

    #[test]
    fn test_resolve_without_trailing_slash() {
        let ctx = context("/mods/demo");
        assert_eq!(ctx.resolve("main.js"), "/mods/demo/main.js");
    }

    #[test]
    fn test_value_export_is_not_constructible() {
        let export = ModuleExport::Value(serde_json::json!({ "answer": 42 }));
        assert!(export.as_factory().is_none());
        assert!(LoadedModule::empty().default_export.is_none());
    }
}
