//! # Modboot Runtime
//!
//! Loads mods into a running host:
//! - Package catalog gathering and dependency ordering
//! - Per-mod lifecycle stages with failure isolation
//! - Host document takeover and readiness polling
//! - A session orchestrator tying the above together
//!
//! Every outside dependency is a trait object handed to
//! [`ModLoader::builder`]: an [`AssetSource`] for packages and the
//! entrypoint, a [`KeyValueStore`] for persisted overrides, a
//! [`HostRuntime`] for the live host and a [`ModuleLoader`] for mod code.
//!
//! ## Example
//!
//! ```rust,no_run
//! use modboot_runtime::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run(host: Arc<dyn HostRuntime>, modules: Arc<dyn ModuleLoader>) -> Result<()> {
//! let mut loader = ModLoader::builder()
//!     .source(Arc::new(FsAssetSource::new("/opt/crosscode/assets")))
//!     .store(Arc::new(MemoryStore::new()))
//!     .host(host)
//!     .modules(modules)
//!     .build()?;
//!
//! loader.start().await?;
//! println!("loaded {:?}", loader.load_order());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod bridge;
pub mod catalog;
pub mod dom;
pub mod error;
pub mod host;
pub mod loader;
pub mod mod_runtime;
pub mod module;
pub mod resolver;
pub mod source;
pub mod store;
pub mod versions;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::fmt;

pub use bridge::{BridgeState, HostBridge};
pub use catalog::{Catalog, PackageMap};
pub use dom::{Document, Element, NodeId};
pub use error::{
    BridgeError, CatalogError, HostError, ResolveError, Result, SessionError, SourceError,
    StageError,
};
pub use host::{
    BodySlot, HostRuntime, ModPartitions, ModSummary, ModsLoadedEvent, NodeRef, PostloadSignal,
    Visibility,
};
pub use loader::{ModLoader, ModLoaderBuilder};
pub use mod_runtime::{Mod, ModState, StageFailure, StageOutcome};
pub use module::{LoadedModule, ModContext, ModPlugin, ModuleExport, ModuleLoader, PluginFactory};
pub use resolver::DependencyResolver;
pub use source::{AssetSource, FsAssetSource, MemoryAssetSource};
pub use store::{KeyValueStore, MemoryStore};
pub use versions::establish_host_version;

/// Session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// Not started
    Idle,
    /// Establishing the host version
    Versioning,
    /// Fetching and validating packages
    Gathering,
    /// Checking dependencies and ordering mods
    Resolving,
    /// Constructing and registering mods
    Constructing,
    /// Preparing the host document
    Bootstrapping,
    /// Instantiating plugins
    PluginStage,
    /// Running preload scripts
    PreloadStage,
    /// Handing the prepared document to the host
    ActivatingHost,
    /// Running postload scripts
    PostloadStage,
    /// Waiting for the host to report ready
    AwaitingReadiness,
    /// Running main scripts
    MainStage,
    /// Every stage ran and the completion event was dispatched
    Completed,
    /// A fatal error ended the session
    Failed,
}

impl SessionPhase {
    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Versioning => "versioning",
            SessionPhase::Gathering => "gathering",
            SessionPhase::Resolving => "resolving",
            SessionPhase::Constructing => "constructing",
            SessionPhase::Bootstrapping => "bootstrapping",
            SessionPhase::PluginStage => "plugin",
            SessionPhase::PreloadStage => "preload",
            SessionPhase::ActivatingHost => "activating-host",
            SessionPhase::PostloadStage => "postload",
            SessionPhase::AwaitingReadiness => "awaiting-readiness",
            SessionPhase::MainStage => "main",
            SessionPhase::Completed => "completed",
            SessionPhase::Failed => "failed",
        }
    }

    /// Whether the session ended, successfully or not
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionPhase::Completed | SessionPhase::Failed)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::error::{Result, SessionError, StageError};
    pub use crate::host::{HostRuntime, ModPartitions, ModSummary};
    pub use crate::loader::{ModLoader, ModLoaderBuilder};
    pub use crate::mod_runtime::{Mod, ModState};
    pub use crate::module::{LoadedModule, ModContext, ModPlugin, ModuleLoader, PluginFactory};
    pub use crate::source::{AssetSource, FsAssetSource, MemoryAssetSource};
    pub use crate::store::{KeyValueStore, MemoryStore};
    pub use crate::SessionPhase;
    pub use modboot_package::{PackageDescriptor, Stage, Version};
}
