//! Test fakes for the host, the module loader and plugins
//!
//! Every fake appends to a shared [`Journal`] so tests can assert the
//! global order of stage scripts, plugin hooks and host interactions.

pub mod fixtures;
pub mod host;
pub mod modules;

pub use fixtures::{game_source, mod_package, ENTRYPOINT_MARKUP};
pub use host::FakeHost;
pub use modules::{RecordingPlugin, RecordingPluginFactory, ScriptedModules};

use parking_lot::Mutex;
use std::sync::Arc;

/// Shared, ordered record of interactions
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    /// Create an empty journal
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    /// Snapshot of every entry
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Position of the first matching entry
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries.lock().iter().position(|e| e == entry)
    }

    /// Whether an entry was recorded
    pub fn contains(&self, entry: &str) -> bool {
        self.position(entry).is_some()
    }
}
