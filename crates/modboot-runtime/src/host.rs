//! Host runtime boundary
//!
//! Everything the loader reads from or writes to the running host goes
//! through [`HostRuntime`], a capability object handed to the session at
//! construction. Field names the host exposes to mods (`activeMods`,
//! `inactiveMods`, `versions`, `postload`, the `modsLoaded` event) are the
//! host's concern; this trait only carries the values.

use crate::dom::Document;
use crate::error::HostError;
use async_trait::async_trait;
use modboot_package::Version;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Script the host evaluates to fire the postload signal
pub const POSTLOAD_HOOK_SCRIPT: &str = "window.postload()";

/// Opaque handle to a node of the live host document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef(pub u64);

/// Redirection target for the host's body accessor.
///
/// Once installed, every read or write of the document body the host
/// performs lands in this slot instead of the real body.
#[derive(Debug, Clone, Default)]
pub struct BodySlot {
    current: Arc<RwLock<Option<NodeRef>>>,
}

impl BodySlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Current body as seen by the host
    pub fn get(&self) -> Option<NodeRef> {
        *self.current.read()
    }

    /// Replace the body the host sees
    pub fn set(&self, body: Option<NodeRef>) {
        *self.current.write() = body;
    }
}

/// One-shot signal the host fires when it evaluates [`POSTLOAD_HOOK_SCRIPT`]
#[derive(Debug, Clone)]
pub struct PostloadSignal {
    sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl PostloadSignal {
    /// Create a signal and the receiver awaiting it
    pub fn channel() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                sender: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Fire the signal; returns `false` if it already fired or nobody waits
    pub fn fire(&self) -> bool {
        self.sender
            .lock()
            .take()
            .map(|tx| tx.send(()).is_ok())
            .unwrap_or(false)
    }

    /// Whether the signal already fired
    pub fn is_fired(&self) -> bool {
        self.sender.lock().is_none()
    }
}

/// Visibility of a live element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Shown
    Visible,
    /// Hidden but still laid out
    Hidden,
}

/// The completion event dispatched once per session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModsLoadedEvent {
    /// Event name
    pub name: &'static str,
    /// Whether the event bubbles
    pub bubbles: bool,
    /// Whether the event is cancelable
    pub cancelable: bool,
}

impl Default for ModsLoadedEvent {
    fn default() -> Self {
        Self {
            name: "modsLoaded",
            bubbles: true,
            cancelable: true,
        }
    }
}

/// A mod as the host sees it in its registries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModSummary {
    /// Mod id
    pub id: String,
    /// Display name
    pub name: String,
    /// Version
    pub version: Version,
    /// Base directory
    pub base_directory: String,
}

/// The host's active and inactive mod registries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModPartitions {
    /// Enabled mods
    pub active: Vec<ModSummary>,
    /// Disabled mods
    pub inactive: Vec<ModSummary>,
}

impl ModPartitions {
    /// Append another partition set, keeping entries already present
    pub fn merge(&mut self, other: ModPartitions) {
        self.active.extend(other.active);
        self.inactive.extend(other.inactive);
    }

    /// Total number of registered mods
    pub fn len(&self) -> usize {
        self.active.len() + self.inactive.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Capabilities of the running host the loader depends on
#[async_trait]
pub trait HostRuntime: Send + Sync + fmt::Debug {
    /// Parse entrypoint markup into a detached document
    fn parse_document(&self, markup: &str) -> Result<Document, HostError>;

    /// Inner markup of a live element
    fn element_inner_html(&self, id: &str) -> Option<String>;

    /// Replace the text of a live element, if present
    fn set_element_text(&self, id: &str, text: &str);

    /// Change the visibility of a live element, if present
    fn set_element_visibility(&self, id: &str, visibility: Visibility);

    /// Route the host's body accessor through `slot` from now on
    fn redirect_body(&self, slot: BodySlot);

    /// Make the postload signal callable from host scripts
    fn expose_postload(&self, signal: PostloadSignal);

    /// Replace the live document with `markup` and let the host evaluate it
    async fn write_document(&self, markup: String) -> Result<(), HostError>;

    /// The real body of the live document, bypassing any redirection
    fn actual_body(&self) -> Option<NodeRef>;

    /// Invoke the host's DOM-ready hook; returns whether one exists
    fn invoke_dom_ready(&self) -> bool;

    /// The host's readiness flag
    fn is_ready(&self) -> bool;

    /// Mods registered so far, possibly by an earlier loader
    fn registered_mods(&self) -> ModPartitions;

    /// Replace the registered mods
    fn set_registered_mods(&self, mods: ModPartitions);

    /// Publish the id to version table of the session's packages
    fn expose_versions(&self, versions: BTreeMap<String, String>);

    /// Dispatch an event on the live document body
    fn dispatch_event(&self, event: &ModsLoadedEvent);
}
