//! In-memory host runtime

use super::Journal;
use crate::dom::{Document, Element};
use crate::error::HostError;
use crate::host::{
    BodySlot, HostRuntime, ModPartitions, ModsLoadedEvent, NodeRef, PostloadSignal, Visibility,
    POSTLOAD_HOOK_SCRIPT,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Body handle the fake reports as the real document body
pub const FAKE_BODY: NodeRef = NodeRef(1);

#[derive(Debug, Default)]
struct State {
    documents: Vec<String>,
    texts: HashMap<String, String>,
    visibility: HashMap<String, Visibility>,
    inner_html: HashMap<String, String>,
    body_slot: Option<BodySlot>,
    postload: Option<PostloadSignal>,
    registered: ModPartitions,
    versions: Option<BTreeMap<String, String>>,
    events: Vec<ModsLoadedEvent>,
    dom_ready_calls: usize,
    polls: usize,
    ready_after: Option<usize>,
    swallow_postload: bool,
}

/// Host that records every interaction
///
/// `parse_document` understands just enough markup for the bootstrap:
/// an element with `id="game"` becomes a `div#game` in the body and a
/// `<script>` becomes a body script holding `boot()`. Writing a document
/// that contains the postload hook fires the exposed signal, the way a
/// real host evaluating the written scripts would.
#[derive(Debug, Clone)]
pub struct FakeHost {
    journal: Journal,
    state: Arc<Mutex<State>>,
}

impl FakeHost {
    /// Host that reports ready on the first poll
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            state: Arc::new(Mutex::new(State {
                ready_after: Some(1),
                ..State::default()
            })),
        }
    }

    /// Report ready on poll number `polls`
    pub fn ready_after(self, polls: usize) -> Self {
        self.state.lock().ready_after = Some(polls);
        self
    }

    /// Never report ready
    pub fn never_ready(self) -> Self {
        self.state.lock().ready_after = None;
        self
    }

    /// Drop the postload signal instead of firing it
    pub fn swallow_postload(self) -> Self {
        self.state.lock().swallow_postload = true;
        self
    }

    /// Mods registered by an earlier session
    pub fn with_registered(self, mods: ModPartitions) -> Self {
        self.state.lock().registered = mods;
        self
    }

    /// Inner markup of a live element
    pub fn with_inner_html(self, id: impl Into<String>, html: impl Into<String>) -> Self {
        self.state.lock().inner_html.insert(id.into(), html.into());
        self
    }

    /// Every document written, in order
    pub fn documents(&self) -> Vec<String> {
        self.state.lock().documents.clone()
    }

    /// Text last set on a live element
    pub fn element_text(&self, id: &str) -> Option<String> {
        self.state.lock().texts.get(id).cloned()
    }

    /// Visibility last set on a live element
    pub fn visibility(&self, id: &str) -> Option<Visibility> {
        self.state.lock().visibility.get(id).copied()
    }

    /// Installed body redirection, if any
    pub fn body_slot(&self) -> Option<BodySlot> {
        self.state.lock().body_slot.clone()
    }

    /// Version table handed to the host
    pub fn versions(&self) -> Option<BTreeMap<String, String>> {
        self.state.lock().versions.clone()
    }

    /// Dispatched events
    pub fn events(&self) -> Vec<ModsLoadedEvent> {
        self.state.lock().events.clone()
    }

    /// Number of DOM-ready hook invocations
    pub fn dom_ready_calls(&self) -> usize {
        self.state.lock().dom_ready_calls
    }

    /// Number of readiness polls
    pub fn polls(&self) -> usize {
        self.state.lock().polls
    }
}

#[async_trait]
impl HostRuntime for FakeHost {
    fn parse_document(&self, markup: &str) -> Result<Document, HostError> {
        if markup.trim().is_empty() {
            return Err(HostError::Parse("empty markup".to_string()));
        }

        let mut document = Document::new();
        let body = document.body();
        if markup.contains(r#"id="game""#) {
            document.append_child(body, Element::new("div").id("game"));
        }
        if markup.contains("<script") {
            document.append_child(body, Element::new("script").text("boot()"));
        }
        Ok(document)
    }

    fn element_inner_html(&self, id: &str) -> Option<String> {
        self.state.lock().inner_html.get(id).cloned()
    }

    fn set_element_text(&self, id: &str, text: &str) {
        self.journal.push(format!("host:text:{id}:{text}"));
        self.state.lock().texts.insert(id.to_string(), text.to_string());
    }

    fn set_element_visibility(&self, id: &str, visibility: Visibility) {
        self.state.lock().visibility.insert(id.to_string(), visibility);
    }

    fn redirect_body(&self, slot: BodySlot) {
        self.journal.push("host:redirect_body");
        self.state.lock().body_slot = Some(slot);
    }

    fn expose_postload(&self, signal: PostloadSignal) {
        self.state.lock().postload = Some(signal);
    }

    async fn write_document(&self, markup: String) -> Result<(), HostError> {
        self.journal.push("host:write");
        let signal = {
            let mut state = self.state.lock();
            let fires = markup.contains(POSTLOAD_HOOK_SCRIPT);
            state.documents.push(markup);
            if state.swallow_postload {
                state.postload = None;
            }
            state.postload.clone().filter(|_| fires)
        };

        if let Some(signal) = signal {
            signal.fire();
        }
        Ok(())
    }

    fn actual_body(&self) -> Option<NodeRef> {
        Some(FAKE_BODY)
    }

    fn invoke_dom_ready(&self) -> bool {
        self.state.lock().dom_ready_calls += 1;
        true
    }

    fn is_ready(&self) -> bool {
        let mut state = self.state.lock();
        state.polls += 1;
        let ready = state.ready_after.map_or(false, |n| state.polls >= n);
        drop(state);

        if ready {
            self.journal.push("host:ready");
        }
        ready
    }

    fn registered_mods(&self) -> ModPartitions {
        self.state.lock().registered.clone()
    }

    fn set_registered_mods(&self, mods: ModPartitions) {
        self.state.lock().registered = mods;
    }

    fn expose_versions(&self, versions: BTreeMap<String, String>) {
        self.journal.push("host:versions");
        self.state.lock().versions = Some(versions);
    }

    fn dispatch_event(&self, event: &ModsLoadedEvent) {
        self.journal.push(format!("host:event:{}", event.name));
        self.state.lock().events.push(event.clone());
    }
}
