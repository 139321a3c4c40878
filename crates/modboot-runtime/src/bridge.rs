//! Host bootstrap bridge
//!
//! Takes over the host document while the host boots:
//!
//! 1. fetch the entrypoint markup and inject the status overlay into a
//!    detached copy of it,
//! 2. find the game mount the postload hook is anchored to,
//! 3. redirect the host's body accessor, write the prepared document over
//!    the live one and wait for the hook script to run,
//! 4. hand the real body back and poll until the host reports ready.
//!
//! The body redirection is never removed once installed.

use crate::dom::{Document, Element, NodeId};
use crate::error::BridgeError;
use crate::host::{BodySlot, HostRuntime, PostloadSignal, Visibility, POSTLOAD_HOOK_SCRIPT};
use crate::source::AssetSource;
use modboot_config::{BootstrapConfig, LoaderConfig};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Id of the full-screen overlay element
pub const OVERLAY_ID: &str = "overlay";

/// Id of the status text element
pub const STATUS_ID: &str = "status";

/// Id of the mod UI mount point
pub const UI_ID: &str = "ui";

/// Position of the bridge in the takeover sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeState {
    /// Nothing done yet
    Idle,
    /// Entrypoint fetched and overlay injected
    OverlayReady,
    /// Game mount located
    HostPrepared,
    /// Prepared document is live and the postload hook ran
    HostActivated,
    /// Polling for host readiness
    AwaitingReadiness,
    /// Host reported ready
    Ready,
}

impl BridgeState {
    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            BridgeState::Idle => "idle",
            BridgeState::OverlayReady => "overlay-ready",
            BridgeState::HostPrepared => "host-prepared",
            BridgeState::HostActivated => "host-activated",
            BridgeState::AwaitingReadiness => "awaiting-readiness",
            BridgeState::Ready => "ready",
        }
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives the host document takeover
pub struct HostBridge {
    host: Arc<dyn HostRuntime>,
    source: Arc<dyn AssetSource>,
    entrypoint: String,
    stylesheet: String,
    config: BootstrapConfig,
    state: BridgeState,
    document: Option<Document>,
    status: Option<NodeId>,
    anchor: Option<NodeId>,
    body_slot: BodySlot,
}

impl HostBridge {
    /// Create a bridge for one session
    pub fn new(
        host: Arc<dyn HostRuntime>,
        source: Arc<dyn AssetSource>,
        config: &LoaderConfig,
    ) -> Self {
        Self {
            host,
            source,
            entrypoint: config.paths.entrypoint.clone(),
            stylesheet: config.paths.stylesheet.clone(),
            config: config.bootstrap.clone(),
            state: BridgeState::Idle,
            document: None,
            status: None,
            anchor: None,
            body_slot: BodySlot::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// The prepared document, once fetched
    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    /// The slot the host's body accessor is redirected to
    pub fn body_slot(&self) -> &BodySlot {
        &self.body_slot
    }

    /// Prepare the overlay and locate the game mount
    pub async fn initialize(&mut self) -> Result<(), BridgeError> {
        self.prepare_overlay().await?;
        self.locate_game()
    }

    /// Fetch the entrypoint and inject the overlay into a detached copy
    pub async fn prepare_overlay(&mut self) -> Result<(), BridgeError> {
        self.expect(BridgeState::Idle)?;

        let markup = self.source.fetch_text(&self.entrypoint).await.map_err(|e| {
            BridgeError::EntrypointNotFound {
                path: self.entrypoint.clone(),
                reason: e.to_string(),
            }
        })?;
        let mut document = self.host.parse_document(&markup)?;

        let head = document.head();
        let body = document.body();

        if let Some(script) = self.config.boot_script.as_deref() {
            match document.child_by_tag(body, "script") {
                Some(node) => document.set_markup(node, script),
                None => warn!(path = %self.entrypoint, "Entrypoint has no body script to replace"),
            }
        }

        document.append_child(
            head,
            Element::new("link")
                .attr("rel", "stylesheet")
                .attr("href", self.stylesheet.as_str()),
        );
        document.append_child(body, Element::new("div").id(OVERLAY_ID));
        let status = document.append_child(
            body,
            Element::new("h1")
                .id(STATUS_ID)
                .class("title")
                .text(self.config.initial_status.as_str()),
        );
        document.append_child(body, Element::new("div").id(UI_ID).class("ui"));

        self.document = Some(document);
        self.status = Some(status);
        self.transition(BridgeState::OverlayReady);
        Ok(())
    }

    /// Find the game mount the postload hook will follow
    pub fn locate_game(&mut self) -> Result<(), BridgeError> {
        self.expect(BridgeState::OverlayReady)?;

        let mount = &self.config.game_mount_id;
        let anchor = self
            .document
            .as_ref()
            .and_then(|document| document.element_by_id(mount))
            .ok_or_else(|| BridgeError::GameMountNotFound(mount.clone()))?;

        self.anchor = Some(anchor);
        self.transition(BridgeState::HostPrepared);
        Ok(())
    }

    /// Replace the live document with the prepared one and wait until the
    /// host runs the postload hook.
    pub async fn activate_host(&mut self) -> Result<(), BridgeError> {
        self.expect(BridgeState::HostPrepared)?;

        let mount = self.config.game_mount_id.clone();
        let (document, anchor) = match (self.document.as_mut(), self.anchor) {
            (Some(document), Some(anchor)) => (document, anchor),
            _ => return Err(BridgeError::GameMountNotFound(mount)),
        };

        let (signal, fired) = PostloadSignal::channel();
        document
            .insert_after(
                anchor,
                Element::new("script")
                    .attr("src", format!("data:text/javascript,{POSTLOAD_HOOK_SCRIPT}"))
                    .attr("type", "text/javascript"),
            )
            .ok_or(BridgeError::GameMountNotFound(mount))?;
        self.host.expose_postload(signal);

        self.body_slot.set(None);
        self.host.redirect_body(self.body_slot.clone());

        if let (Some(ui), Some(html)) = (
            document.element_by_id(UI_ID),
            self.host.element_inner_html(UI_ID),
        ) {
            document.set_markup(ui, html);
        }

        let markup = document.to_html();
        self.host.write_document(markup).await?;
        self.transition(BridgeState::HostActivated);

        fired.await.map_err(|_| BridgeError::PostloadAbandoned)?;
        debug!("Postload hook ran");
        Ok(())
    }

    /// Hand the real body back to the host and poll until it is ready
    pub async fn await_readiness(&mut self) -> Result<(), BridgeError> {
        self.expect(BridgeState::HostActivated)?;

        self.body_slot.set(self.host.actual_body());
        if !self.host.invoke_dom_ready() {
            debug!("Host exposes no DOM-ready hook");
        }
        self.transition(BridgeState::AwaitingReadiness);

        let period = self.config.poll_interval;
        match self.config.readiness_timeout {
            Some(limit) => time::timeout(limit, poll_ready(self.host.as_ref(), period))
                .await
                .map_err(|_| BridgeError::ReadinessTimeout(limit))?,
            None => poll_ready(self.host.as_ref(), period).await,
        }

        self.transition(BridgeState::Ready);
        Ok(())
    }

    /// Show a status line in the prepared and the live document
    pub fn set_status(&mut self, text: &str) {
        if let (Some(document), Some(status)) = (self.document.as_mut(), self.status) {
            document.set_text(status, text);
        }
        self.host.set_element_text(STATUS_ID, text);
        debug!(status = %text, "Status updated");
    }

    /// Hide the overlay and the status line
    pub fn teardown(&self) {
        self.host.set_element_visibility(OVERLAY_ID, Visibility::Hidden);
        self.host.set_element_visibility(STATUS_ID, Visibility::Hidden);
        debug!("Overlay removed");
    }

    fn expect(&self, expected: BridgeState) -> Result<(), BridgeError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(BridgeError::InvalidState {
                expected: expected.as_str(),
                actual: self.state.as_str(),
            })
        }
    }

    fn transition(&mut self, next: BridgeState) {
        info!(from = %self.state, to = %next, "Bridge state changed");
        self.state = next;
    }
}

async fn poll_ready(host: &dyn HostRuntime, period: Duration) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut polls: u64 = 0;
    loop {
        ticker.tick().await;
        polls += 1;
        if host.is_ready() {
            debug!(polls, "Host ready");
            return;
        }
    }
}

impl fmt::Debug for HostBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostBridge")
            .field("state", &self.state)
            .field("entrypoint", &self.entrypoint)
            .field("body", &self.body_slot.get())
            .finish()
    }
}
