// Copyright (c) 2026 Vela Contributors.
// Licensed under the MIT license.

//! Session lifecycle
//!
//! A session moves IDLE -> INITIALIZING -> ACTIVE, with ERROR reachable
//! from anywhere on an unrecoverable failure and a retry path back to
//! INITIALIZING. The phase lives in a watch channel so UI surfaces can
//! subscribe rather than poll. `ProxySession` is the per-realm object
//! tying the config store, the agent bootstraps, and the transport
//! negotiator together.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{error, info};

use crate::error::Result;
use crate::session::address::resolve_address;
use crate::session::bootstrap::AgentBootstrap;
use crate::session::config::{EngineKind, ProxySessionConfig};
use crate::session::storage::ConfigStore;
use crate::session::transport::TransportNegotiator;

/// Where the session is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// Nothing started yet
    Idle,
    /// Bootstrap and transport negotiation in flight
    Initializing,
    /// At least one proxied content load has succeeded
    Active,
    /// Unrecoverable failure; retry returns to Initializing
    Error(String),
}

impl SessionPhase {
    /// True once proxied content has loaded
    pub fn is_active(&self) -> bool {
        matches!(self, SessionPhase::Active)
    }

    /// True when the session has failed
    pub fn is_error(&self) -> bool {
        matches!(self, SessionPhase::Error(_))
    }
}

/// Watch-published session phase
///
/// Writers go through the transition methods; `Active` is sticky against
/// re-entering `Initializing` so a background retry cannot demote a
/// session the user is already browsing in.
pub struct PhaseCell {
    tx: watch::Sender<SessionPhase>,
}

impl PhaseCell {
    /// Fresh cell in the Idle phase
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionPhase::Idle);
        Self { tx }
    }

    /// Current phase
    pub fn current(&self) -> SessionPhase {
        self.tx.borrow().clone()
    }

    /// Subscribe to phase changes
    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.tx.subscribe()
    }

    /// Enter Initializing, unless the session is already Active
    pub fn mark_initializing(&self) {
        self.tx.send_if_modified(|phase| {
            if phase.is_active() || *phase == SessionPhase::Initializing {
                return false;
            }
            *phase = SessionPhase::Initializing;
            true
        });
    }

    /// Enter Active; idempotent
    pub fn mark_active(&self) {
        self.tx.send_if_modified(|phase| {
            if phase.is_active() {
                return false;
            }
            info!("Session active");
            *phase = SessionPhase::Active;
            true
        });
    }

    /// Enter Error with a reason
    pub fn mark_error(&self, reason: impl Into<String>) {
        let reason = reason.into();
        error!("Session failed: {}", reason);
        let _ = self.tx.send(SessionPhase::Error(reason));
    }
}

impl Default for PhaseCell {
    fn default() -> Self {
        Self::new()
    }
}

/// One browsing realm: its config, bootstraps, and transport
pub struct ProxySession {
    store: Arc<dyn ConfigStore>,
    config: RwLock<ProxySessionConfig>,
    phase: Arc<PhaseCell>,
    bootstraps: Vec<Arc<AgentBootstrap>>,
    negotiator: TransportNegotiator,
}

impl ProxySession {
    /// Build a session, loading its config from the store
    pub fn new(
        store: Arc<dyn ConfigStore>,
        bootstraps: Vec<Arc<AgentBootstrap>>,
        negotiator: TransportNegotiator,
    ) -> Self {
        let config = store.load();
        Self {
            store,
            config: RwLock::new(config),
            phase: Arc::new(PhaseCell::new()),
            bootstraps,
            negotiator,
        }
    }

    /// The phase cell, for subscribers and the pipeline
    pub fn phase(&self) -> Arc<PhaseCell> {
        Arc::clone(&self.phase)
    }

    /// Snapshot of the current config
    pub fn config(&self) -> ProxySessionConfig {
        self.config.read().clone()
    }

    /// Apply a config change and persist it
    pub fn update_config(&self, apply: impl FnOnce(&mut ProxySessionConfig)) {
        let mut config = self.config.write();
        apply(&mut config);
        self.store.save(&config);
    }

    /// Bring the session up: agent bootstrap for the configured engine,
    /// then transport negotiation
    ///
    /// Safe to call again after an error; the phase returns to
    /// Initializing and both steps are retried.
    pub async fn start(&self) -> Result<()> {
        self.phase.mark_initializing();
        let config = self.config();

        let result = async {
            let bootstrap = self.bootstrap_for(config.engine).ok_or_else(|| {
                crate::error::Error::config(format!("no agent wired for {}", config.engine))
            })?;
            bootstrap.ensure_ready().await?;
            self.negotiator.configure(&config).await
        }
        .await;

        if let Err(e) = &result {
            self.phase.mark_error(e.to_string());
        }
        result
    }

    /// Turn address-bar input into the engine frame URL to load
    pub fn navigate(&self, input: &str) -> String {
        let config = self.config();
        let target = resolve_address(input, config.search_engine);
        config.engine.frame_url(&target)
    }

    fn bootstrap_for(&self, engine: EngineKind) -> Option<&AgentBootstrap> {
        self.bootstraps
            .iter()
            .find(|b| b.engine() == engine)
            .map(Arc::as_ref)
    }
}
