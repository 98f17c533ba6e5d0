// Copyright (c) 2026 Vela Contributors.
// Licensed under the MIT license.

//! Interception agent bootstrap
//!
//! Lazily initializes the browser-side interception agent for one engine:
//! load its scripts, register it against the engine's scope, wait for it
//! to become active. Initialization is single-flight: concurrent callers
//! share one in-flight attempt, and a failed attempt resets the machine so
//! a later navigation can retry. Nothing here supports cancellation; a
//! caller that gives up still lets the attempt finish and cache its
//! outcome.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::session::config::EngineKind;

/// Default bound on the activation wait
pub const DEFAULT_ACTIVATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifecycle of the agent bootstrap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPhase {
    /// No attempt has run (or the last failure was acknowledged)
    Uninitialized,
    /// An attempt is in flight; callers wait on it
    Initializing,
    /// The agent is registered and usable
    Ready,
    /// The last attempt failed; the next call starts over
    Failed,
}

/// The browser-side agent being bootstrapped
///
/// Registration is visible browser-wide; the bootstrap guarantees only one
/// registration attempt per engine per realm is in flight at a time.
#[async_trait]
pub trait InterceptionAgent: Send + Sync {
    /// Load the engine bootstrap scripts
    async fn load_scripts(&self) -> Result<()>;

    /// Register the agent with a declared scope
    async fn register(&self, scope: &str) -> Result<()>;

    /// Wait for the agent's activation confirmation
    ///
    /// May never resolve when the confirmation event is lost; the
    /// bootstrap bounds this wait and treats the timeout as success.
    async fn wait_active(&self) -> Result<()>;
}

/// Single-flight, memoized initializer for one engine's agent
pub struct AgentBootstrap {
    engine: EngineKind,
    agent: Arc<dyn InterceptionAgent>,
    activation_timeout: Duration,
    phase: Mutex<BootstrapPhase>,
    // Wakes waiters whenever an attempt settles; `phase` stays the
    // authority on the outcome
    settled_tx: watch::Sender<()>,
    settled_rx: watch::Receiver<()>,
}

impl AgentBootstrap {
    /// Create a bootstrap for an engine's agent
    pub fn new(engine: EngineKind, agent: Arc<dyn InterceptionAgent>) -> Self {
        Self::with_activation_timeout(engine, agent, DEFAULT_ACTIVATION_TIMEOUT)
    }

    /// Create a bootstrap with a custom activation bound
    pub fn with_activation_timeout(
        engine: EngineKind,
        agent: Arc<dyn InterceptionAgent>,
        activation_timeout: Duration,
    ) -> Self {
        let (settled_tx, settled_rx) = watch::channel(());
        Self {
            engine,
            agent,
            activation_timeout,
            phase: Mutex::new(BootstrapPhase::Uninitialized),
            settled_tx,
            settled_rx,
        }
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> BootstrapPhase {
        *self.phase.lock()
    }

    /// The engine this bootstrap serves
    pub fn engine(&self) -> EngineKind {
        self.engine
    }

    /// Ensure the agent is registered and active
    ///
    /// Returns once the agent is usable. Concurrent callers during an
    /// in-flight attempt all await that attempt; none start a duplicate.
    pub async fn ensure_ready(&self) -> Result<()> {
        let wait = {
            let mut phase = self.phase.lock();
            match *phase {
                BootstrapPhase::Ready => return Ok(()),
                BootstrapPhase::Initializing => true,
                BootstrapPhase::Uninitialized | BootstrapPhase::Failed => {
                    *phase = BootstrapPhase::Initializing;
                    false
                }
            }
        };

        if wait {
            return self.await_in_flight().await;
        }

        let result = self.initialize().await;
        {
            let mut phase = self.phase.lock();
            *phase = match &result {
                Ok(()) => BootstrapPhase::Ready,
                Err(_) => BootstrapPhase::Failed,
            };
        }
        let _ = self.settled_tx.send(());
        result
    }

    /// Wait for the in-flight attempt to settle and report its outcome
    async fn await_in_flight(&self) -> Result<()> {
        let mut rx = self.settled_rx.clone();
        loop {
            if rx.changed().await.is_err() {
                return Err(Error::bootstrap(self.engine, "bootstrap dropped mid-attempt"));
            }
            match self.phase() {
                BootstrapPhase::Ready => return Ok(()),
                BootstrapPhase::Failed | BootstrapPhase::Uninitialized => {
                    return Err(Error::bootstrap(self.engine, "initialization attempt failed"))
                }
                BootstrapPhase::Initializing => continue,
            }
        }
    }

    /// One initialization attempt: scripts, registration, activation wait
    async fn initialize(&self) -> Result<()> {
        debug!("Bootstrapping {} interception agent", self.engine);

        self.agent
            .load_scripts()
            .await
            .map_err(|e| Error::bootstrap(self.engine, format!("script load failed: {}", e)))?;

        let scope = self.engine.prefix();
        self.agent
            .register(scope)
            .await
            .map_err(|e| Error::bootstrap(self.engine, format!("registration failed: {}", e)))?;

        // Best-effort readiness: a lost activation event does not fail the
        // bootstrap, because the agent is usually usable by the time the
        // bound elapses. Availability wins over certainty here.
        match tokio::time::timeout(self.activation_timeout, self.agent.wait_active()).await {
            Ok(Ok(())) => debug!("{} agent active", self.engine),
            Ok(Err(e)) => {
                return Err(Error::bootstrap(
                    self.engine,
                    format!("activation failed: {}", e),
                ))
            }
            Err(_) => warn!(
                "No activation confirmation from {} agent within {:?}, assuming active",
                self.engine, self.activation_timeout
            ),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FakeAgent {
        registrations: AtomicUsize,
        fail_next_register: AtomicBool,
        hang_activation: bool,
    }

    impl FakeAgent {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                registrations: AtomicUsize::new(0),
                fail_next_register: AtomicBool::new(false),
                hang_activation: false,
            })
        }

        fn hanging() -> Arc<Self> {
            Arc::new(Self {
                registrations: AtomicUsize::new(0),
                fail_next_register: AtomicBool::new(false),
                hang_activation: true,
            })
        }
    }

    #[async_trait]
    impl InterceptionAgent for FakeAgent {
        async fn load_scripts(&self) -> Result<()> {
            Ok(())
        }

        async fn register(&self, _scope: &str) -> Result<()> {
            self.registrations.fetch_add(1, Ordering::SeqCst);
            if self.fail_next_register.swap(false, Ordering::SeqCst) {
                return Err(Error::other("registration refused"));
            }
            // Yield so concurrent callers pile up on the in-flight attempt
            tokio::task::yield_now().await;
            Ok(())
        }

        async fn wait_active(&self) -> Result<()> {
            if self.hang_activation {
                futures::future::pending::<()>().await;
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_attempt() {
        let agent = FakeAgent::new();
        let bootstrap = Arc::new(AgentBootstrap::new(EngineKind::Ultraviolet, agent.clone()));

        let (a, b, c) = tokio::join!(
            bootstrap.ensure_ready(),
            bootstrap.ensure_ready(),
            bootstrap.ensure_ready()
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(agent.registrations.load(Ordering::SeqCst), 1);
        assert_eq!(bootstrap.phase(), BootstrapPhase::Ready);
    }

    #[tokio::test]
    async fn test_ready_is_memoized() {
        let agent = FakeAgent::new();
        let bootstrap = AgentBootstrap::new(EngineKind::Scramjet, agent.clone());

        bootstrap.ensure_ready().await.unwrap();
        bootstrap.ensure_ready().await.unwrap();
        assert_eq!(agent.registrations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_resets_and_allows_retry() {
        let agent = FakeAgent::new();
        agent.fail_next_register.store(true, Ordering::SeqCst);
        let bootstrap = AgentBootstrap::new(EngineKind::Ultraviolet, agent.clone());

        assert!(bootstrap.ensure_ready().await.is_err());
        assert_eq!(bootstrap.phase(), BootstrapPhase::Failed);

        // Not stuck: the next call starts over and succeeds
        bootstrap.ensure_ready().await.unwrap();
        assert_eq!(bootstrap.phase(), BootstrapPhase::Ready);
        assert_eq!(agent.registrations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_timeout_counts_as_success() {
        let agent = FakeAgent::hanging();
        let bootstrap = AgentBootstrap::with_activation_timeout(
            EngineKind::Ultraviolet,
            agent,
            Duration::from_millis(50),
        );

        bootstrap.ensure_ready().await.unwrap();
        assert_eq!(bootstrap.phase(), BootstrapPhase::Ready);
    }
}
