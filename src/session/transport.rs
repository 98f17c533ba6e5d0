// Copyright (c) 2026 Vela Contributors.
// Licensed under the MIT license.

//! Multiplexed transport negotiation
//!
//! Before any proxied navigation, the session binds a mux connection to a
//! worker script and points it at a low-level transport module plus a
//! rendezvous endpoint: the wisp WebSocket URL or the bare HTTP origin.
//! The mux library itself is an external collaborator behind the traits
//! here. A failure to load it or construct the connection is fatal for the
//! session attempt - it surfaces as an ERROR state, never a silent retry.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::session::config::{LowLevelTransport, ProxySessionConfig, TunnelMode};

/// Worker script the mux connection is bound to
pub const MUX_WORKER_PATH: &str = "/baremux/worker.js";

/// Rendezvous endpoint argument handed to the transport module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendezvous {
    /// Wisp WebSocket URL
    Wisp { url: String },
    /// Bare server HTTP origin
    Bare { origin: String },
}

/// An established multiplexed connection
#[async_trait]
pub trait MuxConnection: Send + Sync {
    /// Bind a low-level transport module and its rendezvous endpoint
    async fn set_transport(&self, module_path: &str, rendezvous: Rendezvous) -> Result<()>;
}

/// Loads the mux library and constructs connections
#[async_trait]
pub trait MuxFactory: Send + Sync {
    /// Construct a connection bound to a worker script
    async fn connect(&self, worker_path: &str) -> Result<Arc<dyn MuxConnection>>;
}

/// What the negotiator decided to bind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSelection {
    /// Low-level transport module path
    pub module_path: &'static str,
    /// Rendezvous endpoint argument
    pub rendezvous: Rendezvous,
}

/// Selects and establishes the multiplexed transport
pub struct TransportNegotiator {
    factory: Arc<dyn MuxFactory>,
    /// Same-origin base, e.g. `https://proxy.example`
    origin: String,
}

impl TransportNegotiator {
    /// Create a negotiator over a mux factory and the gateway origin
    pub fn new(factory: Arc<dyn MuxFactory>, origin: impl Into<String>) -> Self {
        Self {
            factory,
            origin: origin.into(),
        }
    }

    /// Establish the transport for a session configuration
    ///
    /// Must complete before any proxied navigation is attempted.
    pub async fn configure(&self, config: &ProxySessionConfig) -> Result<()> {
        let selection = select_transport(config, &self.origin);
        debug!(
            "Negotiating transport: {} via {:?}",
            selection.module_path, selection.rendezvous
        );

        let connection = self
            .factory
            .connect(MUX_WORKER_PATH)
            .await
            .map_err(|e| Error::transport(format!("mux connection failed: {}", e)))?;

        connection
            .set_transport(selection.module_path, selection.rendezvous)
            .await
            .map_err(|e| Error::transport(format!("transport binding failed: {}", e)))
    }
}

/// Pick the transport module and rendezvous endpoint for a configuration
pub fn select_transport(config: &ProxySessionConfig, origin: &str) -> TransportSelection {
    match config.tunnel {
        TunnelMode::Wisp => TransportSelection {
            module_path: config.transport.module_path(),
            rendezvous: Rendezvous::Wisp {
                url: wisp_url(config, origin),
            },
        },
        // Bare mode has no transport module shipped yet; take the wisp
        // path with libcurl instead of failing the whole session
        TunnelMode::Bare => {
            warn!("Bare tunnel mode is not supported yet, falling back to wisp with libcurl");
            TransportSelection {
                module_path: LowLevelTransport::Libcurl.module_path(),
                rendezvous: Rendezvous::Wisp {
                    url: default_wisp_url(origin, config.content_filter),
                },
            }
        }
    }
}

/// The wisp URL for a configuration: the custom rendezvous server when
/// set, otherwise the gateway's own endpoint
fn wisp_url(config: &ProxySessionConfig, origin: &str) -> String {
    config
        .rendezvous_url
        .clone()
        .unwrap_or_else(|| default_wisp_url(origin, config.content_filter))
}

/// Derive the gateway's wisp endpoint from its HTTP origin
fn default_wisp_url(origin: &str, content_filter: bool) -> String {
    let ws_origin = if let Some(host) = origin.strip_prefix("https://") {
        format!("wss://{}", host)
    } else if let Some(host) = origin.strip_prefix("http://") {
        format!("ws://{}", host)
    } else {
        format!("ws://{}", origin)
    };
    let path = if content_filter { "/wisp-cf/" } else { "/wisp/" };
    format!("{}{}", ws_origin.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::config::EngineKind;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingMux {
        bound: Mutex<Vec<(String, Rendezvous)>>,
        fail_connect: bool,
    }

    struct RecordingConnection(Arc<RecordingMux>);

    #[async_trait]
    impl MuxFactory for Arc<RecordingMux> {
        async fn connect(&self, worker_path: &str) -> Result<Arc<dyn MuxConnection>> {
            assert_eq!(worker_path, MUX_WORKER_PATH);
            if self.fail_connect {
                return Err(Error::other("library failed to load"));
            }
            Ok(Arc::new(RecordingConnection(self.clone())))
        }
    }

    #[async_trait]
    impl MuxConnection for RecordingConnection {
        async fn set_transport(&self, module_path: &str, rendezvous: Rendezvous) -> Result<()> {
            self.0
                .bound
                .lock()
                .push((module_path.to_string(), rendezvous));
            Ok(())
        }
    }

    fn config(tunnel: TunnelMode, transport: LowLevelTransport) -> ProxySessionConfig {
        ProxySessionConfig {
            engine: EngineKind::Ultraviolet,
            tunnel,
            transport,
            ..Default::default()
        }
    }

    #[test]
    fn test_wisp_selection_uses_configured_transport() {
        let selection = select_transport(
            &config(TunnelMode::Wisp, LowLevelTransport::Epoxy),
            "https://proxy.example",
        );
        assert_eq!(selection.module_path, "/epoxy/index.mjs");
        assert_eq!(
            selection.rendezvous,
            Rendezvous::Wisp {
                url: "wss://proxy.example/wisp/".to_string()
            }
        );
    }

    #[test]
    fn test_content_filter_selects_filtering_endpoint() {
        let mut config = config(TunnelMode::Wisp, LowLevelTransport::Epoxy);
        config.content_filter = true;
        let selection = select_transport(&config, "http://localhost:8080");
        assert_eq!(
            selection.rendezvous,
            Rendezvous::Wisp {
                url: "ws://localhost:8080/wisp-cf/".to_string()
            }
        );
    }

    #[test]
    fn test_custom_rendezvous_server_wins() {
        let mut config = config(TunnelMode::Wisp, LowLevelTransport::Libcurl);
        config.rendezvous_url = Some("wss://relay.example/wisp/".to_string());
        let selection = select_transport(&config, "https://proxy.example");
        assert_eq!(
            selection.rendezvous,
            Rendezvous::Wisp {
                url: "wss://relay.example/wisp/".to_string()
            }
        );
    }

    #[test]
    fn test_bare_mode_falls_back_to_wisp_libcurl() {
        let selection = select_transport(
            &config(TunnelMode::Bare, LowLevelTransport::Epoxy),
            "https://proxy.example",
        );
        assert_eq!(selection.module_path, "/libcurl/index.mjs");
        assert!(matches!(selection.rendezvous, Rendezvous::Wisp { .. }));
    }

    #[tokio::test]
    async fn test_configure_binds_the_selection() {
        let mux = Arc::new(RecordingMux::default());
        let negotiator = TransportNegotiator::new(Arc::new(mux.clone()), "https://proxy.example");

        negotiator
            .configure(&config(TunnelMode::Wisp, LowLevelTransport::Epoxy))
            .await
            .unwrap();

        let bound = mux.bound.lock();
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].0, "/epoxy/index.mjs");
    }

    #[tokio::test]
    async fn test_connect_failure_is_fatal_transport_error() {
        let mux = Arc::new(RecordingMux {
            fail_connect: true,
            ..Default::default()
        });
        let negotiator = TransportNegotiator::new(Arc::new(mux), "https://proxy.example");

        let err = negotiator
            .configure(&config(TunnelMode::Wisp, LowLevelTransport::Epoxy))
            .await
            .unwrap_err();
        assert!(err.is_fatal_for_session());
    }
}
