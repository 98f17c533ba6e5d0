// Copyright (c) 2026 Vela Contributors.
// Licensed under the MIT license.

//! Client-side session plumbing
//!
//! Everything between the address bar and the gateway: durable session
//! config, rewrite-engine codecs, interception-agent bootstrap, transport
//! negotiation, the fetch pipeline with its client-hook injection, and
//! the session state machine.

pub mod address;
pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod inject;
pub mod pipeline;
pub mod state;
pub mod storage;
pub mod transport;

pub use address::resolve_address;
pub use bootstrap::{AgentBootstrap, BootstrapPhase, InterceptionAgent};
pub use config::{EngineKind, LowLevelTransport, ProxySessionConfig, SearchEngine, TunnelMode};
pub use engine::{EngineRequest, EngineResponse, RewriteEngine};
pub use inject::inject_client_hook;
pub use pipeline::{EngineSlot, FetchPipeline, NetworkFallback, ReqwestFallback};
pub use state::{PhaseCell, ProxySession, SessionPhase};
pub use storage::{ConfigStore, FileStore, MemoryStore};
pub use transport::{MuxConnection, MuxFactory, Rendezvous, TransportNegotiator};
