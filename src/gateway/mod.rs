// Copyright (c) 2026 Vela Contributors.
// Licensed under the MIT license.

//! Server-side traffic dispatch and admission
//!
//! The gateway classifies every inbound request and WebSocket upgrade,
//! gates tunnel traffic through the per-client admission controller, and
//! falls back to the static single-page application for everything else.

pub mod admission;
pub mod app;
pub mod config;
pub mod routes;
pub mod server;
pub mod tunnel;

pub use admission::{Admission, AdmissionController};
pub use app::StaticApp;
pub use config::GatewayConfig;
pub use routes::{looks_like_file, EndpointMatcher, RouteDecision};
pub use server::Gateway;
pub use tunnel::{BareEndpoint, DisconnectedTunnel, TunnelRegistry, WispEndpoint};
