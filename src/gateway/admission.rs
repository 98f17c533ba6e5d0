// Copyright (c) 2026 Vela Contributors.
// Licensed under the MIT license.

//! Per-client connection admission
//!
//! Sliding-window throttle guarding the tunnel endpoints. Each client
//! address gets a window of allowed connection attempts; exceeding the
//! limit blocks the client for a configured cool-down. A `Reject` is a
//! normal throttling outcome, not an error: the routers translate it into
//! connection closure and nothing retries it automatically.
//!
//! All operations are O(1) in-memory map updates and never suspend, so
//! they are safe to call from the connection accept path.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

/// Outcome of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Connection may proceed to the tunnel handler
    Allow,
    /// Client is over its limit or inside a block period
    Reject,
}

impl Admission {
    /// Check if this outcome allows the connection
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allow)
    }
}

/// Per-client sliding-window state
#[derive(Debug, Clone)]
struct ClientWindow {
    /// Connection attempts seen in the current window
    count: u32,
    /// When the current window opened
    window_start: Instant,
    /// End of the active block period, if any; always >= window_start
    blocked_until: Option<Instant>,
    /// Last attempt from this client, for idle eviction
    last_seen: Instant,
}

impl ClientWindow {
    fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
            blocked_until: None,
            last_seen: now,
        }
    }
}

/// Sliding-window per-client connection counter
pub struct AdmissionController {
    windows: DashMap<IpAddr, ClientWindow>,
    max_connections_per_client: u32,
    window_duration: Duration,
    block_duration: Duration,
}

impl AdmissionController {
    /// Create a controller with the supplied limits
    pub fn new(
        max_connections_per_client: u32,
        window_duration: Duration,
        block_duration: Duration,
    ) -> Self {
        Self {
            windows: DashMap::new(),
            max_connections_per_client,
            window_duration,
            block_duration,
        }
    }

    /// Check whether a connection attempt from `client` may proceed
    pub fn admit(&self, client: IpAddr) -> Admission {
        self.admit_at(client, Instant::now())
    }

    /// Admission check against an explicit clock reading
    pub fn admit_at(&self, client: IpAddr, now: Instant) -> Admission {
        let mut entry = self
            .windows
            .entry(client)
            .or_insert_with(|| ClientWindow::new(now));
        let window = entry.value_mut();
        window.last_seen = now;

        // Stale window: start counting fresh
        if now.duration_since(window.window_start) > self.window_duration {
            window.count = 0;
            window.window_start = now;
        }

        if let Some(blocked_until) = window.blocked_until {
            if now < blocked_until {
                return Admission::Reject;
            }
            window.blocked_until = None;
        }

        window.count += 1;
        if window.count > self.max_connections_per_client {
            window.blocked_until = Some(now + self.block_duration);
            debug!(
                "Client {} exceeded {} connections, blocking for {:?}",
                client, self.max_connections_per_client, self.block_duration
            );
            return Admission::Reject;
        }

        Admission::Allow
    }

    /// Drop window state for clients idle longer than a full window plus
    /// block period
    pub fn evict_idle(&self) {
        self.evict_idle_at(Instant::now());
    }

    /// Idle eviction against an explicit clock reading
    pub fn evict_idle_at(&self, now: Instant) {
        let max_idle = self.window_duration + self.block_duration;
        self.windows
            .retain(|_, window| now.duration_since(window.last_seen) <= max_idle);
    }

    /// Number of clients currently tracked
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}
