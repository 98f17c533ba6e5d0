// Copyright (c) 2026 Vela Contributors.
// Licensed under the MIT license.

//! Default application
//!
//! Everything the routers do not send to a tunnel lands here: static files
//! from the public root, the single-page application document for engine
//! routes and extension-less paths, and 404s for unmatched file-looking
//! requests.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use tracing::{error, warn};

use crate::gateway::routes::{looks_like_file, strip_query, RouteDecision};
use crate::gateway::tunnel::GatewayBody;

/// Prefixes whose files back an interception agent and need
/// `Service-Worker-Allowed` widened to the whole origin
const AGENT_BUNDLE_PREFIXES: &[&str] = &["/uv/", "/scram/", "/baremux/"];

/// Prefixes that require cross-origin isolation headers
const ISOLATED_PREFIXES: &[&str] = &["/scram/"];

/// Static files plus SPA fallback
pub struct StaticApp {
    root: PathBuf,
}

impl StaticApp {
    /// Create an application over a static root directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Check whether `path` names an existing file under the root
    pub fn file_exists(&self, path: &str) -> bool {
        self.resolve(strip_query(path))
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    /// Produce the response for a non-tunnel route decision
    pub async fn respond(&self, path: &str, decision: RouteDecision) -> Response<GatewayBody> {
        let path = strip_query(path);
        // Traversal attempts never reach the filesystem or the SPA fallback
        if matches!(decision, RouteDecision::Static | RouteDecision::NotFound)
            && self.resolve(path).is_none()
        {
            return not_found();
        }
        match decision {
            // Engine routes are handled by the interception agent in the
            // browser; the server's job is only to get the application
            // document loaded
            RouteDecision::UvApp | RouteDecision::ScramApp => self.spa_document().await,
            RouteDecision::Static => match self.serve_file(path).await {
                Some(response) => response,
                None => not_found(),
            },
            RouteDecision::NotFound => {
                if let Some(response) = self.serve_file(path).await {
                    return response;
                }
                if looks_like_file(path) {
                    not_found()
                } else {
                    self.spa_document().await
                }
            }
            RouteDecision::BareTunnel | RouteDecision::WispTunnel => {
                // Routers never send tunnel traffic here
                warn!("Tunnel decision reached the application layer for {}", path);
                not_found()
            }
        }
    }

    /// Serve the single-page application document
    async fn spa_document(&self) -> Response<GatewayBody> {
        match self.serve_file("/index.html").await {
            Some(response) => response,
            None => {
                error!("index.html missing from static root {:?}", self.root);
                not_found()
            }
        }
    }

    /// Read and serve a file, or None when it does not exist
    async fn serve_file(&self, path: &str) -> Option<Response<GatewayBody>> {
        let resolved = self.resolve(path)?;
        if !resolved.is_file() {
            return None;
        }
        let body = match tokio::fs::read(&resolved).await {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to read {:?}: {}", resolved, e);
                return None;
            }
        };

        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .header("content-type", content_type(&resolved));

        if AGENT_BUNDLE_PREFIXES.iter().any(|p| path.starts_with(p)) {
            builder = builder.header("service-worker-allowed", "/");
        }
        if ISOLATED_PREFIXES.iter().any(|p| path.starts_with(p)) {
            builder = builder
                .header("cross-origin-opener-policy", "same-origin")
                .header("cross-origin-embedder-policy", "require-corp");
        }

        builder.body(Full::new(Bytes::from(body))).ok()
    }

    /// Map a request path to a file under the root, refusing traversal
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => resolved.push(segment),
                Component::CurDir => {}
                // Anything that could escape the root is rejected outright
                _ => return None,
            }
        }
        Some(resolved)
    }
}

/// Plain-text 404 response
pub fn not_found() -> Response<GatewayBody> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("content-type", "text/plain")
        .body(Full::new(Bytes::from_static(b"Not Found")))
        .unwrap_or_default()
}

/// Content type by file extension
fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "html" => "text/html; charset=utf-8",
        "js" | "mjs" | "cjs" => "application/javascript",
        "wasm" => "application/wasm",
        "css" => "text/css",
        "json" | "map" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn app_with_files() -> (TempDir, StaticApp) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<html>app</html>").unwrap();
        fs::create_dir(dir.path().join("uv")).unwrap();
        fs::write(dir.path().join("uv").join("uv.bundle.js"), "// bundle").unwrap();
        let app = StaticApp::new(dir.path());
        (dir, app)
    }

    #[tokio::test]
    async fn test_engine_route_serves_spa_document() {
        let (_dir, app) = app_with_files();
        let response = app.respond("/~/uv/abcXYZ==", RouteDecision::UvApp).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "text/html; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn test_existing_file_is_served_with_agent_headers() {
        let (_dir, app) = app_with_files();
        let response = app
            .respond("/uv/uv.bundle.js", RouteDecision::NotFound)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "application/javascript");
        assert_eq!(response.headers()["service-worker-allowed"], "/");
    }

    #[tokio::test]
    async fn test_file_looking_miss_is_404() {
        let (_dir, app) = app_with_files();
        let response = app.respond("/missing.js", RouteDecision::NotFound).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_extensionless_miss_gets_spa_fallback() {
        let (_dir, app) = app_with_files();
        let response = app.respond("/settings", RouteDecision::NotFound).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_traversal_is_rejected() {
        let (_dir, app) = app_with_files();
        assert!(!app.file_exists("/../etc/passwd"));
        let response = app
            .respond("/../../etc/passwd", RouteDecision::NotFound)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
