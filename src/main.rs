// Copyright (c) 2026 Vela Contributors.
// Licensed under the MIT license.

//! Vela CLI - gateway entry point and routing diagnostics.

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use vela::{EndpointMatcher, Gateway, GatewayConfig, TunnelRegistry};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vela=info".parse().unwrap()),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    match args[1].as_str() {
        "serve" => serve().await,
        "config" => {
            show_config();
            ExitCode::SUCCESS
        }
        "route" => {
            if args.len() < 3 {
                eprintln!("Usage: vela route <path> [--upgrade]");
                return ExitCode::from(1);
            }
            let is_upgrade = args.iter().any(|a| a == "--upgrade");
            show_route(&args[2], is_upgrade);
            ExitCode::SUCCESS
        }
        "--help" | "-h" | "help" => {
            print_usage();
            ExitCode::SUCCESS
        }
        "--version" | "-v" | "version" => {
            println!("vela {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            ExitCode::from(1)
        }
    }
}

fn print_usage() {
    println!(
        r#"Vela - Web Proxy Traffic Dispatch Gateway

USAGE:
    vela <COMMAND> [OPTIONS]

COMMANDS:
    serve                    Run the gateway (configured via environment)
    config                   Print the effective gateway configuration
    route <path> [--upgrade] Show how a request path would be dispatched
    help                     Show this help message
    version                  Show version information

ENVIRONMENT:
    PORT                            Listen port (default 8080)
    VELA_STATIC_ROOT                Static asset directory (default public)
    VELA_MAX_CONNECTIONS_PER_IP     Admission window limit (default 1000)
    VELA_WINDOW_DURATION            Admission window seconds (default 60)
    VELA_BLOCK_DURATION             Block penalty seconds (default 30)

EXAMPLES:
    vela serve
    PORT=9000 vela serve
    vela route /bare/v3/
    vela route /wisp --upgrade
"#
    );
}

async fn serve() -> ExitCode {
    let config = GatewayConfig::from_env();
    let gateway = Arc::new(Gateway::new(config, TunnelRegistry::disconnected()));

    match gateway.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Gateway failed: {}", e);
            ExitCode::from(1)
        }
    }
}

fn show_config() {
    let config = GatewayConfig::from_env();
    println!("=== Gateway Configuration ===");
    println!("Port: {}", config.port);
    println!("Static root: {}", config.static_root.display());
    println!("Bare prefix: {}", config.bare_prefix);
    println!("Wisp paths: {:?}", config.wisp_paths);
    println!("Engine prefixes: {} {}", config.uv_prefix, config.scram_prefix);
    println!(
        "Admission: {} conns / {:?} window, {:?} block",
        config.max_connections_per_client, config.window_duration, config.block_duration
    );
    println!(
        "Timeouts: keepalive {:?}, request {:?}",
        config.keep_alive_timeout, config.request_timeout
    );
    println!("Max header bytes: {}", config.max_header_bytes);
}

fn show_route(path: &str, is_upgrade: bool) {
    let config = GatewayConfig::from_env();
    let matcher = EndpointMatcher::new(&config);
    let decision = matcher.classify(path, is_upgrade);
    println!("{} (upgrade: {}) -> {:?}", path, is_upgrade, decision);
}
