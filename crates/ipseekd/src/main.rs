// # ipseekd - IPsec endpoint update daemon
//
// The ipseekd daemon is responsible for:
// 1. Parsing flags (each with an environment fallback)
// 2. Loading the YAML update group configuration
// 3. Registering backend drivers
// 4. Serving `GET /update` and handing accepted requests to the dispatcher
//
// All reconciliation logic lives in ipseek-core and the driver crates.
//
// ## Flags
//
// - `-c, --config` / `IPSEEK_CONFIG`: configuration file (default `ipseek.yml`)
// - `-b, --bind` / `IPSEEK_BIND`: listen address or host name (default `0.0.0.0`)
// - `-p, --port` / `IPSEEK_PORT`: listen port (default `8088`)
// - `--log-level` / `IPSEEK_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// ipseekd -c /etc/ipseek/ipseek.yml -p 8088
// curl 'http://localhost:8088/update?group=vpn1&address=203.0.113.5'
// ```

mod server;

use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use ipseek_core::{Configuration, Dispatcher, DriverRegistry};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum IpseekExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<IpseekExitCode> for ExitCode {
    fn from(code: IpseekExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Command line flags
#[derive(Debug, Parser)]
#[command(name = "ipseekd", version, about = "Point IPsec endpoints at addresses received over HTTP")]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "IPSEEK_CONFIG", default_value = "ipseek.yml")]
    config: PathBuf,

    /// Address or host name to listen on
    #[arg(short, long, env = "IPSEEK_BIND", default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on
    #[arg(short, long, env = "IPSEEK_PORT", default_value_t = 8088)]
    port: u16,

    /// Maximum log level
    #[arg(long, env = "IPSEEK_LOG_LEVEL", default_value = "info")]
    log_level: Level,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                IpseekExitCode::ConfigError.into()
            } else {
                IpseekExitCode::CleanShutdown.into()
            };
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return IpseekExitCode::ConfigError.into();
    }

    info!("Starting ipseekd daemon");

    let config = match Configuration::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load {}: {}", cli.config.display(), e);
            return IpseekExitCode::ConfigError.into();
        }
    };

    info!(
        "Configuration loaded: {} update group(s)",
        config.update_groups.len()
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return IpseekExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        let (app, listener) = match start(&cli, config).await {
            Ok(started) => started,
            Err(e) => {
                error!("Startup error: {:#}", e);
                return IpseekExitCode::ConfigError;
            }
        };

        match serve(app, listener).await {
            Ok(()) => IpseekExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                IpseekExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Register drivers, build the dispatcher and bind the listener
async fn start(cli: &Cli, config: Configuration) -> Result<(Router, TcpListener)> {
    let registry = build_registry(&config)?;

    for group in &config.update_groups {
        for object in &group.objects {
            if !registry.has_driver(&object.object_type) {
                warn!(
                    "Object {}@{} has type {} with no registered driver",
                    object.name, group.name, object.object_type
                );
            }
        }
    }

    // Outcomes are reported through logs; nobody consumes the event channel.
    let (dispatcher, _events) = Dispatcher::new(Arc::new(config), Arc::new(registry))?;
    let app = server::router(Arc::new(dispatcher));

    let addr = resolve_bind(&cli.bind, cli.port).await?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Listening on {}", addr);
    Ok((app, listener))
}

/// Resolve the listen host (address or name) to its first socket address
async fn resolve_bind(host: &str, port: u16) -> Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("Failed to resolve bind address {}", host))?
        .next()
        .with_context(|| format!("Bind address {} resolved to nothing", host))
}

fn build_registry(config: &Configuration) -> Result<DriverRegistry> {
    #[cfg_attr(not(feature = "openstack"), allow(unused_mut))]
    let mut registry = DriverRegistry::new();

    #[cfg(feature = "openstack")]
    {
        info!("Registering OpenStack IPsec site connection driver");
        ipseek_driver_openstack::register(&mut registry, config.dispatch.request_timeout())?;
    }

    #[cfg(not(feature = "openstack"))]
    let _ = config;

    info!("Registered drivers: {:?}", registry.list_drivers());
    Ok(registry)
}

/// Serve trigger requests until a shutdown signal arrives
///
/// Reconciliation tasks still running at that point are not awaited.
async fn serve(app: Router, listener: TcpListener) -> Result<()> {
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server failed")?;

    info!("Shutting down daemon");
    Ok(())
}

async fn shutdown_signal() {
    match wait_for_shutdown().await {
        Ok(signal) => info!("Received shutdown signal: {}", signal),
        Err(e) => {
            error!("Shutdown signal handling unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
