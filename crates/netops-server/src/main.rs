use clap::Parser;
use netops_core::{Engine, EngineConfig};
use netops_server::{shutdown, NetOpsService, ServerError};
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "netops",
    about = "Per-slice bandwidth enforcement agent",
    version
)]
struct Cli {
    /// Network interface whose egress traffic is shaped.
    #[arg(long, env = "NETWORK_INTERFACE", default_value = "eth0")]
    interface: String,

    /// Port to listen on.
    #[arg(long, env = "GRPC_PORT", default_value_t = 5000)]
    port: u16,

    /// DEBUG, INFO, WARN, ERROR, FATAL or PANIC. RUST_LOG takes precedence.
    #[arg(long, env = "LOG_LEVEL", default_value = "INFO")]
    log_level: String,

    /// Request worker threads.
    #[arg(long, env = "NETOPS_WORKERS", default_value_t = 4)]
    workers: usize,

    /// Shaping backend: `tc` or `mock`.
    #[arg(long, env = "NETOPS_BACKEND", default_value = "tc")]
    backend: String,
}

fn level_directive(log_level: &str) -> &'static str {
    match log_level.trim().to_ascii_uppercase().as_str() {
        "DEBUG" | "TRACE" => "debug",
        "WARN" | "WARNING" => "warn",
        "ERROR" | "FATAL" | "PANIC" => "error",
        _ => "info",
    }
}

fn run(cli: &Cli) -> Result<(), ServerError> {
    let config = EngineConfig::new(Some(&cli.interface), Some(&cli.backend));
    info!(
        "starting netops on interface {} with {} backend",
        config.interface, config.backend
    );

    if config.backend == "tc" {
        let missing = netops_tc::check_tc_prereqs(&config.interface);
        if !missing.is_empty() {
            warn!("{}", netops_tc::format_missing(&missing));
        }
    }

    let engine = Arc::new(Engine::from_config(&config)?);
    if !engine.backend().available() {
        warn!(
            "{} backend is not usable on this host; shaping requests will fail",
            engine.backend().name()
        );
    }
    if let Err(e) = engine.bootstrap() {
        error!("failed to clear stale shaping configuration: {e}");
    }

    let addr = format!("0.0.0.0:{}", cli.port);
    let server = netops_server::bind(&addr)?;
    info!("listening on {addr}");

    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let service = Arc::new(NetOpsService::with_shutdown(
        engine,
        Arc::clone(&shutdown_flag),
    ));
    if let Err(e) = shutdown::install_signal_handler(shutdown_flag, Arc::clone(&server)) {
        warn!("failed to install signal handler: {e}");
    }

    netops_server::run_server(&service, &server, cli.workers)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(level_directive(&cli.log_level))),
        )
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_levels_map_to_directives() {
        assert_eq!(level_directive("DEBUG"), "debug");
        assert_eq!(level_directive("info"), "info");
        assert_eq!(level_directive("WARN"), "warn");
        assert_eq!(level_directive("FATAL"), "error");
        assert_eq!(level_directive("PANIC"), "error");
        assert_eq!(level_directive(""), "info");
        assert_eq!(level_directive("verbose"), "info");
    }

    #[test]
    fn defaults_without_flags() {
        let cli = Cli::try_parse_from(["netops"]).unwrap();
        assert_eq!(cli.port, 5000);
        assert_eq!(cli.workers, 4);
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "netops",
            "--interface",
            "ens5",
            "--port",
            "6000",
            "--backend",
            "mock",
        ])
        .unwrap();
        assert_eq!(cli.interface, "ens5");
        assert_eq!(cli.port, 6000);
        assert_eq!(cli.backend, "mock");
    }
}
