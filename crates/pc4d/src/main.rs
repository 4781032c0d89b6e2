//! pc4d entrypoint: wires configuration, a Unix-socket transport, and the
//! protocol engine together, then runs until interrupted.

use anyhow::Result;
use clap::Parser;
use pc4_engine::{channel_sink, Engine};
use pc4_transport::UnixSocketTransport;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "pc4d", version, about = "Nanoptix PayCheck 4 protocol emulator")]
struct Args {
    /// Optional configuration file path (overrides discovery of `pc4d.toml`).
    #[arg(long = "config")]
    config: Option<PathBuf>,
    /// Unix domain socket path the host connects to in place of the USB CDC-ACM device.
    #[arg(long = "socket", default_value = "/tmp/pc4d.sock")]
    socket: PathBuf,
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn configure_logging(&mut self) {
        let log_dir = Path::new(".");
        let log_path = log_dir.join("pc4d.log");
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, "pc4d.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
        {
            Ok(_) => self.log_guard = Some(guard),
            Err(_err) => {
                // A global subscriber is already installed (e.g. under a test
                // harness); drop the unused guard so its writer shuts down.
            }
        }
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime", "panic: {info}");
                default_panic(info);
            }));
        });
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut startup = AppStartup::new();
    startup.configure_logging();
    AppStartup::install_panic_hook();

    let args = Args::parse();
    info!(target: "runtime", socket = %args.socket.display(), "startup");

    let config = pc4_config::load_from(args.config.clone())?.into_engine_config();

    let (sink, inbound_rx) = channel_sink();
    let transport = std::sync::Arc::new(UnixSocketTransport::new(args.socket.clone(), std::sync::Arc::new(sink)));
    let engine = Engine::new(config, transport, inbound_rx);

    engine.start().await?;
    info!(target: "runtime", "engine running, waiting for the host to connect");

    tokio::signal::ctrl_c().await?;
    info!(target: "runtime", "shutdown requested");
    engine.stop().await?;

    Ok(())
}
