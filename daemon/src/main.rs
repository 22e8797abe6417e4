mod config;
mod setup;
mod telemetry;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use task_daemon_hub::commands::default_registry;
use task_daemon_hub::registry::DaemonControl;
use task_daemon_workflow::{wiring, AlwaysPassTestRunner, EchoAgentSessionFactory, NoOpCommitRunner};
use telemetry::{init_telemetry, log_config_validation, log_startup_info};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "task-daemon")]
#[command(about = "Task Store, Dependency Engine, Command/Event Hub, and Workflow Engine daemon")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CONFIG_FILE")]
    config: Option<String>,

    /// Base directory override (each environment lives at `<base>/<env>`)
    #[arg(long, env = "TASKD_BASE_DIR")]
    base_dir: Option<String>,

    /// TCP Command Server port override
    #[arg(long, env = "TASKD_TCP_PORT")]
    tcp_port: Option<u16>,

    /// HTTP/WebSocket listener port override
    #[arg(long, env = "TASKD_HTTP_PORT")]
    http_port: Option<u16>,

    /// Skip starting the TCP Command Server (headless runs)
    #[arg(long)]
    skip_tcp: bool,

    /// Disable the workflow loop entirely
    #[arg(long)]
    test_mode: bool,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            info!(path, "loading configuration from file");
            Config::from_file(path)?
        }
        None => {
            info!("loading configuration from environment");
            Config::from_env()?
        }
    };

    if let Some(ref base_dir) = cli.base_dir {
        config.daemon.base_dir = base_dir.clone();
    }
    if let Some(tcp_port) = cli.tcp_port {
        config.daemon.tcp_port = tcp_port;
    }
    if let Some(http_port) = cli.http_port {
        config.daemon.http_port = http_port;
    }
    if cli.skip_tcp {
        config.daemon.skip_tcp = true;
    }
    if cli.test_mode {
        config.daemon.test_mode = true;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = load_config(&cli).context("failed to load configuration")?;
    init_telemetry(&config.logging).context("failed to initialize telemetry")?;
    log_config_validation(&config);

    if let Err(e) = config.validate() {
        error!(error = %e, "configuration validation failed");
        std::process::exit(1);
    }
    log_startup_info(&config);

    let Some((env_registry, _locks)) = setup::open_environments(&config).await? else {
        // Another daemon already owns this environment directory; exit cleanly.
        return Ok(());
    };
    let env_registry = Arc::new(env_registry);

    let control = Arc::new(DaemonControl::new());
    let command_registry = Arc::new(default_registry());
    let workflow_registry = Arc::new(wiring::default_registry(
        Arc::new(AlwaysPassTestRunner),
        Arc::new(NoOpCommitRunner),
    ));
    let agent_factory = Arc::new(EchoAgentSessionFactory);
    let audit_retention = chrono::Duration::days(config.daemon.audit_retention_days);

    spawn_signal_watcher(control.clone());

    let restart = task_daemon_hub::server::run(
        &config.tcp_address(),
        &config.http_address(),
        command_registry,
        env_registry,
        control,
        workflow_registry,
        agent_factory,
        audit_retention,
        config.daemon.skip_tcp,
    )
    .await
    .context("daemon run loop failed")?;

    drop(_locks);

    if restart {
        info!("restart requested, re-executing");
        reexec()?;
    }

    info!("task daemon shut down cleanly");
    Ok(())
}

/// Listens for SIGTERM/SIGINT (or Ctrl+C on Windows) and requests a clean
/// shutdown through [`DaemonControl`].
fn spawn_signal_watcher(control: Arc<DaemonControl>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    error!(error = %e, "failed to register SIGTERM handler");
                    return;
                }
            };
            let mut sigint = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()) {
                Ok(s) => s,
                Err(e) => {
                    error!(error = %e, "failed to register SIGINT handler");
                    return;
                }
            };
            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM"),
                _ = sigint.recv() => info!("received SIGINT"),
            }
        }
        #[cfg(windows)]
        {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            info!("received ctrl+c");
        }
        control.request_shutdown();
    });
}

#[cfg(unix)]
fn reexec() -> Result<()> {
    use std::os::unix::process::CommandExt;
    let exe = std::env::current_exe().context("failed to resolve current executable")?;
    let args: Vec<String> = std::env::args().skip(1).collect();
    let err = std::process::Command::new(exe).args(args).exec();
    Err(anyhow::anyhow!("failed to re-exec task daemon: {err}"))
}

#[cfg(not(unix))]
fn reexec() -> Result<()> {
    let exe = std::env::current_exe().context("failed to resolve current executable")?;
    let args: Vec<String> = std::env::args().skip(1).collect();
    std::process::Command::new(exe).args(args).spawn().context("failed to spawn replacement process")?;
    Ok(())
}
