//! Entry point for the sysmon console. Parses args, loads config and runs the
//! selected monitor.

mod config;
mod send;
mod summary;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sysmon_core::metrics::SystemSource;
use sysmon_core::network_view::NetworkViews;
use sysmon_core::{start_network_monitor, start_process_monitor, Console, MonitorHandle};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use config::{Config, SftpConfig};

#[derive(Parser)]
#[command(name = "sysmon")]
#[command(author, version, about = "Host telemetry console: processes, network diagnostics, file push")]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/sysmon/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Live process table with sort and filter views
    Processes,
    /// Port scan, ping and traceroute
    Network,
    /// Upload a file from the current directory over SFTP
    Sftp(SftpArgs),
}

#[derive(Args)]
struct SftpArgs {
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    user: Option<String>,
    #[arg(long, value_name = "DIR")]
    remote_dir: Option<String>,
}

impl SftpArgs {
    fn apply(self, cfg: &mut SftpConfig) {
        if let Some(h) = self.host {
            cfg.host = h;
        }
        if let Some(p) = self.port {
            cfg.port = p;
        }
        if let Some(u) = self.user {
            cfg.username = u;
        }
        if let Some(d) = self.remote_dir {
            cfg.remote_dir = d;
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SYSMON_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Cancel `stop` on Ctrl-C.
fn stop_on_ctrl_c(stop: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted");
            stop.cancel();
        }
    });
}

async fn run_monitor(handle: MonitorHandle) -> Result<()> {
    stop_on_ctrl_c(handle.stop_token());
    handle.wait().await.context("monitor failed")
}

async fn run(command: Option<Commands>, cfg: Config) -> Result<()> {
    let console = Console::stdout();
    match command {
        None => {
            let stop = CancellationToken::new();
            stop_on_ctrl_c(stop.clone());
            summary::run(console, stop).await;
            Ok(())
        }
        Some(Commands::Processes) => {
            let input = BufReader::new(tokio::io::stdin());
            let handle =
                start_process_monitor(SystemSource::new(), input, console, &cfg.monitor);
            run_monitor(handle).await
        }
        Some(Commands::Network) => {
            let input = BufReader::new(tokio::io::stdin());
            let views = NetworkViews::new(console.clone(), &cfg.monitor);
            run_monitor(start_network_monitor(views, input, console)).await
        }
        Some(Commands::Sftp(args)) => {
            let mut sftp = cfg.sftp;
            args.apply(&mut sftp);
            let mut input = BufReader::new(tokio::io::stdin());
            let dir = std::env::current_dir().context("resolving current directory")?;
            send::run(&sftp, &dir, &console, &mut input).await?;
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let path = cli.config.unwrap_or_else(config::config_path);
    let cfg = config::load(&path)?.with_env_overrides();
    debug!(config = %path.display(), "configuration loaded");

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting runtime")?;
    let result = rt.block_on(run(cli.command, cfg));
    // stdin reads sit on a blocking thread that never returns; don't wait on it
    rt.shutdown_timeout(Duration::from_millis(100));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sftp_flags_override_config() {
        let mut cfg = SftpConfig::default();
        SftpArgs {
            host: Some("nas".into()),
            port: Some(2200),
            user: None,
            remote_dir: Some("/incoming".into()),
        }
        .apply(&mut cfg);
        assert_eq!(cfg.host, "nas");
        assert_eq!(cfg.port, 2200);
        assert_eq!(cfg.username, "admin");
        assert_eq!(cfg.remote_dir, "/incoming");
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["sysmon", "--config", "/tmp/c.json", "network"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Network)));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.json")));

        let cli = Cli::try_parse_from(["sysmon", "sftp", "--port", "2022"]).unwrap();
        match cli.command {
            Some(Commands::Sftp(a)) => assert_eq!(a.port, Some(2022)),
            _ => panic!("expected sftp"),
        }
        assert!(Cli::try_parse_from(["sysmon", "bogus"]).is_err());
    }
}
