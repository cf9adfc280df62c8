use anyhow::{anyhow, Context};
use clap::Parser;
use classbookd::config::AppConfig;
use classbookd::ipc;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "CLASSBOOKD_LOG";

/// classbookd - class records sidecar speaking JSON lines on stdin/stdout
#[derive(Parser, Debug)]
#[command(name = "classbookd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Workspace directory to open at startup
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// TOML config; overrides <workspace>/classbookd.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter (trace, debug, info, warn, error). Falls back to $CLASSBOOKD_LOG
    #[arg(long)]
    log_level: Option<String>,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(args: &Args) -> anyhow::Result<()> {
    let level = args
        .log_level
        .clone()
        .or_else(|| std::env::var(LOG_ENV).ok())
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries responses; logs never go there.
    if let Some(log_file) = &args.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .context("failed to open log file")?;
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file)
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    let mut state = ipc::AppState::default();
    if let Some(path) = &args.config {
        let cfg = AppConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.to_string_lossy()))?;
        state.config_override = Some(cfg);
    }
    if let Some(path) = &args.workspace {
        ipc::open_workspace(&mut state, path).map_err(|e| anyhow!("{}", e))?;
    }
    info!(version = env!("CARGO_PKG_VERSION"), "classbookd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => {
                // No id to echo back.
                warn!(error = %e, "unparseable request line");
                serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                })
            }
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    Ok(())
}
