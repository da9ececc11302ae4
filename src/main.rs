// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! nvr-media: clip retrieval from an NVR server
//!
//! Usage:
//!   nvr-media fetch --camera front --start 1771509600 --end 1771509900
//!   nvr-media reconstruct --camera front --start 1771509600 --end 1771509900
//!   nvr-media serve --config config.toml
//!   nvr-media check --config config.toml

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use nvr_media::api::{self, AppState};
use nvr_media::clip::{ClipAsset, ClipOrigin, ClipRequest, ClipRetriever};
use nvr_media::config::Config;

#[derive(Parser)]
#[command(name = "nvr-media", about = "NVR clip retrieval", version)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download a clip, falling back to the VOD playlist when needed.
    Fetch(ClipArgs),
    /// Rebuild a clip from the VOD playlist only.
    Reconstruct(ClipArgs),
    /// Serve clip downloads over HTTP.
    Serve,
    /// Validate the configuration and exit.
    Check,
}

#[derive(Args)]
struct ClipArgs {
    #[arg(long)]
    camera: String,
    /// Start, seconds since the Unix epoch.
    #[arg(long)]
    start: i64,
    /// End, seconds since the Unix epoch.
    #[arg(long)]
    end: i64,
    /// Output file. Defaults to `<camera>_<start>_to_<end>.<ext>`.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!(error = ?e, "Command failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Fetch(args) => run_fetch(&cfg, args).await,
        Command::Reconstruct(args) => run_reconstruct(&cfg, args).await,
        Command::Serve => run_serve(cfg).await,
        Command::Check => {
            println!("=== nvr-media config ===");
            println!("NVR server     : {}", cfg.server.base_url);
            println!("Max active     : {}", cfg.scheduler.max_active);
            println!("Rotation above : {}", cfg.scheduler.rotation_threshold);
            println!(
                "Clip attempts  : {} ({} ms apart)",
                cfg.clip.max_attempts, cfg.clip.retry_delay_ms
            );
            println!("Segment fetch  : {} in parallel", cfg.clip.segment_concurrency);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => {
            let cfg = Config::default();
            cfg.validate().context("default configuration")?;
            Ok(cfg)
        }
    }
}

/// Cancel `token` on CTRL+C so in-flight downloads stop cleanly.
fn cancel_on_ctrl_c(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received CTRL+C, cancelling…");
            token.cancel();
        }
    });
}

async fn run_fetch(cfg: &Config, args: ClipArgs) -> anyhow::Result<()> {
    let retriever = ClipRetriever::from_config(cfg).context("building clip retriever")?;
    let token = CancellationToken::new();
    cancel_on_ctrl_c(&token);

    let asset = retriever
        .fetch_clip_with_token(&args.camera, args.start, args.end, &token)
        .await
        .with_context(|| format!("fetching clip for camera '{}'", args.camera))?;

    let output = args.output.unwrap_or_else(|| PathBuf::from(&asset.file_name));
    write_asset(&asset, &output).await
}

async fn run_reconstruct(cfg: &Config, args: ClipArgs) -> anyhow::Result<()> {
    let retriever = ClipRetriever::from_config(cfg).context("building clip retriever")?;
    let request = ClipRequest::new(args.camera.as_str(), args.start, args.end)?;
    let token = CancellationToken::new();
    cancel_on_ctrl_c(&token);

    let rebuilt = retriever
        .reconstructor()
        .reconstruct(&request, &token)
        .await
        .with_context(|| format!("rebuilding clip for camera '{}' from playlist", request.camera))?;

    let asset = ClipAsset::new(
        &request,
        rebuilt.data,
        ClipOrigin::Reconstructed { segments: rebuilt.segments },
    );
    let output = args.output.unwrap_or_else(|| PathBuf::from(&asset.file_name));
    write_asset(&asset, &output).await
}

async fn write_asset(asset: &ClipAsset, output: &Path) -> anyhow::Result<()> {
    tokio::fs::write(output, &asset.data)
        .await
        .with_context(|| format!("writing {}", output.display()))?;
    info!(
        output = ?output,
        bytes = asset.len(),
        content_type = asset.content_type(),
        origin = ?asset.origin,
        "Clip saved"
    );
    Ok(())
}

async fn run_serve(cfg: Config) -> anyhow::Result<()> {
    if !cfg.api.enabled {
        anyhow::bail!("HTTP API is disabled in the configuration ([api] enabled = false)");
    }
    let retriever = ClipRetriever::from_config(&cfg).context("building clip retriever")?;
    let state = Arc::new(AppState {
        retriever,
        base_url: cfg.server.base_url.clone(),
    });

    info!(nvr = cfg.server.base_url, port = cfg.api.port, "Starting clip API");
    tokio::select! {
        _ = api::start_server(state, cfg.api.port) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received CTRL+C, shutting down…");
        }
    }
    Ok(())
}
