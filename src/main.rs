use anyhow::{Context, Result};
use audio_sink::{
    create_router, AppState, ChunkStore, Config, Encoder, FfmpegEncoder, OutputStrategy, SessionFinalizer,
};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "audio-sink")]
#[command(about = "Collect streamed audio chunks and assemble them into recordings")]
struct Args {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/audio-sink")]
    config: String,

    /// Override the bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "audio_sink=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut cfg = Config::load(&args.config)?;
    if let Some(bind) = args.bind {
        cfg.service.http.bind = bind;
    }
    if let Some(port) = args.port {
        cfg.service.http.port = port;
    }

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let recordings_dir = cfg.recordings_dir();
    let store = ChunkStore::new();
    let finalizer = match cfg.output.strategy {
        OutputStrategy::Wav => SessionFinalizer::direct(store, &recordings_dir),
        OutputStrategy::Transcode => {
            let encoder = FfmpegEncoder::new(&cfg.output.ffmpeg.binary, cfg.output.ffmpeg.sample_rate);
            info!("Transcoding with {} at {} Hz", encoder.name(), encoder.sample_rate());
            SessionFinalizer::transcoding(store, &recordings_dir, Arc::new(encoder))
        }
    }
    .with_default_sample_rate(cfg.audio.default_sample_rate);

    finalizer
        .prepare()
        .with_context(|| format!("Failed to create {}", finalizer.output_dir().display()))?;

    info!("Output strategy: {:?}", finalizer.mode());
    info!("Recordings directory: {}", finalizer.output_dir().display());

    let state = AppState::new(finalizer).with_max_chunk_bytes(cfg.service.http.max_chunk_bytes);
    let app = create_router(state);

    let bind_addr = cfg.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    info!("HTTP server listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
