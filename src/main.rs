use anyhow::Result;
use clap::Parser;
use scene_classifier::{config::Config, web::serve};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scene-classifier")]
#[command(about = "ONNX-powered scene classification service")]
struct Args {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:5000")]
    bind: String,

    /// Number of worker threads
    #[arg(long)]
    workers: Option<usize>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Path to the ONNX scene model
    #[arg(long, default_value = "models/intel_scene_classifier.onnx")]
    model: String,

    /// Input size (height and width) for models with dynamic spatial dimensions
    #[arg(long, default_value_t = 224)]
    fallback_input_size: usize,

    /// Enable development mode
    #[arg(long)]
    dev: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .init();

    tracing::info!("Starting scene classification service...");
    tracing::info!("Bind address: {}", args.bind);
    tracing::info!("Model path: {}", args.model);

    let config = Config::new(args.bind, args.model, args.workers, args.dev)?
        .with_fallback_input_size(args.fallback_input_size, args.fallback_input_size)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()?;

    runtime.block_on(serve(config))?;

    Ok(())
}
