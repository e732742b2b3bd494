use anyhow::{Context, Result};
use clap::Parser;
use livecam::{
    Camera, CameraPreset, DeviceCatalog, FramePipeline, LivecamConfig, SyntheticBackend,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "livecam")]
#[command(about = "Live camera controller with soft zoom, autofocus and auto-torch")]
#[command(version)]
#[command(long_about = "Drives a live capture device through its open/pause/close lifecycle, \
maps between raster and display coordinates, and extracts cropped, format-converted frames. \
Without a platform capture backend it runs against a synthetic phone camera.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "livecam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without opening a camera")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Number of frames to extract before closing
    #[arg(long, default_value_t = 10, help = "Frames to pull through the pipeline")]
    frames: u32,

    /// Print the enumerated devices as JSON and exit
    #[arg(long, help = "List capture devices and their capabilities as JSON, then exit")]
    list_devices: bool,

    /// Camera preset to open
    #[arg(long, value_name = "PRESET", help = "Camera preset: back, front, macro-back, quick-back")]
    preset: Option<CameraPreset>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting livecam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match LivecamConfig::load_from_file(&args.config) {
        Ok(config) => {
            info!("Configuration loaded successfully from: {}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }
    config.validate().context("invalid configuration")?;

    let backend = Arc::new(SyntheticBackend::phone());
    let catalog = Arc::new(DeviceCatalog::new(backend));
    let camera = Camera::new(catalog, config.clone());

    if args.list_devices {
        let devices = camera.device_infos().await?;
        let listing = serde_json::to_string_pretty(&devices)
            .context("failed to render device list")?;
        println!("{}", listing);
        return Ok(());
    }

    tokio::select! {
        result = run(&camera, &config, &args) => result?,
        _ = tokio::signal::ctrl_c() => warn!("Interrupted, closing camera"),
    }

    camera.dispose().await;
    info!("Livecam stopped");
    Ok(())
}

/// Open the camera, pull frames through the pipeline and close again
async fn run(camera: &Camera, config: &LivecamConfig, args: &Args) -> Result<()> {
    let mut events = camera.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!("Event: {}", event.description());
        }
    });

    for device in camera.device_infos().await? {
        info!("Device {} ({:?}): {}", device.id, device.facing, device.label);
    }

    if let Some(preset) = args.preset {
        camera.request_camera(preset.into()).await?;
    }
    camera.open().await.context("failed to open camera")?;

    let mut pipeline = FramePipeline::new(camera.clone(), &config.pipeline);
    let request = pipeline.default_request();
    let interval = pipeline.max_timeout().max(Duration::from_millis(10));

    for n in 0..args.frames {
        match pipeline.get_data(request) {
            Ok(buffer) => info!(
                "Frame {}: {:?} {}x{} ({} bytes)",
                n,
                buffer.format,
                buffer.width,
                buffer.height,
                buffer.data.len()
            ),
            Err(e) if e.is_recoverable() => warn!("Frame {} skipped: {}", n, e),
            Err(e) => return Err(e.into()),
        }
        tokio::time::sleep(interval).await;
    }

    info!("Extracted {} buffers", pipeline.extractions());
    camera.close().await;
    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("livecam={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Livecam Configuration File");
    println!("# This is the default configuration with all available options");
    println!();
    let rendered = toml::to_string_pretty(&LivecamConfig::default())
        .context("failed to render default configuration")?;
    println!("{}", rendered);
    Ok(())
}
