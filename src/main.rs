//! Frame Pipeline CLI
//!
//! Runs the capture pipeline against a synthetic (or, with the `camera`
//! feature, a physical) camera, cycling through colour-filter "styles" the
//! way a user would by tapping the preview.

use clap::{Parser, ValueEnum};
use frame_pipeline::{
    auth::{check_authorization, AuthorizationKind, StaticAuthorization},
    capture::{CaptureBackend, FileConfig, Frame, MockCamera},
    pipeline::{FramePipeline, PostedDelivery},
    transform::{FrameModel, Grayscale, Invert, ModelCycle, Sepia},
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Live camera pipeline demo.
#[derive(Debug, Parser)]
#[command(name = "frame-pipeline", version, about)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many delivered frames (0 runs until Ctrl-C).
    #[arg(short = 'n', long)]
    frames: Option<u64>,

    /// Switch style after this many delivered frames (0 disables).
    #[arg(long)]
    cycle_every: Option<u64>,

    /// Upper frame-rate bound.
    #[arg(long)]
    max_fps: Option<u32>,

    /// Styles to cycle through, in order.
    #[arg(long, value_enum, value_delimiter = ',', default_values = ["sepia", "grayscale", "invert"])]
    styles: Vec<Style>,

    /// Serve Prometheus metrics on this port.
    #[cfg(feature = "metrics")]
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Capture from a physical camera instead of the synthetic one.
    #[cfg(feature = "camera")]
    #[arg(long)]
    native: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Style {
    Sepia,
    Grayscale,
    Invert,
}

impl Style {
    fn model(self) -> Arc<dyn FrameModel> {
        match self {
            Style::Sepia => Arc::new(Sepia),
            Style::Grayscale => Arc::new(Grayscale),
            Style::Invert => Arc::new(Invert),
        }
    }
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    info!("Frame Pipeline v{}", frame_pipeline::VERSION);

    let mut config = match &args.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => FileConfig::default(),
    };
    if let Some(frames) = args.frames {
        config.output.frame_count = frames;
    }
    if let Some(cycle_every) = args.cycle_every {
        config.output.cycle_every = cycle_every;
    }
    if let Some(max_fps) = args.max_fps {
        config.capture.max_fps = max_fps;
    }
    #[cfg(feature = "metrics")]
    {
        if let Some(port) = args.metrics_port {
            config.output.metrics_port = port;
        }
    }
    if let Err(e) = config.capture.validate() {
        error!("Invalid capture configuration: {}", e);
        std::process::exit(1);
    }

    if !camera_authorized() {
        error!("Camera access is required to run this demo");
        std::process::exit(1);
    }

    let delivery = Arc::new(PostedDelivery::new("main"));
    let pipeline = match FramePipeline::new(backend(&args), config.capture.clone(), delivery.clone())
    {
        Ok(pipeline) => Arc::new(pipeline),
        Err(e) => {
            error!("Failed to create pipeline: {}", e);
            std::process::exit(1);
        }
    };

    // Camera setup failure is fatal; there is nothing to do without frames.
    if let Err(e) = pipeline.configure() {
        error!("{}", e);
        std::process::exit(1);
    }

    #[cfg(feature = "metrics")]
    spawn_metrics_server(config.output.metrics_port, Arc::clone(&pipeline));

    let delivered = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&delivered);
    pipeline.set_delivery_callback(Some(Arc::new(move |frame: Frame| {
        let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            n,
            sequence = frame.sequence(),
            timestamp = ?frame.timestamp(),
            brightness = mean_brightness(&frame),
            "Displayed frame"
        );
    })));

    let mut styles = ModelCycle::new(args.styles.iter().map(|s| s.model()).collect());
    pipeline.set_transform(Some(styles.current_transform()));

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!("Failed to install Ctrl-C handler: {}", e);
    }

    if let Err(e) = pipeline.start_running() {
        error!("Failed to start capture: {}", e);
        std::process::exit(1);
    }

    let frame_count = config.output.frame_count;
    let cycle_every = config.output.cycle_every;
    let mut last_cycle = 0;
    info!(frame_count, cycle_every, "Processing frames...");

    while !interrupted.load(Ordering::SeqCst) {
        delivery.run_until(Instant::now() + Duration::from_millis(50));
        let n = delivered.load(Ordering::Relaxed);

        if cycle_every > 0 && n / cycle_every > last_cycle {
            last_cycle = n / cycle_every;
            styles.advance();
            pipeline.set_transform(Some(styles.current_transform()));
        }
        if frame_count > 0 && n >= frame_count {
            break;
        }
    }

    let session = pipeline.session();
    if let Err(e) = pipeline.stop_running() {
        warn!("Failed to stop capture: {}", e);
    }
    delivery.run_pending();
    if let Err(e) = pipeline.tear_down() {
        warn!("Failed to tear down session: {}", e);
    }

    let stats = pipeline.stats();
    info!(
        "Captured {} frames: {} delivered, {} discarded, {} dropped by camera",
        stats.frames_captured, stats.frames_delivered, stats.frames_discarded, stats.frames_dropped
    );
    info!(
        "Average transform time: {:?}; final style: {}",
        stats.average_transform_time(),
        styles.active_name().unwrap_or("none")
    );
    if let Some(session) = session {
        let elapsed = chrono::Utc::now() - session.configured_at();
        info!("Session ran for {}s", elapsed.num_seconds());
    }
}

/// The demo has no platform permission prompt; access is always granted.
fn camera_authorized() -> bool {
    let (tx, rx) = crossbeam_channel::bounded(1);
    check_authorization(
        &StaticAuthorization::granted(),
        AuthorizationKind::Camera,
        Box::new(move |granted| {
            let _ = tx.send(granted);
        }),
    );
    rx.recv().unwrap_or(false)
}

fn backend(args: &Args) -> Box<dyn CaptureBackend> {
    #[cfg(feature = "camera")]
    {
        if args.native {
            return Box::new(frame_pipeline::capture::NativeCamera::new());
        }
    }
    let _ = args;
    Box::new(MockCamera::new())
}

/// Mean of the colour channels, as a cheap stand-in for drawing the frame.
fn mean_brightness(frame: &Frame) -> u8 {
    let pixels = frame.pixel_count().max(1) as u64;
    let total: u64 = frame
        .pixels()
        .chunks_exact(4)
        .map(|px| (u64::from(px[0]) + u64::from(px[1]) + u64::from(px[2])) / 3)
        .sum();
    (total / pixels) as u8
}

#[cfg(feature = "metrics")]
fn spawn_metrics_server(port: u16, pipeline: Arc<FramePipeline>) {
    use frame_pipeline::metrics::{MetricsRegistry, MetricsServer, MetricsServerConfig};

    if port == 0 {
        return;
    }
    let registry = match MetricsRegistry::new() {
        Ok(registry) => registry,
        Err(e) => {
            warn!("Metrics disabled: {}", e);
            return;
        }
    };
    let server = MetricsServer::new(MetricsServerConfig::with_port(port), registry, pipeline);

    let spawned = std::thread::Builder::new()
        .name("metrics".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(e) => {
                    warn!("Failed to start metrics runtime: {}", e);
                    return;
                }
            };
            if let Err(e) = runtime.block_on(server.run()) {
                warn!("Metrics server stopped: {}", e);
            }
        });
    if let Err(e) = spawned {
        warn!("Failed to spawn metrics thread: {}", e);
    }
}
