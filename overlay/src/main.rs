//! vrkb-overlay - VR keyboard overlay service
//!
//! Bridges controller poses to pointer input on a keyboard panel and keeps
//! the panel texture in step with the render surface.

use vrkb_overlay::backend::{self, HeadlessConfig};
use vrkb_overlay::config::{Buffering, CaptureMode, InputSchedule, OverlayConfig, SpawnOrientation};

use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "vrkb-overlay", about = "VR keyboard overlay service")]
struct Cli {
    /// Backend to use: headless or auto
    #[arg(long, default_value = "auto")]
    backend: String,

    /// Input ticks per second
    #[arg(long, default_value = "120")]
    input_fps: u32,

    /// Run input on a fixed timer instead of following surface paints
    #[arg(long)]
    input_fixed_rate: bool,

    /// Capture ticks per second (timer rate, or paint fallback rate)
    #[arg(long, default_value = "60")]
    capture_fps: u32,

    /// Capture scheduling: paint or poll
    #[arg(long, default_value = "paint")]
    capture_mode: String,

    /// Use one panel texture instead of two
    #[arg(long)]
    single_buffer: bool,

    /// Smooth controller hit points
    #[arg(long)]
    stabilize: bool,

    /// Panel width in meters
    #[arg(long, default_value = "0.5")]
    width: f64,

    /// Spawn orientation: yaw or head
    #[arg(long, default_value = "yaw")]
    spawn_orientation: String,

    /// Spawn tilt about the panel's X axis, in degrees
    #[arg(long, default_value = "-30", allow_hyphen_values = true)]
    spawn_tilt: f64,

    /// Render surface size (WxH)
    #[arg(long, default_value = "1000x500")]
    headless_size: String,

    /// Simulated paint rate in headless mode (0 disables)
    #[arg(long, default_value = "60")]
    headless_paint_fps: u32,

    /// Complete captures asynchronously in headless mode
    #[arg(long)]
    headless_deferred: bool,

    /// Do not drive a scripted controller in headless mode
    #[arg(long)]
    headless_no_sweep: bool,

    /// Exit after N seconds (headless mode testing)
    #[arg(long)]
    headless_exit_after: Option<u64>,

    /// Show version and exit
    #[arg(long)]
    version: bool,
}

impl Cli {
    fn overlay_config(&self) -> OverlayConfig {
        let mut config = OverlayConfig::default();

        config.input.fps = self.input_fps;
        config.input.schedule = if self.input_fixed_rate {
            InputSchedule::Interval
        } else {
            InputSchedule::SyncWithCapture {
                fallback_fps: self.input_fps.min(30),
            }
        };
        config.input.stabilizer.enabled = self.stabilize;

        config.present.fps = self.capture_fps;
        config.present.mode = CaptureMode::from_str(&self.capture_mode).unwrap_or_else(|| {
            eprintln!("Unknown capture mode '{}', using paint", self.capture_mode);
            CaptureMode::PaintDriven
        });
        if self.single_buffer {
            config.present.buffering = Buffering::Single;
        }

        config.panel.width_m = self.width;
        config.spawn.orientation = SpawnOrientation::from_str(&self.spawn_orientation).unwrap_or_else(|| {
            eprintln!("Unknown spawn orientation '{}', using yaw", self.spawn_orientation);
            SpawnOrientation::YawOnly
        });
        config.spawn.tilt_deg = self.spawn_tilt;
        config
    }

    fn headless_config(&self) -> HeadlessConfig {
        let (surface_width, surface_height) = HeadlessConfig::parse_size(&self.headless_size).unwrap_or_else(|| {
            eprintln!("Invalid headless size '{}', using 1000x500", self.headless_size);
            (1000, 500)
        });
        HeadlessConfig {
            surface_width,
            surface_height,
            paint_fps: self.headless_paint_fps,
            deferred_frames: self.headless_deferred,
            sweep_controller: !self.headless_no_sweep,
            exit_after: self.headless_exit_after,
            ..Default::default()
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("vrkb-overlay {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vrkb_overlay=info".into()),
        )
        .init();

    info!("vrkb-overlay v{} starting", env!("CARGO_PKG_VERSION"));
    info!("backend: {}", cli.backend);

    let Some(backend_type) = backend::BackendType::from_str(&cli.backend) else {
        eprintln!("Unknown backend: {}. Use: headless or auto", cli.backend);
        std::process::exit(1);
    };

    backend::run(backend_type, cli.overlay_config(), cli.headless_config())
}
