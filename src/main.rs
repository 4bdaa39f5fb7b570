use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use pixoo_mirror::{
    CaptureRegion, DeviceSink, Filter, LatestPreview, MemorySink, PixooSink, ProcessingConfig,
    ResizeMethod, StreamConfig, StreamController, list_displays, logger,
};

/// Mirror your screen, or show an image, on a Divoom Pixoo 64.
#[derive(Parser, Debug)]
#[command(name = "pixoo-mirror", version)]
#[command(about = "Mirror your screen onto a Pixoo 64 LED panel")]
#[command(long_about = "Mirror your screen onto a Pixoo 64 LED panel.
Frames are cropped, resized to 64x64 and optionally filtered before being sent over the
device's local HTTP API. Set PIXOO_ADDRESS to skip --address; RUST_LOG controls logging.")]
struct Cli {
    /// Debug-level logging unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream the screen (or a still image) until Ctrl-C or --duration elapses
    Stream(StreamArgs),
    /// Capture the screen once and send it
    Snapshot(SnapshotArgs),
    /// Send an image file once
    Show(ShowArgs),
    /// Fill the display with one colour
    Clear(ClearArgs),
    /// Write a short message with the built-in 3x5 font
    Text(TextArgs),
    /// List capturable displays
    Displays {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct DeviceArgs {
    /// Pixoo IP address or host[:port]
    #[arg(short, long, env = "PIXOO_ADDRESS")]
    address: Option<String>,

    /// HTTP timeout per request
    #[arg(long, default_value = "2s", help = "Request timeout: 500ms, 2s, 1m")]
    timeout: String,
}

#[derive(Args, Debug)]
struct LookArgs {
    /// Crop to the centered square before resizing
    #[arg(long)]
    crop: bool,

    /// Interpolation used to reach 64x64
    #[arg(long, value_enum)]
    resize: Option<ResizeMethod>,

    /// Filter applied after resizing
    #[arg(long, value_enum, default_value_t = Filter::None)]
    filter: Filter,

    /// Leave the pixel grid off the saved preview
    #[arg(long)]
    no_grid: bool,

    /// Save the last preview (512x512) to this file
    #[arg(long)]
    preview: Option<PathBuf>,
}

impl LookArgs {
    fn processing(&self, default_resize: ResizeMethod) -> ProcessingConfig {
        ProcessingConfig {
            crop_to_square: self.crop,
            resize_method: self.resize.unwrap_or(default_resize),
            filter: self.filter,
            show_grid: !self.no_grid,
        }
    }
}

#[derive(Args, Debug)]
struct StreamArgs {
    #[command(flatten)]
    device: DeviceArgs,

    #[command(flatten)]
    look: LookArgs,

    /// Target frames per second
    #[arg(short = 'f', long, default_value_t = 60)]
    fps: u32,

    /// What to capture: primary, display:N or square:N
    #[arg(short, long, default_value = "primary")]
    region: CaptureRegion,

    /// Stop after this long: 30 (seconds), 30s, 2m, 1h
    #[arg(short, long)]
    duration: Option<String>,

    /// Send this image once instead of streaming the screen
    #[arg(long)]
    image: Option<PathBuf>,

    /// Run the whole pipeline without a device
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct SnapshotArgs {
    #[command(flatten)]
    device: DeviceArgs,

    #[command(flatten)]
    look: LookArgs,

    /// What to capture: primary, display:N or square:N
    #[arg(short, long, default_value = "primary")]
    region: CaptureRegion,
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// Image file (PNG, JPEG, GIF, BMP, WebP, ...)
    path: PathBuf,

    #[command(flatten)]
    device: DeviceArgs,

    #[command(flatten)]
    look: LookArgs,
}

#[derive(Args, Debug)]
struct ClearArgs {
    #[command(flatten)]
    device: DeviceArgs,

    /// Fill colour as r,g,b
    #[arg(long, default_value = "0,0,0")]
    color: String,
}

#[derive(Args, Debug)]
struct TextArgs {
    /// Message to draw; use \n for a second line
    message: String,

    #[command(flatten)]
    device: DeviceArgs,

    /// Top-left corner of the text as x,y
    #[arg(long, default_value = "0,0", allow_hyphen_values = true)]
    pos: String,

    /// Text colour as r,g,b
    #[arg(long, default_value = "255,255,255")]
    color: String,

    /// Background colour as r,g,b
    #[arg(long, default_value = "0,0,0")]
    background: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    match cli.command {
        Command::Stream(args) => stream(args),
        Command::Snapshot(args) => snapshot(args),
        Command::Show(args) => show(args),
        Command::Clear(args) => clear(args),
        Command::Text(args) => text(args),
        Command::Displays { json } => displays(json),
    }
}

fn stream(args: StreamArgs) -> Result<()> {
    let run_for = args.duration.as_deref().map(parse_duration).transpose()?;
    let settings = StreamConfig {
        fps: args.fps,
        region: args.region,
        http_timeout: parse_duration(&args.device.timeout)?,
        ..StreamConfig::default()
    };
    let preview = LatestPreview::new();
    let mut controller = StreamController::builder()
        .with_settings(settings.clone())
        .with_processing(args.look.processing(ResizeMethod::Nearest))
        .with_surface(Arc::new(preview.clone()))
        .build()?;

    let recorder = MemorySink::keep_last(1);
    let sink: Box<dyn DeviceSink> = if args.dry_run {
        Box::new(recorder.clone())
    } else {
        Box::new(connect(&args.device, settings.http_timeout)?)
    };
    controller.connect(sink);

    // A still is sent once, never looped
    if let Some(path) = &args.image {
        controller.show_static(path)?;
        println!("Sent {} to the device", path.display());
        if args.dry_run {
            println!("dry run: {} frames committed", recorder.commits());
        }
        return save_preview(&preview, args.look.preview.as_ref());
    }

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("failed to install Ctrl-C handler")?;

    controller.start()?;
    match run_for {
        Some(limit) => {
            info!(?limit, "streaming, press Ctrl-C to stop early");
            let _ = rx.recv_timeout(limit);
        }
        None => {
            info!("streaming, press Ctrl-C to stop");
            let _ = rx.recv();
        }
    }
    controller.stop();

    let stats = controller.stats();
    println!(
        "{} ticks, {} frames sent, {} skipped",
        stats.ticks, stats.frames_sent, stats.skipped
    );
    if args.dry_run {
        println!("dry run: {} frames committed", recorder.commits());
    }
    save_preview(&preview, args.look.preview.as_ref())
}

fn snapshot(args: SnapshotArgs) -> Result<()> {
    let settings = StreamConfig {
        region: args.region,
        http_timeout: parse_duration(&args.device.timeout)?,
        ..StreamConfig::default()
    };
    let preview = LatestPreview::new();
    let mut controller = StreamController::builder()
        .with_settings(settings.clone())
        .with_processing(args.look.processing(ResizeMethod::Bicubic))
        .with_surface(Arc::new(preview.clone()))
        .build()?;
    controller.connect(Box::new(connect(&args.device, settings.http_timeout)?));
    controller.capture_once()?;
    println!("Sent {} to the device", args.region);
    save_preview(&preview, args.look.preview.as_ref())
}

fn show(args: ShowArgs) -> Result<()> {
    let timeout = parse_duration(&args.device.timeout)?;
    let preview = LatestPreview::new();
    let mut controller = StreamController::builder()
        .with_processing(args.look.processing(ResizeMethod::Nearest))
        .with_surface(Arc::new(preview.clone()))
        .build()?;
    controller.connect(Box::new(connect(&args.device, timeout)?));
    controller.show_static(&args.path)?;
    println!("Sent {} to the device", args.path.display());
    save_preview(&preview, args.look.preview.as_ref())
}

fn clear(args: ClearArgs) -> Result<()> {
    let color = parse_color(&args.color)?;
    let mut sink = connect(&args.device, parse_duration(&args.device.timeout)?)?;
    sink.clear(color)?;
    println!("Cleared {} to {},{},{}", sink.address(), color[0], color[1], color[2]);
    Ok(())
}

fn text(args: TextArgs) -> Result<()> {
    let origin = parse_position(&args.pos)?;
    let color = parse_color(&args.color)?;
    let background = parse_color(&args.background)?;
    let message = args.message.replace("\\n", "\n");
    let mut sink = connect(&args.device, parse_duration(&args.device.timeout)?)?;
    sink.show_text(&message, origin, color, background)?;
    println!("Sent \"{}\" to {}", args.message, sink.address());
    Ok(())
}

fn displays(json: bool) -> Result<()> {
    let displays = list_displays()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&displays)?);
    } else if displays.is_empty() {
        println!("No displays found");
    } else {
        for display in &displays {
            println!("{display}  (--region display:{0} or square:{0})", display.index);
        }
    }
    Ok(())
}

fn connect(device: &DeviceArgs, timeout: Duration) -> Result<PixooSink> {
    let address = device
        .address
        .as_deref()
        .ok_or_else(|| anyhow!("no device address: pass --address or set PIXOO_ADDRESS"))?;
    Ok(PixooSink::connect(address, timeout)?)
}

fn save_preview(preview: &LatestPreview, path: Option<&PathBuf>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    if preview.save(path)? {
        println!("Preview saved to {}", path.display());
    } else {
        println!("No preview was rendered");
    }
    Ok(())
}

/// Parse duration string like "30s", "2m", "1h" (or "500ms"); a bare number
/// means seconds
fn parse_duration(duration: &str) -> Result<Duration> {
    let duration = duration.trim();
    if let Ok(seconds) = duration.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }
    if let Some(ms) = duration.strip_suffix("ms") {
        let ms: u64 = ms
            .parse()
            .map_err(|_| anyhow!("Invalid number in duration: {}", ms))?;
        return Ok(Duration::from_millis(ms));
    }

    let len = duration.len();
    if len < 2 {
        return Err(anyhow!("Invalid duration format: {}", duration));
    }

    let (num_str, unit) = duration.split_at(len - 1);
    let num: u64 = num_str
        .parse()
        .map_err(|_| anyhow!("Invalid number in duration: {}", num_str))?;

    match unit {
        "s" => Ok(Duration::from_secs(num)),
        "m" => Ok(Duration::from_secs(num * 60)),
        "h" => Ok(Duration::from_secs(num * 3600)),
        _ => Err(anyhow!(
            "Invalid duration unit: {}. Use 'ms', 's' for seconds, 'm' for minutes, 'h' for hours",
            unit
        )),
    }
}

/// Parse "r,g,b" into a colour
fn parse_color(color: &str) -> Result<[u8; 3]> {
    let parts: Vec<&str> = color.split(',').map(str::trim).collect();
    let [r, g, b] = parts.as_slice() else {
        return Err(anyhow!("Invalid colour: {}. Use r,g,b such as 255,0,0", color));
    };
    let channel = |s: &str| -> Result<u8> {
        s.parse()
            .map_err(|_| anyhow!("Invalid colour channel '{}': expected 0-255", s))
    };
    Ok([channel(*r)?, channel(*g)?, channel(*b)?])
}

/// Parse "x,y" into a pixel position; negative values start off-panel
fn parse_position(position: &str) -> Result<(i32, i32)> {
    let (x, y) = position
        .split_once(',')
        .ok_or_else(|| anyhow!("Invalid position: {}. Use x,y such as 0,10", position))?;
    let coord = |s: &str| -> Result<i32> {
        s.trim()
            .parse()
            .map_err(|_| anyhow!("Invalid coordinate '{}' in position {}", s.trim(), position))
    };
    Ok((coord(x)?, coord(y)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_accept_unit_suffixes() {
        assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn bad_durations_are_rejected() {
        for text in ["", "s", "10x", "abc", "1.5s", "ms"] {
            assert!(parse_duration(text).is_err(), "{text}");
        }
    }

    #[test]
    fn colors_parse_as_rgb_triples() {
        assert_eq!(parse_color("255, 0,10").unwrap(), [255, 0, 10]);
        assert!(parse_color("256,0,0").is_err());
        assert!(parse_color("1,2").is_err());
    }

    #[test]
    fn positions_parse_as_xy_pairs() {
        assert_eq!(parse_position("0,0").unwrap(), (0, 0));
        assert_eq!(parse_position(" 12, -3").unwrap(), (12, -3));
        assert!(parse_position("12").is_err());
        assert!(parse_position("a,b").is_err());
    }

    #[test]
    fn cli_parses_a_text_invocation() {
        let cli = Cli::try_parse_from([
            "pixoo-mirror",
            "text",
            "Hello, Pixoo!",
            "-a",
            "10.0.0.5",
            "--pos",
            "-2,10",
            "--color",
            "255,0,0",
        ])
        .unwrap();
        let Command::Text(args) = cli.command else {
            panic!("expected text");
        };
        assert_eq!(args.message, "Hello, Pixoo!");
        assert_eq!(parse_position(&args.pos).unwrap(), (-2, 10));
        assert_eq!(parse_color(&args.color).unwrap(), [255, 0, 0]);
        assert_eq!(parse_color(&args.background).unwrap(), [0, 0, 0]);
    }

    #[test]
    fn stream_with_an_image_sends_it_once_and_returns() {
        let dir = tempfile::tempdir().unwrap();
        let still = dir.path().join("still.png");
        let out = dir.path().join("preview.png");
        image::RgbImage::from_pixel(20, 10, image::Rgb([0, 0, 255]))
            .save(&still)
            .unwrap();

        let cli = Cli::try_parse_from([
            "pixoo-mirror",
            "stream",
            "--dry-run",
            "--image",
            still.to_str().unwrap(),
            "--preview",
            out.to_str().unwrap(),
        ])
        .unwrap();
        let Command::Stream(args) = cli.command else {
            panic!("expected stream");
        };
        stream(args).unwrap();

        let saved = image::open(&out).unwrap().to_rgb8();
        assert_eq!(saved.dimensions(), (512, 512));
        assert_eq!(saved.get_pixel(3, 3).0, [0, 0, 255]);
    }

    #[test]
    fn cli_parses_a_stream_invocation() {
        let cli = Cli::try_parse_from([
            "pixoo-mirror",
            "stream",
            "--address",
            "10.0.0.5",
            "--region",
            "square:1",
            "--resize",
            "lanczos",
            "--filter",
            "edge-enhance",
            "--no-grid",
            "--fps",
            "30",
        ])
        .unwrap();
        let Command::Stream(args) = cli.command else {
            panic!("expected stream");
        };
        assert_eq!(args.region, CaptureRegion::CenteredSquare(1));
        assert_eq!(args.fps, 30);
        let cfg = args.look.processing(ResizeMethod::Nearest);
        assert_eq!(cfg.resize_method, ResizeMethod::Lanczos);
        assert_eq!(cfg.filter, Filter::EdgeEnhance);
        assert!(!cfg.show_grid);
    }

    #[test]
    fn snapshot_defaults_to_bicubic() {
        let cli = Cli::try_parse_from(["pixoo-mirror", "snapshot", "-a", "10.0.0.5"]).unwrap();
        let Command::Snapshot(args) = cli.command else {
            panic!("expected snapshot");
        };
        assert!(args.look.resize.is_none());
        assert_eq!(args.region, CaptureRegion::Primary);
    }
}
