use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, Instant};

use clap::{ArgGroup, Parser, ValueEnum};

use mocap_core::detection::domain::landmark_detector::LandmarkDetector;
use mocap_core::detection::infrastructure::replay_detector::ReplayDetector;
use mocap_core::overlay::skeleton::SceneGeometry;
use mocap_core::pipeline::domain::result_sink::FanoutSink;
use mocap_core::pipeline::frame_loop::FrameLoop;
use mocap_core::pipeline::loop_logger::{LogLoopLogger, LoopLogger};
use mocap_core::pipeline::refresh_driver::RefreshDriver;
use mocap_core::recording::jsonl_recording::{read_recording_file, RecordingSink};
use mocap_core::shared::constants::IMAGE_EXTENSIONS;
use mocap_core::shared::settings::{DetectorFailurePolicy, LoopSettings};
use mocap_core::state::capture_store::CaptureStore;
use mocap_core::video::domain::video_source::VideoSource;
use mocap_core::video::infrastructure::still_image_source::StillImageSource;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum DetectorKind {
    /// YOLO-pose ONNX model.
    Onnx,
    /// Replay a recording made with --record.
    Replay,
}

/// Stream pose landmarks from a camera, video file or still image.
#[derive(Parser)]
#[command(name = "mocap")]
#[command(group(ArgGroup::new("input").required(true).args(["image", "video", "camera"])))]
struct Cli {
    /// Still image to run detection on once.
    #[arg(long)]
    image: Option<PathBuf>,

    /// Video file, played back in real time.
    #[arg(long)]
    video: Option<PathBuf>,

    /// Capture device index.
    #[arg(long)]
    camera: Option<u32>,

    #[arg(long, value_enum, default_value = "onnx")]
    detector: DetectorKind,

    /// ONNX pose model file. Resolved from the model cache when omitted.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Download URL used when the model is not cached.
    #[arg(long)]
    model_url: Option<String>,

    /// Recording to replay with --detector replay.
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Write delivered results to this JSON-lines file.
    #[arg(long)]
    record: Option<PathBuf>,

    /// Refresh rate in Hz (overrides settings).
    #[arg(long)]
    fps: Option<f64>,

    /// What to do when detection fails: skip or halt (overrides settings).
    #[arg(long)]
    on_detector_error: Option<DetectorFailurePolicy>,

    /// Stop after this many seconds.
    #[arg(long)]
    duration: Option<f64>,

    /// Person confidence threshold, 0.0-1.0 (overrides settings).
    #[arg(long)]
    confidence: Option<f64>,

    /// Settings file to use instead of the per-user one.
    #[arg(long)]
    settings: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;
    let settings = load_settings(&cli)?;

    let source = open_source(&cli)?;
    let detector = build_detector(&cli, &settings)?;

    let store = CaptureStore::new();
    let mut sinks = FanoutSink::new().with(store.subscriber());
    if let Some(path) = &cli.record {
        sinks = sinks.with(RecordingSink::create(path, store.clone())?);
    }
    store.set_capturing(true);

    let mut frame_loop =
        FrameLoop::new(sinks, &settings).with_logger(LogLoopLogger::new(settings.summary_every));
    frame_loop.bind(source, detector);
    frame_loop.start()?;

    let driver = RefreshDriver::new(settings.refresh_hz);
    let deadline = cli
        .duration
        .map(|secs| Instant::now() + Duration::from_secs_f64(secs));
    let single_shot = cli.image.is_some() && deadline.is_none();

    let outcome = driver.run(&mut frame_loop, |counts| {
        if single_shot && counts.delivered + counts.failed > 0 {
            return false;
        }
        deadline.map_or(true, |d| Instant::now() < d)
    });

    frame_loop.logger().summary();
    frame_loop.release();
    drop(frame_loop);
    let summary = outcome?;

    log::info!(
        "stopped ({:?}): {} results delivered, {} duplicate ticks, {} detector failures",
        summary.stop_reason,
        summary.counts.delivered,
        summary.counts.duplicate,
        summary.counts.failed
    );
    report_latest(&store);
    Ok(())
}

fn report_latest(store: &CaptureStore) {
    let state = store.snapshot();
    let Some(latest) = state.latest else {
        println!("No landmarks detected.");
        return;
    };
    let geometry = SceneGeometry::from_result(&latest);
    println!(
        "{} results; latest at {:.1} ms with {} landmarks ({} bones)",
        state.results_received,
        latest.timestamp().as_secs_f64() * 1000.0,
        state.landmarks.len(),
        geometry.bone_count()
    );
    for part in &geometry.parts {
        println!(
            "  {:10} {:3} points {:3} bones",
            part.part.label(),
            part.points.len(),
            part.bones.len()
        );
    }
}

fn load_settings(cli: &Cli) -> Result<LoopSettings, Box<dyn std::error::Error>> {
    let mut settings = match &cli.settings {
        Some(path) => LoopSettings::load_from(path)?,
        None => LoopSettings::load(),
    };
    if let Some(fps) = cli.fps {
        settings.refresh_hz = fps;
    }
    if let Some(policy) = cli.on_detector_error {
        settings.on_detector_error = policy;
    }
    if let Some(confidence) = cli.confidence {
        settings.confidence = confidence;
    }
    settings.validate()?;
    Ok(settings)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    for path in [&cli.image, &cli.video, &cli.replay, &cli.model, &cli.settings]
        .into_iter()
        .flatten()
    {
        if !path.exists() {
            return Err(format!("File not found: {}", path.display()).into());
        }
    }
    if let Some(image) = &cli.image {
        if !is_image(image) {
            return Err(format!("Not a supported image file: {}", image.display()).into());
        }
    }
    if cli.detector == DetectorKind::Replay && cli.replay.is_none() {
        return Err("--detector replay requires --replay <recording>".into());
    }
    if let Some(secs) = cli.duration {
        if !(secs.is_finite() && secs > 0.0) {
            return Err(format!("Duration must be positive, got {secs}").into());
        }
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn open_source(cli: &Cli) -> Result<Box<dyn VideoSource>, Box<dyn std::error::Error>> {
    if let Some(path) = &cli.image {
        return Ok(Box::new(StillImageSource::open(path)?));
    }
    if let Some(path) = &cli.video {
        return open_video(path);
    }
    match cli.camera {
        Some(index) => open_camera(index),
        None => Err("one of --image, --video or --camera is required".into()),
    }
}

#[cfg(feature = "ffmpeg")]
fn open_video(path: &Path) -> Result<Box<dyn VideoSource>, Box<dyn std::error::Error>> {
    use mocap_core::video::infrastructure::ffmpeg_file_source::FfmpegFileSource;
    Ok(Box::new(FfmpegFileSource::open(path)?))
}

#[cfg(not(feature = "ffmpeg"))]
fn open_video(_path: &Path) -> Result<Box<dyn VideoSource>, Box<dyn std::error::Error>> {
    Err("video input requires a build with the `ffmpeg` feature".into())
}

#[cfg(feature = "camera")]
fn open_camera(index: u32) -> Result<Box<dyn VideoSource>, Box<dyn std::error::Error>> {
    use mocap_core::video::infrastructure::camera_source::CameraSource;
    Ok(Box::new(CameraSource::open(index)?))
}

#[cfg(not(feature = "camera"))]
fn open_camera(_index: u32) -> Result<Box<dyn VideoSource>, Box<dyn std::error::Error>> {
    Err("camera input requires a build with the `camera` feature".into())
}

fn build_detector(
    cli: &Cli,
    settings: &LoopSettings,
) -> Result<Box<dyn LandmarkDetector>, Box<dyn std::error::Error>> {
    match cli.detector {
        DetectorKind::Replay => {
            let path = cli
                .replay
                .as_ref()
                .ok_or("--detector replay requires --replay <recording>")?;
            let results = read_recording_file(path)?;
            log::info!("replaying {} recorded frames from {}", results.len(), path.display());
            Ok(Box::new(ReplayDetector::new(results)))
        }
        DetectorKind::Onnx => build_onnx_detector(cli, settings),
    }
}

#[cfg(feature = "onnx")]
fn build_onnx_detector(
    cli: &Cli,
    settings: &LoopSettings,
) -> Result<Box<dyn LandmarkDetector>, Box<dyn std::error::Error>> {
    use mocap_core::detection::infrastructure::onnx_pose_detector::OnnxPoseDetector;
    use mocap_core::shared::constants::POSE_MODEL_NAME;
    use mocap_core::shared::model_resolver;

    let model_path = match &cli.model {
        Some(path) => path.clone(),
        None => {
            log::info!("Resolving model: {POSE_MODEL_NAME}");
            let path = model_resolver::resolve(
                POSE_MODEL_NAME,
                cli.model_url.as_deref(),
                None,
                Some(Box::new(download_progress)),
            )?;
            eprintln!();
            path
        }
    };
    Ok(Box::new(OnnxPoseDetector::new(
        &model_path,
        settings.confidence,
    )?))
}

#[cfg(not(feature = "onnx"))]
fn build_onnx_detector(
    _cli: &Cli,
    _settings: &LoopSettings,
) -> Result<Box<dyn LandmarkDetector>, Box<dyn std::error::Error>> {
    Err("the onnx detector requires a build with the `onnx` feature; try --detector replay".into())
}

#[cfg(feature = "onnx")]
fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading pose model... {pct}%");
    } else {
        eprint!("\rDownloading pose model... {downloaded} bytes");
    }
}
