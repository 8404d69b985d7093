use anyhow::{anyhow, bail, Context};
use posecam::export::{find_pairs, read_sidecar, Sidecar};
use posecam::session::{CaptureSession, RecordingTarget};
use posecam::testing::SyntheticTracker;
use posecam::{MediaName, PosecamConfig, TrackingQuality};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const USAGE: &str = "Usage: posecam-cli <command> [args]

Commands:
  simulate [--frames <n>] [--fps <f>] [--output <dir>] [--images <WxH>] [--video] [--photo] [--json]
  inspect <sidecar.json> [--json]
  pairs <dir> [--suffix <s>] [--json]
  config [--save <path>]

Global:
  --config <path>   configuration file (default: posecam.toml)";

fn main() -> anyhow::Result<()> {
    posecam::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    let config_path = flag_value(&args, "--config")
        .map(PathBuf::from)
        .unwrap_or_else(PosecamConfig::default_path);
    let config = PosecamConfig::load_from_file(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let command = &args[1];
    match command.as_str() {
        "simulate" => cmd_simulate(&args, config),
        "inspect" => cmd_inspect(&args),
        "pairs" => cmd_pairs(&args, &config),
        "config" => cmd_config(&args, &config),
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        _ => {
            eprintln!("Unknown command: {}\n\n{}", command, USAGE);
            std::process::exit(1);
        }
    }
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// First argument after the command that is neither a flag nor a flag value
fn positional(args: &[String]) -> Option<&str> {
    let mut i = 2;
    while i < args.len() {
        let arg = &args[i];
        if arg.starts_with("--") {
            if !matches!(
                arg.as_str(),
                "--json" | "--video" | "--photo"
            ) {
                i += 1;
            }
        } else {
            return Some(arg);
        }
        i += 1;
    }
    None
}

fn parse_size(value: &str) -> anyhow::Result<(u32, u32)> {
    let (w, h) = value
        .split_once('x')
        .ok_or_else(|| anyhow!("expected WIDTHxHEIGHT, got '{}'", value))?;
    Ok((w.parse()?, h.parse()?))
}

fn cmd_simulate(args: &[String], mut config: PosecamConfig) -> anyhow::Result<()> {
    let frames: u64 = flag_value(args, "--frames").unwrap_or("90").parse()?;
    let fps: f64 = flag_value(args, "--fps").unwrap_or("30").parse()?;
    if let Some(dir) = flag_value(args, "--output") {
        config.export.output_directory = dir.to_string();
    }
    let images = flag_value(args, "--images").map(parse_size).transpose()?;
    let want_video = has_flag(args, "--video");
    let want_photo = has_flag(args, "--photo");
    let json = has_flag(args, "--json");

    if frames == 0 {
        bail!("--frames must be at least 1");
    }
    if (want_video || want_photo) && images.is_none() {
        bail!("--video and --photo need --images <WxH>");
    }

    let mut tracker = SyntheticTracker::new(fps).with_max_frames(frames).realtime();
    if let Some((width, height)) = images {
        tracker = tracker.with_images(width, height);
    }
    let counters = tracker.counters();

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        ctrlc::set_handler(move || interrupted.store(true, Ordering::Relaxed))?;
    }

    let session = CaptureSession::new(Box::new(tracker), &config);
    let video_name = MediaName::video();
    session.start_recording(video_target(&config, &video_name, want_video)?)?;
    session.start()?;

    let deadline = Instant::now() + Duration::from_secs_f64(frames as f64 / fps + 10.0);
    while counters.frames.load(Ordering::Relaxed) < frames {
        if interrupted.load(Ordering::Relaxed) {
            eprintln!("Interrupted, finishing recording");
            break;
        }
        if Instant::now() > deadline {
            bail!("synthetic tracker stalled");
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    let photo = if want_photo {
        session.capture_photo(None)?
    } else {
        None
    };
    session.stop(Duration::from_secs(2))?;

    let outcome = session
        .stop_recording()
        .ok_or_else(|| anyhow!("recording was not open"))?;

    if json {
        let summary = serde_json::json!({
            "media": outcome.media_file_name,
            "frames": outcome.frames,
            "skippedFrames": outcome.skipped_frames,
            "sidecar": outcome.sidecar,
            "video": outcome.video.as_ref().and_then(|v| v.path.clone()),
            "photo": photo.as_ref().map(|p| &p.sidecar),
            "errors": outcome.errors,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Recorded {} frames for {}", outcome.frames, outcome.media_file_name);
        if outcome.skipped_frames > 0 {
            println!("Skipped {} frames", outcome.skipped_frames);
        }
        if let Some(sidecar) = &outcome.sidecar {
            println!("Calibration: {}", sidecar.display());
        }
        if let Some(path) = outcome.video.as_ref().and_then(|v| v.path.as_ref()) {
            println!("Video: {}", path.display());
        }
        if let Some(photo) = &photo {
            println!("Photo calibration: {}", photo.sidecar.display());
        }
        for error in &outcome.errors {
            eprintln!("Error: {}", error);
        }
    }
    Ok(())
}

#[cfg(feature = "recording")]
fn video_target(
    config: &PosecamConfig,
    name: &str,
    want_video: bool,
) -> anyhow::Result<RecordingTarget> {
    if !want_video {
        return Ok(RecordingTarget::calibration_only(name));
    }
    let sink = posecam::recording::Mp4VideoSink::new(
        config.output_directory().join(name),
        config.recording.clone(),
    )
    .with_title("posecam simulation");
    Ok(RecordingTarget::with_sink(name, Box::new(sink)))
}

#[cfg(not(feature = "recording"))]
fn video_target(
    _config: &PosecamConfig,
    name: &str,
    want_video: bool,
) -> anyhow::Result<RecordingTarget> {
    if want_video {
        bail!("--video requires posecam-cli built with the 'recording' feature");
    }
    Ok(RecordingTarget::calibration_only(name))
}

fn quality_label(quality: TrackingQuality) -> String {
    match quality.reason_str() {
        Some(reason) => format!("{}/{}", quality.state_str(), reason),
        None => quality.state_str().to_string(),
    }
}

fn cmd_inspect(args: &[String]) -> anyhow::Result<()> {
    let path = positional(args).ok_or_else(|| anyhow!("Usage: posecam-cli inspect <sidecar.json>"))?;
    let sidecar = read_sidecar(Path::new(path)).with_context(|| format!("reading {}", path))?;

    if has_flag(args, "--json") {
        let value = match &sidecar {
            Sidecar::Photo(record) => serde_json::to_value(record)?,
            Sidecar::Video(manifest) => serde_json::to_value(manifest)?,
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match sidecar {
        Sidecar::Photo(record) => {
            let focal = record.focal_length();
            let principal = record.principal_point();
            let resolution = record.image_resolution();
            println!("Photo calibration");
            println!("  resolution:  {}x{}", resolution.width, resolution.height);
            println!("  focal:       fx={} fy={}", focal.fx, focal.fy);
            println!("  principal:   cx={} cy={}", principal.cx, principal.cy);
            println!("  translation: {:?}", record.translation_vector());
            println!("  timestamp:   {}", record.timestamp());
            println!("  tracking:    {}", quality_label(record.tracking_quality()));
        }
        Sidecar::Video(manifest) => {
            let mut states: BTreeMap<String, usize> = BTreeMap::new();
            for frame in &manifest.frames {
                *states.entry(quality_label(frame.tracking_quality())).or_default() += 1;
            }
            println!("Video calibration for {}", manifest.video_file_name);
            println!("  frames:        {}", manifest.total_frames);
            println!(
                "  time:          {:.6} .. {:.6} ({:.3}s)",
                manifest.recording_start_time,
                manifest.recording_end_time,
                manifest.duration_secs()
            );
            println!("  session start: {:.6}", manifest.session_start_time);
            println!("  indices:       {}", if manifest.has_contiguous_indices() {
                "contiguous"
            } else {
                "GAPS"
            });
            for (state, count) in states {
                println!("  {:<28} {}", state, count);
            }
        }
    }
    Ok(())
}

fn cmd_pairs(args: &[String], config: &PosecamConfig) -> anyhow::Result<()> {
    let dir = positional(args)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.output_directory());
    let suffix = flag_value(args, "--suffix").unwrap_or(config.export.sidecar_suffix.as_str());
    let pairs = find_pairs(&dir, suffix).with_context(|| format!("scanning {}", dir.display()))?;

    if has_flag(args, "--json") {
        let list: Vec<_> = pairs
            .iter()
            .map(|p| serde_json::json!({ "calibration": p.calibration, "media": p.media }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
    } else {
        for pair in pairs {
            match pair.media {
                Some(media) => println!("{} <- {}", media.display(), pair.calibration.display()),
                None => println!("(missing media) <- {}", pair.calibration.display()),
            }
        }
    }
    Ok(())
}

fn cmd_config(args: &[String], config: &PosecamConfig) -> anyhow::Result<()> {
    if let Some(path) = flag_value(args, "--save") {
        config.save_to_file(path)?;
        println!("Saved configuration to {}", path);
    } else {
        print!("{}", toml::to_string_pretty(config)?);
    }
    Ok(())
}
