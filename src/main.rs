use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use secrecy::{ExposeSecret, SecretString};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use guidepost::detection::SpatialProjector;
use guidepost::guidance::feedback_for;
use guidepost::sensors::{FileFrameSource, LogMarker, StaticHands};
use guidepost::transport::{
    DetectionTransport, HttpPerceptionClient, SpeechTransport, StructuredDescriber,
    VisionDescriber, with_timeout,
};
use guidepost::voice::{AudioPlayback, PlaybackParams, beep, decode_pcm16, samples_to_wav};
use guidepost::{Config, Daemon, Vec3};

/// Guidepost - perception-guided hand navigation
#[derive(Parser)]
#[command(name = "guidepost", version, about)]
struct Cli {
    /// Captioning and TTS server (overrides config)
    #[arg(long)]
    server_url: Option<String>,

    /// Object detection server (overrides config)
    #[arg(long)]
    detector_url: Option<String>,

    /// Guide to a point straight ahead instead of where objects were detected
    #[arg(long)]
    fixed_target: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Read recognized phrases from stdin and act on them (default)
    Run {
        /// Image file used as the camera frame, re-read on every request
        #[arg(long)]
        frame: Option<PathBuf>,

        /// Pretend both hands are held still at "x,y,z"
        #[arg(long, value_parser = parse_vec3)]
        hands: Option<Vec3>,
    },
    /// Play the guidance beep at far and near settings
    TestSpeaker,
    /// Synthesize and play a sentence
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,

        /// Also write the decoded audio to this WAV file
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Print detections for an image and where they project
    Detect {
        /// Encoded image (PNG)
        image: PathBuf,
    },
    /// Print a description of an image
    Describe {
        /// Encoded image (PNG)
        image: PathBuf,

        /// Use the vision model room description
        #[arg(long)]
        room: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,guidepost=info",
        1 => "info,guidepost=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;

    // CLI > env > toml > default
    if let Some(url) = cli.server_url {
        config.endpoints.server_url = Some(url);
    }
    if let Some(url) = cli.detector_url {
        config.endpoints.detector_url = Some(url);
    }
    if cli.fixed_target {
        config.guidance.fixed_debug_target = true;
    }

    match cli.command.unwrap_or(Command::Run {
        frame: None,
        hands: None,
    }) {
        Command::Run { frame, hands } => run_daemon(config, frame, hands).await,
        Command::TestSpeaker => test_speaker(&config).await,
        Command::TestTts { text, save } => test_tts(&config, &text, save).await,
        Command::Detect { image } => detect(&config, &image).await,
        Command::Describe { image, room } => describe(&config, &image, room).await,
    }
}

/// Run the daemon, feeding it one phrase per stdin line
async fn run_daemon(
    config: Config,
    frame: Option<PathBuf>,
    hands: Option<Vec3>,
) -> anyhow::Result<()> {
    let mut daemon = Daemon::new(config).with_marker(Arc::new(LogMarker::new()));
    if let Some(path) = frame {
        tracing::info!(path = %path.display(), "using file as camera frame");
        daemon = daemon.with_frame_source(Arc::new(FileFrameSource::new(path)));
    }
    if let Some(position) = hands {
        daemon = daemon.with_hand_tracker(Arc::new(StaticHands::at(position)));
    }

    let (phrase_tx, phrase_rx) = mpsc::channel::<String>(16);
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if phrase_tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read stdin");
                    break;
                }
            }
        }
    });

    tracing::info!("guidepost ready - type a command, or \"help\"");
    daemon.run(phrase_rx).await?;

    Ok(())
}

/// Play the beep at both ends of the feedback range
async fn test_speaker(config: &Config) -> anyhow::Result<()> {
    println!("Testing speaker output...");

    let playback = AudioPlayback::new()?;
    let clip = beep::beep_or_default(config.audio.beep_path.as_deref());

    for (label, distance) in [("far", 1.5_f32), ("near", 0.05_f32)] {
        let fb = feedback_for(distance);
        println!(
            "{label}: pitch {:.2}, volume {:.2}, every {:.2}s",
            fb.pitch,
            fb.volume,
            fb.interval.as_secs_f32()
        );
        for _ in 0..3 {
            playback
                .play_to_end(&clip, PlaybackParams::spatial(fb.pitch, fb.volume, Vec3::FORWARD))
                .await?;
            tokio::time::sleep(fb.interval).await;
        }
    }

    println!("\n---");
    println!("If you heard slow low beeps then fast high ones, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");
    println!("  3. Try: pavucontrol (to check output levels)");

    Ok(())
}

/// Test TTS output via the speech server
async fn test_tts(config: &Config, text: &str, save: Option<PathBuf>) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let client = HttpPerceptionClient::new(config.endpoints.server_url.clone(), None);

    println!("Synthesizing speech...");
    let wav = with_timeout(config.timing.request_timeout, client.synthesize(text)).await?;
    println!("Got {} bytes of audio data", wav.len());

    let clip = decode_pcm16(&wav)?;
    println!(
        "Decoded {} samples at {} Hz ({:.2}s)",
        clip.samples.len(),
        clip.sample_rate,
        clip.duration().as_secs_f32()
    );

    if let Some(path) = save {
        std::fs::write(&path, samples_to_wav(&clip.samples, clip.sample_rate)?)?;
        println!("Saved to {}", path.display());
    }

    println!("Playing audio...");
    AudioPlayback::new()?
        .play_to_end(&clip, PlaybackParams::flat())
        .await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

/// Print detections and their projected world positions
async fn detect(config: &Config, image: &Path) -> anyhow::Result<()> {
    let frame = tokio::fs::read(image).await?;
    let client = HttpPerceptionClient::new(None, config.endpoints.detector_url.clone());
    let set = with_timeout(config.timing.request_timeout, client.detect(&frame)).await?;

    let projector = SpatialProjector::new(config.camera.image_width, config.camera.image_height);
    let pose = config.camera.pose();

    if set.is_empty() {
        println!("No objects detected");
    }
    for detection in &set {
        let target = projector.project(detection, &pose);
        let (nx, ny) = target.viewport.unwrap_or((0.5, 0.5));
        println!(
            "{:<10} box ({:.0},{:.0})-({:.0},{:.0})  viewport ({nx:.3},{ny:.3})  depth {:.2}m  world {}",
            detection.label,
            detection.x1,
            detection.y1,
            detection.x2,
            detection.y2,
            target.depth,
            target.position
        );
    }
    println!("\n{}", set.announcement());

    Ok(())
}

/// Print a caption (or a room description) for an image
async fn describe(config: &Config, image: &Path, room: bool) -> anyhow::Result<()> {
    let frame = tokio::fs::read(image).await?;
    let timeout = config.timing.request_timeout;

    let text = if room {
        let key = config
            .endpoints
            .gemini_api_key
            .as_ref()
            .map_or_else(String::new, |k| k.expose_secret().to_string());
        let describer = VisionDescriber::new(SecretString::from(key))?
            .with_url(config.endpoints.vision_url.clone());
        with_timeout(timeout, describer.describe(&frame)).await?
    } else {
        let client = HttpPerceptionClient::new(config.endpoints.server_url.clone(), None);
        with_timeout(timeout, client.describe_scene(&frame)).await?
    };

    println!("{text}");
    Ok(())
}

/// Parse "x,y,z" into a vector
fn parse_vec3(s: &str) -> Result<Vec3, String> {
    let parts: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>().map_err(|e| format!("{p:?}: {e}")))
        .collect::<Result<_, _>>()?;

    match parts.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(format!("expected x,y,z, got {s:?}")),
    }
}
