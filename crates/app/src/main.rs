use std::{
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use clap::{Args, Parser, Subcommand};
use cutin_player_core::{
    centering_offset, contain_ratio, AppConfig, AssetSource, Canvas, DatasetMetadata,
    DatasetRequest, FsAssetSource, PlaybackState, Player, PlayerEvent, Recorder,
    RecordingSettings, Size,
};
use tracing_subscriber::EnvFilter;

fn main() -> cutin_player_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play(args) => run_play(args),
        Commands::Inspect(args) => run_inspect(args),
    }
}

fn run_play(args: PlayArgs) -> cutin_player_core::Result<()> {
    let config = resolve_config(&args.common)?;
    tracing::info!(
        dataset = %args.common.dataset,
        root = ?config.assets.root,
        fps = config.playback.target_fps,
        "starting playback"
    );

    let source = FsAssetSource::new(&config.assets.root)
        .with_metadata_file(config.assets.metadata_file.as_str());
    let mut player = Player::from_source(Arc::new(source), config.playback);
    let mut canvas = Canvas::new(config.surface.width, config.surface.height)
        .with_mirror(config.surface.mirror);

    let mut recorder = args.out.map(|output_dir| {
        Recorder::new(RecordingSettings {
            output_dir,
            max_frames: args.max_frames,
        })
    });
    if let Some(recorder) = recorder.as_mut() {
        recorder.start()?;
    }

    player.select_str(&args.common.dataset)?;

    let refresh = Duration::from_secs_f64(1.0 / args.refresh_hz.max(1.0));
    let deadline = Instant::now() + Duration::from_millis(args.duration_ms);
    let mut drawn = 0usize;

    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }

        let outcome = player.tick(now, &mut canvas)?;
        for event in &outcome.events {
            match event {
                PlayerEvent::Progress(progress) => {
                    tracing::debug!(loaded = progress.loaded, total = progress.total, "loading")
                }
                PlayerEvent::Ready { dataset } => tracing::info!(%dataset, "ready"),
            }
        }

        if outcome.drawn.is_some() {
            drawn += 1;
            if let Some(recorder) = recorder.as_mut() {
                if let Some(path) = recorder.capture(&canvas)? {
                    tracing::debug!(?path, "saved snapshot");
                }
            }
        }

        thread::sleep(refresh);
    }

    if player.state() != PlaybackState::Playing {
        tracing::warn!(progress = ?player.progress(), "dataset did not finish loading in time");
    }
    tracing::info!(drawn, "playback finished");
    Ok(())
}

fn run_inspect(args: InspectArgs) -> cutin_player_core::Result<()> {
    let config = resolve_config(&args.common)?;
    let request = DatasetRequest::parse(&args.common.dataset)?;
    let source = FsAssetSource::new(&config.assets.root)
        .with_metadata_file(config.assets.metadata_file.as_str());
    let surface = Size::from((config.surface.width, config.surface.height));

    let metadata = source
        .metadata(&request.name)?
        .map(|bytes| DatasetMetadata::from_slice(&request.name, &bytes))
        .transpose()?;

    match metadata {
        Some(metadata) if metadata.positions.is_some() => {
            let ratio = contain_ratio(metadata.area(), surface)?;
            let offset = centering_offset(metadata.area(), surface, ratio);
            println!(
                "{}: {} frames, area {}x{}, ratio {ratio:.4}, offset ({:.1}, {:.1})",
                request.name,
                metadata.frame_count(),
                metadata.area[0],
                metadata.area[1],
                offset.dx,
                offset.dy
            );
        }
        Some(metadata) => println!(
            "{}: {} frames, no positions, stretch-fit",
            request.name,
            metadata.frame_count()
        ),
        None => match request.frame_count {
            Some(frames) => println!("{}: {frames} frames, no metadata, stretch-fit", request.name),
            None => println!("{}: no metadata and no frame count in selector", request.name),
        },
    }
    Ok(())
}

/// Config file first, then command line overrides.
fn resolve_config(common: &CommonArgs) -> cutin_player_core::Result<AppConfig> {
    let mut config = match &common.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    if let Some(root) = &common.root {
        config.assets.root = root.clone();
    }
    if let Some(fps) = common.fps {
        config.playback.target_fps = fps;
    }
    if let Some(clear_after) = common.clear_after {
        config.playback.clear_after_frames = clear_after;
    }
    if let Some(width) = common.width {
        config.surface.width = width;
    }
    if let Some(height) = common.height {
        config.surface.height = height;
    }
    if common.mirror {
        config.surface.mirror = true;
    }

    config.playback = config.playback.clamped();
    Ok(config)
}

fn load_config(path: &Path) -> cutin_player_core::Result<AppConfig> {
    tracing::info!(?path, "loading configuration");
    AppConfig::from_json_file(path)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Frame-sequence cutin player", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a dataset on a headless canvas, optionally saving each drawn frame.
    Play(PlayArgs),
    /// Report frame count and fit geometry for a dataset.
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Dataset selector, `<name>` or `<name>-<maxIndex>`.
    dataset: String,
    /// Directory holding dataset folders.
    #[arg(short, long)]
    root: Option<PathBuf>,
    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Target playback frame rate.
    #[arg(long)]
    fps: Option<f64>,
    /// Clear the surface every N drawn frames (0 = never).
    #[arg(long)]
    clear_after: Option<u32>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    /// Mirror output horizontally.
    #[arg(long)]
    mirror: bool,
}

#[derive(Args, Debug)]
struct PlayArgs {
    #[command(flatten)]
    common: CommonArgs,
    /// Simulated display refresh rate.
    #[arg(long, default_value_t = 60.0)]
    refresh_hz: f64,
    /// How long to play before exiting.
    #[arg(long, default_value_t = 3000)]
    duration_ms: u64,
    /// Directory to write drawn frames into as PNGs.
    #[arg(short, long)]
    out: Option<PathBuf>,
    /// Stop saving after this many frames.
    #[arg(long)]
    max_frames: Option<usize>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    #[command(flatten)]
    common: CommonArgs,
}
