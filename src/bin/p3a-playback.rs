use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use p3a_playback::{
    AssetKind, CodecFactory as _, EngineBuilder, HealthRegistry, ImageCodecFactory, MemoryDisplay,
    PlaybackConfig, PlaybackError, PlaylistNavigator,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "p3a-playback", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a directory of artwork onto an in-memory panel.
    Play(PlayArgs),
    /// Print stream properties and frame delays of one asset.
    Probe(ProbeArgs),
}

#[derive(Parser, Debug)]
struct PlayArgs {
    /// Directory holding the playlist.
    #[arg(long)]
    dir: PathBuf,

    /// JSON engine configuration. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop after this many presented frames.
    #[arg(long, default_value_t = 10)]
    frames: u64,

    /// Give up after this many milliseconds.
    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,

    /// Write the final panel contents as a PNG.
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    /// Asset file (webp, gif, png or jpeg).
    file: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Play(args) => cmd_play(args),
        Command::Probe(args) => cmd_probe(args),
    }
}

fn cmd_play(args: PlayArgs) -> anyhow::Result<()> {
    let cfg = match &args.config {
        Some(path) => PlaybackConfig::from_path(path)
            .with_context(|| format!("load config '{}'", path.display()))?,
        None => PlaybackConfig::default(),
    };

    let health = Arc::new(HealthRegistry::default());
    let nav = PlaylistNavigator::from_dir(&args.dir, &cfg, health)
        .with_context(|| format!("scan '{}'", args.dir.display()))?;
    if nav.entries().is_empty() {
        anyhow::bail!("no playable files in '{}'", args.dir.display());
    }

    let panel = cfg.panel;
    let display = MemoryDisplay::new(panel);
    let engine = EngineBuilder::new(cfg, Arc::new(nav), Arc::new(display.clone()))
        .build()
        .context("start engine")?;
    engine.request_swap_current()?;

    let deadline = Instant::now() + Duration::from_millis(args.timeout_ms);
    let status = loop {
        let status = engine.status();
        if status.stats.frames_presented >= args.frames {
            break status;
        }
        if Instant::now() >= deadline {
            engine.shutdown();
            anyhow::bail!(
                "presented {} of {} frames before the timeout",
                status.stats.frames_presented,
                args.frames
            );
        }
        std::thread::sleep(Duration::from_millis(10));
    };
    engine.shutdown();

    if let Some(out) = &args.snapshot {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output dir '{}'", parent.display()))?;
        }
        image::save_buffer_with_format(
            out,
            &display.snapshot(),
            panel.width,
            panel.height,
            image::ColorType::Rgb8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write png '{}'", out.display()))?;
        eprintln!("wrote {}", out.display());
    }

    let stats = status.stats;
    println!(
        "frames={} swaps={} failed_loads={} front={:?}",
        stats.frames_presented, stats.swaps, stats.failed_loads, status.front_position
    );
    Ok(())
}

fn cmd_probe(args: ProbeArgs) -> anyhow::Result<()> {
    let kind = AssetKind::from_path(&args.file)
        .with_context(|| format!("unsupported file type '{}'", args.file.display()))?;
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("read '{}'", args.file.display()))?;
    let mut codec = ImageCodecFactory
        .open(kind, Arc::from(bytes))
        .with_context(|| format!("open '{}'", args.file.display()))?;
    let info = codec.info();

    let mut scratch = vec![0u8; info.width as usize * info.height as usize * 4];
    let mut delays = Vec::with_capacity(info.frame_count as usize);
    loop {
        match codec.decode_next(&mut scratch) {
            Ok(()) => delays.push(codec.frame_delay_ms()),
            Err(PlaybackError::EndOfStream) => break,
            Err(e) => return Err(e).context("decode"),
        }
    }

    println!(
        "{}x{} frames={} transparency={} delays_ms={:?}",
        info.width, info.height, info.frame_count, info.has_transparency, delays
    );
    Ok(())
}
