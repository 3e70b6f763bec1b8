//! modplay CLI: headless playback and WAV export.
//!
//! Usage:
//!   mp-cli path/to/song.s3m
//!   mp-cli path/to/song.xm --wav output.wav

use anyhow::{Context, Result};
use clap::Parser;
use mp_master::{Controller, EngineConfig, SlideMemory};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[cfg(feature = "alloc_check")]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

#[derive(Parser, Debug)]
#[command(name = "mp-cli", version, about = "Play S3M and XM modules")]
struct Args {
    /// Module file to load
    file: PathBuf,

    /// Output sample rate for WAV export
    #[arg(long, default_value_t = 44100)]
    sample_rate: u32,

    /// Loop the song instead of stopping at the end
    #[arg(long)]
    repeat: bool,

    /// Share one slide memory between effects (S3M)
    #[arg(long)]
    shared_slide_memory: bool,

    /// Render to a WAV file instead of the audio device
    #[arg(long, value_name = "PATH")]
    wav: Option<PathBuf>,

    /// Maximum seconds to render
    #[arg(long, default_value_t = 300)]
    seconds: u32,

    /// Print module information and exit
    #[arg(long)]
    info: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let slide_memory = if args.shared_slide_memory {
        SlideMemory::Shared
    } else {
        SlideMemory::Independent
    };
    let config = EngineConfig::default()
        .with_sample_rate(args.sample_rate)
        .with_repeat(args.repeat)
        .with_slide_memory(slide_memory);

    let mut ctrl = Controller::with_config(config);
    ctrl.load_file(&args.file)
        .with_context(|| format!("failed to load {}", args.file.display()))?;

    print_info(&ctrl);
    if args.info {
        return Ok(());
    }

    match args.wav {
        Some(path) => render_to_wav(&ctrl, &path, args.seconds),
        None => play_audio(&mut ctrl, args.seconds),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn print_info(ctrl: &Controller) {
    let module = ctrl.module();
    let format = if module.format.is_xm() { "XM" } else { "S3M" };
    println!("Title:       {}", module.title);
    println!("Format:      {}", format);
    println!("Channels:    {}", module.channel_count());
    println!("Patterns:    {}", module.patterns.len());
    println!("Orders:      {}", module.song_length);
    println!("Instruments: {}", module.instruments.len());
    println!("Samples:     {}", module.sample_count());
    println!(
        "Tempo:       {} BPM, Speed: {}",
        module.initial_tempo, module.initial_speed
    );
    println!();
}

fn play_audio(ctrl: &mut Controller, seconds: u32) -> Result<()> {
    ctrl.play();
    println!("Playing...");

    let limit = Duration::from_secs(seconds as u64);
    let started = std::time::Instant::now();
    // Give the playback thread a moment to open the device
    std::thread::sleep(Duration::from_millis(50));

    while ctrl.is_playing() && started.elapsed() < limit {
        if let Some(pos) = ctrl.position() {
            print!(
                "\rOrd: {:02X} | Row: {:02X} | Tick: {:02}",
                pos.order, pos.row, pos.tick
            );
            std::io::stdout().flush().context("stdout")?;
        }
        for code in ctrl.drain_sync_codes().into_iter().rev() {
            log::info!("sync {code:#x}");
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    ctrl.stop();

    println!("\rDone.                          ");
    Ok(())
}

fn render_to_wav(ctrl: &Controller, path: &Path, seconds: u32) -> Result<()> {
    println!(
        "Rendering to {} at {} Hz...",
        path.display(),
        ctrl.config().sample_rate
    );
    let frames = ctrl
        .render_to_wav_file(path, seconds)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Rendered {frames} frames");
    println!("Done.");
    Ok(())
}
