//! pulseroll CLI: headless loop playback and WAV export.
//!
//! Usage:
//!   cargo run --bin pr-cli -- --demo chords --bpm 96
//!   cargo run --bin pr-cli -- --demo arpeggio --wav out.wav --seconds 4

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use pr_master::{Controller, Song, Tick};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[cfg(feature = "alloc_check")]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

/// Play or render a looping piano-roll pattern
#[derive(Parser, Debug)]
#[command(name = "pr-cli")]
#[command(version)]
struct Cli {
    /// Pattern to play
    #[arg(long, value_enum, default_value = "arpeggio")]
    demo: Demo,

    /// Tempo in beats per minute
    #[arg(long, default_value_t = 120.0)]
    bpm: f32,

    /// Ticks per quarter note
    #[arg(long, default_value_t = 24)]
    ppqn: u32,

    /// Loop length in ticks (default: four beats)
    #[arg(long)]
    loop_ticks: Option<Tick>,

    /// How long to play or render
    #[arg(long, default_value_t = 8.0)]
    seconds: f32,

    /// Sample rate for WAV export
    #[arg(long, default_value_t = 48000)]
    sample_rate: u32,

    /// Audition this pitch on the preview voice before playback starts
    #[arg(long)]
    preview: Option<f32>,

    /// Render to this WAV file instead of playing
    #[arg(long)]
    wav: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Demo {
    /// C major arpeggio in sixteenths
    Arpeggio,
    /// C major scale in eighths
    Scale,
    /// I-vi-IV-V with a held bass
    Chords,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if cli.ppqn == 0 {
        bail!("--ppqn must be at least 1");
    }
    if cli.bpm.is_nan() || cli.bpm <= 0.0 {
        bail!("--bpm must be positive");
    }
    if cli.seconds.is_nan() || cli.seconds < 0.0 {
        bail!("--seconds must not be negative");
    }

    let song = build_demo(cli.demo, cli.bpm, cli.ppqn, cli.loop_ticks);
    println!("Title:  {}", song.title);
    println!("Tempo:  {} BPM, {} PPQN", song.bpm, song.ppqn);
    println!("Loop:   {} ticks", song.pattern_duration);
    println!("Notes:  {} (tree height {:?})", song.len(), song.max_level());
    println!();

    let mut ctrl = Controller::with_song(song);
    match &cli.wav {
        Some(path) => render_to_wav(&ctrl, path, cli.sample_rate, cli.seconds),
        None => play_audio(&mut ctrl, cli.seconds, cli.preview),
    }
}

fn play_audio(ctrl: &mut Controller, seconds: f32, preview: Option<f32>) -> Result<()> {
    let sample_rate = ctrl.open_audio().context("failed to start audio")?;
    log::info!("playing at {} Hz", sample_rate);

    if let Some(pitch) = preview {
        ctrl.play_piano_note(pitch);
        std::thread::sleep(Duration::from_millis(500));
        ctrl.stop_piano_note(pitch);
    }

    ctrl.play();
    let started = Instant::now();
    let duration = Duration::from_secs_f32(seconds);
    while started.elapsed() < duration {
        print!(
            "\rTick: {:7.2} | Block: {:.3} ms",
            ctrl.playhead(),
            ctrl.last_block_ms()
        );
        let _ = std::io::stdout().flush();
        std::thread::sleep(Duration::from_millis(20));
    }

    ctrl.stop();
    // Let the stop reach the audio thread before the device closes.
    std::thread::sleep(Duration::from_millis(50));
    ctrl.close_audio();
    println!("\rDone.                              ");
    Ok(())
}

fn render_to_wav(ctrl: &Controller, path: &Path, sample_rate: u32, seconds: f32) -> Result<()> {
    let frames = (sample_rate as f64 * seconds as f64).round() as usize;
    println!("Rendering {} frames to {} at {} Hz...", frames, path.display(), sample_rate);
    ctrl.write_wav_file(path, sample_rate, frames)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Done.");
    Ok(())
}

/// Build one of the built-in patterns at the given timing.
fn build_demo(demo: Demo, bpm: f32, ppqn: u32, loop_ticks: Option<Tick>) -> Song {
    let beat = ppqn;
    let title = match demo {
        Demo::Arpeggio => "arpeggio",
        Demo::Scale => "scale",
        Demo::Chords => "chords",
    };
    let mut song = Song::with_timing(title, ppqn, bpm, loop_ticks.unwrap_or(4 * beat));

    match demo {
        Demo::Arpeggio => {
            let step = (beat / 4).max(1);
            for (i, pitch) in [60.0, 64.0, 67.0, 72.0].iter().cycle().take(16).enumerate() {
                let start = i as Tick * step;
                song.add_note(start, start + step, *pitch);
            }
        }
        Demo::Scale => {
            let step = (beat / 2).max(1);
            for (i, pitch) in [60.0, 62.0, 64.0, 65.0, 67.0, 69.0, 71.0, 72.0].iter().enumerate() {
                let start = i as Tick * step;
                song.add_note(start, start + step, *pitch);
            }
        }
        Demo::Chords => {
            let chords: [[f32; 3]; 4] = [
                [60.0, 64.0, 67.0],
                [57.0, 60.0, 64.0],
                [53.0, 57.0, 60.0],
                [55.0, 59.0, 62.0],
            ];
            for (i, chord) in chords.iter().enumerate() {
                let start = i as Tick * beat;
                for &pitch in chord {
                    song.add_note(start, start + beat, pitch);
                }
            }
            song.add_note(0, 2 * beat, 36.0);
            song.add_note(2 * beat, 4 * beat, 41.0);
        }
    }
    song
}
