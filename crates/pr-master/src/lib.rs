//! Headless controller for the pulseroll sequencer.
//!
//! Owns the song, runs a [`Scheduler`] on a dedicated audio thread, and
//! renders offline. The CLI and any front end share this API.
//!
//! The scheduler is never touched from two threads: transport calls and
//! song replacements travel to the audio thread over a lock-free queue and
//! are applied at the start of the next block. Replaced songs come back
//! over a second queue so they are freed off the audio thread.

mod command;
mod error;
mod wav;

use pr_audio::{AudioError, AudioOutput, CpalOutput};
use pr_engine::Scheduler;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::mpsc::{self, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;

// Re-export common types so callers don't need pr-ir/pr-engine directly.
use command::CommandSender;
pub use command::Command;
pub use error::ControllerError;
pub use pr_engine::{Frame, Transport};
pub use pr_ir::{Note, NoteId, Song, Tick};
pub use wav::{frames_to_wav, write_wav};

/// Frames rendered per scheduler call on the audio thread.
pub const BLOCK_SIZE: usize = 256;

/// Pending commands (and returned songs) the queues can hold.
const QUEUE_CAPACITY: usize = 64;

/// Headless sequencer controller: owns a song and manages playback.
pub struct Controller {
    song: Song,
    audio: Option<AudioHandle>,
}

struct AudioHandle {
    sender: CommandSender,
    shared: Arc<Shared>,
    sample_rate: u32,
    thread: Option<JoinHandle<()>>,
}

/// State published by the audio thread once per block.
struct Shared {
    shutdown: AtomicBool,
    /// f32 bits of the playhead at the start of the last block
    playhead: AtomicU32,
    /// f64 bits of the last block's render time in milliseconds
    block_ms: AtomicU64,
    transport: AtomicU8,
}

impl Shared {
    fn new() -> Self {
        Self {
            shutdown: AtomicBool::new(false),
            playhead: AtomicU32::new(0f32.to_bits()),
            block_ms: AtomicU64::new(0f64.to_bits()),
            transport: AtomicU8::new(encode_transport(Transport::Stopped)),
        }
    }

    fn publish(&self, scheduler: &Scheduler, playhead: f32, block_ms: f64) {
        self.playhead.store(playhead.to_bits(), Ordering::Relaxed);
        self.block_ms.store(block_ms.to_bits(), Ordering::Relaxed);
        self.transport
            .store(encode_transport(scheduler.state()), Ordering::Relaxed);
    }
}

fn encode_transport(state: Transport) -> u8 {
    match state {
        Transport::Stopped => 0,
        Transport::Playing => 1,
        Transport::Paused => 2,
    }
}

fn decode_transport(raw: u8) -> Transport {
    match raw {
        1 => Transport::Playing,
        2 => Transport::Paused,
        _ => Transport::Stopped,
    }
}

impl Controller {
    pub fn new() -> Self {
        Self::with_song(Song::default())
    }

    pub fn with_song(song: Song) -> Self {
        Self { song, audio: None }
    }

    // --- Song management ---

    pub fn song(&self) -> &Song {
        &self.song
    }

    /// Replace the song. A running audio thread picks it up at its next block.
    pub fn load_song(&mut self, song: Song) {
        self.song = song;
        self.push_song();
    }

    /// Edit the song in place and forward the result to the audio thread.
    pub fn edit_song<R>(&mut self, edit: impl FnOnce(&mut Song) -> R) -> R {
        let result = edit(&mut self.song);
        self.push_song();
        result
    }

    fn push_song(&mut self) {
        if self.audio.is_some() {
            let song = self.song.clone();
            self.send(Command::LoadSong(song));
        }
    }

    // --- Real-time playback ---

    /// Open the default output device and start the audio thread.
    ///
    /// Returns the device sample rate. Does nothing if already open.
    pub fn open_audio(&mut self) -> Result<u32, ControllerError> {
        if let Some(audio) = &self.audio {
            return Ok(audio.sample_rate);
        }

        let (commands, command_rx) = HeapRb::<Command>::new(QUEUE_CAPACITY).split();
        let (retired_tx, retired) = HeapRb::<Song>::new(QUEUE_CAPACITY).split();
        let shared = Arc::new(Shared::new());
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let song = self.song.clone();
        let thread_shared = shared.clone();
        let thread = std::thread::Builder::new()
            .name("pr-audio".into())
            .spawn(move || audio_thread(song, command_rx, retired_tx, thread_shared, ready_tx))?;

        let sample_rate = match ready_rx.recv() {
            Ok(Ok(sample_rate)) => sample_rate,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e.into());
            }
            Err(_) => {
                let _ = thread.join();
                return Err(ControllerError::ThreadStart);
            }
        };

        self.audio = Some(AudioHandle {
            sender: CommandSender::new(commands, retired),
            shared,
            sample_rate,
            thread: Some(thread),
        });
        Ok(sample_rate)
    }

    /// Stop the audio thread and release the device.
    pub fn close_audio(&mut self) {
        if let Some(mut audio) = self.audio.take() {
            audio.shared.shutdown.store(true, Ordering::Relaxed);
            if let Some(handle) = audio.thread.take() {
                if handle.join().is_err() {
                    log::error!("audio thread panicked");
                }
            }
        }
    }

    pub fn is_audio_open(&self) -> bool {
        self.audio.is_some()
    }

    /// Device sample rate, while the audio thread runs.
    pub fn sample_rate(&self) -> Option<u32> {
        self.audio.as_ref().map(|a| a.sample_rate)
    }

    pub fn play(&mut self) {
        self.send(Command::Play);
    }

    pub fn pause(&mut self) {
        self.send(Command::Pause);
    }

    pub fn stop(&mut self) {
        self.send(Command::Stop);
    }

    pub fn seek(&mut self, tick: Tick) {
        self.send(Command::Seek(tick));
    }

    pub fn play_piano_note(&mut self, pitch: f32) {
        self.send(Command::PianoOn(pitch));
    }

    pub fn stop_piano_note(&mut self, pitch: f32) {
        self.send(Command::PianoOff(pitch));
    }

    fn send(&mut self, command: Command) {
        let Some(audio) = self.audio.as_mut() else {
            log::debug!("audio not open, ignoring {:?}", command);
            return;
        };
        audio.sender.send(command, &self.song);
    }

    /// Transport state as of the last rendered block.
    pub fn transport(&self) -> Transport {
        self.audio.as_ref().map_or(Transport::Stopped, |a| {
            decode_transport(a.shared.transport.load(Ordering::Relaxed))
        })
    }

    pub fn is_playing(&self) -> bool {
        self.transport() == Transport::Playing
    }

    /// Fractional tick position at the start of the last rendered block.
    pub fn playhead(&self) -> f32 {
        self.audio.as_ref().map_or(0.0, |a| {
            f32::from_bits(a.shared.playhead.load(Ordering::Relaxed))
        })
    }

    /// Wall-clock milliseconds the last block took to render.
    pub fn last_block_ms(&self) -> f64 {
        self.audio.as_ref().map_or(0.0, |a| {
            f64::from_bits(a.shared.block_ms.load(Ordering::Relaxed))
        })
    }

    // --- Offline rendering ---

    /// Render `frames` frames of the song from tick 0.
    pub fn render_frames(&self, sample_rate: u32, frames: usize) -> Vec<Frame> {
        let mut scheduler = Scheduler::with_song(self.song.clone(), sample_rate);
        scheduler.play();

        let mut left = [0.0f32; BLOCK_SIZE];
        let mut right = [0.0f32; BLOCK_SIZE];
        let mut out = Vec::with_capacity(frames);
        while out.len() < frames {
            let n = (frames - out.len()).min(BLOCK_SIZE);
            let (left, right) = (&mut left[..n], &mut right[..n]);
            left.fill(0.0);
            right.fill(0.0);
            scheduler.process_block(left, right, None, None);
            out.extend(left.iter().zip(right.iter()).map(|(&l, &r)| Frame::from_f32(l, r)));
        }
        out
    }

    /// Render `loops` passes through the song's loop.
    pub fn render_loops(&self, sample_rate: u32, loops: u32) -> Vec<Frame> {
        let frames = self.song.loop_frames(sample_rate) * loops as u64;
        self.render_frames(sample_rate, frames as usize)
    }

    pub fn render_to_wav(&self, sample_rate: u32, frames: usize) -> Result<Vec<u8>, ControllerError> {
        let rendered = self.render_frames(sample_rate, frames);
        Ok(frames_to_wav(&rendered, sample_rate)?)
    }

    /// Render to a WAV file at `path`.
    pub fn write_wav_file(
        &self,
        path: impl AsRef<Path>,
        sample_rate: u32,
        frames: usize,
    ) -> Result<(), ControllerError> {
        let path = path.as_ref();
        let rendered = self.render_frames(sample_rate, frames);
        let mut file = BufWriter::new(File::create(path)?);
        write_wav(&mut file, &rendered, sample_rate)?;
        log::info!("wrote {} frames to {}", rendered.len(), path.display());
        Ok(())
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.close_audio();
    }
}

fn open_output() -> Result<CpalOutput, AudioError> {
    let (mut output, consumer) = CpalOutput::new()?;
    output.build_stream(consumer)?;
    output.start()?;
    Ok(output)
}

fn audio_thread(
    song: Song,
    mut commands: HeapCons<Command>,
    mut retired: HeapProd<Song>,
    shared: Arc<Shared>,
    ready: SyncSender<Result<u32, AudioError>>,
) {
    let mut output = match open_output() {
        Ok(output) => output,
        Err(e) => {
            log::error!("failed to open audio output: {}", e);
            let _ = ready.send(Err(e));
            return;
        }
    };
    let sample_rate = output.sample_rate();
    if ready.send(Ok(sample_rate)).is_err() {
        return;
    }
    log::info!("audio thread started at {} Hz", sample_rate);

    let mut scheduler = Scheduler::with_song(song, sample_rate);
    let mut left = [0.0f32; BLOCK_SIZE];
    let mut right = [0.0f32; BLOCK_SIZE];
    let mut playhead = [0.0f32; BLOCK_SIZE];
    let mut frames = [Frame::silence(); BLOCK_SIZE];

    while !shared.shutdown.load(Ordering::Relaxed) {
        while let Some(command) = commands.try_pop() {
            if let Some(old) = command.apply(&mut scheduler) {
                // Queue full: the song is dropped here instead.
                let _ = retired.try_push(old);
            }
        }

        left.fill(0.0);
        right.fill(0.0);
        let mut block_ms = 0.0;
        render_block(&mut scheduler, &mut left, &mut right, &mut playhead, &mut block_ms);
        shared.publish(&scheduler, playhead[0], block_ms);

        output.write_block_spin(&left, &right, &mut frames);
    }

    if let Err(e) = output.stop() {
        log::warn!("failed to stop audio output: {}", e);
    }
    log::info!("audio thread stopped");
}

#[cfg(feature = "alloc_check")]
fn render_block(
    scheduler: &mut Scheduler,
    left: &mut [f32],
    right: &mut [f32],
    playhead: &mut [f32],
    block_ms: &mut f64,
) {
    assert_no_alloc::assert_no_alloc(|| {
        scheduler.process_block(left, right, Some(playhead), Some(block_ms))
    });
}

#[cfg(not(feature = "alloc_check"))]
fn render_block(
    scheduler: &mut Scheduler,
    left: &mut [f32],
    right: &mut [f32],
    playhead: &mut [f32],
    block_ms: &mut f64,
) {
    scheduler.process_block(left, right, Some(playhead), Some(block_ms));
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 4800;

    fn arpeggio() -> Song {
        let mut song = Song::with_timing("arp", 24, 60.0, 16);
        song.add_note(0, 4, 60.0).unwrap();
        song.add_note(4, 8, 64.0).unwrap();
        song.add_note(8, 16, 67.0).unwrap();
        song
    }

    #[test]
    fn render_frames_has_requested_length() {
        let ctrl = Controller::with_song(arpeggio());
        assert_eq!(ctrl.render_frames(SR, 1000).len(), 1000);
        assert_eq!(ctrl.render_frames(SR, 0).len(), 0);
    }

    #[test]
    fn empty_song_renders_silence() {
        let ctrl = Controller::new();
        assert!(ctrl.render_frames(SR, 4096).iter().all(|f| f.is_silent()));
    }

    #[test]
    fn loops_repeat_exactly() {
        let ctrl = Controller::with_song(arpeggio());
        let frames = ctrl.render_loops(SR, 2);
        let loop_len = ctrl.song().loop_frames(SR) as usize;
        assert_eq!(frames.len(), 2 * loop_len);
        assert!(frames[..loop_len].iter().any(|f| !f.is_silent()));
        assert_eq!(frames[..loop_len], frames[loop_len..]);
    }

    #[test]
    fn render_to_wav_wraps_frames() {
        let ctrl = Controller::with_song(arpeggio());
        let wav = ctrl.render_to_wav(SR, 100).unwrap();
        assert_eq!(wav.len(), 44 + 100 * 4);
    }

    #[test]
    fn edit_song_updates_owned_copy() {
        let mut ctrl = Controller::new();
        let id = ctrl.edit_song(|song| song.add_note(0, 8, 69.0)).unwrap();
        assert_eq!(ctrl.song().note(id).map(|n| n.end), Some(8));
    }

    #[test]
    fn transport_without_audio_is_inert() {
        let mut ctrl = Controller::with_song(arpeggio());
        ctrl.play();
        ctrl.play_piano_note(60.0);
        assert!(!ctrl.is_audio_open());
        assert_eq!(ctrl.transport(), Transport::Stopped);
        assert_eq!(ctrl.playhead(), 0.0);
        assert_eq!(ctrl.sample_rate(), None);
    }

    #[test]
    fn transport_encoding_round_trips() {
        for state in [Transport::Stopped, Transport::Playing, Transport::Paused] {
            assert_eq!(decode_transport(encode_transport(state)), state);
        }
    }
}
