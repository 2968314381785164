//! Messages from the controller to the audio thread.

use pr_engine::Scheduler;
use pr_ir::{Song, Tick};
use ringbuf::traits::{Consumer, Producer};
use ringbuf::{HeapCons, HeapProd};

/// Transport and editing requests, applied at the start of the next block.
#[derive(Debug)]
pub enum Command {
    Play,
    Pause,
    Stop,
    Seek(Tick),
    PianoOn(f32),
    PianoOff(f32),
    /// Replace the song. The previous one is handed back for dropping.
    LoadSong(Song),
}

impl Command {
    /// Apply to `scheduler`, returning any song that must be freed elsewhere.
    pub fn apply(self, scheduler: &mut Scheduler) -> Option<Song> {
        match self {
            Command::Play => scheduler.play(),
            Command::Pause => scheduler.pause(),
            Command::Stop => scheduler.stop(),
            Command::Seek(tick) => scheduler.seek(tick),
            Command::PianoOn(pitch) => scheduler.play_piano_note(pitch),
            Command::PianoOff(pitch) => scheduler.stop_piano_note(pitch),
            Command::LoadSong(song) => return Some(scheduler.load_song(song)),
        }
        None
    }
}

/// Controller side of the audio thread's queues.
///
/// A song update that finds the queue full is not lost: the sender marks
/// the audio thread's song as stale and pushes the controller's current
/// song ahead of the next command.
pub(crate) struct CommandSender {
    commands: HeapProd<Command>,
    retired: HeapCons<Song>,
    song_stale: bool,
}

impl CommandSender {
    pub fn new(commands: HeapProd<Command>, retired: HeapCons<Song>) -> Self {
        Self {
            commands,
            retired,
            song_stale: false,
        }
    }

    /// Queue `command`. `song` is the controller's current song.
    pub fn send(&mut self, command: Command, song: &Song) {
        // Free songs the audio thread has finished with.
        while self.retired.try_pop().is_some() {}

        if self.song_stale && !matches!(command, Command::LoadSong(_)) {
            self.push(Command::LoadSong(song.clone()));
        }
        self.push(command);
    }

    /// The audio thread is playing an older song than the controller holds.
    pub fn song_stale(&self) -> bool {
        self.song_stale
    }

    fn push(&mut self, command: Command) {
        let is_song = matches!(command, Command::LoadSong(_));
        match self.commands.try_push(command) {
            Ok(()) => {
                if is_song {
                    self.song_stale = false;
                }
            }
            Err(_) if is_song => {
                self.song_stale = true;
                log::warn!("command queue full, deferring song update");
            }
            Err(command) => log::warn!("command queue full, dropping {:?}", command),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pr_engine::Transport;
    use ringbuf::traits::Split;
    use ringbuf::HeapRb;

    fn sender(capacity: usize) -> (CommandSender, HeapCons<Command>, HeapProd<Song>) {
        let (commands, command_rx) = HeapRb::<Command>::new(capacity).split();
        let (retired_tx, retired) = HeapRb::<Song>::new(capacity).split();
        (CommandSender::new(commands, retired), command_rx, retired_tx)
    }

    #[test]
    fn transport_commands_drive_the_scheduler() {
        let mut s = Scheduler::new(48000);
        assert!(Command::Play.apply(&mut s).is_none());
        assert_eq!(s.state(), Transport::Playing);
        Command::Pause.apply(&mut s);
        assert_eq!(s.state(), Transport::Paused);
        Command::Seek(12).apply(&mut s);
        assert_eq!(s.tick(), 12);
        Command::Stop.apply(&mut s);
        assert_eq!((s.state(), s.tick()), (Transport::Stopped, 0));
    }

    #[test]
    fn piano_commands_toggle_preview() {
        let mut s = Scheduler::new(48000);
        Command::PianoOn(64.0).apply(&mut s);
        assert_eq!(s.preview().pitch(), Some(64.0));
        Command::PianoOff(64.0).apply(&mut s);
        assert!(!s.preview().is_active());
    }

    #[test]
    fn load_song_returns_previous() {
        let mut s = Scheduler::with_song(Song::new("first"), 48000);
        let old = Command::LoadSong(Song::new("second")).apply(&mut s).unwrap();
        assert_eq!(old.title.as_str(), "first");
        assert_eq!(s.song().title.as_str(), "second");
    }

    #[test]
    fn song_update_dropped_on_full_queue_is_resent_with_next_command() {
        let (mut tx, mut rx, _retired) = sender(2);
        let mut song = Song::new("edited");
        tx.send(Command::Play, &song);
        tx.send(Command::Seek(4), &song);

        song.add_note(0, 4, 60.0).unwrap();
        tx.send(Command::LoadSong(song.clone()), &song);
        assert!(tx.song_stale());

        // Audio thread catches up.
        while rx.try_pop().is_some() {}

        tx.send(Command::Stop, &song);
        assert!(!tx.song_stale());
        match rx.try_pop() {
            Some(Command::LoadSong(sent)) => assert_eq!(sent.len(), 1),
            other => panic!("expected the current song first, got {:?}", other),
        }
        assert!(matches!(rx.try_pop(), Some(Command::Stop)));
        assert!(rx.try_pop().is_none());
    }

    #[test]
    fn stale_song_waits_while_queue_stays_full() {
        let (mut tx, mut rx, _retired) = sender(1);
        let song = Song::new("s");
        tx.send(Command::Play, &song);
        tx.send(Command::LoadSong(song.clone()), &song);
        assert!(tx.song_stale());

        // Still full: neither the song nor the pause get through.
        tx.send(Command::Pause, &song);
        assert!(tx.song_stale());
        assert!(matches!(rx.try_pop(), Some(Command::Play)));
        assert!(rx.try_pop().is_none());
    }

    #[test]
    fn newer_song_update_clears_stale_flag() {
        let (mut tx, mut rx, _retired) = sender(1);
        let mut song = Song::new("s");
        tx.send(Command::Play, &song);
        tx.send(Command::LoadSong(song.clone()), &song);
        assert!(tx.song_stale());
        let _ = rx.try_pop();

        song.add_note(0, 2, 64.0).unwrap();
        song.add_note(2, 4, 67.0).unwrap();
        tx.send(Command::LoadSong(song.clone()), &song);
        assert!(!tx.song_stale());
        match rx.try_pop() {
            Some(Command::LoadSong(sent)) => assert_eq!(sent.len(), 2),
            other => panic!("expected a song, got {:?}", other),
        }
        assert!(rx.try_pop().is_none());
    }

    #[test]
    fn send_frees_retired_songs() {
        let (mut tx, _rx, mut retired) = sender(2);
        retired.try_push(Song::new("old")).unwrap();
        retired.try_push(Song::new("older")).unwrap();
        tx.send(Command::Play, &Song::new("current"));
        assert!(retired.try_push(Song::new("a")).is_ok());
        assert!(retired.try_push(Song::new("b")).is_ok());
    }
}
