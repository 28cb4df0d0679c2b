pub mod pacing;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use tracing::{debug, info, warn};

use crate::events::RawInput;
use crate::input::{Command, dispatch};
use crate::media::{MediaItem, Playlist, Rect};
use crate::render::{Canvas, Scenes};
use crate::store::{PlaylistStore, read_address};
use pacing::{Clock, DwellSetting, DwellTimer, MediaClock, POLL_INTERVAL};

/// Menu and playlist screens are redrawn this often while idle, so a changed
/// address shows up without input.
const IDLE_REDRAW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Menu,
    PlaylistSelect,
    Playing,
}

/// Where finished canvases go.
pub trait Screen {
    /// Show the canvas. An error means the screen is gone.
    fn present(&mut self, canvas: &Canvas) -> Result<()>;
    fn close(&mut self);
}

/// Engine side of the background playlist build.
pub trait PlaylistRefresher {
    /// Start a build unless one is already outstanding.
    fn begin(&mut self);
    /// The finished build, if it is ready. Never blocks.
    fn try_join(&mut self) -> Option<Playlist>;
    /// Wait for the outstanding build. `None` when nothing is outstanding.
    fn join(&mut self) -> Option<Playlist>;
    fn in_flight(&self) -> bool;
}

/// Playlist picker state: descriptor names, selected index and first
/// visible row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectView {
    pub entries: Vec<String>,
    pub selected: usize,
    pub offset: usize,
}

impl SelectView {
    pub const ROWS: usize = 5;

    pub fn new(entries: Vec<String>) -> Self {
        Self {
            entries,
            selected: 0,
            offset: 0,
        }
    }

    pub fn visible_rows(&self) -> usize {
        Self::ROWS.min(self.entries.len().saturating_sub(self.offset))
    }

    /// `(row, index, display name)` for every row on screen.
    pub fn visible(&self) -> impl Iterator<Item = (usize, usize, &str)> {
        self.entries
            .iter()
            .enumerate()
            .skip(self.offset)
            .take(Self::ROWS)
            .enumerate()
            .map(|(row, (idx, name))| (row, idx, crate::store::display_name(name)))
    }

    pub fn selected_name(&self) -> Option<&str> {
        self.entries.get(self.selected).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub dwell_seconds: u32,
    pub address_file: PathBuf,
    pub address_port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    To(PlaybackState),
    Quit,
}

/// Playback state machine. Owns the playlist, cursor, pause flag and dwell
/// setting; runs on its own thread and blocks only at its poll points.
pub struct Engine<S, R, C> {
    screen: S,
    refresher: R,
    clock: C,
    input: Receiver<RawInput>,
    playlists: PlaylistStore,
    scenes: Scenes,
    settings: EngineSettings,
    canvas: Canvas,
    state: PlaybackState,
    playlist: Playlist,
    cursor: usize,
    paused: bool,
    dwell: DwellSetting,
    select: SelectView,
}

impl<S: Screen, R: PlaylistRefresher, C: Clock> Engine<S, R, C> {
    pub fn new(
        screen: S,
        refresher: R,
        clock: C,
        input: Receiver<RawInput>,
        playlists: PlaylistStore,
        scenes: Scenes,
        settings: EngineSettings,
    ) -> Self {
        let dwell = DwellSetting::new(settings.dwell_seconds);
        Self {
            screen,
            refresher,
            clock,
            input,
            playlists,
            scenes,
            settings,
            canvas: Canvas::default(),
            state: PlaybackState::Menu,
            playlist: Playlist::default(),
            cursor: 0,
            paused: false,
            dwell,
            select: SelectView::default(),
        }
    }

    /// Run until quit, interrupt, or the screen goes away.
    pub fn run(mut self) -> Result<()> {
        info!(state = ?self.state, dwell = self.dwell.seconds(), "engine started");
        let outcome = self.run_states();
        self.shutdown();
        outcome
    }

    fn run_states(&mut self) -> Result<()> {
        loop {
            let next = match self.state {
                PlaybackState::Menu => self.run_menu()?,
                PlaybackState::PlaylistSelect => self.run_select()?,
                PlaybackState::Playing => self.run_playing()?,
            };
            match next {
                Transition::To(state) => {
                    debug!(from = ?self.state, to = ?state, "state change");
                    self.state = state;
                }
                Transition::Quit => {
                    info!("quit requested");
                    return Ok(());
                }
            }
        }
    }

    fn shutdown(&mut self) {
        self.playlist.release_all();
        if self.refresher.in_flight() {
            self.refresher.join();
        }
        self.screen.close();
        info!("engine stopped");
    }

    /// Pause and dwell apply in every state.
    fn apply_setting(&mut self, cmd: Command) {
        match cmd {
            Command::TogglePause => {
                self.paused = !self.paused;
                info!(paused = self.paused, "pause toggled");
            }
            Command::DecrementDwell => {
                self.dwell.decrement();
                info!(seconds = self.dwell.seconds(), "dwell changed");
            }
            _ => {}
        }
    }

    /// Blocking wait for the next command on an idle screen. The inner value
    /// is `None` on redraw timeout or input that hits nothing; the outer one
    /// is `None` once every input source is gone.
    fn next_idle_command(&mut self) -> Option<Option<Command>> {
        match self.input.recv_timeout(IDLE_REDRAW) {
            Ok(raw) => Some(dispatch(raw, self.state, &self.select)),
            Err(RecvTimeoutError::Timeout) => Some(None),
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    fn run_menu(&mut self) -> Result<Transition> {
        loop {
            let address = read_address(&self.settings.address_file, self.settings.address_port);
            self.scenes.menu(&mut self.canvas, &address);
            self.screen.present(&self.canvas)?;

            let Some(cmd) = self.next_idle_command() else {
                return Ok(Transition::Quit);
            };
            match cmd {
                Some(Command::PlayAll) => {
                    if let Err(err) = self.playlists.deactivate() {
                        warn!(error = %err, "could not clear active playlist");
                    }
                    self.cursor = 0;
                    return Ok(Transition::To(PlaybackState::Playing));
                }
                Some(Command::OpenPlaylistSelect) => {
                    self.select = SelectView::new(self.playlists.list());
                    return Ok(Transition::To(PlaybackState::PlaylistSelect));
                }
                Some(Command::Quit) => return Ok(Transition::Quit),
                Some(other) => self.apply_setting(other),
                None => {}
            }
        }
    }

    fn run_select(&mut self) -> Result<Transition> {
        loop {
            self.scenes.playlist_select(&mut self.canvas, &self.select);
            self.screen.present(&self.canvas)?;

            let Some(cmd) = self.next_idle_command() else {
                return Ok(Transition::Quit);
            };
            match cmd {
                Some(Command::SelectRow(idx)) => self.select.selected = idx,
                Some(Command::ScrollUp) => self.select.offset = self.select.offset.saturating_sub(1),
                Some(Command::ScrollDown) => self.select.offset += 1,
                Some(Command::StartSelected) => {
                    if self.activate_selected() {
                        self.cursor = 0;
                        return Ok(Transition::To(PlaybackState::Playing));
                    }
                }
                Some(Command::Back) => {
                    self.activate_selected();
                    return Ok(Transition::To(PlaybackState::Menu));
                }
                Some(Command::ReturnToMenu) => return Ok(Transition::To(PlaybackState::Menu)),
                Some(Command::Quit) => return Ok(Transition::Quit),
                Some(other) => self.apply_setting(other),
                None => {}
            }
        }
    }

    /// Move the selected descriptor into the active slot and reset the
    /// picker. `false` when the list is empty and nothing was activated.
    fn activate_selected(&mut self) -> bool {
        let Some(name) = self.select.selected_name().map(str::to_string) else {
            debug!("no playlists to activate");
            return false;
        };
        if let Err(err) = self.playlists.activate(&name) {
            warn!(playlist = %name, error = %err, "could not activate playlist");
        }
        self.select.selected = 0;
        self.select.offset = 0;
        true
    }

    /// Drain queued input during playback. Returns the transition a menu or
    /// quit request asks for.
    fn poll_playing(&mut self) -> Option<Transition> {
        loop {
            let raw = match self.input.try_recv() {
                Ok(raw) => raw,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => return None,
            };
            match dispatch(raw, PlaybackState::Playing, &self.select) {
                Some(Command::Quit) => return Some(Transition::Quit),
                Some(Command::ReturnToMenu) => return Some(Transition::To(PlaybackState::Menu)),
                Some(cmd) => self.apply_setting(cmd),
                None => {}
            }
        }
    }

    fn run_playing(&mut self) -> Result<Transition> {
        self.refresher.begin();
        self.scenes.loading(&mut self.canvas);
        self.screen.present(&self.canvas)?;
        let first = loop {
            if let Some(playlist) = self.refresher.try_join() {
                break playlist;
            }
            if let Some(exit) = self.poll_playing() {
                self.refresher.join();
                return Ok(exit);
            }
            self.clock.sleep(POLL_INTERVAL);
        };
        self.playlist = first;
        self.cursor = 0;
        info!(
            items = self.playlist.len(),
            skipped = self.playlist.skipped().len(),
            "playback started"
        );

        loop {
            if self.playlist.is_empty() {
                warn!("playlist is empty; returning to menu");
                return Ok(Transition::To(PlaybackState::Menu));
            }

            self.refresher.begin();
            let is_video = matches!(
                self.playlist.items().get(self.cursor),
                Some(MediaItem::Video { .. })
            );
            let exit = if is_video {
                self.play_video()?
            } else {
                self.show_image()?
            };
            if let Some(exit) = exit {
                self.refresher.join();
                return Ok(exit);
            }

            if let Some(next) = self.refresher.join() {
                self.playlist = next;
            }
            self.cursor = if self.playlist.is_empty() {
                0
            } else {
                (self.cursor + 1) % self.playlist.len()
            };
        }
    }

    fn show_image(&mut self) -> Result<Option<Transition>> {
        if let Some(MediaItem::Image { name, frame, rect }) = self.playlist.items().get(self.cursor) {
            debug!(entry = %name, cursor = self.cursor, "showing image");
            self.scenes.media(&mut self.canvas, frame, *rect);
        }
        self.screen.present(&self.canvas)?;

        let mut timer = DwellTimer::default();
        let mut last = self.clock.now();
        loop {
            self.clock.sleep(POLL_INTERVAL);
            let now = self.clock.now();
            let elapsed = now.saturating_sub(last);
            last = now;
            if let Some(exit) = self.poll_playing() {
                return Ok(Some(exit));
            }
            timer.record(elapsed, self.paused);
            if timer.is_done(self.dwell) {
                return Ok(None);
            }
        }
    }

    /// Play the video under the cursor; its stream is released however the
    /// loop ends.
    fn play_video(&mut self) -> Result<Option<Transition>> {
        let outcome = self.video_loop();
        if let Some(MediaItem::Video { source, .. }) = self.playlist.get_mut(self.cursor) {
            source.release();
        }
        outcome
    }

    fn video_loop(&mut self) -> Result<Option<Transition>> {
        let (duration, fps) = match self.playlist.items().get(self.cursor) {
            Some(MediaItem::Video { name, source }) => {
                debug!(entry = %name, duration = source.duration(), fps = source.fps(), "playing video");
                (source.duration(), source.fps())
            }
            _ => return Ok(None),
        };
        let mut media = MediaClock::new(fps);

        loop {
            let started = self.clock.now();
            if let Some(exit) = self.poll_playing() {
                return Ok(Some(exit));
            }
            if media.is_past(duration) {
                return Ok(None);
            }

            if let Some(MediaItem::Video { name, source }) = self.playlist.get_mut(self.cursor) {
                match source.frame_at(media.time()) {
                    Ok(frame) => {
                        let rect = Rect::centered(frame.width, frame.height);
                        self.scenes.media(&mut self.canvas, frame, rect);
                    }
                    Err(err) => {
                        warn!(entry = %name, error = %err, "video decode failed; skipping");
                        return Ok(None);
                    }
                }
            }
            self.screen.present(&self.canvas)?;

            let interval = if self.paused {
                POLL_INTERVAL
            } else {
                media.advance();
                media.frame_interval()
            };
            let spent = self.clock.now().saturating_sub(started);
            let mut remaining = interval.saturating_sub(spent);
            // Long frame intervals are slept in poll-sized steps.
            while !remaining.is_zero() {
                let step = remaining.min(POLL_INTERVAL);
                self.clock.sleep(step);
                remaining -= step;
                if let Some(exit) = self.poll_playing() {
                    return Ok(Some(exit));
                }
            }
        }
    }
}
