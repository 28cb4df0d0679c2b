use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Configuration, VideoOptions};
use crate::engine::PlaylistRefresher;
use crate::error::MediaError;
use crate::events::LoadRequest;
use crate::media::image_decoder::decode_for_display;
use crate::media::video::open_video;
use crate::media::{MediaItem, MediaKind, Playlist, SkipDiagnostic, classify};
use crate::store::{MediaStore, PlaylistStore, check_entry_name};

/// Everything a playlist build reads. Cloned into blocking tasks.
#[derive(Debug, Clone)]
pub struct LoaderSettings {
    pub media: MediaStore,
    pub playlists: PlaylistStore,
    pub video: VideoOptions,
    pub max_concurrent_decodes: usize,
}

impl LoaderSettings {
    pub fn from_config(cfg: &Configuration) -> Self {
        Self {
            media: MediaStore::new(&cfg.media_dir),
            playlists: PlaylistStore::new(&cfg.active_playlist_dir, &cfg.inactive_playlist_dir),
            video: cfg.video.clone(),
            max_concurrent_decodes: cfg.loader_max_concurrent_decodes.max(1),
        }
    }
}

/// Names to load: the active descriptor's entries, or every file in the
/// media store when no descriptor is active or it cannot be read.
pub fn resolve_entries(settings: &LoaderSettings) -> Vec<String> {
    if let Some(entries) = settings.playlists.read_active_entries() {
        debug!(entries = entries.len(), "using active playlist");
        return entries;
    }
    match settings.media.list() {
        Ok(names) => {
            debug!(entries = names.len(), "no active playlist; using whole media store");
            names
        }
        Err(err) => {
            warn!(root = %settings.media.root().display(), error = %err, "cannot list media store");
            Vec::new()
        }
    }
}

/// Classify and decode a single entry.
pub fn load_entry(
    media: &MediaStore,
    name: &str,
    video: &VideoOptions,
) -> Result<MediaItem, MediaError> {
    check_entry_name(name)?;
    let path = media.path_of(name);
    match classify(name) {
        MediaKind::Image => Ok(MediaItem::image(name, decode_for_display(&path)?)),
        MediaKind::Video => Ok(MediaItem::video(name, open_video(&path, video)?)),
        MediaKind::Unsupported => Err(MediaError::Unsupported(name.to_string())),
    }
}

/// Build a playlist from scratch. Decodes run on the blocking pool, at most
/// `max_concurrent_decodes` at a time; items keep entry order. Failed
/// entries are logged and recorded, never fatal.
pub async fn load_playlist(settings: &LoaderSettings) -> Playlist {
    let entries = {
        let settings = settings.clone();
        tokio::task::spawn_blocking(move || resolve_entries(&settings))
            .await
            .unwrap_or_else(|err| {
                warn!(error = %err, "entry listing task failed");
                Vec::new()
            })
    };

    let mut results: Vec<Option<Result<MediaItem, MediaError>>> =
        entries.iter().map(|_| None).collect();
    let mut tasks: JoinSet<(usize, Result<MediaItem, MediaError>)> = JoinSet::new();
    let mut queue = entries.iter().cloned().enumerate();

    loop {
        while tasks.len() < settings.max_concurrent_decodes {
            let Some((idx, name)) = queue.next() else { break };
            let media = settings.media.clone();
            let video = settings.video.clone();
            tasks.spawn_blocking(move || (idx, load_entry(&media, &name, &video)));
        }
        match tasks.join_next().await {
            Some(Ok((idx, res))) => results[idx] = Some(res),
            Some(Err(err)) => warn!(error = %err, "decode task failed"),
            None => break,
        }
    }

    let mut items = Vec::with_capacity(entries.len());
    let mut skipped = Vec::new();
    for (name, res) in entries.into_iter().zip(results) {
        match res {
            Some(Ok(item)) => items.push(item),
            Some(Err(err)) => {
                warn!(entry = %name, error = %err, "skipping media");
                skipped.push(SkipDiagnostic {
                    name,
                    reason: err.to_string(),
                });
            }
            None => skipped.push(SkipDiagnostic {
                name,
                reason: "decode task did not complete".to_string(),
            }),
        }
    }
    Playlist::new(items, skipped)
}

/// Persistent loader worker: one playlist build per request, replied on the
/// request's oneshot.
pub async fn run(
    settings: LoaderSettings,
    mut requests: Receiver<LoadRequest>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        let request = select! {
            _ = cancel.cancelled() => break,
            req = requests.recv() => match req {
                Some(req) => req,
                None => break,
            },
        };
        let playlist = select! {
            _ = cancel.cancelled() => break,
            playlist = load_playlist(&settings) => playlist,
        };
        info!(
            items = playlist.len(),
            skipped = playlist.skipped().len(),
            "playlist loaded"
        );
        if request.reply.send(playlist).is_err() {
            debug!("playlist requester went away");
        }
    }
    debug!("loader worker exiting");
    Ok(())
}

/// Engine-side end of the loader worker. Keeps at most one request
/// outstanding; a vanished worker yields empty playlists.
pub struct LoaderHandle {
    tx: Sender<LoadRequest>,
    pending: Option<oneshot::Receiver<Playlist>>,
}

impl LoaderHandle {
    pub fn new(tx: Sender<LoadRequest>) -> Self {
        Self { tx, pending: None }
    }
}

impl PlaylistRefresher for LoaderHandle {
    fn begin(&mut self) {
        if self.pending.is_some() {
            return;
        }
        let (reply, rx) = oneshot::channel();
        if self.tx.blocking_send(LoadRequest { reply }).is_err() {
            warn!("loader worker is gone; playlist will be empty");
        }
        self.pending = Some(rx);
    }

    fn try_join(&mut self) -> Option<Playlist> {
        let rx = self.pending.as_mut()?;
        let playlist = match rx.try_recv() {
            Ok(playlist) => playlist,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => Playlist::default(),
        };
        self.pending = None;
        Some(playlist)
    }

    fn join(&mut self) -> Option<Playlist> {
        let rx = self.pending.take()?;
        Some(rx.blocking_recv().unwrap_or_default())
    }

    fn in_flight(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::fs;
    use tokio::sync::mpsc;

    fn settings_in(root: &std::path::Path) -> LoaderSettings {
        let media = root.join("media");
        fs::create_dir_all(&media).unwrap();
        LoaderSettings {
            media: MediaStore::new(&media),
            playlists: PlaylistStore::new(root.join("active"), root.join("inactive")),
            video: VideoOptions::default(),
            max_concurrent_decodes: 2,
        }
    }

    fn write_png(path: &std::path::Path, w: u32, h: u32) {
        RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn active_descriptor_wins_over_media_listing() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        fs::write(settings.media.path_of("z.png"), b"").unwrap();
        fs::create_dir_all(dir.path().join("active")).unwrap();
        fs::write(dir.path().join("active/trip.txt"), "b.png\na.png\n").unwrap();
        assert_eq!(resolve_entries(&settings), vec!["b.png", "a.png"]);
    }

    #[test]
    fn falls_back_to_sorted_media_listing() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        fs::write(settings.media.path_of("b.png"), b"").unwrap();
        fs::write(settings.media.path_of("a.mp4"), b"").unwrap();
        fs::create_dir_all(settings.media.path_of("nested")).unwrap();
        assert_eq!(resolve_entries(&settings), vec!["a.mp4", "b.png"]);
    }

    #[test]
    fn unsafe_and_unsupported_entries_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        let err = load_entry(&settings.media, "../secret.png", &settings.video).unwrap_err();
        assert!(matches!(err, MediaError::InvalidName(_)));
        let err = load_entry(&settings.media, "clip.mkv", &settings.video).unwrap_err();
        assert!(matches!(err, MediaError::Unsupported(_)));
    }

    #[tokio::test]
    async fn playlist_keeps_entry_order_under_concurrency() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings_in(dir.path());
        settings.max_concurrent_decodes = 3;
        let names = ["e.png", "d.png", "c.png", "b.png", "a.png"];
        for (i, name) in names.iter().enumerate() {
            write_png(&settings.media.path_of(name), 10 + i as u32 * 40, 100);
        }
        fs::create_dir_all(dir.path().join("active")).unwrap();
        fs::write(dir.path().join("active/order.txt"), names.join("\n")).unwrap();

        let playlist = load_playlist(&settings).await;
        let loaded: Vec<&str> = playlist.items().iter().map(MediaItem::name).collect();
        assert_eq!(loaded, names);
        assert!(playlist.skipped().is_empty());
    }

    #[tokio::test]
    async fn worker_replies_and_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        write_png(&settings.media.path_of("only.png"), 4, 4);

        let (tx, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(run(settings, rx, cancel.clone()));

        let (reply, reply_rx) = oneshot::channel();
        tx.send(LoadRequest { reply }).await.unwrap();
        let playlist = reply_rx.await.unwrap();
        assert_eq!(playlist.len(), 1);

        cancel.cancel();
        worker.await.unwrap().unwrap();
    }

    #[test]
    fn handle_degrades_to_empty_when_worker_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let mut handle = LoaderHandle::new(tx);
        handle.begin();
        assert!(handle.in_flight());
        let playlist = handle.join().unwrap();
        assert!(playlist.is_empty());
        assert!(!handle.in_flight());
        assert!(handle.join().is_none());
    }
}
