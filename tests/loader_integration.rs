use media_frame::config::VideoOptions;
use media_frame::events::LoadRequest;
use media_frame::media::MediaItem;
use media_frame::store::{MediaStore, PlaylistStore};
use media_frame::tasks::loader::{self, LoaderSettings};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

fn settings_in(root: &Path) -> LoaderSettings {
    fs::create_dir_all(root.join("media")).unwrap();
    fs::create_dir_all(root.join("active")).unwrap();
    fs::create_dir_all(root.join("inactive")).unwrap();
    LoaderSettings {
        media: MediaStore::new(root.join("media")),
        playlists: PlaylistStore::new(root.join("active"), root.join("inactive")),
        video: VideoOptions {
            ffprobe: root.join("no-such-ffprobe"),
            ffmpeg: root.join("no-such-ffmpeg"),
        },
        max_concurrent_decodes: 2,
    }
}

fn write_png(path: &Path, w: u32, h: u32) {
    image::RgbaImage::from_pixel(w, h, image::Rgba([10, 20, 30, 255]))
        .save_with_format(path, image::ImageFormat::Png)
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn bad_entries_are_skipped_with_a_reason() {
    let tmp = tempdir().unwrap();
    let settings = settings_in(tmp.path());
    write_png(&tmp.path().join("media/photo.PNG"), 40, 20);
    fs::write(tmp.path().join("media/clip.mkv"), b"not a video").unwrap();
    fs::write(tmp.path().join("media/broken.jpg"), b"not a jpeg").unwrap();
    fs::write(tmp.path().join("media/movie.mp4"), b"not a video either").unwrap();
    fs::write(
        tmp.path().join("active/set.txt"),
        "photo.PNG\nclip.mkv\nbroken.jpg\nmovie.mp4\ngone.png\nnotes.doc\n",
    )
    .unwrap();

    let playlist = loader::load_playlist(&settings).await;

    assert_eq!(playlist.len(), 1);
    match &playlist.items()[0] {
        MediaItem::Image { name, frame, .. } => {
            assert_eq!(name, "photo.PNG");
            assert_eq!((frame.width, frame.height), (480, 240));
        }
        other => panic!("expected image, got {other:?}"),
    }
    let skipped: Vec<&str> = playlist.skipped().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(skipped, ["clip.mkv", "broken.jpg", "movie.mp4", "gone.png", "notes.doc"]);
    assert!(playlist.skipped().iter().all(|s| !s.reason.is_empty()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unsupported_files_in_the_store_are_skipped_without_a_descriptor() {
    let tmp = tempdir().unwrap();
    let settings = settings_in(tmp.path());
    write_png(&tmp.path().join("media/photo.PNG"), 40, 20);
    fs::write(tmp.path().join("media/clip.mkv"), b"not a video").unwrap();

    let playlist = loader::load_playlist(&settings).await;

    let names: Vec<&str> = playlist.items().iter().map(MediaItem::name).collect();
    assert_eq!(names, ["photo.PNG"]);
    assert!(matches!(playlist.items()[0], MediaItem::Image { .. }));
    let skipped: Vec<&str> = playlist.skipped().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(skipped, ["clip.mkv"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn whole_store_plays_when_nothing_is_active() {
    let tmp = tempdir().unwrap();
    let settings = settings_in(tmp.path());
    for name in ["c.png", "a.png", "b.png"] {
        write_png(&tmp.path().join("media").join(name), 8, 8);
    }

    let playlist = loader::load_playlist(&settings).await;
    let names: Vec<&str> = playlist.items().iter().map(MediaItem::name).collect();
    assert_eq!(names, ["a.png", "b.png", "c.png"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn worker_rebuilds_on_each_request() {
    let tmp = tempdir().unwrap();
    let settings = settings_in(tmp.path());
    write_png(&tmp.path().join("media/one.png"), 8, 8);

    let (tx, rx) = mpsc::channel::<LoadRequest>(1);
    let cancel = CancellationToken::new();
    let worker = tokio::spawn(loader::run(settings, rx, cancel.clone()));

    let (reply, first) = oneshot::channel();
    tx.send(LoadRequest { reply }).await.unwrap();
    let first = tokio::time::timeout(Duration::from_secs(5), first)
        .await
        .expect("timeout waiting for playlist")
        .unwrap();
    assert_eq!(first.len(), 1);

    write_png(&tmp.path().join("media/two.png"), 8, 8);
    let (reply, second) = oneshot::channel();
    tx.send(LoadRequest { reply }).await.unwrap();
    let second = tokio::time::timeout(Duration::from_secs(5), second)
        .await
        .expect("timeout waiting for playlist")
        .unwrap();
    assert_eq!(second.len(), 2);

    cancel.cancel();
    worker.await.unwrap().unwrap();
}
