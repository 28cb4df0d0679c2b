use std::thread;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use media_frame::config::Configuration;
use media_frame::engine::pacing::SystemClock;
use media_frame::engine::{Engine, EngineSettings};
use media_frame::events::{LoadRequest, RawInput};
use media_frame::platform::{buttons, window};
use media_frame::render::Scenes;
use media_frame::render::font::load_system_font;
use media_frame::store::PlaylistStore;
use media_frame::tasks::loader::{self, LoaderHandle, LoaderSettings};

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls level, default = info
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let (cfg, path) = Configuration::load()?;
    let cfg = cfg.validated()?;
    tracing::info!(config = %path.display(), media = %cfg.media_dir.display(), "starting media frame");

    let (input_tx, input_rx) = crossbeam_channel::unbounded::<RawInput>(); // Window/buttons/signals -> Engine
    let (load_tx, load_rx) = mpsc::channel::<LoadRequest>(1); // Engine -> Loader

    let cancel = CancellationToken::new();

    {
        let input = input_tx.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; shutting down");
            let _ = input.send(RawInput::Interrupt);
        });
    }

    #[cfg(unix)]
    {
        let input = input_tx.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        received = sigterm.recv() => {
                            if received.is_some() {
                                tracing::info!("SIGTERM received; shutting down");
                                let _ = input.send(RawInput::Interrupt);
                            }
                        }
                    }
                }
                Err(err) => tracing::warn!("failed to register SIGTERM handler: {err}"),
            }
        });
    }

    let loader_task = tokio::spawn({
        let settings = LoaderSettings::from_config(&cfg);
        let cancel = cancel.clone();
        async move { loader::run(settings, load_rx, cancel).await }
    });

    let button_thread = match buttons::spawn(&cfg.buttons, input_tx.clone(), cancel.clone()) {
        Ok(handle) => handle,
        Err(err) => {
            tracing::warn!("hardware buttons unavailable: {err:?}");
            None
        }
    };

    let event_loop = window::build_event_loop()?;
    let screen = window::WindowScreen::new(event_loop.create_proxy());
    let font = load_system_font()
        .map_err(|err| tracing::warn!("no usable font; text will not be drawn: {err:?}"))
        .ok();

    let engine = Engine::new(
        screen,
        LoaderHandle::new(load_tx),
        SystemClock::default(),
        input_rx,
        PlaylistStore::new(&cfg.active_playlist_dir, &cfg.inactive_playlist_dir),
        Scenes::new(font),
        EngineSettings {
            dwell_seconds: cfg.dwell_seconds,
            address_file: cfg.address_file.clone(),
            address_port: cfg.address_port,
        },
    );
    let engine_thread = thread::Builder::new()
        .name("engine".into())
        .spawn(move || engine.run())
        .context("failed to spawn engine thread")?;

    // The window owns the main thread until the engine closes it.
    if let Err(e) = window::run(event_loop, cfg.window.clone(), input_tx.clone())
        .context("window failed")
    {
        tracing::error!("{e:?}");
        let _ = input_tx.send(RawInput::Interrupt);
    }
    drop(input_tx);

    let mut result = Ok(());
    match engine_thread.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::error!("engine error: {e:?}");
            result = Err(e);
        }
        Err(_) => tracing::error!("engine thread panicked"),
    }

    cancel.cancel();
    if let Some(handle) = button_thread
        && handle.join().is_err()
    {
        tracing::error!("button thread panicked");
    }
    match loader_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("loader error: {e:?}"),
        Err(e) => tracing::error!("join error: {e}"),
    }

    tracing::info!("media frame stopped");
    result
}
