use std::collections::HashMap;
use std::fs;
use std::io;
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use crossbeam_channel::Sender;
use evdev::{Device, EventSummary, KeyCode};
use nix::fcntl::{FcntlArg, OFlag, fcntl};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ButtonConfig;
use crate::events::{Button, RawInput};

const IDLE_SLEEP: Duration = Duration::from_millis(20);

/// Which evdev key code drives which button.
#[derive(Debug, Clone)]
pub struct KeyMap {
    entries: Vec<(KeyCode, Button)>,
}

impl KeyMap {
    pub fn from_config(cfg: &ButtonConfig) -> Result<Self> {
        let bindings = [
            (&cfg.pause_key, Button::TogglePause),
            (&cfg.menu_key, Button::ReturnToMenu),
            (&cfg.dwell_key, Button::DecrementDwell),
            (&cfg.quit_key, Button::Quit),
        ];
        let mut entries = Vec::with_capacity(bindings.len());
        for (name, button) in bindings {
            let code = KeyCode::from_str(name.trim())
                .map_err(|_| anyhow!("unknown key code {name:?} for {button:?}"))?;
            entries.push((code, button));
        }
        Ok(Self { entries })
    }

    pub fn button_for(&self, code: KeyCode) -> Option<Button> {
        self.entries
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, button)| *button)
    }

    fn supported_by(&self, device: &Device) -> bool {
        device
            .supported_keys()
            .is_some_and(|keys| self.entries.iter().any(|(code, _)| keys.contains(*code)))
    }
}

/// Drops a press that follows the previous accepted press of the same
/// button within the window.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    last: HashMap<Button, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: HashMap::new(),
        }
    }

    pub fn accept(&mut self, button: Button, now: Instant) -> bool {
        if let Some(last) = self.last.get(&button)
            && now.saturating_duration_since(*last) < self.window
        {
            debug!(?button, "debounced press");
            return false;
        }
        self.last.insert(button, now);
        true
    }
}

/// Start the button watcher thread. `Ok(None)` when buttons are disabled or
/// no device carries the configured keys.
pub fn spawn(
    cfg: &ButtonConfig,
    tx: Sender<RawInput>,
    cancel: CancellationToken,
) -> Result<Option<JoinHandle<()>>> {
    if !cfg.enabled {
        info!("hardware buttons disabled");
        return Ok(None);
    }
    let keymap = KeyMap::from_config(cfg)?;
    let Some((device, path)) = open_device(cfg.device.as_deref(), &keymap)? else {
        warn!("no input device with the configured button keys; buttons unavailable");
        return Ok(None);
    };
    set_nonblocking(&device)
        .with_context(|| format!("failed to set {} non-blocking", path.display()))?;
    info!(device = %path.display(), "listening for button events");

    let debouncer = Debouncer::new(Duration::from_millis(cfg.debounce_ms));
    let handle = thread::Builder::new()
        .name("buttons".into())
        .spawn(move || watch(device, keymap, debouncer, tx, cancel))
        .context("failed to spawn button thread")?;
    Ok(Some(handle))
}

fn watch(
    mut device: Device,
    keymap: KeyMap,
    mut debouncer: Debouncer,
    tx: Sender<RawInput>,
    cancel: CancellationToken,
) {
    while !cancel.is_cancelled() {
        let idle = match device.fetch_events() {
            Ok(events) => {
                let mut handled = false;
                for event in events {
                    handled = true;
                    // Value 1 is the press edge; releases and autorepeat are ignored.
                    if let EventSummary::Key(_, code, 1) = event.destructure()
                        && let Some(button) = keymap.button_for(code)
                        && debouncer.accept(button, Instant::now())
                    {
                        info!(?button, "button pressed");
                        if tx.send(RawInput::Button(button)).is_err() {
                            debug!("input queue closed; button thread exiting");
                            return;
                        }
                    }
                }
                !handled
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => true,
            Err(err) => {
                error!(error = %err, "failed reading button events");
                return;
            }
        };
        if idle {
            thread::sleep(IDLE_SLEEP);
        }
    }
    debug!("button thread cancelled");
}

fn set_nonblocking(device: &Device) -> Result<()> {
    let current = fcntl(device.as_fd(), FcntlArg::F_GETFL).context("F_GETFL failed")?;
    let mut flags = OFlag::from_bits_retain(current);
    flags.insert(OFlag::O_NONBLOCK);
    fcntl(device.as_fd(), FcntlArg::F_SETFL(flags)).context("F_SETFL failed")?;
    Ok(())
}

fn open_device(configured: Option<&Path>, keymap: &KeyMap) -> Result<Option<(Device, PathBuf)>> {
    if let Some(path) = configured {
        let device =
            Device::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        if !keymap.supported_by(&device) {
            bail!("{} does not report any configured button key", path.display());
        }
        return Ok(Some((device, path.to_path_buf())));
    }
    scan_dir(Path::new("/dev/input"), keymap)
}

fn scan_dir(dir: &Path, keymap: &KeyMap) -> Result<Option<(Device, PathBuf)>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read directory {}", dir.display()));
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("event"))
        })
        .collect();
    paths.sort();

    for path in paths {
        let device = match Device::open(&path) {
            Ok(device) => device,
            Err(err) => {
                debug!(device = %path.display(), error = %err, "cannot open input device");
                continue;
            }
        };
        if keymap.supported_by(&device) {
            return Ok(Some((device, path)));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_keys_map_to_fixed_actions() {
        let map = KeyMap::from_config(&ButtonConfig::default()).unwrap();
        assert_eq!(map.button_for(KeyCode::KEY_F1), Some(Button::TogglePause));
        assert_eq!(map.button_for(KeyCode::KEY_F2), Some(Button::ReturnToMenu));
        assert_eq!(map.button_for(KeyCode::KEY_F3), Some(Button::DecrementDwell));
        assert_eq!(map.button_for(KeyCode::KEY_F4), Some(Button::Quit));
        assert_eq!(map.button_for(KeyCode::KEY_A), None);
    }

    #[test]
    fn unknown_key_names_are_rejected() {
        let cfg = ButtonConfig {
            quit_key: "KEY_NOT_A_KEY".into(),
            ..ButtonConfig::default()
        };
        assert!(KeyMap::from_config(&cfg).is_err());
    }

    #[test]
    fn second_press_within_window_is_dropped() {
        let mut debouncer = Debouncer::new(Duration::from_millis(200));
        let t0 = Instant::now();
        assert!(debouncer.accept(Button::TogglePause, t0));
        assert!(!debouncer.accept(Button::TogglePause, t0 + Duration::from_millis(150)));
        assert!(debouncer.accept(Button::TogglePause, t0 + Duration::from_millis(220)));
    }

    #[test]
    fn buttons_debounce_independently() {
        let mut debouncer = Debouncer::new(Duration::from_millis(200));
        let t0 = Instant::now();
        assert!(debouncer.accept(Button::DecrementDwell, t0));
        assert!(debouncer.accept(Button::Quit, t0 + Duration::from_millis(10)));
    }

    #[test]
    fn disabled_buttons_spawn_nothing() {
        let cfg = ButtonConfig {
            enabled: false,
            ..ButtonConfig::default()
        };
        let (tx, _rx) = crossbeam_channel::unbounded();
        let handle = spawn(&cfg, tx, CancellationToken::new()).unwrap();
        assert!(handle.is_none());
    }
}
