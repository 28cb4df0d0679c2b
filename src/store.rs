use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{MediaError, StoreError};

const DESCRIPTOR_EXTENSION: &str = "txt";
/// Shown in place of the address when the address file cannot be read.
pub const ADDRESS_PLACEHOLDER: &str = "address unavailable";

/// Flat directory of uploaded media files.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Every regular file directly inside the store, sorted by name.
    pub fn list(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            match entry.file_name().to_str() {
                Some(name) => names.push(name.to_string()),
                None => warn!(path = %entry.path().display(), "skipping non-UTF-8 file name"),
            }
        }
        Ok(names)
    }
}

/// Entries of a descriptor, in file order. Only the line ending is
/// stripped, so names may begin or end with spaces; whitespace-only lines
/// are ignored.
pub fn parse_descriptor(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Descriptor entries must be a single file name inside the media store.
pub fn check_entry_name(name: &str) -> Result<(), MediaError> {
    let mut components = Path::new(name).components();
    let plain = matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none()
        && !name.contains(['/', '\\']);
    if plain {
        Ok(())
    } else {
        Err(MediaError::InvalidName(name.to_string()))
    }
}

/// Descriptor file name without its `.txt` suffix.
pub fn display_name(descriptor: &str) -> &str {
    descriptor.strip_suffix(".txt").unwrap_or(descriptor)
}

/// First line of the address file followed by `:port`.
pub fn read_address(path: &Path, port: u16) -> String {
    match fs::read_to_string(path) {
        Ok(text) => match text.lines().next().map(str::trim) {
            Some(addr) if !addr.is_empty() => format!("{addr}:{port}"),
            _ => ADDRESS_PLACEHOLDER.to_string(),
        },
        Err(err) => {
            debug!(path = %path.display(), error = %err, "address file unreadable");
            ADDRESS_PLACEHOLDER.to_string()
        }
    }
}

/// Playlist descriptors split between a single-entry active slot and an
/// inactive pool. Names are descriptor file names including the extension.
#[derive(Debug, Clone)]
pub struct PlaylistStore {
    active_dir: PathBuf,
    inactive_dir: PathBuf,
}

impl PlaylistStore {
    pub fn new(active_dir: impl Into<PathBuf>, inactive_dir: impl Into<PathBuf>) -> Self {
        Self {
            active_dir: active_dir.into(),
            inactive_dir: inactive_dir.into(),
        }
    }

    /// The active descriptor, if the slot holds one.
    pub fn active(&self) -> Option<String> {
        descriptors_in(&self.active_dir)
            .map_err(|err| warn!(dir = %self.active_dir.display(), error = %err, "cannot read active slot"))
            .ok()?
            .into_iter()
            .next()
    }

    /// Empty the active slot into the inactive pool and return the name that
    /// was active. Every file in the slot is moved, not just descriptors.
    pub fn deactivate(&self) -> Result<Option<String>, StoreError> {
        let previous = self.active();
        let entries = match fs::read_dir(&self.active_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        fs::create_dir_all(&self.inactive_dir)?;
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let from = entry.path();
            let to = self.inactive_dir.join(entry.file_name());
            move_file(&from, &to)?;
        }
        if let Some(name) = &previous {
            info!(playlist = %name, "deactivated playlist");
        }
        Ok(previous)
    }

    /// Make `name` the only descriptor in the active slot. On failure the
    /// previously active descriptor is put back.
    pub fn activate(&self, name: &str) -> Result<(), StoreError> {
        if check_entry_name(name).is_err() {
            return Err(StoreError::UnknownDescriptor(name.to_string()));
        }
        let previous = self.deactivate()?;

        let from = self.inactive_dir.join(name);
        if !from.is_file() {
            self.restore(previous.as_deref());
            return Err(StoreError::UnknownDescriptor(name.to_string()));
        }
        let to = self.active_dir.join(name);
        let moved = fs::create_dir_all(&self.active_dir)
            .map_err(StoreError::from)
            .and_then(|()| move_file(&from, &to));
        if let Err(err) = moved {
            self.restore(previous.as_deref());
            return Err(err);
        }
        info!(playlist = %name, "activated playlist");
        Ok(())
    }

    fn restore(&self, previous: Option<&str>) {
        let Some(prev) = previous else { return };
        let from = self.inactive_dir.join(prev);
        let to = self.active_dir.join(prev);
        if let Err(err) = move_file(&from, &to) {
            warn!(playlist = %prev, error = %err, "failed to restore previously active playlist");
        }
    }

    /// Active descriptor first, then the inactive ones sorted by name.
    /// Only `.txt` files count as descriptors.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.active().into_iter().collect();
        match descriptors_in(&self.inactive_dir) {
            Ok(inactive) => {
                for name in inactive {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
            Err(err) => {
                warn!(dir = %self.inactive_dir.display(), error = %err, "cannot list inactive playlists")
            }
        }
        names
    }

    /// Entries of the active descriptor. `None` when nothing is active or the
    /// descriptor cannot be read.
    pub fn read_active_entries(&self) -> Option<Vec<String>> {
        let name = self.active()?;
        let path = self.active_dir.join(&name);
        match fs::read_to_string(&path) {
            Ok(text) => Some(parse_descriptor(&text)),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "active playlist unreadable");
                None
            }
        }
    }
}

fn descriptors_in(dir: &Path) -> io::Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let is_descriptor = path.extension().and_then(OsStr::to_str) == Some(DESCRIPTOR_EXTENSION);
        if !is_descriptor || !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

fn move_file(from: &Path, to: &Path) -> Result<(), StoreError> {
    debug!(from = %from.display(), to = %to.display(), "moving descriptor");
    fs::rename(from, to).map_err(|source| StoreError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })
}
