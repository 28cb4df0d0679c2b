use std::path::PathBuf;

use thiserror::Error;

/// Why a single media entry could not become part of a playlist.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The filename carries an extension the frame does not play.
    #[error("unsupported format: {0}")]
    Unsupported(String),

    /// Descriptor lines must name a file inside the media store.
    #[error("not a plain file name: {0}")]
    InvalidName(String),

    /// Underlying IO error (missing file, permissions).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The image codec rejected the file.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// Scaling to display height failed.
    #[error("resize failed: {0}")]
    Resize(String),

    /// ffprobe/ffmpeg could not make sense of the file.
    #[error("video probe failed for {path}: {reason}")]
    Probe { path: PathBuf, reason: String },

    /// The container decoded but holds nothing playable.
    #[error("no frames in {0}")]
    Empty(PathBuf),
}

/// Errors raised while moving playlist descriptors between slots.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no descriptor named {0} in the inactive store")]
    UnknownDescriptor(String),

    #[error("failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
