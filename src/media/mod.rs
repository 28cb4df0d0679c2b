pub mod ffmpeg;
pub mod image_decoder;
pub mod video;

use std::ffi::OsStr;
use std::fmt;
use std::path::Path;

pub use video::VideoSource;

/// Logical surface size of the panel.
pub const SURFACE_WIDTH: u32 = 320;
pub const SURFACE_HEIGHT: u32 = 240;
/// Every decoded item is scaled to exactly this height.
pub const DISPLAY_HEIGHT: u32 = SURFACE_HEIGHT;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp", "tiff"];
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "webm", "mpg", "mpeg", "gif", "avi", "wmv", "ogg", "mov",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Unsupported,
}

/// Classify a filename by extension, ignoring case.
pub fn classify(name: impl AsRef<Path>) -> MediaKind {
    let ext = name
        .as_ref()
        .extension()
        .and_then(OsStr::to_str)
        .map(|s| s.to_ascii_lowercase());
    match ext.as_deref() {
        Some(e) if IMAGE_EXTENSIONS.contains(&e) => MediaKind::Image,
        Some(e) if VIDEO_EXTENSIONS.contains(&e) => MediaKind::Video,
        _ => MediaKind::Unsupported,
    }
}

/// Packed `0x00RRGGBB` raster, the format the window surface consumes.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

impl Frame {
    pub fn filled(width: u32, height: u32, color: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; (width as usize) * (height as usize)],
        }
    }

    /// Convert straight RGBA bytes, compositing alpha over black.
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Self {
        let pixels = rgba
            .chunks_exact(4)
            .map(|px| {
                let a = u32::from(px[3]);
                let r = u32::from(px[0]) * a / 255;
                let g = u32::from(px[1]) * a / 255;
                let b = u32::from(px[2]) * a / 255;
                (r << 16) | (g << 8) | b
            })
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get((y * self.width + x) as usize)
            .copied()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Place content of the given size at the top of the surface, centered
    /// horizontally. Wider-than-surface content gets a negative x.
    pub fn centered(width: u32, height: u32) -> Self {
        let half = (width / 2) as i32;
        Self {
            x: (SURFACE_WIDTH / 2) as i32 - half,
            y: 0,
            width,
            height,
        }
    }
}

/// Width that keeps the aspect ratio when scaling to `DISPLAY_HEIGHT`.
pub fn scaled_width(width: u32, height: u32) -> u32 {
    if height == 0 {
        return 1;
    }
    let w = u64::from(width) * u64::from(DISPLAY_HEIGHT) / u64::from(height);
    (w as u32).max(1)
}

pub enum MediaItem {
    Image {
        name: String,
        frame: Frame,
        rect: Rect,
    },
    Video {
        name: String,
        source: Box<dyn VideoSource>,
    },
}

impl MediaItem {
    pub fn image(name: impl Into<String>, frame: Frame) -> Self {
        let rect = Rect::centered(frame.width, frame.height);
        Self::Image {
            name: name.into(),
            frame,
            rect,
        }
    }

    pub fn video(name: impl Into<String>, source: Box<dyn VideoSource>) -> Self {
        Self::Video {
            name: name.into(),
            source,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Image { name, .. } | Self::Video { name, .. } => name,
        }
    }
}

impl fmt::Debug for MediaItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image { name, frame, rect } => f
                .debug_struct("Image")
                .field("name", name)
                .field("frame", frame)
                .field("rect", rect)
                .finish(),
            Self::Video { name, source } => f
                .debug_struct("Video")
                .field("name", name)
                .field("duration", &source.duration())
                .field("fps", &source.fps())
                .finish(),
        }
    }
}

/// An entry the loader left out, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipDiagnostic {
    pub name: String,
    pub reason: String,
}

/// Ordered media built in one shot by the loader. The engine never edits a
/// playlist; it swaps in a new one.
#[derive(Debug, Default)]
pub struct Playlist {
    items: Vec<MediaItem>,
    skipped: Vec<SkipDiagnostic>,
}

impl Playlist {
    pub fn new(items: Vec<MediaItem>, skipped: Vec<SkipDiagnostic>) -> Self {
        Self { items, skipped }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut MediaItem> {
        self.items.get_mut(idx)
    }

    pub fn skipped(&self) -> &[SkipDiagnostic] {
        &self.skipped
    }

    /// Close every open video stream.
    pub fn release_all(&mut self) {
        for item in &mut self.items {
            if let MediaItem::Video { source, .. } = item {
                source.release();
            }
        }
    }
}

impl Drop for Playlist {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension_ignoring_case() {
        assert_eq!(classify("photo.PNG"), MediaKind::Image);
        assert_eq!(classify("scan.Tiff"), MediaKind::Image);
        assert_eq!(classify("holiday.jpeg"), MediaKind::Image);
        assert_eq!(classify("clip.MOV"), MediaKind::Video);
        assert_eq!(classify("loop.gif"), MediaKind::Video);
        assert_eq!(classify("clip.mkv"), MediaKind::Unsupported);
        assert_eq!(classify("README"), MediaKind::Unsupported);
        assert_eq!(classify(".png"), MediaKind::Unsupported);
    }

    #[test]
    fn scaled_width_keeps_aspect_and_truncates() {
        assert_eq!(scaled_width(640, 480), 320);
        assert_eq!(scaled_width(1000, 3000), 80);
        assert_eq!(scaled_width(100, 7), 3428);
        assert_eq!(scaled_width(1, 10_000), 1);
    }

    #[test]
    fn centered_rect_matches_surface_midline() {
        assert_eq!(Rect::centered(320, 240).x, 0);
        assert_eq!(Rect::centered(180, 240).x, 70);
        assert_eq!(Rect::centered(427, 240).x, -53);
    }

    #[test]
    fn rgba_alpha_is_composited_over_black() {
        let frame = Frame::from_rgba(2, 1, &[255, 0, 0, 255, 255, 255, 255, 0]);
        assert_eq!(frame.pixel(0, 0), Some(0x00FF_0000));
        assert_eq!(frame.pixel(1, 0), Some(0));
    }
}
