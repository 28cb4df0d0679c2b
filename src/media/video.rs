use std::ffi::OsStr;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::AnimationDecoder;
use image::codecs::gif::GifDecoder;

use super::Frame;
use super::ffmpeg::FfmpegVideo;
use super::image_decoder::scale_to_display_height;
use crate::config::VideoOptions;
use crate::error::MediaError;

/// GIF frames with a zero delay are shown for this long.
const GIF_DEFAULT_DELAY_SECS: f64 = 0.1;

/// An open video, already scaled to the display height, sampled by media time.
pub trait VideoSource: Send {
    /// Length in seconds.
    fn duration(&self) -> f64;
    fn fps(&self) -> f64;
    /// Frame on screen at `t` seconds of media time. Media time only moves
    /// forward during playback; sampling an earlier time restarts the stream.
    fn frame_at(&mut self, t: f64) -> Result<&Frame, MediaError>;
    /// Close whatever decoder state is held open. A later `frame_at` reopens.
    fn release(&mut self);
}

/// Open a video with the decoder its extension calls for.
pub fn open_video(path: &Path, opts: &VideoOptions) -> Result<Box<dyn VideoSource>, MediaError> {
    let is_gif = path
        .extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gif"));
    if is_gif {
        Ok(Box::new(GifVideo::open(path)?))
    } else {
        Ok(Box::new(FfmpegVideo::probe(path, opts)?))
    }
}

/// Animated GIF decoded up front; GIFs on a frame are small.
pub struct GifVideo {
    frames: Vec<Frame>,
    starts: Vec<f64>,
    duration: f64,
}

impl GifVideo {
    pub fn open(path: &Path) -> Result<Self, MediaError> {
        let reader = BufReader::new(File::open(path)?);
        let decoded = GifDecoder::new(reader)?.into_frames().collect_frames()?;
        if decoded.is_empty() {
            return Err(MediaError::Empty(path.to_path_buf()));
        }

        let mut frames = Vec::with_capacity(decoded.len());
        let mut starts = Vec::with_capacity(decoded.len());
        let mut elapsed = 0.0;
        for frame in decoded {
            let (numer, denom) = frame.delay().numer_denom_ms();
            let mut delay = f64::from(numer) / f64::from(denom.max(1)) / 1000.0;
            if delay <= 0.0 {
                delay = GIF_DEFAULT_DELAY_SECS;
            }
            let scaled = scale_to_display_height(frame.into_buffer())?;
            let (width, height) = scaled.dimensions();
            starts.push(elapsed);
            frames.push(Frame::from_rgba(width, height, scaled.as_raw()));
            elapsed += delay;
        }

        Ok(Self {
            frames,
            starts,
            duration: elapsed,
        })
    }

    fn index_at(&self, t: f64) -> usize {
        self.starts
            .partition_point(|&start| start <= t)
            .saturating_sub(1)
            .min(self.frames.len() - 1)
    }
}

impl VideoSource for GifVideo {
    fn duration(&self) -> f64 {
        self.duration
    }

    fn fps(&self) -> f64 {
        self.frames.len() as f64 / self.duration
    }

    fn frame_at(&mut self, t: f64) -> Result<&Frame, MediaError> {
        let idx = self.index_at(t);
        Ok(&self.frames[idx])
    }

    fn release(&mut self) {}
}
