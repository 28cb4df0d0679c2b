use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use serde::Deserialize;
use tracing::{debug, warn};

use super::{DISPLAY_HEIGHT, Frame, VideoSource, scaled_width};
use crate::config::VideoOptions;
use crate::error::MediaError;

/// Container video decoded by an `ffmpeg` child that scales to the display
/// height and writes raw RGBA frames to a pipe. The child is started on the
/// first sample and read strictly forward.
pub struct FfmpegVideo {
    path: PathBuf,
    ffmpeg: PathBuf,
    width: u32,
    duration: f64,
    fps: f64,
    stream: Option<FrameStream>,
    current: Option<Frame>,
}

struct FrameStream {
    child: Child,
    stdout: ChildStdout,
    /// Index of the next frame the pipe will yield.
    next_index: u64,
    finished: bool,
    buf: Vec<u8>,
}

/// The parts of `ffprobe -of json` output the player needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub duration: f64,
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse ffprobe's `num/den` rate notation. `0/0` means unknown.
pub fn parse_rate(rate: &str) -> Option<f64> {
    let (num, den) = match rate.split_once('/') {
        Some((n, d)) => (n.trim().parse::<f64>().ok()?, d.trim().parse::<f64>().ok()?),
        None => (rate.trim().parse::<f64>().ok()?, 1.0),
    };
    let value = num / den;
    (value.is_finite() && value > 0.0).then_some(value)
}

pub fn parse_probe(json: &[u8]) -> Result<ProbeInfo, String> {
    let output: ProbeOutput =
        serde_json::from_slice(json).map_err(|err| format!("unreadable ffprobe output: {err}"))?;
    let stream = output
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| "no video stream".to_string())?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err("video stream has no size".to_string()),
    };
    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate))
        .ok_or_else(|| "unknown frame rate".to_string())?;
    let duration = stream
        .duration
        .as_deref()
        .or(output.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| "unknown duration".to_string())?;

    Ok(ProbeInfo {
        width,
        height,
        fps,
        duration,
    })
}

impl FfmpegVideo {
    /// Read duration, frame rate and size with ffprobe. No decoder is started.
    pub fn probe(path: &Path, opts: &VideoOptions) -> Result<Self, MediaError> {
        let probe_err = |reason: String| MediaError::Probe {
            path: path.to_path_buf(),
            reason,
        };
        let output = Command::new(&opts.ffprobe)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,r_frame_rate,avg_frame_rate,duration:format=duration",
                "-of",
                "json",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| probe_err(format!("cannot run {}: {err}", opts.ffprobe.display())))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(probe_err(format!(
                "ffprobe exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        let info = parse_probe(&output.stdout).map_err(probe_err)?;
        debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            fps = info.fps,
            duration = info.duration,
            "probed video"
        );

        Ok(Self {
            path: path.to_path_buf(),
            ffmpeg: opts.ffmpeg.clone(),
            width: scaled_width(info.width, info.height),
            duration: info.duration,
            fps: info.fps,
            stream: None,
            current: None,
        })
    }

    fn frame_len(&self) -> usize {
        self.width as usize * DISPLAY_HEIGHT as usize * 4
    }

    fn spawn(&self) -> Result<FrameStream, MediaError> {
        let scale = format!("scale={}:{}", self.width, DISPLAY_HEIGHT);
        let mut child = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(&self.path)
            .args([
                "-vf",
                scale.as_str(),
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(MediaError::Io(io::Error::other("ffmpeg stdout not captured")));
        };
        debug!(path = %self.path.display(), pid = child.id(), "started ffmpeg");
        Ok(FrameStream {
            child,
            stdout,
            next_index: 0,
            finished: false,
            buf: vec![0; self.frame_len()],
        })
    }
}

impl FrameStream {
    /// Read one frame into `buf`. `false` at end of stream.
    fn read_next(&mut self) -> io::Result<bool> {
        match self.stdout.read_exact(&mut self.buf) {
            Ok(()) => {
                self.next_index += 1;
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                self.finished = true;
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    fn close(mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl VideoSource for FfmpegVideo {
    fn duration(&self) -> f64 {
        self.duration
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_at(&mut self, t: f64) -> Result<&Frame, MediaError> {
        let target = (t.max(0.0) * self.fps).floor() as u64;

        let rewind = self
            .stream
            .as_ref()
            .is_some_and(|s| s.next_index > 0 && target < s.next_index - 1);
        if rewind {
            self.release();
        }
        if self.stream.is_none() {
            self.stream = Some(self.spawn()?);
        }

        let width = self.width;
        if let Some(stream) = self.stream.as_mut() {
            // Frames before the target are read and dropped. At end of stream
            // the last complete frame stays on screen.
            while !stream.finished && stream.next_index <= target {
                if !stream.read_next()? {
                    break;
                }
                if stream.next_index > target || self.current.is_none() {
                    self.current = Some(Frame::from_rgba(width, DISPLAY_HEIGHT, &stream.buf));
                }
            }
        }

        self.current.as_ref().ok_or_else(|| {
            warn!(path = %self.path.display(), "ffmpeg produced no frames");
            MediaError::Empty(self.path.clone())
        })
    }

    fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!(path = %self.path.display(), "released ffmpeg stream");
            stream.close();
        }
        self.current = None;
    }
}

impl Drop for FfmpegVideo {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_parse_as_fractions() {
        assert_eq!(parse_rate("30/1"), Some(30.0));
        assert!((parse_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_rate("25"), Some(25.0));
        assert_eq!(parse_rate("0/0"), None);
        assert_eq!(parse_rate("abc"), None);
    }

    #[test]
    fn probe_prefers_stream_values() {
        let json = br#"{
            "programs": [],
            "streams": [{
                "width": 1920, "height": 1080,
                "r_frame_rate": "60/1", "avg_frame_rate": "30/1",
                "duration": "12.5"
            }],
            "format": {"duration": "13.0"}
        }"#;
        let info = parse_probe(json).unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
        assert_eq!(info.fps, 30.0);
        assert_eq!(info.duration, 12.5);
    }

    #[test]
    fn probe_falls_back_to_container_duration_and_real_rate() {
        let json = br#"{
            "streams": [{"width": 640, "height": 480,
                         "r_frame_rate": "24/1", "avg_frame_rate": "0/0"}],
            "format": {"duration": "4.000000"}
        }"#;
        let info = parse_probe(json).unwrap();
        assert_eq!(info.fps, 24.0);
        assert_eq!(info.duration, 4.0);
    }

    #[test]
    fn probe_rejects_audio_only_and_garbage() {
        assert!(parse_probe(br#"{"streams": [], "format": {"duration": "3"}}"#).is_err());
        assert!(parse_probe(b"not json").is_err());
        assert!(
            parse_probe(br#"{"streams": [{"width": 10, "height": 10, "r_frame_rate": "25/1"}]}"#)
                .is_err()
        );
    }

    #[test]
    fn missing_ffprobe_is_a_probe_error() {
        let opts = VideoOptions {
            ffprobe: PathBuf::from("/nonexistent/ffprobe"),
            ffmpeg: PathBuf::from("/nonexistent/ffmpeg"),
        };
        let err = FfmpegVideo::probe(Path::new("clip.mp4"), &opts).err().unwrap();
        assert!(matches!(err, MediaError::Probe { .. }));
    }
}
