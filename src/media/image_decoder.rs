use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use fast_image_resize as fir;
use image::RgbaImage;
use image::imageops;
use tracing::debug;

use super::{DISPLAY_HEIGHT, Frame, scaled_width};
use crate::error::MediaError;

/// EXIF orientation values and the transform that makes each one upright.
/// "Rotate 90" is a clockwise quarter turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Normal,
    FlipHorizontal,
    Rotate180,
    FlipRotate180,
    FlipRotate90,
    Rotate90,
    FlipRotate270,
    Rotate270,
}

impl Orientation {
    /// Unknown values fall back to `Normal`.
    pub fn from_exif(value: u16) -> Self {
        match value {
            2 => Self::FlipHorizontal,
            3 => Self::Rotate180,
            4 => Self::FlipRotate180,
            5 => Self::FlipRotate90,
            6 => Self::Rotate90,
            7 => Self::FlipRotate270,
            8 => Self::Rotate270,
            _ => Self::Normal,
        }
    }

    pub fn apply(self, img: RgbaImage) -> RgbaImage {
        match self {
            Self::Normal => img,
            Self::FlipHorizontal => imageops::flip_horizontal(&img),
            Self::Rotate180 => imageops::rotate180(&img),
            Self::FlipRotate180 => imageops::rotate180(&imageops::flip_horizontal(&img)),
            Self::FlipRotate90 => imageops::rotate90(&imageops::flip_horizontal(&img)),
            Self::Rotate90 => imageops::rotate90(&img),
            Self::FlipRotate270 => imageops::rotate270(&imageops::flip_horizontal(&img)),
            Self::Rotate270 => imageops::rotate270(&img),
        }
    }
}

/// Decode an image file, make it upright and scale it to the display height.
pub fn decode_for_display(path: &Path) -> Result<Frame, MediaError> {
    let img = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?
        .to_rgba8();

    let orientation = read_orientation(path)
        .map(Orientation::from_exif)
        .unwrap_or(Orientation::Normal);
    let upright = orientation.apply(img);
    let scaled = scale_to_display_height(upright)?;
    let (width, height) = scaled.dimensions();
    Ok(Frame::from_rgba(width, height, scaled.as_raw()))
}

fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let value = field.value.get_uint(0)? as u16;
    debug!(orientation = value, path = %path.display(), "exif orientation");
    Some(value)
}

pub(crate) fn scale_to_display_height(img: RgbaImage) -> Result<RgbaImage, MediaError> {
    let (width, height) = img.dimensions();
    let target_w = scaled_width(width, height);
    if (width, height) == (target_w, DISPLAY_HEIGHT) {
        return Ok(img);
    }

    let src_view = fir::images::ImageRef::new(width, height, img.as_raw(), fir::PixelType::U8x4)
        .map_err(|err| MediaError::Resize(err.to_string()))?;
    let mut dst_image = fir::images::Image::new(target_w, DISPLAY_HEIGHT, fir::PixelType::U8x4);
    let options =
        fir::ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Bilinear));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .map_err(|err| MediaError::Resize(err.to_string()))?;
    RgbaImage::from_raw(target_w, DISPLAY_HEIGHT, dst_image.into_vec())
        .ok_or_else(|| MediaError::Resize("resized buffer has unexpected length".to_string()))
}
