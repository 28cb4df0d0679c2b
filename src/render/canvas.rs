use ab_glyph::{Font, FontArc, PxScale, ScaleFont, point};

use crate::media::{Frame, SURFACE_HEIGHT, SURFACE_WIDTH};

pub const BLACK: u32 = 0x0000_0000;
pub const WHITE: u32 = 0x00FF_FFFF;

/// CPU raster the engine draws into before handing it to the screen.
#[derive(Clone, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(SURFACE_WIDTH, SURFACE_HEIGHT)
    }
}

impl std::fmt::Debug for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canvas")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![BLACK; width as usize * height as usize],
        }
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize).copied()
    }

    pub fn clear(&mut self, color: u32) {
        self.pixels.fill(color);
    }

    /// Copy `frame` with its top-left corner at (x, y), clipped to the canvas.
    pub fn blit(&mut self, frame: &Frame, x: i32, y: i32) {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + frame.width as i32).min(self.width as i32);
        let y1 = (y + frame.height as i32).min(self.height as i32);
        if x0 >= x1 || y0 >= y1 {
            return;
        }
        let span = (x1 - x0) as usize;
        for dy in y0..y1 {
            let src_row = (dy - y) as usize * frame.width as usize;
            let src = src_row + (x0 - x) as usize;
            let dst = dy as usize * self.width as usize + x0 as usize;
            self.pixels[dst..dst + span].copy_from_slice(&frame.pixels[src..src + span]);
        }
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, width: u32, height: u32, color: u32) {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + width as i32).min(self.width as i32);
        let y1 = (y + height as i32).min(self.height as i32);
        if x0 >= x1 {
            return;
        }
        for row in y0..y1 {
            let start = row as usize * self.width as usize;
            self.pixels[start + x0 as usize..start + x1 as usize].fill(color);
        }
    }

    /// Polyline with a square pen of `thickness` pixels.
    pub fn draw_lines(&mut self, points: &[(i32, i32)], color: u32, thickness: u32) {
        for pair in points.windows(2) {
            self.draw_line(pair[0], pair[1], color, thickness);
        }
    }

    fn draw_line(&mut self, from: (i32, i32), to: (i32, i32), color: u32, thickness: u32) {
        let (mut x, mut y) = from;
        let dx = (to.0 - x).abs();
        let dy = -(to.1 - y).abs();
        let sx = if x < to.0 { 1 } else { -1 };
        let sy = if y < to.1 { 1 } else { -1 };
        let mut err = dx + dy;
        let half = thickness as i32 / 2;
        loop {
            self.fill_rect(x - half, y - half, thickness.max(1), thickness.max(1), color);
            if (x, y) == to {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Draw a single line of text starting at `left` on `baseline`.
    pub fn draw_text(
        &mut self,
        font: &FontArc,
        text: &str,
        left: f32,
        baseline: f32,
        px: f32,
        color: u32,
    ) {
        let scaled = font.as_scaled(PxScale::from(px));
        let mut cursor_x = left;
        let mut previous = None;
        for ch in text.chars() {
            if ch.is_control() {
                continue;
            }
            let glyph = scaled.glyph_id(ch);
            if let Some(prev) = previous {
                cursor_x += scaled.kern(prev, glyph);
            }
            let advance = scaled.h_advance(glyph);
            let mut positioned = scaled.scaled_glyph(ch);
            positioned.position = point(cursor_x, baseline);
            if let Some(outline) = font.outline_glyph(positioned) {
                let bounds = outline.px_bounds();
                outline.draw(|gx, gy, coverage| {
                    self.blend_pixel(
                        bounds.min.x + gx as f32,
                        bounds.min.y + gy as f32,
                        color,
                        coverage,
                    );
                });
            }
            cursor_x += advance;
            previous = Some(glyph);
        }
    }

    fn blend_pixel(&mut self, x: f32, y: f32, color: u32, coverage: f32) {
        if coverage <= 0.0 {
            return;
        }
        let xi = x.floor() as i32;
        let yi = y.floor() as i32;
        if xi < 0 || yi < 0 || xi >= self.width as i32 || yi >= self.height as i32 {
            return;
        }
        let idx = (yi as u32 * self.width + xi as u32) as usize;
        let alpha = coverage.clamp(0.0, 1.0);
        let dst = self.pixels[idx];
        let mix = |shift: u32| {
            let s = ((color >> shift) & 0xFF) as f32;
            let d = ((dst >> shift) & 0xFF) as f32;
            ((s * alpha + d * (1.0 - alpha)).round() as u32).min(255) << shift
        };
        self.pixels[idx] = mix(16) | mix(8) | mix(0);
    }
}

/// Horizontal advance of `text` at `px`.
pub fn measure_text(font: &FontArc, text: &str, px: f32) -> f32 {
    let scaled = font.as_scaled(PxScale::from(px));
    let mut width = 0.0f32;
    let mut previous = None;
    for ch in text.chars() {
        if ch.is_control() {
            continue;
        }
        let glyph = scaled.glyph_id(ch);
        if let Some(prev) = previous {
            width += scaled.kern(prev, glyph);
        }
        width += scaled.h_advance(glyph);
        previous = Some(glyph);
    }
    width.max(0.0)
}

/// Ascent and descent (positive) at `px`.
pub fn line_extent(font: &FontArc, px: f32) -> (f32, f32) {
    let scaled = font.as_scaled(PxScale::from(px));
    (scaled.ascent(), scaled.descent().abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blit_clips_negative_offsets() {
        let mut canvas = Canvas::new(4, 2);
        let frame = Frame {
            width: 3,
            height: 2,
            pixels: vec![1, 2, 3, 4, 5, 6],
        };
        canvas.blit(&frame, -1, 0);
        assert_eq!(canvas.pixels(), &[2, 3, 0, 0, 5, 6, 0, 0]);
        canvas.clear(BLACK);
        canvas.blit(&frame, 3, 1);
        assert_eq!(canvas.pixels(), &[0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn blit_fully_outside_is_a_no_op() {
        let mut canvas = Canvas::new(4, 2);
        let frame = Frame::filled(2, 2, WHITE);
        canvas.blit(&frame, 10, 0);
        canvas.blit(&frame, -2, 0);
        assert!(canvas.pixels().iter().all(|&p| p == BLACK));
    }

    #[test]
    fn fill_rect_is_clipped() {
        let mut canvas = Canvas::new(4, 4);
        canvas.fill_rect(2, 2, 10, 10, WHITE);
        assert_eq!(canvas.pixel(1, 1), Some(BLACK));
        assert_eq!(canvas.pixel(3, 3), Some(WHITE));
        assert_eq!(canvas.pixel(2, 3), Some(WHITE));
    }

    #[test]
    fn lines_cover_their_endpoints() {
        let mut canvas = Canvas::default();
        canvas.draw_lines(&[(290, 30), (300, 10), (310, 30)], WHITE, 3);
        assert_eq!(canvas.pixel(290, 30), Some(WHITE));
        assert_eq!(canvas.pixel(300, 10), Some(WHITE));
        assert_eq!(canvas.pixel(310, 30), Some(WHITE));
        assert_eq!(canvas.pixel(300, 30), Some(BLACK));
    }

    #[test]
    fn blend_mixes_channels_by_coverage() {
        let mut canvas = Canvas::new(1, 1);
        canvas.blend_pixel(0.0, 0.0, WHITE, 0.5);
        assert_eq!(canvas.pixel(0, 0), Some(0x0080_8080));
    }
}
