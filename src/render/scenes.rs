use ab_glyph::FontArc;

use super::canvas::{BLACK, Canvas, WHITE, line_extent, measure_text};
use crate::engine::SelectView;
use crate::media::{Frame, Rect};

/// Text size used on every screen.
pub const TEXT_PX: f32 = 22.0;
pub const ROW_HEIGHT: i32 = 40;
const HIGHLIGHT_WIDTH: u32 = 260;
const ARROW_THICKNESS: u32 = 3;
const UP_ARROW: [(i32, i32); 3] = [(290, 30), (300, 10), (310, 30)];
const DOWN_ARROW: [(i32, i32); 3] = [(290, 170), (300, 190), (310, 170)];

/// Draws the fixed screens. Without a font the layout is kept and text is
/// left out.
#[derive(Clone, Default)]
pub struct Scenes {
    font: Option<FontArc>,
}

impl Scenes {
    pub fn new(font: Option<FontArc>) -> Self {
        Self { font }
    }

    pub fn menu(&self, canvas: &mut Canvas, address: &str) {
        canvas.clear(BLACK);
        self.text_centered(canvas, "Welcome to PiFrame", 160.0, 60.0, WHITE);
        self.text_centered(canvas, address, 160.0, 100.0, WHITE);
        self.text_centered(canvas, "Select playlist", 160.0, 160.0, WHITE);
        self.text_at(canvas, "Play all", 0.0, 220.0, WHITE);
        self.text_at(canvas, "Quit", 260.0, 220.0, WHITE);
    }

    pub fn loading(&self, canvas: &mut Canvas) {
        canvas.clear(BLACK);
        self.text_centered(canvas, "Loading…", 160.0, 120.0, WHITE);
    }

    pub fn playlist_select(&self, canvas: &mut Canvas, view: &SelectView) {
        canvas.clear(BLACK);
        for (row, idx, name) in view.visible() {
            let top = row as i32 * ROW_HEIGHT;
            let color = if idx == view.selected {
                canvas.fill_rect(0, top, HIGHLIGHT_WIDTH, ROW_HEIGHT as u32, WHITE);
                BLACK
            } else {
                WHITE
            };
            self.text_at(canvas, name, 0.0, top as f32, color);
        }
        self.text_centered(canvas, "Start", 40.0, 220.0, WHITE);
        self.text_centered(canvas, "Back", 280.0, 220.0, WHITE);
        canvas.draw_lines(&UP_ARROW, WHITE, ARROW_THICKNESS);
        canvas.draw_lines(&DOWN_ARROW, WHITE, ARROW_THICKNESS);
    }

    /// Black background with `frame` at `rect`.
    pub fn media(&self, canvas: &mut Canvas, frame: &Frame, rect: Rect) {
        canvas.clear(BLACK);
        canvas.blit(frame, rect.x, rect.y);
    }

    fn text_at(&self, canvas: &mut Canvas, text: &str, left: f32, top: f32, color: u32) {
        let Some(font) = self.font.as_ref() else {
            return;
        };
        let (ascent, _) = line_extent(font, TEXT_PX);
        canvas.draw_text(font, text, left, top + ascent, TEXT_PX, color);
    }

    fn text_centered(&self, canvas: &mut Canvas, text: &str, cx: f32, cy: f32, color: u32) {
        let Some(font) = self.font.as_ref() else {
            return;
        };
        let width = measure_text(font, text, TEXT_PX);
        let (ascent, descent) = line_extent(font, TEXT_PX);
        let baseline = cy - (ascent + descent) / 2.0 + ascent;
        canvas.draw_text(font, text, cx - width / 2.0, baseline, TEXT_PX, color);
    }
}
