// SPDX-License-Identifier: MIT
//! # Timestamp Labels and Annotation Bands
//!
//! A 5×7 bitmap font covering exactly the characters needed for timestamp labels
//! (`0-9 : . s -` and space). Labels are drawn white on a filled black box in the
//! top-left corner of a cell, so a reviewer (human or model) can read back which
//! moment of the clip a cell shows.
//!
//! Unknown characters render as blank advance; drawing is clipped to the canvas.

use crate::presets::Size;

const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;
const PADDING: u32 = 3;

/// Returns the 5×7 bitmap for `c`; bit 4 of each row is the leftmost column.
fn glyph(c: char) -> [u8; 7] {
    match c {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        's' => [0x00, 0x00, 0x0E, 0x10, 0x0E, 0x01, 0x1E],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        _ => [0x00; 7],
    }
}

/// Format seconds as `mm:ss.cc`.
pub fn format_timestamp(seconds: f64) -> String {
    let centis = (seconds.max(0.0) * 100.0).round() as u64;
    format!("{:02}:{:02}.{:02}", centis / 6000, centis % 6000 / 100, centis % 100)
}

/// Pixel size of the label box (text plus padding) at the given scale.
pub fn label_box(text: &str, scale: u32) -> Size {
    let scale = scale.max(1);
    let chars = text.chars().count() as u32;
    let advance = (GLYPH_W + 1) * scale;
    Size {
        w: chars * advance + 2 * PADDING,
        h: GLYPH_H * scale + 2 * PADDING,
    }
}

/// Pick a label scale that keeps glyphs legible relative to the cell width.
pub fn scale_for_width(cell_width: u32) -> u32 {
    (cell_width / 240).clamp(1, 4)
}

/// Draw `text` in white on a black box with its top-left corner at (`x`, `y`).
///
/// `canvas` is tightly packed RGB8 of `canvas_size`.
pub fn draw_label(canvas: &mut [u8], canvas_size: Size, x: u32, y: u32, text: &str, scale: u32) {
    let scale = scale.max(1);
    let bx = label_box(text, scale);
    fill_rect(canvas, canvas_size, x, y, bx.w, bx.h, [0, 0, 0]);

    let advance = (GLYPH_W + 1) * scale;
    for (i, c) in text.chars().enumerate() {
        let gx = x + PADDING + (i as u32) * advance;
        let gy = y + PADDING;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits & (0x10 >> col) == 0 {
                    continue;
                }
                fill_rect(
                    canvas,
                    canvas_size,
                    gx + col * scale,
                    gy + (row as u32) * scale,
                    scale,
                    scale,
                    [255, 255, 255],
                );
            }
        }
    }
}

/// Blend a solid color band over the top `band_h` rows of the canvas.
///
/// `alpha` is the weight of `color` (0.0 keeps the image, 1.0 replaces it).
pub fn tint_band(canvas: &mut [u8], canvas_size: Size, band_h: u32, color: [u8; 3], alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    let rows = band_h.min(canvas_size.h) as usize;
    let row_bytes = canvas_size.w as usize * 3;
    for px in canvas[..rows * row_bytes].chunks_exact_mut(3) {
        for (channel, tint) in px.iter_mut().zip(color) {
            let blended = f32::from(tint) * alpha + f32::from(*channel) * (1.0 - alpha);
            *channel = blended.round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Fill a rectangle, clipped to the canvas.
pub fn fill_rect(canvas: &mut [u8], canvas_size: Size, x: u32, y: u32, w: u32, h: u32, rgb: [u8; 3]) {
    let x_end = x.saturating_add(w).min(canvas_size.w);
    let y_end = y.saturating_add(h).min(canvas_size.h);
    for yy in y.min(y_end)..y_end {
        let row = yy as usize * canvas_size.w as usize * 3;
        for xx in x.min(x_end)..x_end {
            let off = row + xx as usize * 3;
            canvas[off..off + 3].copy_from_slice(&rgb);
        }
    }
}
