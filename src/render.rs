// Sheet rendering: turns a Board into a raster image. Each cell's clue
// is word-wrapped and shrunk until it fits, so the grid geometry never
// changes no matter how verbose a clue is.

use std::io::Cursor;
use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::engine::board::{Board, GRID_SIZE};
use crate::error::Result;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);

/// Well-known locations for the preferred face, tried in order after any
/// configured path.
const FONT_CANDIDATES: [&str; 4] = [
    "DejaVuSans.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
];

/// Pixel geometry of the rendered sheet.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Side of the square output image.
    pub grid_px: u32,
    /// Side of one cell.
    pub cell_px: u32,
    /// Width of the label band along the top and left edges.
    pub margin_px: u32,
    /// Font size the fitting loop starts from.
    pub base_font_px: u32,
    /// Floor for the fitting loop; text that still overflows here is
    /// drawn anyway.
    pub min_font_px: u32,
    /// Total horizontal/vertical padding inside a cell.
    pub cell_padding_px: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            grid_px: 600,
            cell_px: 100,
            margin_px: 50,
            base_font_px: 15,
            min_font_px: 5,
            cell_padding_px: 10,
        }
    }
}

/// The face used for all sheet text: a loaded TrueType font, or the
/// built-in 8x8 bitmap font when no face can be found. Having a builtin
/// means rendering never fails for lack of font assets.
pub enum SheetFont {
    Truetype(FontArc),
    Builtin,
}

impl SheetFont {
    /// Try the configured path, then the well-known candidates, and fall
    /// back to the builtin.
    pub fn load(preferred: Option<&Path>) -> SheetFont {
        let configured = preferred.map(Path::to_path_buf);
        let candidates = configured
            .iter()
            .map(|p| p.as_path())
            .chain(FONT_CANDIDATES.iter().map(Path::new));
        for path in candidates {
            if let Ok(data) = std::fs::read(path) {
                match FontArc::try_from_vec(data) {
                    Ok(font) => {
                        tracing::info!("loaded sheet font from {}", path.display());
                        return SheetFont::Truetype(font);
                    }
                    Err(e) => tracing::warn!("unusable font file {}: {e}", path.display()),
                }
            }
        }
        tracing::warn!("no TrueType font found, falling back to the built-in bitmap font");
        SheetFont::Builtin
    }

    /// Rendered pixel size of one line of text at the given font size.
    fn measure(&self, text: &str, px: u32) -> (u32, u32) {
        match self {
            SheetFont::Truetype(font) => text_size(PxScale::from(px as f32), font, text),
            // 8x8 glyphs scale to a px-square box per character.
            SheetFont::Builtin => (text.chars().count() as u32 * px, px),
        }
    }

    fn draw(&self, canvas: &mut RgbImage, x: i32, y: i32, px: u32, text: &str, color: Rgb<u8>) {
        match self {
            SheetFont::Truetype(font) => {
                draw_text_mut(canvas, color, x, y, PxScale::from(px as f32), font, text)
            }
            SheetFont::Builtin => draw_bitmap_text(canvas, x, y, px, text, color),
        }
    }
}

/// Nearest-neighbor scaled rendering of the 8x8 bitmap font.
fn draw_bitmap_text(canvas: &mut RgbImage, x: i32, y: i32, px: u32, text: &str, color: Rgb<u8>) {
    let fallback = BASIC_FONTS.get('?').unwrap_or([0; 8]);
    for (i, ch) in text.chars().enumerate() {
        let glyph = BASIC_FONTS.get(ch).unwrap_or(fallback);
        let origin_x = x + (i as u32 * px) as i32;
        for dy in 0..px {
            let row = glyph[(dy * 8 / px) as usize];
            for dx in 0..px {
                if (row >> (dx * 8 / px)) & 1 == 0 {
                    continue;
                }
                let (tx, ty) = (origin_x + dx as i32, y + dy as i32);
                if tx >= 0 && ty >= 0 && (tx as u32) < canvas.width() && (ty as u32) < canvas.height()
                {
                    canvas.put_pixel(tx as u32, ty as u32, color);
                }
            }
        }
    }
}

/// Greedy word wrap: words accumulate onto the current line while it
/// still fits the width budget; the overflowing word starts the next
/// line. A single word wider than the budget stays on its own line, no
/// hyphenation.
fn wrap_text(font: &SheetFont, text: &str, px: u32, max_width: u32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if font.measure(&candidate, px).0 <= max_width {
            current = candidate;
        } else {
            if !current.is_empty() {
                lines.push(current);
            }
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Shrink-to-fit: wrap at the current size, and while either the stacked
/// line height or the widest line exceeds the budget, drop one font unit
/// and re-wrap. At the floor the text is accepted as-is; a verbose clue
/// degrades visually instead of failing the render.
fn fit_cell_text(
    font: &SheetFont,
    text: &str,
    max_width: u32,
    max_height: u32,
    base_px: u32,
    min_px: u32,
) -> (u32, Vec<String>) {
    let mut px = base_px.max(min_px);
    loop {
        let lines = wrap_text(font, text, px, max_width);
        let total_height: u32 = lines.iter().map(|line| font.measure(line, px).1).sum();
        let widest: u32 = lines
            .iter()
            .map(|line| font.measure(line, px).0)
            .max()
            .unwrap_or(0);
        if (total_height <= max_height && widest <= max_width) || px <= min_px {
            return (px, lines);
        }
        px -= 1;
    }
}

/// Typographic double quotes render as boxes in many faces; normalize
/// them before measurement so wrapping sees the same text that is drawn.
fn display_text(text: &str) -> String {
    text.replace('\u{201c}', "\"").replace('\u{201d}', "\"")
}

fn draw_cross(canvas: &mut RgbImage, x: i32, y: i32, size: i32, color: Rgb<u8>) {
    // Three adjacent segments approximate a 3 px stroke.
    for offset in -1..=1i32 {
        let o = offset as f32;
        draw_line_segment_mut(
            canvas,
            (x as f32, (y + offset) as f32),
            ((x + size) as f32, (y + size) as f32 + o),
            color,
        );
        draw_line_segment_mut(
            canvas,
            ((x + size) as f32, (y + offset) as f32),
            (x as f32, (y + size) as f32 + o),
            color,
        );
    }
}

/// Render a sheet into a `grid_px` square image: a label band with
/// columns A-E and rows 1-5, then the 5x5 cell grid with fitted clue
/// text and a red cross over every crossed-off cell. Read-only with
/// respect to the board.
pub fn render_board(board: &Board, font: &SheetFont, opts: &RenderOptions) -> RgbImage {
    let mut img = RgbImage::from_pixel(opts.grid_px, opts.grid_px, WHITE);

    let margin = opts.margin_px as i32;
    let cell = opts.cell_px as i32;
    let budget = opts.cell_px.saturating_sub(opts.cell_padding_px);

    // Band labels, centered over each cell's row/column.
    for i in 0..GRID_SIZE {
        let column = ((b'A' + i as u8) as char).to_string();
        let (w, h) = font.measure(&column, opts.base_font_px);
        font.draw(
            &mut img,
            margin + i as i32 * cell + (cell - w as i32) / 2,
            (margin - h as i32) / 2,
            opts.base_font_px,
            &column,
            BLACK,
        );

        let row = (i + 1).to_string();
        let (w, h) = font.measure(&row, opts.base_font_px);
        font.draw(
            &mut img,
            (margin - w as i32) / 2,
            margin + i as i32 * cell + (cell - h as i32) / 2,
            opts.base_font_px,
            &row,
            BLACK,
        );
    }

    for row in 0..GRID_SIZE {
        for col in 0..GRID_SIZE {
            let x = margin + col as i32 * cell;
            let y = margin + row as i32 * cell;

            // 2 px border as two nested outlines.
            draw_hollow_rect_mut(
                &mut img,
                Rect::at(x, y).of_size(opts.cell_px, opts.cell_px),
                BLACK,
            );
            draw_hollow_rect_mut(
                &mut img,
                Rect::at(x + 1, y + 1).of_size(opts.cell_px - 2, opts.cell_px - 2),
                BLACK,
            );

            let cell_state = &board.cells()[row * GRID_SIZE + col];
            let text = display_text(&cell_state.text);
            let (px, lines) =
                fit_cell_text(font, &text, budget, budget, opts.base_font_px, opts.min_font_px);

            let total_height: i32 = lines
                .iter()
                .map(|line| font.measure(line, px).1 as i32)
                .sum();
            let mut line_y = y + (cell - total_height) / 2;
            for line in &lines {
                let (w, h) = font.measure(line, px);
                font.draw(&mut img, x + (cell - w as i32) / 2, line_y, px, line, BLACK);
                line_y += h as i32;
            }

            if cell_state.marked {
                draw_cross(&mut img, x, y, cell, RED);
            }
        }
    }

    img
}

/// PNG-encode a rendered sheet for delivery.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::board::{Square, BOARD_CELLS};
    use crate::engine::pool::ClueSet;

    fn board_with(clue: &str) -> Board {
        let pool = ClueSet {
            label: "Render Test".to_string(),
            clues: (0..BOARD_CELLS).map(|_| clue.to_string()).collect(),
        };
        Board::sample(&pool, false).unwrap()
    }

    #[test]
    fn test_wrap_is_greedy() {
        // Builtin font is monospace: width = chars * px. Budget of 90 at
        // px 10 fits 9 characters per line.
        let font = SheetFont::Builtin;
        let lines = wrap_text(&font, "aaa bb cc dd", 10, 90);
        assert_eq!(lines, vec!["aaa bb cc", "dd"]);
    }

    #[test]
    fn test_wrap_keeps_overlong_word_whole() {
        let font = SheetFont::Builtin;
        let lines = wrap_text(&font, "tiny enormousword tiny", 10, 90);
        assert_eq!(lines, vec!["tiny", "enormousword", "tiny"]);
    }

    #[test]
    fn test_wrap_empty_text() {
        let font = SheetFont::Builtin;
        assert!(wrap_text(&font, "", 10, 90).is_empty());
    }

    #[test]
    fn test_fit_shrinks_until_it_fits() {
        let font = SheetFont::Builtin;
        // A 12-char word is 180 px wide at size 15 and cannot wrap; the
        // loop must walk down to 7, where 12 * 7 = 84 fits the budget.
        let (px, lines) = fit_cell_text(&font, "abcdefghijkl", 90, 90, 15, 5);
        assert_eq!(px, 7);
        assert_eq!(lines, vec!["abcdefghijkl"]);
    }

    #[test]
    fn test_fit_keeps_base_size_when_text_already_fits() {
        let font = SheetFont::Builtin;
        let (px, lines) = fit_cell_text(&font, "abcd efgh", 90, 90, 15, 5);
        assert_eq!(px, 15);
        assert_eq!(lines, vec!["abcd", "efgh"]);
    }

    #[test]
    fn test_fit_terminates_at_floor_for_verbose_text() {
        let font = SheetFont::Builtin;
        let long = "x".repeat(200);
        let (px, lines) = fit_cell_text(&font, &long, 90, 90, 15, 5);
        assert_eq!(px, 5, "floor size is accepted even though text overflows");
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn test_render_size_is_fixed_regardless_of_text() {
        let opts = RenderOptions::default();
        let font = SheetFont::Builtin;

        for clue in ["short", &"very long clue text ".repeat(10)] {
            let img = render_board(&board_with(clue), &font, &opts);
            assert_eq!(img.dimensions(), (opts.grid_px, opts.grid_px));
        }
    }

    #[test]
    fn test_render_draws_cross_on_marked_cell() {
        let opts = RenderOptions::default();
        let font = SheetFont::Builtin;
        let mut board = board_with("clue");
        board.mark(Square::parse("A1").unwrap()).unwrap();

        let img = render_board(&board, &font, &opts);
        // Cell A1 spans (50,50)..(150,150); its diagonal passes the center.
        assert_eq!(*img.get_pixel(100, 100), RED);
        // An unmarked cell's center stays uncrossed (white or text-black,
        // never red).
        assert_ne!(*img.get_pixel(250, 100), RED);
    }

    #[test]
    fn test_render_has_grid_borders() {
        let opts = RenderOptions::default();
        let img = render_board(&board_with("clue"), &SheetFont::Builtin, &opts);
        // Top-left corner of the first cell.
        assert_eq!(*img.get_pixel(50, 50), BLACK);
        // Outside the band stays white.
        assert_eq!(*img.get_pixel(10, 10), WHITE);
    }

    #[test]
    fn test_display_text_normalizes_curly_quotes() {
        assert_eq!(display_text("\u{201c}hi\u{201d}"), "\"hi\"");
    }

    #[test]
    fn test_encode_png_magic_bytes() {
        let img = RgbImage::from_pixel(4, 4, WHITE);
        let png = encode_png(&img).unwrap();
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
    }
}
