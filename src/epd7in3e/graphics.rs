//! Frame generators: solid fills and the text status screen.
//!
//! A full frame is 192,000 bytes and never lives in RAM as a whole;
//! everything here produces the packed byte stream lazily, row-major,
//! ready to be handed to [`super::driver::Epd7in3e::stream_frame`].

use crate::epd7in3e::color::Color;
use crate::epd7in3e::{HEIGHT, WIDTH};

/// Endless solid-fill source; the driver bounds it to one frame.
pub fn fill_bytes(color: Color) -> impl Iterator<Item = u8> {
    core::iter::repeat(color.pair())
}

/// Vertical offsets of the four status lines, pixels from the top.
pub const LINE_OFFSETS: [usize; 4] = [160, 200, 240, 280];

/// Character cell at the rendered 2x scale: 10 px of glyph plus 2 px
/// gap, 14 px tall.
pub const CELL_WIDTH: usize = 12;
pub const CELL_HEIGHT: usize = 14;
const SCALE: usize = 2;
const MAX_CHARS: usize = WIDTH as usize / CELL_WIDTH;

/// Up to four lines of centered black-on-white text, rendered with the
/// built-in 5x7 font. Used for the boot status screens.
pub struct StatusScreen {
    lines: [String; 4],
}

impl StatusScreen {
    /// Lay out four lines; over-long lines are truncated to the canvas.
    pub fn new(lines: [&str; 4]) -> Self {
        StatusScreen {
            lines: lines.map(|line| line.chars().take(MAX_CHARS).collect()),
        }
    }

    /// The full frame as a lazy packed byte stream, row-major.
    /// Restart by calling again; the iterator is not reusable.
    pub fn bytes(&self) -> impl Iterator<Item = u8> + '_ {
        (0..HEIGHT as usize).flat_map(move |y| {
            (0..WIDTH as usize / 2).map(move |pair| {
                Color::pack(self.pixel(2 * pair, y), self.pixel(2 * pair + 1, y))
            })
        })
    }

    fn pixel(&self, x: usize, y: usize) -> Color {
        if self.ink_at(x, y) {
            Color::Black
        } else {
            Color::White
        }
    }

    /// Whether (x, y) lands on a lit glyph bit of one of the lines.
    fn ink_at(&self, x: usize, y: usize) -> bool {
        for (line, y0) in self.lines.iter().zip(LINE_OFFSETS) {
            if y < y0 || y >= y0 + CELL_HEIGHT {
                continue;
            }
            let width = line.len() * CELL_WIDTH;
            let x0 = (WIDTH as usize).saturating_sub(width) / 2;
            if x < x0 || x >= x0 + width {
                return false;
            }
            let cell_x = (x - x0) % CELL_WIDTH;
            let glyph_col = cell_x / SCALE;
            if glyph_col >= 5 {
                // inter-character gap
                return false;
            }
            let glyph_row = (y - y0) / SCALE;
            let ch = line.as_bytes()[(x - x0) / CELL_WIDTH] as char;
            let rows = &FONT_5X7[glyph_index(ch)];
            return rows[glyph_row] & (0x10 >> glyph_col) != 0;
        }
        false
    }
}

/// Map a character onto the font table. Case-insensitive, total: anything
/// the font does not carry renders as a space.
pub fn glyph_index(ch: char) -> usize {
    match ch {
        'A'..='Z' => 1 + (ch as usize - 'A' as usize),
        'a'..='z' => 1 + (ch as usize - 'a' as usize),
        '0'..='9' => 27 + (ch as usize - '0' as usize),
        ':' => 37,
        '-' => 38,
        '.' => 39,
        '/' => 40,
        _ => 0,
    }
}

/// 5x7 bitmap font: space, A-Z, 0-9, `: - . /`. One byte per row, bit 4
/// is the leftmost column.
const FONT_5X7: [[u8; 7]; 41] = [
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // space
    [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11], // A
    [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E], // B
    [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E], // C
    [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E], // D
    [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F], // E
    [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10], // F
    [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F], // G
    [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11], // H
    [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E], // I
    [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C], // J
    [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11], // K
    [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F], // L
    [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11], // M
    [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11], // N
    [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E], // O
    [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10], // P
    [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D], // Q
    [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11], // R
    [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E], // S
    [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04], // T
    [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E], // U
    [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04], // V
    [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A], // W
    [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11], // X
    [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04], // Y
    [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F], // Z
    [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E], // 0
    [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E], // 1
    [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F], // 2
    [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E], // 3
    [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02], // 4
    [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E], // 5
    [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E], // 6
    [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08], // 7
    [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E], // 8
    [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C], // 9
    [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00], // :
    [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00], // -
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C], // .
    [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00], // /
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epd7in3e::color::WHITE_PAIR;
    use crate::epd7in3e::FRAME_BYTES;

    fn frame_of(screen: &StatusScreen) -> Vec<u8> {
        screen.bytes().collect()
    }

    fn byte_at(frame: &[u8], x: usize, y: usize) -> u8 {
        frame[y * (WIDTH as usize / 2) + x / 2]
    }

    #[test]
    fn empty_screen_is_one_full_white_frame() {
        let frame = frame_of(&StatusScreen::new(["", "", "", ""]));
        assert_eq!(frame.len(), FRAME_BYTES);
        assert!(frame.iter().all(|b| *b == WHITE_PAIR));
    }

    #[test]
    fn fill_source_repeats_the_pair_byte() {
        let mut bytes = fill_bytes(Color::Green);
        assert_eq!(bytes.next(), Some(0x66));
        assert_eq!(bytes.next(), Some(0x66));
    }

    #[test]
    fn single_glyph_lands_centered_on_its_line() {
        // "I": top row of the glyph is 01110, doubled to 4 lit pixels.
        let frame = frame_of(&StatusScreen::new(["I", "", "", ""]));

        // one 12 px cell centered on the 800 px canvas
        let x0 = (WIDTH as usize - CELL_WIDTH) / 2;
        let y0 = LINE_OFFSETS[0];

        // glyph column 0 (pixels x0, x0+1) is dark only where the row
        // starts with a lit bit; row 0 of "I" starts 0
        let black = Color::Black as u8;
        let white = Color::White as u8;
        assert_eq!(byte_at(&frame, x0, y0), Color::pack(Color::White, Color::White));
        // columns 1..=3 are lit on row 0
        assert_eq!(byte_at(&frame, x0 + 2, y0), (black << 4) | black);
        assert_eq!(byte_at(&frame, x0 + 4, y0), (black << 4) | black);
        assert_eq!(byte_at(&frame, x0 + 6, y0), (black << 4) | black);
        assert_eq!(byte_at(&frame, x0 + 8, y0), (white << 4) | white);

        // 2x scale: the row below repeats
        assert_eq!(byte_at(&frame, x0 + 2, y0 + 1), (black << 4) | black);
        // and the row after that is glyph row 1, where only the middle is lit
        assert_eq!(byte_at(&frame, x0 + 2, y0 + 2), (white << 4) | white);
        assert_eq!(byte_at(&frame, x0 + 4, y0 + 2), (black << 4) | black);
    }

    #[test]
    fn pixels_outside_every_band_are_white() {
        let frame = frame_of(&StatusScreen::new(["WIFI", "SETUP", "MODE", "X"]));
        for y in [0, 100, 159, 174, 199, 300, 479] {
            // rows between/outside the bands (band height is 14)
            if LINE_OFFSETS.iter().any(|y0| y >= *y0 && y < y0 + CELL_HEIGHT) {
                continue;
            }
            for x in (0..WIDTH as usize).step_by(2) {
                assert_eq!(byte_at(&frame, x, y), WHITE_PAIR);
            }
        }
    }

    #[test]
    fn lowercase_folds_onto_the_same_glyphs() {
        let upper = frame_of(&StatusScreen::new(["HELLO", "", "", ""]));
        let lower = frame_of(&StatusScreen::new(["hello", "", "", ""]));
        assert_eq!(upper, lower);
    }

    #[test]
    fn unsupported_characters_render_as_space() {
        assert_eq!(glyph_index('~'), 0);
        assert_eq!(glyph_index('!'), 0);
        let blank = frame_of(&StatusScreen::new(["!!!", "", "", ""]));
        assert!(blank.iter().all(|b| *b == WHITE_PAIR));
    }

    #[test]
    fn glyph_lookup_covers_the_advertised_set() {
        assert_eq!(glyph_index(' '), 0);
        assert_eq!(glyph_index('A'), 1);
        assert_eq!(glyph_index('z'), 26);
        assert_eq!(glyph_index('0'), 27);
        assert_eq!(glyph_index('9'), 36);
        assert_eq!(glyph_index(':'), 37);
        assert_eq!(glyph_index('/'), 40);
    }
}
