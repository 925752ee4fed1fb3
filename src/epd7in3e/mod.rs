//! 7.3" Spectra-6 ePaper Panel Driver
//!
//! Drives the six-color 800x480 panel found on the
//! [Waveshare 7.3" e-Paper (E)](https://www.waveshare.com/7.3inch-e-paper-hat-e.htm)
//! over a bit-banged write-only SPI bus (CLK/DIN/CS/DC plus RST out and
//! BUSY in). The controller is a UC8179-class chip: every refresh is a
//! full init -> data transmission -> refresh -> deep sleep cycle.
//!
//! ### Usage
//!
//! 1. build a [`interface::DisplayInterface`] from the six GPIO lines and
//!    a delay provider,
//! 2. wrap it in [`driver::Epd7in3e`],
//! 3. feed it a packed frame, either in one go with
//!    [`driver::Epd7in3e::stream_frame`] or incrementally with
//!    `begin_frame`/`push_frame`/`end_frame`.
//!
//! Frames are panel-native: two 4-bit [`color::Color`] codes per byte,
//! row-major, no row padding.

pub mod color;
pub mod driver;

pub(crate) mod cmd;
pub(crate) mod flag;
pub mod graphics;
pub mod interface;
pub mod pins;

#[cfg(test)]
pub(crate) mod testbus;

/// Display height, pixels vertically
pub const HEIGHT: u16 = 480;

/// Display width, pixels horizontally
pub const WIDTH: u16 = 800;

/// One full frame in panel-native form: two pixels per byte.
pub const FRAME_BYTES: usize = WIDTH as usize * HEIGHT as usize / 2;
