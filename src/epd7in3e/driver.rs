//! Panel driver for the 7.3" Spectra-6 controller.
//!
//! Sequences the controller from cold/unknown state to displaying a
//! frame and back into deep sleep. A full update is always:
//!
//! 1. `init()`: hardware reset plus the vendor bring-up sequence, then
//!    power-on and a busy wait
//! 2. `begin_frame()` / `push_frame()` / `end_frame()`: open the data
//!    transmission, stream exactly [`FRAME_BYTES`] packed bytes (short
//!    transfers are padded with white), trigger the refresh and wait it
//!    out
//! 3. `sleep()`: deep sleep; the next update starts over at `init()`
//!
//! [`stream_frame`](Epd7in3e::stream_frame) collapses step 2 for
//! sources that are available as one iterator, and the fills and the
//! palette test screen are built on top of it.
//!
//! ## Critical implementation details
//!
//! The bring-up sequence in `init()` is vendor-mandated and must be
//! reproduced byte-for-byte; a deviating sequence does not error, the
//! panel just silently renders garbage or nothing. The busy line is the
//! only feedback channel the controller has, and the wait on it is
//! deadline-bounded: a missing or dead panel degrades to warnings, it
//! never takes the firmware down.

pub use display_interface::DisplayError;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::epd7in3e::interface::DisplayInterface;
use crate::epd7in3e::{
    cmd::Cmd,
    color::{Color, WHITE_PAIR},
    flag::Flag,
    FRAME_BYTES, HEIGHT, WIDTH,
};

/// Driver for the 7.3" Spectra-6 panel.
///
/// ## Type parameters
///
/// The six bus lines plus the delay provider, as `embedded-hal` traits:
/// CLK/DIN/CS/DC/RST outputs, BSY input.
pub struct Epd7in3e<CLK, DIN, CS, DC, RST, BSY, DELAY> {
    interface: DisplayInterface<CLK, DIN, CS, DC, RST, BSY, DELAY>,
    /// Bytes accepted into the currently open frame transfer.
    streamed: usize,
}

impl<CLK, DIN, CS, DC, RST, BSY, DELAY> Epd7in3e<CLK, DIN, CS, DC, RST, BSY, DELAY>
where
    CLK: OutputPin,
    DIN: OutputPin,
    CS: OutputPin,
    DC: OutputPin,
    RST: OutputPin,
    BSY: InputPin,
    DELAY: DelayNs,
{
    /// Wrap an interface. The panel is not touched until `init`.
    pub fn new(interface: DisplayInterface<CLK, DIN, CS, DC, RST, BSY, DELAY>) -> Self {
        Epd7in3e {
            interface,
            streamed: 0,
        }
    }

    /// Bring the panel from any state to ready: hardware reset, the
    /// vendor bring-up sequence, then power-on and a busy wait.
    ///
    /// The command order and every parameter byte follow the vendor
    /// reference for this panel model.
    pub fn init(&mut self) -> Result<(), DisplayError> {
        log::info!("initializing panel");
        self.interface.reset()?;
        self.interface.wait_ready();

        self.interface.cmd_with_data(Cmd::CMDH, &Flag::CMDH_UNLOCK)?;
        self.interface.cmd_with_data(Cmd::POWER_SETTING, &[Flag::POWER_DEFAULT])?;
        self.interface.cmd_with_data(Cmd::PANEL_SETTING, &Flag::PANEL_SETTING_DEFAULT)?;
        self.interface.cmd_with_data(Cmd::POWER_OFF_SEQUENCE, &Flag::POWER_OFF_SEQUENCE_DEFAULT)?;
        self.interface.cmd_with_data(Cmd::BOOSTER_SOFT_START_1, &Flag::BOOSTER_PHASE1)?;
        self.interface.cmd_with_data(Cmd::BOOSTER_SOFT_START_2, &Flag::BOOSTER_PHASE2)?;
        self.interface.cmd_with_data(Cmd::BOOSTER_SOFT_START_3, &Flag::BOOSTER_PHASE3)?;
        self.interface.cmd_with_data(Cmd::IPC, &Flag::IPC_DEFAULT)?;
        self.interface.cmd_with_data(Cmd::PLL_CONTROL, &[Flag::PLL_DEFAULT])?;
        self.interface.cmd_with_data(Cmd::TEMP_SENSOR_ENABLE, &[Flag::INTERNAL_TEMP_SENSOR])?;
        self.interface.cmd_with_data(Cmd::VCOM_DATA_INTERVAL, &[Flag::CDI_DEFAULT])?;
        self.interface.cmd_with_data(Cmd::TCON_SETTING, &Flag::TCON_DEFAULT)?;
        self.interface.cmd_with_data(Cmd::RESOLUTION_SETTING, &Self::resolution_bytes())?;
        self.interface.cmd_with_data(Cmd::VCOM_DC_TRIM, &[Flag::VCOM_DC_DEFAULT])?;
        self.interface.cmd_with_data(Cmd::POWER_SAVING, &[Flag::POWER_SAVING_DEFAULT])?;

        self.interface.cmd(Cmd::POWER_ON)?;
        self.interface.wait_ready();
        Ok(())
    }

    /// Resolution parameter: width and height, big-endian, in pixels.
    fn resolution_bytes() -> [u8; 4] {
        [
            (WIDTH >> 8) as u8,
            (WIDTH & 0xFF) as u8,
            (HEIGHT >> 8) as u8,
            (HEIGHT & 0xFF) as u8,
        ]
    }

    /// Open a frame transfer. Precondition: panel initialized.
    pub fn begin_frame(&mut self) -> Result<(), DisplayError> {
        self.interface.cmd(Cmd::DATA_START)?;
        self.streamed = 0;
        Ok(())
    }

    /// Feed packed bytes into the open transfer; anything past the frame
    /// budget is silently dropped. Returns the number of bytes accepted.
    /// Precondition: an open frame.
    pub fn push_frame(&mut self, data: &[u8]) -> Result<usize, DisplayError> {
        let room = FRAME_BYTES - self.streamed;
        let take = data.len().min(room);
        if take < data.len() {
            log::debug!("dropping {} bytes past the frame end", data.len() - take);
        }
        self.interface.data(&data[..take])?;
        self.streamed += take;
        Ok(take)
    }

    /// Bytes accepted into the open transfer so far.
    pub fn streamed(&self) -> usize {
        self.streamed
    }

    /// Close the transfer: pad any shortfall with white, trigger the
    /// refresh and wait until the controller settles.
    /// Precondition: an open frame.
    pub fn end_frame(&mut self) -> Result<(), DisplayError> {
        let shortfall = FRAME_BYTES - self.streamed;
        if shortfall > 0 {
            log::info!("padding {} missing frame bytes with white", shortfall);
            self.interface.data_x_times(WHITE_PAIR, shortfall as u32)?;
            self.streamed = FRAME_BYTES;
        }
        self.interface.cmd_with_data(Cmd::DISPLAY_REFRESH, &[Flag::REFRESH_FULL])?;
        self.interface.wait_ready();
        Ok(())
    }

    /// Write exactly one frame pulled from `source`: literal buffers,
    /// file readers and generated patterns all come through here. A
    /// short source is padded with white.
    pub fn stream_frame<I>(&mut self, mut source: I) -> Result<(), DisplayError>
    where
        I: Iterator<Item = u8>,
    {
        self.begin_frame()?;
        let mut buf = [0u8; 256];
        while self.streamed < FRAME_BYTES {
            let mut filled = 0;
            while filled < buf.len() && self.streamed + filled < FRAME_BYTES {
                buf[filled] = source.next().unwrap_or(WHITE_PAIR);
                filled += 1;
            }
            self.push_frame(&buf[..filled])?;
        }
        self.end_frame()
    }

    /// Solid fill with one palette color.
    pub fn fill(&mut self, color: Color) -> Result<(), DisplayError> {
        self.stream_frame(core::iter::repeat(color.pair()))
    }

    /// Clear to white.
    pub fn clear(&mut self) -> Result<(), DisplayError> {
        self.fill(Color::White)
    }

    /// Vendor panel check: six equal horizontal bands, one per palette
    /// color. Band bytes carry the single-pixel 4-bit code as-is, not
    /// pair-packed; this matches the vendor test sequence and is the one
    /// place the encoding deviates from normal fills.
    pub fn show_palette_bands(&mut self) -> Result<(), DisplayError> {
        self.begin_frame()?;
        let band = FRAME_BYTES / Color::PALETTE.len();
        for color in Color::PALETTE {
            self.interface.data_x_times(color as u8, band as u32)?;
        }
        self.streamed = FRAME_BYTES;
        self.end_frame()
    }

    /// Put the controller into deep sleep. Waking requires a full
    /// `init`.
    pub fn sleep(&mut self) -> Result<(), DisplayError> {
        self.interface.cmd_with_data(Cmd::DEEP_SLEEP, &[Flag::DEEP_SLEEP_CHECK])?;
        self.interface.wait_ready();
        Ok(())
    }
}
