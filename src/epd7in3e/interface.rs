//! Panel bus: bit-banged write-only SPI with a data/command select line.
use display_interface::DisplayError;
use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};

/// Bus timing and busy-wait policy.
///
/// The busy deadline is deliberately a configuration value rather than a
/// constant baked into the wait loop: production uses the values from
/// `config`, tests inject short ones.
#[derive(Clone, Copy, Debug)]
pub struct BusConfig {
    /// Settle time after each clock edge, microseconds. Must exceed the
    /// panel's data setup/hold time.
    pub settle_us: u32,
    /// Upper bound for one busy wait, milliseconds.
    pub busy_timeout_ms: u32,
    /// Sleep between busy-line polls, milliseconds.
    pub busy_poll_ms: u32,
}

/// The connection to the panel: four driven lines, the reset line and the
/// busy input, clocked by hand.
///
/// Generic over the `embedded-hal` pin and delay traits so the whole
/// stack above it can run against recorded pins on a host.
pub struct DisplayInterface<CLK, DIN, CS, DC, RST, BSY, DELAY> {
    clk: CLK,
    din: DIN,
    /// Chip select, asserted low for every single byte
    cs: CS,
    /// Data/Command control pin (high for data, low for command)
    dc: DC,
    /// Pin for resetting the controller
    rst: RST,
    /// Low while the controller is busy; wait until it reports ready
    busy: BSY,
    pub(crate) delay: DELAY,
    config: BusConfig,
}

impl<CLK, DIN, CS, DC, RST, BSY, DELAY> DisplayInterface<CLK, DIN, CS, DC, RST, BSY, DELAY>
where
    CLK: OutputPin,
    DIN: OutputPin,
    CS: OutputPin,
    DC: OutputPin,
    RST: OutputPin,
    BSY: InputPin,
    DELAY: DelayNs,
{
    /// Create the interface. Lines are left wherever the bootloader put
    /// them until the first `reset`.
    pub fn new(clk: CLK, din: DIN, cs: CS, dc: DC, rst: RST, busy: BSY, delay: DELAY, config: BusConfig) -> Self {
        DisplayInterface {
            clk,
            din,
            cs,
            dc,
            rst,
            busy,
            delay,
            config,
        }
    }

    /// Clock one byte out, most significant bit first: clock low, data
    /// line set, clock high. The settle delay keeps both edges outside
    /// the controller's setup/hold window.
    fn write_byte(&mut self, mut value: u8) -> Result<(), DisplayError> {
        for _ in 0..8 {
            self.clk.set_low().map_err(|_| DisplayError::BusWriteError)?;
            if value & 0x80 != 0 {
                self.din.set_high().map_err(|_| DisplayError::BusWriteError)?;
            } else {
                self.din.set_low().map_err(|_| DisplayError::BusWriteError)?;
            }
            self.delay.delay_us(self.config.settle_us);
            self.clk.set_high().map_err(|_| DisplayError::BusWriteError)?;
            self.delay.delay_us(self.config.settle_us);
            value <<= 1;
        }
        self.clk.set_low().map_err(|_| DisplayError::BusWriteError)?;
        Ok(())
    }

    /// Basic function for sending commands
    pub(crate) fn cmd(&mut self, command: u8) -> Result<(), DisplayError> {
        // low for commands
        self.dc.set_low().map_err(|_| DisplayError::DCError)?;
        self.cs.set_low().map_err(|_| DisplayError::CSError)?;
        self.write_byte(command)?;
        self.cs.set_high().map_err(|_| DisplayError::CSError)
    }

    /// Basic function for sending a run of data bytes. Chip select is
    /// asserted per byte, matching the vendor transaction discipline.
    pub(crate) fn data(&mut self, data: &[u8]) -> Result<(), DisplayError> {
        // high for data
        self.dc.set_high().map_err(|_| DisplayError::DCError)?;
        for &byte in data {
            self.cs.set_low().map_err(|_| DisplayError::CSError)?;
            self.write_byte(byte)?;
            self.cs.set_high().map_err(|_| DisplayError::CSError)?;
        }
        Ok(())
    }

    /// Basic function for sending a command and the data belonging to it.
    pub(crate) fn cmd_with_data(&mut self, command: u8, data: &[u8]) -> Result<(), DisplayError> {
        self.cmd(command)?;
        self.data(data)
    }

    /// Basic function for sending the same byte of data multiple times.
    /// Used for solid fills and for padding short frames.
    pub(crate) fn data_x_times(&mut self, val: u8, repetitions: u32) -> Result<(), DisplayError> {
        self.dc.set_high().map_err(|_| DisplayError::DCError)?;

        // Log roughly ten times over a long run so a stuck transfer is
        // visible without flooding the console.
        let log_interval = (repetitions / 10).max(1);

        for i in 0..repetitions {
            if i > 0 && i % log_interval == 0 {
                log::debug!("repeated write {}/{}", i, repetitions);
            }
            self.cs.set_low().map_err(|_| DisplayError::CSError)?;
            self.write_byte(val)?;
            self.cs.set_high().map_err(|_| DisplayError::CSError)?;
        }
        Ok(())
    }

    /// Hardware reset: high, low, high with the controller's documented
    /// hold times. Leaves the panel in a clean power-on state regardless
    /// of what it was doing before.
    pub(crate) fn reset(&mut self) -> Result<(), DisplayError> {
        self.rst.set_high().map_err(|_| DisplayError::RSError)?;
        self.delay.delay_ms(20);
        self.rst.set_low().map_err(|_| DisplayError::RSError)?;
        self.delay.delay_ms(2);
        self.rst.set_high().map_err(|_| DisplayError::RSError)?;
        self.delay.delay_ms(20);
        Ok(())
    }

    /// Wait until the busy line reports ready (high), polling with short
    /// sleeps up to the configured deadline.
    ///
    /// Returns `false` when the deadline passes. Callers proceed either
    /// way: a panel that never answers must not take the rest of the
    /// device down with it, so the failure mode is a warning and a best
    /// effort refresh, not a hang.
    pub(crate) fn wait_ready(&mut self) -> bool {
        let poll_ms = self.config.busy_poll_ms.max(1);
        let polls = self.config.busy_timeout_ms / poll_ms;

        for _ in 0..=polls {
            match self.busy.is_high() {
                Ok(true) => return true,
                Ok(false) => self.delay.delay_ms(poll_ms),
                Err(_) => {
                    // Unreadable pin: assume ready rather than loop forever
                    log::error!("cannot read BUSY line, continuing");
                    return true;
                }
            }
        }

        log::warn!(
            "BUSY line stuck for {} ms, panel may not be connected; continuing",
            self.config.busy_timeout_ms
        );
        false
    }
}
