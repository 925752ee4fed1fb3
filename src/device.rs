//! Shared device context: the one owner of the panel, the busy flag and
//! the in-flight transfer session.
//!
//! Request handlers never touch globals; everything they may use sits in
//! [`Device`] behind one lock, and the busy flag inside it is the single
//! mutual-exclusion mechanism for panel work. Chunked transfers span
//! multiple HTTP requests, which is why the flag exists on top of the
//! lock: the panel stays claimed between requests.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::epd7in3e::color::Color;
use crate::epd7in3e::driver::{DisplayError, Epd7in3e};
use crate::epd7in3e::graphics::StatusScreen;
use crate::ingest::{IngestError, TransferSession};
use crate::storage::Storage;

/// Network identity acquired at boot; reported on `/status` and drawn on
/// the boot screen.
#[derive(Clone, Debug)]
pub enum NetMode {
    Station { ssid: String, ip: String },
    AccessPoint { ssid: String, ip: String },
}

/// The device context. Generic over the panel's pin and delay types so
/// the full request path can run against recorded pins in tests.
pub struct Device<CLK, DIN, CS, DC, RST, BSY, DELAY> {
    pub(crate) epd: Epd7in3e<CLK, DIN, CS, DC, RST, BSY, DELAY>,
    pub(crate) storage: Option<Storage>,
    pub(crate) session: Option<TransferSession>,
    busy: bool,
    pub net: Option<NetMode>,
}

impl<CLK, DIN, CS, DC, RST, BSY, DELAY> Device<CLK, DIN, CS, DC, RST, BSY, DELAY>
where
    CLK: OutputPin,
    DIN: OutputPin,
    CS: OutputPin,
    DC: OutputPin,
    RST: OutputPin,
    BSY: InputPin,
    DELAY: DelayNs,
{
    /// Storage is an optional capability: without a mounted card the
    /// device still displays, it just cannot save.
    pub fn new(epd: Epd7in3e<CLK, DIN, CS, DC, RST, BSY, DELAY>, storage: Option<Storage>) -> Self {
        Device {
            epd,
            storage,
            session: None,
            busy: false,
            net: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn has_storage(&self) -> bool {
        self.storage.is_some()
    }

    /// Saved entries, or nothing when no card is mounted.
    pub fn saved_images(&self) -> Vec<String> {
        self.storage.as_ref().map(Storage::list).unwrap_or_default()
    }

    /// Claim the panel. Fails without side effects while any other panel
    /// operation (including an open transfer session) holds it.
    pub(crate) fn acquire(&mut self) -> Result<(), IngestError> {
        if self.busy {
            return Err(IngestError::Busy);
        }
        self.busy = true;
        Ok(())
    }

    /// Release the panel. Must be reached on every exit path, error
    /// paths included; a leaked claim locks the device out for good.
    pub(crate) fn release(&mut self) {
        self.busy = false;
    }

    /// Run one self-contained panel operation: claim, wake, execute,
    /// sleep, release.
    fn with_panel<F>(&mut self, op: F) -> Result<(), IngestError>
    where
        F: FnOnce(&mut Epd7in3e<CLK, DIN, CS, DC, RST, BSY, DELAY>) -> Result<(), DisplayError>,
    {
        self.acquire()?;
        let result = (|| {
            self.epd.init()?;
            op(&mut self.epd)?;
            self.epd.sleep()
        })();
        self.release();
        result.map_err(IngestError::Panel)
    }

    /// Draw a boot/status text screen.
    pub fn show_screen(&mut self, screen: &StatusScreen) -> Result<(), IngestError> {
        self.with_panel(|epd| epd.stream_frame(screen.bytes()))
    }

    /// Fill the whole panel with one palette color.
    pub fn clear_to(&mut self, color: Color) -> Result<(), IngestError> {
        self.with_panel(|epd| epd.fill(color))
    }

    /// Vendor palette-band check screen.
    pub fn show_test_pattern(&mut self) -> Result<(), IngestError> {
        self.with_panel(|epd| epd.show_palette_bands())
    }
}

#[cfg(target_os = "espidf")]
pub use board::BoardDevice;

#[cfg(target_os = "espidf")]
mod board {
    use esp_idf_svc::hal::delay::Delay;
    use esp_idf_svc::hal::gpio::{AnyInputPin, AnyOutputPin, Input, Output, PinDriver};

    /// The context as wired on the board (see `epd7in3e::pins`).
    pub type BoardDevice = super::Device<
        PinDriver<'static, AnyOutputPin, Output>,
        PinDriver<'static, AnyOutputPin, Output>,
        PinDriver<'static, AnyOutputPin, Output>,
        PinDriver<'static, AnyOutputPin, Output>,
        PinDriver<'static, AnyOutputPin, Output>,
        PinDriver<'static, AnyInputPin, Input>,
        Delay,
    >;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epd7in3e::cmd::Cmd;
    use crate::epd7in3e::testbus::test_epd;
    use crate::epd7in3e::FRAME_BYTES;

    #[test]
    fn one_shot_operations_release_the_panel() {
        let (epd, bus) = test_epd(0);
        let mut device = Device::new(epd, None);

        assert!(!device.is_busy());
        device.clear_to(Color::Blue).unwrap();
        assert!(!device.is_busy());

        // a full init + frame + sleep reached the wire
        let bus = bus.borrow();
        let frame = bus.payload_of(Cmd::DATA_START).unwrap();
        assert_eq!(frame.len(), FRAME_BYTES);
        assert!(frame.iter().all(|b| *b == Color::Blue.pair()));
        let codes: Vec<u8> = bus.commands().into_iter().map(|(c, _)| c).collect();
        assert_eq!(codes.last(), Some(&Cmd::DEEP_SLEEP));
    }

    #[test]
    fn status_screen_renders_through_the_same_path() {
        let (epd, bus) = test_epd(0);
        let mut device = Device::new(epd, None);
        device
            .show_screen(&StatusScreen::new(["BOOT", "", "", ""]))
            .unwrap();
        let frame = bus.borrow().payload_of(Cmd::DATA_START).unwrap();
        assert_eq!(frame.len(), FRAME_BYTES);
    }
}
