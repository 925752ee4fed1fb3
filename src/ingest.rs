//! Frame ingest: the single writer feeding the panel.
//!
//! Two producers exist, a single-shot raw body and a chunked
//! hex-streamed session, and both converge on the driver's one
//! begin/push/end write path, so the panel sees an identical byte
//! sequence no matter how the frame arrived. The rules differ only at
//! the edges:
//!
//! * the single-shot path is strict: a body that is not exactly one
//!   frame is rejected before a single byte reaches the wire;
//! * the chunked path is lenient: short transfers are padded with white
//!   at `finish`, bytes past the frame budget are dropped.
//!
//! A chunked session may also tee into a persistence entry on the SD
//! card. The entry is closed *before* padding, so a short transfer
//! leaves a short file while the live panel stream is padded to full
//! length; read-back pads again in memory. The asymmetry is documented
//! behavior and pinned by the tests below.

use std::fs::File;
use std::io::Write;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::{debug, info, warn};

use crate::device::Device;
use crate::epd7in3e::driver::DisplayError;
use crate::epd7in3e::FRAME_BYTES;
use crate::storage;

/// Errors the HTTP adapter maps onto response statuses. None of these
/// are fatal and none leave partial state behind.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Another panel operation (or an open session) holds the device.
    #[error("device busy")]
    Busy,
    /// Chunk or end without a running transfer.
    #[error("no transfer in progress")]
    NoSession,
    /// Single-shot body with the wrong exact length.
    #[error("invalid frame length {got}, expected {expected}")]
    InvalidLength { expected: usize, got: usize },
    /// Read-back of a saved image that does not exist.
    #[error("no such saved image")]
    NotFound,
    /// The bus rejected a write; panel wiring fault.
    #[error("panel transfer failed: {0:?}")]
    Panel(DisplayError),
}

impl From<DisplayError> for IngestError {
    fn from(e: DisplayError) -> Self {
        IngestError::Panel(e)
    }
}

/// State of one chunked transfer, owned by the device context between
/// requests.
pub struct TransferSession {
    received: usize,
    sink: Option<File>,
    save_name: Option<String>,
}

impl TransferSession {
    /// Bytes accepted so far.
    pub fn received(&self) -> usize {
        self.received
    }
}

/// Lenient ASCII-hex decode: two digits per byte, case-insensitive,
/// anything that is not a hex digit counts as zero. An odd trailing
/// digit becomes the high nibble of a final byte.
pub(crate) fn decode_hex(hex: &[u8]) -> Vec<u8> {
    fn nibble(b: u8) -> u8 {
        match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => 0,
        }
    }
    hex.chunks(2)
        .map(|pair| nibble(pair[0]) << 4 | pair.get(1).map_or(0, |b| nibble(*b)))
        .collect()
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
    /// Open a chunked transfer: claim the panel, wake it, open the data
    /// transmission, optionally open a persistence entry.
    ///
    /// Rejected with [`IngestError::Busy`] while anything else holds the
    /// panel, including an already-running session, which stays
    /// untouched.
    pub fn start_stream(&mut self, save: Option<&str>) -> Result<(), IngestError> {
        self.acquire()?;

        if let Err(e) = self.epd.init().and_then(|_| self.epd.begin_frame()) {
            self.release();
            return Err(e.into());
        }

        let (sink, save_name) = match save.and_then(|name| self.open_sink(name)) {
            Some((file, name)) => (Some(file), Some(name)),
            None => (None, None),
        };

        info!(
            "transfer started{}",
            save_name.as_deref().map(|n| format!(", saving to {n}")).unwrap_or_default()
        );
        self.session = Some(TransferSession {
            received: 0,
            sink,
            save_name,
        });
        Ok(())
    }

    /// A missing card or an unusable name skips the save; the display
    /// part of the transfer is unaffected.
    fn open_sink(&self, requested: &str) -> Option<(File, String)> {
        let store = self.storage.as_ref()?;
        let name = storage::sanitize_name(requested)?;
        match store.create(&name) {
            Ok(file) => Some((file, name)),
            Err(e) => {
                warn!("cannot create {name}: {e}; continuing without save");
                None
            }
        }
    }

    /// Feed one hex-encoded chunk into the running transfer. Decoded
    /// bytes go to the panel and, when saving, to the persistence entry,
    /// capped at one frame; the overshoot is dropped from both. Returns
    /// the running total.
    pub fn stream_chunk(&mut self, hex: &[u8]) -> Result<usize, IngestError> {
        let Some(session) = self.session.as_mut() else {
            return Err(IngestError::NoSession);
        };

        let mut bytes = decode_hex(hex);
        let room = FRAME_BYTES - session.received;
        if bytes.len() > room {
            debug!("dropping {} bytes past the frame budget", bytes.len() - room);
            bytes.truncate(room);
        }

        self.epd.push_frame(&bytes)?;

        if let Some(sink) = session.sink.as_mut() {
            if let Err(e) = sink.write_all(&bytes) {
                warn!("save aborted mid-transfer: {e}");
                session.sink = None;
            }
        }

        session.received += bytes.len();
        Ok(session.received)
    }

    /// Close the transfer: the persistence entry keeps exactly the
    /// received bytes, then the panel stream alone is padded to a full
    /// frame, refreshed and put back to sleep. The panel is released on
    /// every path out of here.
    pub fn finish_stream(&mut self) -> Result<(), IngestError> {
        let Some(session) = self.session.take() else {
            return Err(IngestError::NoSession);
        };

        if let Some(name) = &session.save_name {
            info!("saved {} bytes to {}", session.received, name);
        }
        info!("transfer complete at {} bytes", session.received);
        drop(session); // closes the sink before any padding

        let result = self.epd.end_frame().and_then(|_| self.epd.sleep());
        self.release();
        result.map_err(IngestError::from)
    }

    /// Single-shot ingest. `total` is the caller-declared body length
    /// and must be exactly one frame; this path never pads, the caller
    /// controls the whole buffer up front. `read` fills buffers like
    /// `std::io::Read::read`.
    ///
    /// Should the producer then under-deliver anyway, the open frame is
    /// still padded, refreshed and slept so neither the panel nor the
    /// busy flag is left wedged, and the failure is reported.
    pub fn display_from<F>(&mut self, total: usize, mut read: F) -> Result<(), IngestError>
    where
        F: FnMut(&mut [u8]) -> std::io::Result<usize>,
    {
        if total != FRAME_BYTES {
            return Err(IngestError::InvalidLength {
                expected: FRAME_BYTES,
                got: total,
            });
        }

        self.acquire()?;
        let result = self.pump_exact(&mut read);
        self.release();
        result
    }

    fn pump_exact(
        &mut self,
        read: &mut dyn FnMut(&mut [u8]) -> std::io::Result<usize>,
    ) -> Result<(), IngestError> {
        self.epd.init()?;
        self.epd.begin_frame()?;

        let mut buf = [0u8; 2048];
        let mut starved = false;
        while self.epd.streamed() < FRAME_BYTES {
            let want = buf.len().min(FRAME_BYTES - self.epd.streamed());
            match read(&mut buf[..want]) {
                Ok(0) => {
                    starved = true;
                    break;
                }
                Ok(n) => {
                    self.epd.push_frame(&buf[..n])?;
                }
                Err(e) => {
                    warn!("body read failed mid-frame: {e}");
                    starved = true;
                    break;
                }
            }
        }

        let got = self.epd.streamed();
        self.epd.end_frame().and_then(|_| self.epd.sleep())?;
        if starved {
            return Err(IngestError::InvalidLength {
                expected: FRAME_BYTES,
                got,
            });
        }
        Ok(())
    }

    /// Single-shot ingest of an in-memory frame; the saved-image path
    /// and the tests use this.
    pub fn display_frame(&mut self, data: &[u8]) -> Result<(), IngestError> {
        if data.len() != FRAME_BYTES {
            return Err(IngestError::InvalidLength {
                expected: FRAME_BYTES,
                got: data.len(),
            });
        }
        let mut offset = 0;
        self.display_from(data.len(), |buf| {
            let n = buf.len().min(data.len() - offset);
            buf[..n].copy_from_slice(&data[offset..offset + n]);
            offset += n;
            Ok(n)
        })
    }

    /// Display a saved image. A file shorter than one frame (see the
    /// module notes on the save asymmetry) is white-padded on the way
    /// to the panel.
    pub fn show_saved(&mut self, name: &str) -> Result<(), IngestError> {
        let file = self
            .storage
            .as_ref()
            .and_then(|store| store.open(name))
            .ok_or(IngestError::NotFound)?;

        self.acquire()?;
        let reader = std::io::BufReader::new(file);
        let result = (|| {
            self.epd.init()?;
            self.epd
                .stream_frame(std::io::Read::bytes(reader).map_while(Result::ok))?;
            self.epd.sleep()
        })();
        self.release();
        result.map_err(IngestError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epd7in3e::cmd::Cmd;
    use crate::epd7in3e::color::WHITE_PAIR;
    use crate::epd7in3e::testbus::{test_epd, BusState, BusyLine, NoDelay, Wire};
    use crate::storage::Storage;
    use core::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type TestDevice = Device<Wire, Wire, Wire, Wire, Wire, BusyLine, NoDelay>;

    fn temp_root() -> PathBuf {
        static SEQ: AtomicUsize = AtomicUsize::new(0);
        let dir = std::env::temp_dir().join(format!(
            "gakubuchi-ingest-{}-{}",
            std::process::id(),
            SEQ.fetch_add(1, Ordering::SeqCst)
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn test_device(storage_root: Option<&PathBuf>) -> (TestDevice, Rc<RefCell<BusState>>) {
        let (epd, bus) = test_epd(0);
        let storage = storage_root.map(|root| Storage::new(root.clone()));
        (Device::new(epd, storage), bus)
    }

    #[test]
    fn hex_decoding_is_case_insensitive() {
        assert_eq!(decode_hex(b"00112233"), vec![0x00, 0x11, 0x22, 0x33]);
        assert_eq!(decode_hex(b"aAbBcC"), vec![0xAA, 0xBB, 0xCC]);
        assert_eq!(decode_hex(b""), Vec::<u8>::new());
    }

    #[test]
    fn non_hex_digits_decode_as_zero() {
        // Garbage digits become 0x0 instead of rejecting the chunk.
        assert_eq!(decode_hex(b"zz"), vec![0x00]);
        assert_eq!(decode_hex(b"4g"), vec![0x40]);
        assert_eq!(decode_hex(b"g4"), vec![0x04]);
        // odd trailing digit fills the high nibble
        assert_eq!(decode_hex(b"abc"), vec![0xAB, 0xC0]);
    }

    #[test]
    fn chunked_transfer_pads_the_panel_and_keeps_the_file_short() {
        let root = temp_root();
        let (mut device, bus) = test_device(Some(&root));

        device.start_stream(Some("My Photo!")).unwrap();
        assert!(device.is_busy());
        assert_eq!(device.stream_chunk(b"00112233").unwrap(), 4);
        device.finish_stream().unwrap();
        assert!(!device.is_busy());

        // the panel got a full frame: 4 real bytes, the rest white
        let bus = bus.borrow();
        let frame = bus.payload_of(Cmd::DATA_START).unwrap();
        assert_eq!(frame.len(), FRAME_BYTES);
        assert_eq!(&frame[..4], &[0x00, 0x11, 0x22, 0x33]);
        assert!(frame[4..].iter().all(|b| *b == WHITE_PAIR));

        // the sanitized entry kept only the received bytes
        let saved = std::fs::read(root.join("MyPhoto.bin")).unwrap();
        assert_eq!(saved, vec![0x00, 0x11, 0x22, 0x33]);

        // refresh and deep sleep closed the cycle
        let codes: Vec<u8> = bus.commands().into_iter().map(|(c, _)| c).collect();
        assert!(codes.ends_with(&[Cmd::DISPLAY_REFRESH, Cmd::DEEP_SLEEP]));
    }

    #[test]
    fn starting_while_busy_leaves_the_running_session_alone() {
        let (mut device, _) = test_device(None);

        device.start_stream(None).unwrap();
        device.stream_chunk(b"00112233").unwrap();

        assert!(matches!(device.start_stream(None), Err(IngestError::Busy)));
        assert_eq!(device.session.as_ref().unwrap().received(), 4);

        // the rejected start did not corrupt the transfer
        assert_eq!(device.stream_chunk(b"44").unwrap(), 5);
        device.finish_stream().unwrap();
    }

    #[test]
    fn chunk_and_end_require_a_session() {
        let (mut device, bus) = test_device(None);
        assert!(matches!(device.stream_chunk(b"00"), Err(IngestError::NoSession)));
        assert!(matches!(device.finish_stream(), Err(IngestError::NoSession)));
        assert!(!device.is_busy());
        assert!(bus.borrow().xfers.is_empty());
    }

    #[test]
    fn bytes_past_the_frame_budget_never_reach_the_wire() {
        let (mut device, bus) = test_device(None);

        device.start_stream(None).unwrap();
        let almost_full = "11".repeat(FRAME_BYTES - 2);
        assert_eq!(
            device.stream_chunk(almost_full.as_bytes()).unwrap(),
            FRAME_BYTES - 2
        );
        // four bytes offered, two fit; the rest is dropped silently
        assert_eq!(device.stream_chunk(b"AABBCCDD").unwrap(), FRAME_BYTES);
        device.finish_stream().unwrap();

        let bus = bus.borrow();
        let frame = bus.payload_of(Cmd::DATA_START).unwrap();
        assert_eq!(frame.len(), FRAME_BYTES);
        assert_eq!(&frame[FRAME_BYTES - 2..], &[0xAA, 0xBB]);
    }

    #[test]
    fn unusable_save_name_means_no_save_not_an_error() {
        let root = temp_root();
        let (mut device, _) = test_device(Some(&root));

        device.start_stream(Some("!!!")).unwrap();
        device.stream_chunk(b"FF").unwrap();
        device.finish_stream().unwrap();

        assert!(std::fs::read_dir(&root).unwrap().next().is_none());
    }

    #[test]
    fn save_is_skipped_without_storage() {
        let (mut device, _) = test_device(None);
        device.start_stream(Some("photo")).unwrap();
        device.stream_chunk(b"FF").unwrap();
        device.finish_stream().unwrap();
    }

    #[test]
    fn single_shot_rejects_a_wrong_length_before_touching_the_wire() {
        let (mut device, bus) = test_device(None);

        let short = vec![0u8; FRAME_BYTES - 1];
        assert!(matches!(
            device.display_frame(&short),
            Err(IngestError::InvalidLength { got, .. }) if got == FRAME_BYTES - 1
        ));
        assert!(bus.borrow().xfers.is_empty());
        assert!(!device.is_busy());
    }

    #[test]
    fn single_shot_streams_one_exact_frame() {
        let (mut device, bus) = test_device(None);

        device.display_frame(&vec![0x23; FRAME_BYTES]).unwrap();
        assert!(!device.is_busy());

        let bus = bus.borrow();
        let frame = bus.payload_of(Cmd::DATA_START).unwrap();
        assert_eq!(frame.len(), FRAME_BYTES);
        assert!(frame.iter().all(|b| *b == 0x23));
        let codes: Vec<u8> = bus.commands().into_iter().map(|(c, _)| c).collect();
        assert!(codes.ends_with(&[Cmd::DATA_START, Cmd::DISPLAY_REFRESH, Cmd::DEEP_SLEEP]));
    }

    #[test]
    fn starved_single_shot_pads_the_panel_and_reports_failure() {
        let (mut device, bus) = test_device(None);

        // declares a full frame, delivers nothing
        let result = device.display_from(FRAME_BYTES, |_| Ok(0));
        assert!(matches!(
            result,
            Err(IngestError::InvalidLength { got: 0, .. })
        ));

        // the panel still saw a complete padded frame and went to sleep
        let bus = bus.borrow();
        let frame = bus.payload_of(Cmd::DATA_START).unwrap();
        assert_eq!(frame.len(), FRAME_BYTES);
        assert!(frame.iter().all(|b| *b == WHITE_PAIR));
        assert!(!device.is_busy());
    }

    #[test]
    fn show_saved_pads_a_short_file() {
        let root = temp_root();
        let (mut device, bus) = test_device(Some(&root));

        std::fs::write(root.join("sunset.bin"), [0x12, 0x34, 0x56]).unwrap();
        device.show_saved("sunset").unwrap();

        let bus = bus.borrow();
        let frame = bus.payload_of(Cmd::DATA_START).unwrap();
        assert_eq!(frame.len(), FRAME_BYTES);
        assert_eq!(&frame[..3], &[0x12, 0x34, 0x56]);
        assert!(frame[3..].iter().all(|b| *b == WHITE_PAIR));
        assert!(!device.is_busy());
    }

    #[test]
    fn show_saved_of_an_unknown_entry_is_not_found() {
        let root = temp_root();
        let (mut device, bus) = test_device(Some(&root));
        assert!(matches!(
            device.show_saved("nothing-here"),
            Err(IngestError::NotFound)
        ));
        assert!(bus.borrow().xfers.is_empty());
        assert!(!device.is_busy());
    }

    #[test]
    fn single_shot_is_rejected_while_a_session_runs() {
        let (mut device, _) = test_device(None);
        device.start_stream(None).unwrap();
        assert!(matches!(
            device.display_frame(&vec![0x11; FRAME_BYTES]),
            Err(IngestError::Busy)
        ));
        assert_eq!(device.session.as_ref().unwrap().received(), 0);
    }
}
