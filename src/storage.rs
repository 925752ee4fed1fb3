//! SD-backed image store.
//!
//! One flat file per saved frame under the card's mount root, named by
//! the sanitized request name plus the fixed extension. Files hold
//! exactly the bytes the transfer delivered; a short transfer leaves a
//! short file, and the display path white-pads at read-back time.

use std::fs::{self, File};
use std::io;
use std::path::PathBuf;

/// Extension every persisted frame gets.
pub const IMAGE_EXT: &str = "bin";

/// Flat-directory image store rooted at the SD mount point.
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Storage { root: root.into() }
    }

    /// Create (or truncate) an entry. `file_name` must already be a
    /// sanitized name from [`sanitize_name`].
    pub(crate) fn create(&self, file_name: &str) -> io::Result<File> {
        File::create(self.root.join(file_name))
    }

    /// Open an entry by its requested name; `None` for unknown or
    /// unusable names.
    pub fn open(&self, requested: &str) -> Option<File> {
        let name = sanitize_name(requested)?;
        File::open(self.root.join(name)).ok()
    }

    /// Saved entries, scoped to the fixed extension, sorted by name.
    pub fn list(&self) -> Vec<String> {
        let suffix = format!(".{IMAGE_EXT}");
        let mut names: Vec<String> = fs::read_dir(&self.root)
            .into_iter()
            .flatten()
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                name.ends_with(&suffix).then_some(name)
            })
            .collect();
        names.sort();
        names
    }
}

/// `"My Photo!"` becomes `MyPhoto.bin`: everything outside
/// `[A-Za-z0-9_-]` is stripped and the extension is forced. A name with
/// nothing valid left is `None`; callers treat that as "no save
/// requested", not as an error.
pub fn sanitize_name(requested: &str) -> Option<String> {
    let stem = requested
        .strip_suffix(&format!(".{IMAGE_EXT}"))
        .unwrap_or(requested);
    let stem: String = stem
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        .collect();
    (!stem.is_empty()).then(|| format!("{stem}.{IMAGE_EXT}"))
}

#[cfg(target_os = "espidf")]
pub use sd::{mount_sdcard, SdMount};

#[cfg(target_os = "espidf")]
mod sd {
    use super::Storage;
    use crate::config;
    use anyhow::Result;
    use esp_idf_svc::fs::fatfs::Fatfs;
    use esp_idf_svc::hal::gpio::AnyIOPin;
    use esp_idf_svc::hal::peripheral::Peripheral;
    use esp_idf_svc::hal::sd::{spi::SdSpiHostDriver, SdCardConfiguration, SdCardDriver};
    use esp_idf_svc::hal::spi::{SpiAnyPins, SpiDriver, SpiDriverConfig};
    use esp_idf_svc::io::vfs::MountedFatfs;

    /// Keeps the filesystem mounted; drop unmounts.
    pub type SdMount = MountedFatfs<Fatfs<SdCardDriver<SdSpiHostDriver<'static, SpiDriver<'static>>>>>;

    /// Mount the SD card over SPI behind `config::SD_MOUNT_PATH`. Any
    /// failure here just means the device runs without persistence.
    pub fn mount_sdcard<S: SpiAnyPins>(
        spi: impl Peripheral<P = S> + 'static,
        sclk: AnyIOPin,
        mosi: AnyIOPin,
        miso: AnyIOPin,
        cs: AnyIOPin,
    ) -> Result<(Storage, SdMount)> {
        let spi_driver = SpiDriver::new(spi, sclk, mosi, Some(miso), &SpiDriverConfig::default())?;
        let host = SdSpiHostDriver::new(
            spi_driver,
            Some(cs),
            AnyIOPin::none(),
            AnyIOPin::none(),
            AnyIOPin::none(),
            None,
        )?;
        let card = SdCardDriver::new_spi(host, &SdCardConfiguration::new())?;
        let mounted = MountedFatfs::mount(
            Fatfs::new_sdcard(0, card)?,
            config::SD_MOUNT_PATH,
            config::SD_MAX_OPEN_FILES,
        )?;
        log::info!("SD card mounted at {}", config::SD_MOUNT_PATH);
        Ok((Storage::new(config::SD_MOUNT_PATH), mounted))
    }
}
