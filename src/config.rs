//! Device configuration: every tunable in one place.

use crate::epd7in3e::interface::BusConfig;

/// SSID announced when no credentials are stored or the join fails.
pub const SETUP_AP_SSID: &str = "gakubuchi-setup";

/// NVS namespace holding device settings.
pub const NVS_NAMESPACE: &str = "gakubuchi";
/// NVS keys: WiFi credentials and the address seen on the last boot.
pub const NVS_KEY_SSID: &str = "ssid";
pub const NVS_KEY_PASS: &str = "pass";
pub const NVS_KEY_LAST_IP: &str = "last_ip";

/// Where the SD card lands in the VFS.
pub const SD_MOUNT_PATH: &str = "/sdcard";
pub const SD_MAX_OPEN_FILES: usize = 4;

/// HTTP handler stack: handlers stream whole frames through 2 KiB
/// buffers, the default stack is too tight for that.
pub const HTTP_STACK_SIZE: usize = 10_240;

/// Panel bus timing and busy-wait policy. The 30 s deadline covers the
/// slowest full-color refresh with margin; expiry degrades to a warning
/// so an unplugged panel cannot wedge the device.
pub fn bus_config() -> BusConfig {
    BusConfig {
        settle_us: 1,
        busy_timeout_ms: 30_000,
        busy_poll_ms: 10,
    }
}
