//! Pin assignments for the panel and the other board peripherals.
//!
//! The panel mapping matches the stock wiring of the ESP32 e-paper
//! driver board; `main.rs` references these when claiming GPIOs.

/// GPIO assignment table.
pub struct Pins;

#[allow(dead_code)]
impl Pins {
    // Panel bus (bit-banged, write-only)
    /// Serial clock
    pub const CLK: u8 = 13;
    /// Serial data into the panel
    pub const DIN: u8 = 14;
    /// Chip select, active low, asserted per byte
    pub const CS: u8 = 15;
    /// Data/command select (high for data, low for command)
    pub const DC: u8 = 27;
    /// Panel reset, active low
    pub const RST: u8 = 26;
    /// Busy status input (low while the controller is working)
    pub const BSY: u8 = 25;

    // SD card (hardware SPI)
    /// SD clock
    pub const SD_CLK: u8 = 18;
    /// SD Master Out Slave In
    pub const SD_MOSI: u8 = 23;
    /// SD Master In Slave Out
    pub const SD_MISO: u8 = 19;
    /// SD chip select
    pub const SD_CS: u8 = 5;

    // RGB status LED (LEDC PWM)
    /// Red channel
    pub const LED_R: u8 = 4;
    /// Green channel
    pub const LED_G: u8 = 16;
    /// Blue channel
    pub const LED_B: u8 = 17;
}
