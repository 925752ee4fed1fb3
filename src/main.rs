#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    app::run()
}

// The binary is only meaningful on the chip; building the workspace on a
// host still needs an entry point.
#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!("gakubuchi is device firmware; build it for the espidf target");
}

#[cfg(target_os = "espidf")]
mod app {
    use std::sync::{Arc, Mutex};

    use anyhow::{Context, Result};
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::delay::{Delay, FreeRtos};
    use esp_idf_svc::hal::gpio::PinDriver;
    use esp_idf_svc::hal::ledc::{config::TimerConfig, LedcDriver, LedcTimerDriver};
    use esp_idf_svc::hal::peripherals::Peripherals;
    use esp_idf_svc::hal::prelude::*;
    use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs};
    use log::{info, warn};

    use gakubuchi::config;
    use gakubuchi::device::{Device, NetMode};
    use gakubuchi::epd7in3e::driver::Epd7in3e;
    use gakubuchi::epd7in3e::graphics::StatusScreen;
    use gakubuchi::epd7in3e::interface::DisplayInterface;
    use gakubuchi::http;
    use gakubuchi::led::StatusLed;
    use gakubuchi::storage;
    use gakubuchi::wifi::{self, WifiManager};

    // https://docs.esp-rs.org/esp-idf-svc/esp_idf_svc/
    pub fn run() -> Result<()> {
        // It is necessary to call this function once. Otherwise some patches to the runtime
        // implemented by esp-idf-sys might not link properly. See https://github.com/esp-rs/esp-idf-template/issues/71
        esp_idf_svc::sys::link_patches();

        // Bind the log crate to the ESP Logging facilities
        esp_idf_svc::log::EspLogger::initialize_default();

        let peripherals = Peripherals::take().context("could not take peripherals")?;
        let pins = peripherals.pins;
        let sys_loop = EspSystemEventLoop::take()?;
        let nvs_partition = EspDefaultNvsPartition::take()?;
        let mut nvs = EspNvs::new(nvs_partition.clone(), config::NVS_NAMESPACE, true)?;

        // Panel bus, bit-banged over plain GPIOs (see epd7in3e::pins)
        info!("wiring panel bus");
        let interface = DisplayInterface::new(
            PinDriver::output(pins.gpio13.downgrade_output())?, // Pins::CLK
            PinDriver::output(pins.gpio14.downgrade_output())?, // Pins::DIN
            PinDriver::output(pins.gpio15.downgrade_output())?, // Pins::CS
            PinDriver::output(pins.gpio27.downgrade_output())?, // Pins::DC
            PinDriver::output(pins.gpio26.downgrade_output())?, // Pins::RST
            PinDriver::input(pins.gpio25.downgrade_input())?,   // Pins::BSY
            Delay::default(),
            config::bus_config(),
        );
        let epd = Epd7in3e::new(interface);

        // SD card is optional; without it the frame just cannot save.
        // https://github.com/esp-rs/esp-idf-svc/blob/master/examples/sd_spi.rs
        let (storage, _sd_mount) = match storage::mount_sdcard(
            peripherals.spi3,
            pins.gpio18.downgrade(), // Pins::SD_CLK
            pins.gpio23.downgrade(), // Pins::SD_MOSI
            pins.gpio19.downgrade(), // Pins::SD_MISO
            pins.gpio5.downgrade(),  // Pins::SD_CS
        ) {
            Ok((storage, mount)) => (Some(storage), Some(mount)),
            Err(e) => {
                warn!("SD card unavailable: {e}");
                (None, None)
            }
        };

        // RGB status LED on LEDC PWM
        let ledc_timer = Arc::new(LedcTimerDriver::new(
            peripherals.ledc.timer0,
            &TimerConfig::default().frequency(25.kHz().into()),
        )?);
        let led = StatusLed::new(
            LedcDriver::new(peripherals.ledc.channel0, ledc_timer.clone(), pins.gpio4)?, // Pins::LED_R
            LedcDriver::new(peripherals.ledc.channel1, ledc_timer.clone(), pins.gpio16)?, // Pins::LED_G
            LedcDriver::new(peripherals.ledc.channel2, ledc_timer.clone(), pins.gpio17)?, // Pins::LED_B
        )?;

        let mut device = Device::new(epd, storage);

        // Stored credentials -> station; anything else -> setup AP.
        let mut wifi = WifiManager::new(peripherals.modem, sys_loop, nvs_partition)?;
        let joined = match wifi::load_credentials(&nvs) {
            Some(creds) => match wifi.connect(&creds) {
                Ok(ip) => Some(NetMode::Station {
                    ssid: creds.ssid,
                    ip,
                }),
                Err(e) => {
                    warn!("join failed: {e}");
                    None
                }
            },
            None => {
                info!("no stored credentials");
                None
            }
        };
        let net = match joined {
            Some(mode) => mode,
            None => NetMode::AccessPoint {
                ssid: config::SETUP_AP_SSID.to_string(),
                ip: wifi.start_access_point()?,
            },
        };

        // Boot screen policy: an unchanged address means the panel
        // already shows something sensible; skip the refresh and spare
        // the panel the wear.
        match &net {
            NetMode::Station { ssid, ip } => {
                if wifi::load_last_ip(&nvs).as_deref() == Some(ip.as_str()) {
                    info!("address unchanged since last boot, leaving panel untouched");
                } else {
                    let screen = StatusScreen::new([
                        "GAKUBUCHI",
                        &format!("Connected to: {ssid}"),
                        &format!("http://{ip}/"),
                        "",
                    ]);
                    if let Err(e) = device.show_screen(&screen) {
                        warn!("boot screen failed: {e}");
                    }
                    wifi::store_last_ip(&mut nvs, ip)?;
                }
            }
            NetMode::AccessPoint { ssid, ip } => {
                let screen = StatusScreen::new([
                    "SETUP MODE",
                    &format!("Join WiFi network: {ssid}"),
                    &format!("Open http://{ip}/"),
                    "Setup: POST /wifi",
                ]);
                if let Err(e) = device.show_screen(&screen) {
                    warn!("setup screen failed: {e}");
                }
            }
        }
        device.net = Some(net);

        let device = Arc::new(Mutex::new(device));
        let led = Arc::new(Mutex::new(led));
        let nvs = Arc::new(Mutex::new(nvs));
        let _server = http::serve(device, led, nvs)?;
        info!("ready");

        loop {
            FreeRtos::delay_ms(1000);
        }
    }
}
