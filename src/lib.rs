//! gakubuchi: WiFi picture frame firmware for a 7.3" six-color e-paper
//! panel.
//!
//! A remote host renders and dithers images, then pushes the
//! panel-native packed frames over the HTTP API: either as one raw
//! body or as a hex-encoded chunk stream, optionally saved to the SD
//! card for later redisplay.
//!
//! The panel stack (`epd7in3e`), the ingest state machine (`ingest`)
//! and the device context (`device`) are generic over `embedded-hal`
//! traits and carry their own tests; the thin hardware adapters below
//! them only build for the chip.

pub mod config;
pub mod device;
pub mod epd7in3e;
pub mod ingest;
pub mod storage;

// Hardware adapters; only meaningful on the chip.
#[cfg(target_os = "espidf")]
pub mod http;
#[cfg(target_os = "espidf")]
pub mod led;
#[cfg(target_os = "espidf")]
pub mod wifi;
