//! RGB status LED on three LEDC PWM channels.
//!
//! Purely a side channel: it never interacts with the panel or the busy
//! flag.

use anyhow::Result;
use esp_idf_svc::hal::ledc::LedcDriver;

/// Clamp request components into the 8-bit channel range.
pub fn clamp_rgb(r: u32, g: u32, b: u32) -> (u8, u8, u8) {
    (r.min(255) as u8, g.min(255) as u8, b.min(255) as u8)
}

pub struct StatusLed<'d> {
    r: LedcDriver<'d>,
    g: LedcDriver<'d>,
    b: LedcDriver<'d>,
    color: (u8, u8, u8),
    lit: bool,
}

impl<'d> StatusLed<'d> {
    /// Takes the three ready-made channel drivers; starts dark.
    pub fn new(r: LedcDriver<'d>, g: LedcDriver<'d>, b: LedcDriver<'d>) -> Result<Self> {
        let mut led = StatusLed {
            r,
            g,
            b,
            color: (255, 255, 255),
            lit: false,
        };
        led.apply()?;
        Ok(led)
    }

    /// Set an arbitrary color (components clamped to 0-255) and light up.
    pub fn set_rgb(&mut self, r: u32, g: u32, b: u32) -> Result<()> {
        self.color = clamp_rgb(r, g, b);
        self.lit = self.color != (0, 0, 0);
        self.apply()
    }

    pub fn on(&mut self) -> Result<()> {
        self.lit = true;
        self.apply()
    }

    pub fn off(&mut self) -> Result<()> {
        self.lit = false;
        self.apply()
    }

    pub fn toggle(&mut self) -> Result<()> {
        self.lit = !self.lit;
        self.apply()
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    fn apply(&mut self) -> Result<()> {
        let (r, g, b) = if self.lit { self.color } else { (0, 0, 0) };
        set_channel(&mut self.r, r)?;
        set_channel(&mut self.g, g)?;
        set_channel(&mut self.b, b)?;
        Ok(())
    }
}

fn set_channel(channel: &mut LedcDriver<'_>, value: u8) -> Result<()> {
    let max = channel.get_max_duty();
    channel.set_duty(max * u32::from(value) / 255)?;
    Ok(())
}
