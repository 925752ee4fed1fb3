//! Recorded pins for host tests: a logic-analyzer stand-in that decodes
//! the bit-banged wire traffic back into command/data transactions.

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use super::interface::{BusConfig, DisplayInterface};

/// One byte recovered from the wire, tagged by the DC line level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Xfer {
    Cmd(u8),
    Data(u8),
}

/// Shared wire state. Bits are latched on rising clock edges while chip
/// select is asserted, exactly as the panel would latch them.
pub struct BusState {
    clk: bool,
    din: bool,
    cs: bool,
    dc: bool,
    rst: bool,
    bits: u8,
    shift: u8,
    pub xfers: Vec<Xfer>,
    /// Number of reset pulses (high-to-low transitions on RST).
    pub resets: usize,
}

impl Default for BusState {
    fn default() -> Self {
        BusState {
            clk: false,
            din: false,
            cs: true, // deselected
            dc: false,
            rst: true,
            bits: 0,
            shift: 0,
            xfers: Vec::new(),
            resets: 0,
        }
    }
}

impl BusState {
    fn set(&mut self, line: Line, level: bool) {
        match line {
            Line::Clk => {
                let rising = level && !self.clk;
                self.clk = level;
                if rising && !self.cs {
                    self.shift = (self.shift << 1) | u8::from(self.din);
                    self.bits += 1;
                    if self.bits == 8 {
                        let xfer = if self.dc {
                            Xfer::Data(self.shift)
                        } else {
                            Xfer::Cmd(self.shift)
                        };
                        self.xfers.push(xfer);
                        self.bits = 0;
                        self.shift = 0;
                    }
                }
            }
            Line::Din => self.din = level,
            Line::Cs => {
                self.cs = level;
                if level {
                    // deselect discards any partial byte
                    self.bits = 0;
                    self.shift = 0;
                }
            }
            Line::Dc => self.dc = level,
            Line::Rst => {
                if self.rst && !level {
                    self.resets += 1;
                }
                self.rst = level;
            }
        }
    }

    /// Group the recorded transfers into (command, payload) runs.
    pub fn commands(&self) -> Vec<(u8, Vec<u8>)> {
        let mut out: Vec<(u8, Vec<u8>)> = Vec::new();
        for xfer in &self.xfers {
            match *xfer {
                Xfer::Cmd(code) => out.push((code, Vec::new())),
                Xfer::Data(byte) => {
                    if let Some(last) = out.last_mut() {
                        last.1.push(byte);
                    }
                }
            }
        }
        out
    }

    /// Payload of the first occurrence of `code`.
    pub fn payload_of(&self, code: u8) -> Option<Vec<u8>> {
        self.commands().into_iter().find(|(c, _)| *c == code).map(|(_, p)| p)
    }
}

#[derive(Clone, Copy, Debug)]
pub enum Line {
    Clk,
    Din,
    Cs,
    Dc,
    Rst,
}

/// One driven line of the shared bus.
pub struct Wire {
    pub line: Line,
    pub bus: Rc<RefCell<BusState>>,
}

impl ErrorType for Wire {
    type Error = Infallible;
}

impl OutputPin for Wire {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.bus.borrow_mut().set(self.line, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.bus.borrow_mut().set(self.line, true);
        Ok(())
    }
}

/// Busy input that reports ready after a fixed number of polls.
pub struct BusyLine {
    ready_after: u32,
    polls: Rc<Cell<u32>>,
}

impl BusyLine {
    pub fn ready_after(polls: u32) -> Self {
        BusyLine {
            ready_after: polls,
            polls: Rc::new(Cell::new(0)),
        }
    }

    pub fn never_ready() -> Self {
        Self::ready_after(u32::MAX)
    }

    /// Shared poll counter, for asserting on wait behavior.
    pub fn counter(&self) -> Rc<Cell<u32>> {
        self.polls.clone()
    }
}

impl ErrorType for BusyLine {
    type Error = Infallible;
}

impl InputPin for BusyLine {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        self.polls.set(self.polls.get() + 1);
        Ok(self.polls.get() > self.ready_after)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.is_high()?)
    }
}

/// Delay provider that spends no wall-clock time.
#[derive(Default)]
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

pub type TestInterface = DisplayInterface<Wire, Wire, Wire, Wire, Wire, BusyLine, NoDelay>;

pub type TestEpd = super::driver::Epd7in3e<Wire, Wire, Wire, Wire, Wire, BusyLine, NoDelay>;

/// Driver on a fresh recorded bus.
pub fn test_epd(busy_ready_after: u32) -> (TestEpd, Rc<RefCell<BusState>>) {
    let (iface, bus) = test_interface(busy_ready_after);
    (super::driver::Epd7in3e::new(iface), bus)
}

/// Interface wired to a fresh recorded bus, with test-sized timeouts.
/// The busy line reports ready after `busy_ready_after` polls.
pub fn test_interface(busy_ready_after: u32) -> (TestInterface, Rc<RefCell<BusState>>) {
    let bus = Rc::new(RefCell::new(BusState::default()));
    let wire = |line| Wire {
        line,
        bus: bus.clone(),
    };
    let iface = DisplayInterface::new(
        wire(Line::Clk),
        wire(Line::Din),
        wire(Line::Cs),
        wire(Line::Dc),
        wire(Line::Rst),
        BusyLine::ready_after(busy_ready_after),
        NoDelay,
        BusConfig {
            settle_us: 0,
            busy_timeout_ms: 50,
            busy_poll_ms: 1,
        },
    );
    (iface, bus)
}
