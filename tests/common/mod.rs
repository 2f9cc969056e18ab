//! A simulated target for the integration tests: a TAP controller wired to fake embedded-hal
//! pins, reacting to TCK edges the way a real device does.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use tapbang::cable::gpio::Gpio;
use tapbang::TapState;

pub const IDCODE: u32 = 0x4ba0_0477;
pub const IR_CAPTURE: u32 = 0b0001;
pub const TCK_KHZ: u32 = 1000;

// Each test runs on its own thread with its own simulated target, so the critical section is
// tracked per thread.
thread_local! {
    static SECTION_HELD: Cell<bool> = const { Cell::new(false) };
    static SECTIONS_ENTERED: Cell<u32> = const { Cell::new(0) };
}

/// Counts how often the cable masks interrupts and whether it is doing so right now.
struct CountingSection;
critical_section::set_impl!(CountingSection);

unsafe impl critical_section::Impl for CountingSection {
    unsafe fn acquire() -> critical_section::RawRestoreState {
        assert!(!SECTION_HELD.replace(true), "critical section entered twice");
        SECTIONS_ENTERED.set(SECTIONS_ENTERED.get() + 1);
    }

    unsafe fn release(_: critical_section::RawRestoreState) {
        SECTION_HELD.set(false);
    }
}

pub fn section_held() -> bool {
    SECTION_HELD.get()
}

pub fn sections_entered() -> u32 {
    SECTIONS_ENTERED.get()
}

/// One TCK rising edge as seen by the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    pub state: TapState,
    pub tms: bool,
    pub tdi: bool,
}

pub struct Bus {
    pub state: TapState,
    tck: bool,
    tms: bool,
    tdi: bool,
    trst: bool,
    tdo: bool,
    pub marker: bool,
    shift: u64,
    /// Bits shifted into the register since the last capture.
    pub shifted_in: Vec<bool>,
    /// Rising edges in a shift state with TMS low since the last capture.
    pub data_clocks: u32,
    /// Rising edges seen while nTRST was asserted.
    pub trst_clocks: u32,
    pub edges: Vec<Edge>,
    pub delays: Vec<u32>,
    /// Rising edges of the shift timing marker.
    pub marker_pulses: u32,
    /// TCK rising edges seen while the marker was high.
    pub marked_edges: u32,
}

impl Bus {
    fn new() -> Self {
        Self {
            state: TapState::TestLogicReset,
            tck: false,
            tms: false,
            tdi: false,
            trst: true,
            tdo: false,
            marker: false,
            shift: 0,
            shifted_in: Vec::new(),
            data_clocks: 0,
            trst_clocks: 0,
            edges: Vec::new(),
            delays: Vec::new(),
            marker_pulses: 0,
            marked_edges: 0,
        }
    }

    fn rising_edge(&mut self) {
        self.edges.push(Edge { state: self.state, tms: self.tms, tdi: self.tdi });
        if self.marker {
            self.marked_edges += 1;
        }
        if !self.trst {
            self.trst_clocks += 1;
            self.state = TapState::TestLogicReset;
            return;
        }

        match self.state {
            TapState::CaptureDr | TapState::CaptureIr => {
                self.shift = if self.state == TapState::CaptureDr { IDCODE as u64 } else { IR_CAPTURE as u64 };
                self.shifted_in.clear();
                self.data_clocks = 0;
            }
            TapState::ShiftDr | TapState::ShiftIr => {
                self.shift = (self.shift >> 1) | ((self.tdi as u64) << 63);
                self.shifted_in.push(self.tdi);
                if !self.tms {
                    self.data_clocks += 1;
                }
            }
            _ => {}
        }
        self.state = self.state.next(self.tms);
    }

    fn falling_edge(&mut self) {
        if matches!(self.state, TapState::ShiftDr | TapState::ShiftIr) {
            self.tdo = self.shift & 1 == 1;
        }
    }

    /// The first `count` shifted-in bits as a number, first bit in the LSB.
    pub fn shifted_value(&self, count: usize) -> u32 {
        self.shifted_in
            .iter()
            .take(count)
            .enumerate()
            .fold(0, |value, (i, &bit)| value | (bit as u32) << i)
    }

    pub fn clear_history(&mut self) {
        self.edges.clear();
        self.delays.clear();
    }
}

#[derive(Clone, Copy, Debug)]
enum Line {
    Tck,
    Tms,
    Tdi,
    Tdo,
    Trst,
    Marker,
}

pub struct SimPin {
    bus: Rc<RefCell<Bus>>,
    line: Line,
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl SimPin {
    fn drive(&mut self, level: bool) {
        let mut bus = self.bus.borrow_mut();
        match self.line {
            Line::Tck => {
                let was = bus.tck;
                if was != level {
                    assert!(section_held(), "TCK edge with interrupts enabled");
                }
                bus.tck = level;
                match (was, level) {
                    (false, true) => bus.rising_edge(),
                    (true, false) => bus.falling_edge(),
                    _ => {}
                }
            }
            Line::Tms => bus.tms = level,
            Line::Tdi => bus.tdi = level,
            Line::Trst => {
                bus.trst = level;
                if !level {
                    bus.state = TapState::TestLogicReset;
                }
            }
            Line::Marker => {
                if level && !bus.marker {
                    bus.marker_pulses += 1;
                }
                bus.marker = level;
            }
            Line::Tdo => panic!("TDO is an input"),
        }
    }
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.drive(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.drive(true);
        Ok(())
    }
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.bus.borrow().tdo)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.bus.borrow().tdo)
    }
}

pub struct SimDelay {
    bus: Rc<RefCell<Bus>>,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.bus.borrow_mut().delays.push(ns);
    }
}

pub type SimGpio = Gpio<SimPin, SimPin, SimPin, SimPin, SimPin, SimDelay>;

/// A spare output on the target's bus, for the shift timing marker.
pub fn marker_pin(bus: &Rc<RefCell<Bus>>) -> SimPin {
    SimPin { bus: bus.clone(), line: Line::Marker }
}

/// A fresh target and the GPIO cable wired to it.
pub fn target() -> (Rc<RefCell<Bus>>, SimGpio) {
    let _ = env_logger::builder().is_test(true).try_init();

    let bus = Rc::new(RefCell::new(Bus::new()));
    let pin = |line| SimPin { bus: bus.clone(), line };
    let gpio = Gpio::new(
        TCK_KHZ,
        pin(Line::Tck),
        pin(Line::Tms),
        pin(Line::Tdi),
        pin(Line::Tdo),
        pin(Line::Trst),
        SimDelay { bus: bus.clone() },
    );
    (bus, gpio)
}
