use core::convert::Infallible;

use embedded_hal::{delay::DelayNs, digital::{ErrorType, InputPin, OutputPin, PinState}};
use log::trace;

use crate::cable::Cable;

/// Which output carries the shifted value.
#[derive(Clone, Copy, Debug)]
enum Line {
    Tms,
    Tdi,
}

/// Bit-banged JTAG on five GPIO pins, plus an optional shift timing marker.  Pins have to be
/// infallible, which is what MCU HALs provide for on-chip GPIO.
///
/// The bit loop relies on `critical_section::with`, so the firmware has to link in a
/// critical-section implementation (`cortex-m` has one for single core parts).
pub struct Gpio<Tck, Tms, Tdi, Tdo, Trst, Delay, Marker = Unmarked>
where
    Tck: OutputPin<Error = Infallible>,
    Tms: OutputPin<Error = Infallible>,
    Tdi: OutputPin<Error = Infallible>,
    Tdo: InputPin<Error = Infallible>,
    Trst: OutputPin<Error = Infallible>,
    Delay: DelayNs,
    Marker: OutputPin<Error = Infallible>,
{
    half_period: u32,
    delay: Delay,
    clock: Tck,
    tms: Tms,
    tdi: Tdi,
    tdo: Tdo,
    trst: Trst,
    marker: Marker,
}

/// Stand-in for the shift timing marker when no pin is spare for it.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unmarked;

impl ErrorType for Unmarked {
    type Error = Infallible;
}

impl OutputPin for Unmarked {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl<Tck, Tms, Tdi, Tdo, Trst, Delay> Gpio<Tck, Tms, Tdi, Tdo, Trst, Delay>
where
    Tck: OutputPin<Error = Infallible>,
    Tms: OutputPin<Error = Infallible>,
    Tdi: OutputPin<Error = Infallible>,
    Tdo: InputPin<Error = Infallible>,
    Trst: OutputPin<Error = Infallible>,
    Delay: DelayNs,
{
    /// Take ownership of the JTAG pins.  TCK idles low and nTRST is released.
    pub fn new(freq_khz: u32, mut clock: Tck, tms: Tms, tdi: Tdi, tdo: Tdo, mut trst: Trst, delay: Delay) -> Self {
        let period_ns = 1_000_000 / freq_khz.max(1);
        let half_period = period_ns / 2;
        let Ok(()) = clock.set_low();
        let Ok(()) = trst.set_high();
        Gpio { half_period, delay, clock, tms, tdi, tdo, trst, marker: Unmarked }
    }
}

impl<Tck, Tms, Tdi, Tdo, Trst, Delay, Marker> Gpio<Tck, Tms, Tdi, Tdo, Trst, Delay, Marker>
where
    Tck: OutputPin<Error = Infallible>,
    Tms: OutputPin<Error = Infallible>,
    Tdi: OutputPin<Error = Infallible>,
    Tdo: InputPin<Error = Infallible>,
    Trst: OutputPin<Error = Infallible>,
    Delay: DelayNs,
    Marker: OutputPin<Error = Infallible>,
{
    /// Swap the shift timing marker for `marker`.  It is high for as long as each shift takes,
    /// which makes the time spent bit-banging visible on a scope.
    pub fn with_marker<M>(self, mut marker: M) -> Gpio<Tck, Tms, Tdi, Tdo, Trst, Delay, M>
    where
        M: OutputPin<Error = Infallible>,
    {
        let Ok(()) = marker.set_low();
        let Gpio { half_period, delay, clock, tms, tdi, tdo, trst, marker: _ } = self;
        Gpio { half_period, delay, clock, tms, tdi, tdo, trst, marker }
    }

    /// Duration of each TCK phase in nanoseconds.
    pub fn half_period_ns(&self) -> u32 {
        self.half_period
    }

    /// Give the pins back.
    pub fn release(self) -> (Tck, Tms, Tdi, Tdo, Trst, Delay, Marker) {
        (self.clock, self.tms, self.tdi, self.tdo, self.trst, self.delay, self.marker)
    }

    /// Clock `bit_count` bits of `write_value` out on `line`, sampling TDO on every rising edge.
    /// The other output is parked low.  The whole loop runs with interrupts masked so every TCK
    /// phase has the same length.
    fn shift(&mut self, line: Line, bit_count: u32, mut write_value: u32, trst: PinState) -> u32 {
        let bit_count = bit_count.min(32);
        let mut read_value: u32 = 0;

        let Ok(()) = self.marker.set_high();
        critical_section::with(|_| {
            let Ok(()) = self.trst.set_state(trst);
            let Ok(()) = match line {
                Line::Tms => self.tdi.set_low(),
                Line::Tdi => self.tms.set_low(),
            };

            for _ in 0..bit_count {
                // Low phase: present the next bit
                let bit = PinState::from(write_value & 1 == 1);
                write_value >>= 1;
                let Ok(()) = match line {
                    Line::Tms => self.tms.set_state(bit),
                    Line::Tdi => self.tdi.set_state(bit),
                };
                self.delay.delay_ns(self.half_period);

                // High phase: the target latches on this edge, TDO is stable until the falling one
                let Ok(()) = self.clock.set_high();
                let Ok(tdo) = self.tdo.is_high();
                read_value = (read_value >> 1) | ((tdo as u32) << 31);
                self.delay.delay_ns(self.half_period);
                let Ok(()) = self.clock.set_low();
            }

            let Ok(()) = self.trst.set_high();
        });
        let Ok(()) = self.marker.set_low();

        // Bits came in from the top, move them down
        read_value.checked_shr(32 - bit_count).unwrap_or(0)
    }
}

impl<Tck, Tms, Tdi, Tdo, Trst, Delay, Marker> Cable for Gpio<Tck, Tms, Tdi, Tdo, Trst, Delay, Marker>
where
    Tck: OutputPin<Error = Infallible>,
    Tms: OutputPin<Error = Infallible>,
    Tdi: OutputPin<Error = Infallible>,
    Tdo: InputPin<Error = Infallible>,
    Trst: OutputPin<Error = Infallible>,
    Delay: DelayNs,
    Marker: OutputPin<Error = Infallible>,
{
    fn shift_tms(&mut self, bit_count: u32, pattern: u32) {
        self.shift(Line::Tms, bit_count, pattern, PinState::High);
    }

    fn shift_data(&mut self, bit_count: u32, write_value: u32) -> u32 {
        let read_value = self.shift(Line::Tdi, bit_count, write_value, PinState::High);
        trace!("shifted {} bits: out {:#010x} in {:#010x}", bit_count, write_value, read_value);
        read_value
    }

    fn drive_reset(&mut self, bit_count: u32) {
        self.shift(Line::Tms, bit_count, u32::MAX, PinState::Low);
    }
}
