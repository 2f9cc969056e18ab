//! Firmware core of a bit-banging JTAG probe.  It drives a target's TAP over GPIO and lets a
//! host control that through a compact stream of 32-bit command words.
//!
//! At the lowest level is the `Cable` trait, the shift engine that clocks bits out on TMS or
//! TDI and samples TDO.  `cable::gpio::Gpio` implements it on embedded-hal pins, with the
//! whole bit loop in a critical section so the TCK duty cycle does not jitter.
//!
//! Above that, `TapStateMachine` keeps track of the state of the TAP.  You tell it which state
//! you want and it gets there with the fewest clocks, using a precomputed transition table.
//! Nothing is read back from the target: the tracked state is trusted.
//!
//! A `Probe` holds the state machine together with the settings the host can change (default
//! end state, instruction and data register lengths) and implements each host command.  The
//! `Dispatcher` decodes a request buffer into those commands and fills the response buffer.
//!
//! # Example
//! ```no_run
//! use tapbang::{Dispatcher, Probe};
//! use tapbang::dispatch::opcode;
//! # fn pins() -> tapbang::cable::gpio::Gpio<Pin, Pin, Pin, Pin, Pin, NoDelay> { unimplemented!() }
//! # struct Pin;
//! # impl embedded_hal::digital::ErrorType for Pin { type Error = core::convert::Infallible; }
//! # impl embedded_hal::digital::OutputPin for Pin {
//! #     fn set_low(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! #     fn set_high(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # impl embedded_hal::digital::InputPin for Pin {
//! #     fn is_high(&mut self) -> Result<bool, Self::Error> { Ok(false) }
//! #     fn is_low(&mut self) -> Result<bool, Self::Error> { Ok(true) }
//! # }
//! # struct NoDelay;
//! # impl embedded_hal::delay::DelayNs for NoDelay { fn delay_ns(&mut self, _: u32) {} }
//! # struct SingleCore;
//! # critical_section::set_impl!(SingleCore);
//! # unsafe impl critical_section::Impl for SingleCore {
//! #     unsafe fn acquire() -> critical_section::RawRestoreState {}
//! #     unsafe fn release(_: critical_section::RawRestoreState) {}
//! # }
//! let mut cable = pins();
//! let mut dispatcher = Dispatcher::new(Probe::new(&mut cable));
//!
//! // Read a 32-bit IDCODE out of the data register after reset
//! let request = [opcode::PING as u32, 0x3b, 0, 0];
//! let mut response = [0u32; 4];
//! let cursors = dispatcher.parse_queue(&request, &mut response);
//! assert_eq!(cursors.response, 2);
//! ```

#![no_std]

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod cable;
pub mod commands;
pub mod dispatch;
pub mod error;
pub mod statemachine;

pub use commands::{Probe, ProtocolState, FIRMWARE_VERSION};
pub use dispatch::{Cursors, Dispatcher};
pub use error::Error;
pub use statemachine::{TapState, TapStateMachine};
