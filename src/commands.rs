//! The commands a host can issue, run against a `Probe` session.
//!
//! Every command reads its arguments from the request stream just past its opcode and appends
//! its results, if any, to the response stream.  Arguments are read and checked before any pin
//! moves, so a command that fails leaves the TAP where it was.
use core::ops::DerefMut;

use log::debug;

use crate::cable::Cable;
use crate::dispatch::{Access, EndState, LengthSource, ScanVariant, Stream};
use crate::error::Error;
use crate::statemachine::{Register, TapState, TapStateMachine};

const fn parse_version(digits: &str) -> u32 {
    let digits = digits.as_bytes();
    let mut value = 0;
    let mut i = 0;
    while i < digits.len() {
        value = value * 10 + (digits[i] - b'0') as u32;
        i += 1;
    }
    value
}

/// Answer to `ping`: `major << 16 | minor << 8 | patch` of this crate's version.
pub const FIRMWARE_VERSION: u32 = parse_version(env!("CARGO_PKG_VERSION_MAJOR")) << 16
    | parse_version(env!("CARGO_PKG_VERSION_MINOR")) << 8
    | parse_version(env!("CARGO_PKG_VERSION_PATCH"));

/// Clocks spent in TMS reset by the `reset` command.
pub const RESET_CLOCKS: u32 = 32;

/// The longest scan that fits in one word.
pub const MAX_OPCODE_LEN: u32 = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetKind {
    Trst,
    Srst,
}

impl From<u32> for ResetKind {
    fn from(word: u32) -> Self {
        match word {
            0 => ResetKind::Trst,
            _ => ResetKind::Srst,
        }
    }
}

/// Settings the host changes with dedicated commands and scans read back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProtocolState {
    /// Where scans finish unless told otherwise.
    pub default_end_state: TapState,
    pub ir_opcode_len: u32,
    pub dr_opcode_len: u32,
}

impl Default for ProtocolState {
    fn default() -> Self {
        Self {
            default_end_state: TapState::RunTestIdle,
            ir_opcode_len: 4,
            dr_opcode_len: 32,
        }
    }
}

fn opcode_len(word: u32) -> Result<u32, Error> {
    if (1..=MAX_OPCODE_LEN).contains(&word) {
        Ok(word)
    } else {
        Err(Error::InvalidOpcodeLength(word))
    }
}

/// One probe session: the TAP being driven and the protocol settings that go with it.
pub struct Probe<T> {
    pub tap: TapStateMachine<T>,
    state: ProtocolState,
}

impl<T, U> Probe<T>
    where T: DerefMut<Target=U>,
          U: Cable + ?Sized
{
    pub fn new(cable: T) -> Self {
        Self {
            tap: TapStateMachine::new(cable),
            state: ProtocolState::default(),
        }
    }

    /// Start a session with settings other than the defaults.  Opcode lengths are checked the
    /// same way the setter commands check them, before the TAP is reset.
    pub fn with_state(cable: T, state: ProtocolState) -> Result<Self, Error> {
        opcode_len(state.ir_opcode_len)?;
        opcode_len(state.dr_opcode_len)?;
        Ok(Self {
            tap: TapStateMachine::new(cable),
            state,
        })
    }

    pub fn state(&self) -> &ProtocolState {
        &self.state
    }

    /// Reply with `FIRMWARE_VERSION`.
    pub fn ping(&mut self, stream: &mut Stream<'_>) -> Result<(), Error> {
        stream.write(FIRMWARE_VERSION)
    }

    /// Reset the target through nTRST while clocking TMS high.  Both kinds currently do the same
    /// thing.  The tracked TAP state is left alone; follow with a path move to resynchronize.
    pub fn reset(&mut self, stream: &mut Stream<'_>) -> Result<(), Error> {
        let kind = ResetKind::from(stream.read()?);
        debug!("{:?} reset", kind);
        self.tap.cable.drive_reset(RESET_CLOCKS);
        Ok(())
    }

    /// Set the state scans finish in.  The TAP does not move.
    pub fn state_move(&mut self, stream: &mut Stream<'_>) -> Result<(), Error> {
        self.state.default_end_state = TapState::try_from(stream.read()?)?;
        Ok(())
    }

    /// Move the TAP to the given state now.
    pub fn path_move(&mut self, stream: &mut Stream<'_>) -> Result<(), Error> {
        let target = TapState::try_from(stream.read()?)?;
        self.tap.move_to(target);
        Ok(())
    }

    /// Clock RunTestIdle the given number of times, entering it first if needed.
    pub fn run_test(&mut self, stream: &mut Stream<'_>) -> Result<(), Error> {
        let count = stream.read()?;
        for _ in 0..count {
            self.tap.move_to(TapState::RunTestIdle);
        }
        Ok(())
    }

    pub fn set_ir_opcode_len(&mut self, stream: &mut Stream<'_>) -> Result<(), Error> {
        self.state.ir_opcode_len = opcode_len(stream.read()?)?;
        Ok(())
    }

    pub fn set_dr_opcode_len(&mut self, stream: &mut Stream<'_>) -> Result<(), Error> {
        self.state.dr_opcode_len = opcode_len(stream.read()?)?;
        Ok(())
    }

    /// Shift a value through the instruction or data register and move to the end state.
    ///
    /// Arguments in the stream are the data word, then the length word when the variant takes
    /// its length from the stream, then the end state id when the variant takes its end state
    /// from the stream.  A read-write scan replies with the captured bits.
    pub fn scan(&mut self, variant: ScanVariant, stream: &mut Stream<'_>) -> Result<(), Error> {
        let data = stream.read()?;

        let length = match (variant.length, variant.register) {
            (LengthSource::Global, Register::Instruction) => self.state.ir_opcode_len,
            (LengthSource::Global, Register::Data) => self.state.dr_opcode_len,
            (LengthSource::Stream, _) => opcode_len(stream.read()?)?,
        };

        let end_state = match variant.end_state {
            EndState::Default => self.state.default_end_state,
            EndState::Stream => TapState::try_from(stream.read()?)?,
        };

        if variant.access == Access::ReadWrite {
            stream.reserve(1)?;
        }

        let captured = self.tap.read_write_reg(variant.register, length, data);
        self.tap.move_to(end_state);
        debug!(
            "scan {:?} {} bits: out {:#x} in {:#x}, now in {:?}",
            variant.register, length, data, captured, end_state
        );

        if variant.access == Access::ReadWrite {
            stream.write(captured)?;
        }
        Ok(())
    }
}
