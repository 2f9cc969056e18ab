//! Decoding of the host command stream.
//!
//! A request is a sequence of 32-bit words.  Each command starts with a word whose low byte is
//! the opcode, followed by the command's arguments.  Opcode 0 ends the stream, and a request
//! that runs out of words ends as if a 0 followed it.  Responses are appended word by word, with
//! no framing, in the order the commands produce them.
//!
//! Opcodes 1 to 10 are simple commands.  Every opcode whose low nibble is `opcode::SCAN` is a
//! scan, with the high nibble carrying independent flags:
//!
//! | bit | clear                  | set                        |
//! |-----|------------------------|----------------------------|
//! | 4   | write only             | write and read back        |
//! | 5   | instruction register   | data register              |
//! | 6   | global opcode length   | length word in the stream  |
//! | 7   | up to 32 bits          | more than 32 bits          |
//!
//! Scans longer than 32 bits are not implemented, so opcodes with bit 7 set are unassigned.
//! A command that fails, whether its opcode is unassigned or its arguments are bad, is skipped:
//! its words stay consumed and processing carries on with the next word.  Nothing is written to
//! the response for it.  The failure shows up only through `Dispatcher::last_failure` and the
//! log.
use core::ops::DerefMut;

use log::{debug, warn};

use crate::cable::Cable;
use crate::commands::Probe;
use crate::error::Error;
use crate::statemachine::Register;

pub mod opcode {
    pub const STOP: u8 = 0;
    pub const PING: u8 = 1;
    pub const RESET: u8 = 2;
    /// Reserved, no handler.
    pub const SET_LED: u8 = 3;
    /// Reserved, no handler.
    pub const SET_TCK: u8 = 4;
    /// Reserved, no handler.
    pub const GET_TCK: u8 = 5;
    pub const STATE_MOVE: u8 = 6;
    pub const PATH_MOVE: u8 = 7;
    pub const RUN_TEST: u8 = 8;
    pub const SET_IR_OPCODE_LEN: u8 = 9;
    pub const SET_DR_OPCODE_LEN: u8 = 10;
    pub const SCAN: u8 = 11;

    pub const SCAN_READ_WRITE: u8 = 1 << 4;
    pub const SCAN_DR: u8 = 1 << 5;
    pub const SCAN_LEN_IN_STREAM: u8 = 1 << 6;
    pub const SCAN_OVER_32: u8 = 1 << 7;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Write,
    ReadWrite,
}

/// Where a scan takes its bit count from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LengthSource {
    Global,
    Stream,
}

/// Where a scan goes once the bits are shifted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndState {
    /// The state last set with the state move command.
    Default,
    /// A state id word following the other arguments.
    Stream,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanVariant {
    pub register: Register,
    pub access: Access,
    pub length: LengthSource,
    pub end_state: EndState,
}

impl ScanVariant {
    /// Decode a scan opcode.  Scans picked by opcode always finish in the default end state.
    pub const fn decode(opcode: u8) -> Result<ScanVariant, Error> {
        if opcode & 0x0f != opcode::SCAN {
            return Err(Error::UnassignedOpcode(opcode));
        }
        if opcode & opcode::SCAN_OVER_32 != 0 {
            return Err(Error::UnsupportedScanWidth(opcode));
        }

        let access = if opcode & opcode::SCAN_READ_WRITE != 0 { Access::ReadWrite } else { Access::Write };
        let register = if opcode & opcode::SCAN_DR != 0 { Register::Data } else { Register::Instruction };
        let length = if opcode & opcode::SCAN_LEN_IN_STREAM != 0 { LengthSource::Stream } else { LengthSource::Global };

        Ok(ScanVariant { register, access, length, end_state: EndState::Default })
    }

    /// The opcode that selects this variant.  The end state is not part of the encoding.
    pub const fn opcode(&self) -> u8 {
        let mut opcode = opcode::SCAN;
        if let Access::ReadWrite = self.access {
            opcode |= opcode::SCAN_READ_WRITE;
        }
        if let Register::Data = self.register {
            opcode |= opcode::SCAN_DR;
        }
        if let LengthSource::Stream = self.length {
            opcode |= opcode::SCAN_LEN_IN_STREAM;
        }
        opcode
    }
}

/// What an opcode does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Ping,
    Reset,
    StateMove,
    PathMove,
    RunTest,
    SetIrOpcodeLen,
    SetDrOpcodeLen,
    Scan(ScanVariant),
    Failure,
}

const ASSIGNED: [(u8, Command); 7] = [
    (opcode::PING, Command::Ping),
    (opcode::RESET, Command::Reset),
    (opcode::STATE_MOVE, Command::StateMove),
    (opcode::PATH_MOVE, Command::PathMove),
    (opcode::RUN_TEST, Command::RunTest),
    (opcode::SET_IR_OPCODE_LEN, Command::SetIrOpcodeLen),
    (opcode::SET_DR_OPCODE_LEN, Command::SetDrOpcodeLen),
];

/// Maps each of the 256 opcodes to a command.  Anything not assigned is `Command::Failure`.
pub struct HandlerTable {
    entries: [Command; 256],
}

impl HandlerTable {
    pub const fn new() -> Self {
        let mut entries = [Command::Failure; 256];

        let mut i = 0;
        while i < ASSIGNED.len() {
            let (opcode, command) = ASSIGNED[i];
            entries[opcode as usize] = command;
            i += 1;
        }

        let mut flags: u8 = 0;
        while flags < 16 {
            let opcode = opcode::SCAN | flags << 4;
            if let Ok(variant) = ScanVariant::decode(opcode) {
                entries[opcode as usize] = Command::Scan(variant);
            }
            flags += 1;
        }

        HandlerTable { entries }
    }

    pub fn lookup(&self, opcode: u8) -> Command {
        self.entries[opcode as usize]
    }
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::new()
    }
}

pub static HANDLERS: HandlerTable = HandlerTable::new();

/// Positions, in words, reached in the request and response buffers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cursors {
    pub request: usize,
    pub response: usize,
}

/// The request being consumed and the response being produced by one `parse_queue` call.
pub struct Stream<'a> {
    request: &'a [u32],
    response: &'a mut [u32],
    cursors: Cursors,
}

impl<'a> Stream<'a> {
    pub fn new(request: &'a [u32], response: &'a mut [u32]) -> Self {
        Self {
            request,
            response,
            cursors: Cursors::default(),
        }
    }

    pub fn cursors(&self) -> Cursors {
        self.cursors
    }

    /// Opcode of the next command.  Past the end of the request this is the implicit stop, which
    /// consumes nothing.
    fn next_opcode(&mut self) -> u8 {
        match self.request.get(self.cursors.request) {
            Some(&word) => {
                self.cursors.request += 1;
                word as u8
            }
            None => opcode::STOP,
        }
    }

    /// Consume one argument word.
    pub fn read(&mut self) -> Result<u32, Error> {
        let position = self.cursors.request;
        let word = *self.request.get(position).ok_or(Error::TruncatedRequest { position })?;
        self.cursors.request += 1;
        Ok(word)
    }

    /// Check that `words` more response words fit.
    pub fn reserve(&self, words: usize) -> Result<(), Error> {
        let position = self.cursors.response;
        if self.response.len() - position < words {
            return Err(Error::ResponseOverflow { position });
        }
        Ok(())
    }

    /// Append one response word.
    pub fn write(&mut self, word: u32) -> Result<(), Error> {
        let position = self.cursors.response;
        let slot = self.response.get_mut(position).ok_or(Error::ResponseOverflow { position })?;
        *slot = word;
        self.cursors.response += 1;
        Ok(())
    }
}

/// Runs request buffers against a `Probe`.
pub struct Dispatcher<T> {
    pub probe: Probe<T>,
    last_failure: Option<Error>,
}

impl<T, U> Dispatcher<T>
    where T: DerefMut<Target=U>,
          U: Cable + ?Sized
{
    pub fn new(probe: Probe<T>) -> Self {
        Self {
            probe,
            last_failure: None,
        }
    }

    /// The most recent command that failed during the previous `parse_queue`, if any.
    pub fn last_failure(&self) -> Option<Error> {
        self.last_failure
    }

    /// Execute every command in `request` up to the terminating opcode, writing results to
    /// `response`.  Returns how far into each buffer processing got; the terminating word counts
    /// as consumed.
    pub fn parse_queue(&mut self, request: &[u32], response: &mut [u32]) -> Cursors {
        let mut stream = Stream::new(request, response);
        self.last_failure = None;

        loop {
            let opcode = stream.next_opcode();
            if opcode == opcode::STOP {
                break;
            }

            let command = HANDLERS.lookup(opcode);
            debug!("opcode {:#04x} at word {}: {:?}", opcode, stream.cursors().request - 1, command);

            if let Err(err) = self.execute(opcode, command, &mut stream) {
                warn!("command skipped, resuming at word {}: {}", stream.cursors().request, err);
                self.last_failure = Some(err);
            }
        }

        stream.cursors()
    }

    fn execute(&mut self, opcode: u8, command: Command, stream: &mut Stream<'_>) -> Result<(), Error> {
        match command {
            Command::Ping => self.probe.ping(stream),
            Command::Reset => self.probe.reset(stream),
            Command::StateMove => self.probe.state_move(stream),
            Command::PathMove => self.probe.path_move(stream),
            Command::RunTest => self.probe.run_test(stream),
            Command::SetIrOpcodeLen => self.probe.set_ir_opcode_len(stream),
            Command::SetDrOpcodeLen => self.probe.set_dr_opcode_len(stream),
            Command::Scan(variant) => self.probe.scan(variant, stream),
            Command::Failure => Err(failure(opcode)),
        }
    }
}

fn failure(opcode: u8) -> Error {
    match ScanVariant::decode(opcode) {
        Err(err) => err,
        Ok(_) => Error::UnassignedOpcode(opcode),
    }
}
