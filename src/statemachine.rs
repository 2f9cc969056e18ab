//! Tracks the state of the target's TAP controller and moves it around.  `TapStateMachine` gets
//! to any requested state by the shortest TMS sequence, looked up in `TRANSITIONS` based on the
//! current state.
use core::ops::DerefMut;

use log::trace;

use crate::cable::Cable;
use crate::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Register {
    Data,
    Instruction
}

/// The 16 states of the IEEE 1149.1 TAP controller.  The discriminants are the state ids used on
/// the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TapState {
    TestLogicReset = 0,
    RunTestIdle = 1,
    SelectDrScan = 2,
    CaptureDr = 3,
    ShiftDr = 4,
    Exit1Dr = 5,
    PauseDr = 6,
    Exit2Dr = 7,
    UpdateDr = 8,
    SelectIrScan = 9,
    CaptureIr = 10,
    ShiftIr = 11,
    Exit1Ir = 12,
    PauseIr = 13,
    Exit2Ir = 14,
    UpdateIr = 15,
}

impl TapState {
    pub const COUNT: usize = 16;

    pub const ALL: [TapState; Self::COUNT] = [
        TapState::TestLogicReset,
        TapState::RunTestIdle,
        TapState::SelectDrScan,
        TapState::CaptureDr,
        TapState::ShiftDr,
        TapState::Exit1Dr,
        TapState::PauseDr,
        TapState::Exit2Dr,
        TapState::UpdateDr,
        TapState::SelectIrScan,
        TapState::CaptureIr,
        TapState::ShiftIr,
        TapState::Exit1Ir,
        TapState::PauseIr,
        TapState::Exit2Ir,
        TapState::UpdateIr,
    ];

    /// The state the controller enters on the next TCK rising edge for the given TMS level.
    pub const fn next(self, tms: bool) -> TapState {
        use TapState::*;
        match (self, tms) {
            (TestLogicReset, false) => RunTestIdle,
            (TestLogicReset, true) => TestLogicReset,
            (RunTestIdle, false) => RunTestIdle,
            (RunTestIdle, true) => SelectDrScan,

            (SelectDrScan, false) => CaptureDr,
            (SelectDrScan, true) => SelectIrScan,
            (CaptureDr, false) | (ShiftDr, false) | (Exit2Dr, false) => ShiftDr,
            (CaptureDr, true) | (ShiftDr, true) => Exit1Dr,
            (Exit1Dr, false) | (PauseDr, false) => PauseDr,
            (Exit1Dr, true) | (Exit2Dr, true) => UpdateDr,
            (PauseDr, true) => Exit2Dr,
            (UpdateDr, false) => RunTestIdle,
            (UpdateDr, true) => SelectDrScan,

            (SelectIrScan, false) => CaptureIr,
            (SelectIrScan, true) => TestLogicReset,
            (CaptureIr, false) | (ShiftIr, false) | (Exit2Ir, false) => ShiftIr,
            (CaptureIr, true) | (ShiftIr, true) => Exit1Ir,
            (Exit1Ir, false) | (PauseIr, false) => PauseIr,
            (Exit1Ir, true) | (Exit2Ir, true) => UpdateIr,
            (PauseIr, true) => Exit2Ir,
            (UpdateIr, false) => RunTestIdle,
            (UpdateIr, true) => SelectDrScan,
        }
    }
}

impl TryFrom<u32> for TapState {
    type Error = Error;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        TapState::ALL
            .get(id as usize)
            .copied()
            .ok_or(Error::InvalidState(id))
    }
}

/// A TMS sequence: `clocks` TCK cycles, bit *i* of `pattern` driven on cycle *i*.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TmsMove {
    pub clocks: u8,
    pub pattern: u8,
}

const fn mv(clocks: u8, pattern: u8) -> TmsMove {
    TmsMove { clocks, pattern }
}

/// Shortest TMS sequence for every (from, to) pair, indexed `[from][to]`.  A move to the same
/// state is the shortest non-empty cycle back to it, so moving RunTestIdle to RunTestIdle clocks
/// the idle state once.
///
/// Patterns are written MSB..LSB, so read them right to left to follow the clocks.
#[rustfmt::skip]
pub static TRANSITIONS: [[TmsMove; TapState::COUNT]; TapState::COUNT] = [
    //                TLReset          RunTestIdle      SelectDR         CaptureDR        ShiftDR          Exit1DR          PauseDR          Exit2DR              UpdateDR         SelectIR         CaptureIR        ShiftIR          Exit1IR          PauseIR          Exit2IR              UpdateIR
    /* TLReset   */ [mv(1, 0b1),     mv(1, 0b0),      mv(2, 0b10),     mv(3, 0b010),    mv(4, 0b0010),   mv(4, 0b1010),   mv(5, 0b01010),  mv(6, 0b101010),     mv(5, 0b11010),  mv(3, 0b110),    mv(4, 0b0110),   mv(5, 0b00110),  mv(5, 0b10110),  mv(6, 0b010110), mv(7, 0b1010110),    mv(6, 0b110110)],
    /* Idle      */ [mv(3, 0b111),   mv(1, 0b0),      mv(1, 0b1),      mv(2, 0b01),     mv(3, 0b001),    mv(3, 0b101),    mv(4, 0b0101),   mv(5, 0b10101),      mv(4, 0b1101),   mv(2, 0b11),     mv(3, 0b011),    mv(4, 0b0011),   mv(4, 0b1011),   mv(5, 0b01011),  mv(6, 0b101011),     mv(5, 0b11011)],
    /* SelectDR  */ [mv(2, 0b11),    mv(3, 0b011),    mv(4, 0b1011),   mv(1, 0b0),      mv(2, 0b00),     mv(2, 0b10),     mv(3, 0b010),    mv(4, 0b1010),       mv(3, 0b110),    mv(1, 0b1),      mv(2, 0b01),     mv(3, 0b001),    mv(3, 0b101),    mv(4, 0b0101),   mv(5, 0b10101),      mv(4, 0b1101)],
    /* CaptureDR */ [mv(5, 0b11111), mv(3, 0b011),    mv(3, 0b111),    mv(4, 0b0111),   mv(1, 0b0),      mv(1, 0b1),      mv(2, 0b01),     mv(3, 0b101),        mv(2, 0b11),     mv(4, 0b1111),   mv(5, 0b01111),  mv(6, 0b001111), mv(6, 0b101111), mv(7, 0b0101111), mv(8, 0b10101111), mv(7, 0b1101111)],
    /* ShiftDR   */ [mv(5, 0b11111), mv(3, 0b011),    mv(3, 0b111),    mv(4, 0b0111),   mv(1, 0b0),      mv(1, 0b1),      mv(2, 0b01),     mv(3, 0b101),        mv(2, 0b11),     mv(4, 0b1111),   mv(5, 0b01111),  mv(6, 0b001111), mv(6, 0b101111), mv(7, 0b0101111), mv(8, 0b10101111), mv(7, 0b1101111)],
    /* Exit1DR   */ [mv(4, 0b1111),  mv(2, 0b01),     mv(2, 0b11),     mv(3, 0b011),    mv(3, 0b010),    mv(4, 0b1010),   mv(1, 0b0),      mv(2, 0b10),         mv(1, 0b1),      mv(3, 0b111),    mv(4, 0b0111),   mv(5, 0b00111),  mv(5, 0b10111),  mv(6, 0b010111), mv(7, 0b1010111),    mv(6, 0b110111)],
    /* PauseDR   */ [mv(5, 0b11111), mv(3, 0b011),    mv(3, 0b111),    mv(4, 0b0111),   mv(2, 0b01),     mv(3, 0b101),    mv(1, 0b0),      mv(1, 0b1),          mv(2, 0b11),     mv(4, 0b1111),   mv(5, 0b01111),  mv(6, 0b001111), mv(6, 0b101111), mv(7, 0b0101111), mv(8, 0b10101111), mv(7, 0b1101111)],
    /* Exit2DR   */ [mv(4, 0b1111),  mv(2, 0b01),     mv(2, 0b11),     mv(3, 0b011),    mv(1, 0b0),      mv(2, 0b10),     mv(3, 0b010),    mv(4, 0b1010),       mv(1, 0b1),      mv(3, 0b111),    mv(4, 0b0111),   mv(5, 0b00111),  mv(5, 0b10111),  mv(6, 0b010111), mv(7, 0b1010111),    mv(6, 0b110111)],
    /* UpdateDR  */ [mv(3, 0b111),   mv(1, 0b0),      mv(1, 0b1),      mv(2, 0b01),     mv(3, 0b001),    mv(3, 0b101),    mv(4, 0b0101),   mv(5, 0b10101),      mv(4, 0b1101),   mv(2, 0b11),     mv(3, 0b011),    mv(4, 0b0011),   mv(4, 0b1011),   mv(5, 0b01011),  mv(6, 0b101011),     mv(5, 0b11011)],
    /* SelectIR  */ [mv(1, 0b1),     mv(2, 0b01),     mv(3, 0b101),    mv(4, 0b0101),   mv(5, 0b00101),  mv(5, 0b10101),  mv(6, 0b010101), mv(7, 0b1010101),    mv(6, 0b110101), mv(4, 0b1101),   mv(1, 0b0),      mv(2, 0b00),     mv(2, 0b10),     mv(3, 0b010),    mv(4, 0b1010),       mv(3, 0b110)],
    /* CaptureIR */ [mv(5, 0b11111), mv(3, 0b011),    mv(3, 0b111),    mv(4, 0b0111),   mv(5, 0b00111),  mv(5, 0b10111),  mv(6, 0b010111), mv(7, 0b1010111),    mv(6, 0b110111), mv(4, 0b1111),   mv(5, 0b01111),  mv(1, 0b0),      mv(1, 0b1),      mv(2, 0b01),     mv(3, 0b101),        mv(2, 0b11)],
    /* ShiftIR   */ [mv(5, 0b11111), mv(3, 0b011),    mv(3, 0b111),    mv(4, 0b0111),   mv(5, 0b00111),  mv(5, 0b10111),  mv(6, 0b010111), mv(7, 0b1010111),    mv(6, 0b110111), mv(4, 0b1111),   mv(5, 0b01111),  mv(1, 0b0),      mv(1, 0b1),      mv(2, 0b01),     mv(3, 0b101),        mv(2, 0b11)],
    /* Exit1IR   */ [mv(4, 0b1111),  mv(2, 0b01),     mv(2, 0b11),     mv(3, 0b011),    mv(4, 0b0011),   mv(4, 0b1011),   mv(5, 0b01011),  mv(6, 0b101011),     mv(5, 0b11011),  mv(3, 0b111),    mv(4, 0b0111),   mv(3, 0b010),    mv(4, 0b1010),   mv(1, 0b0),      mv(2, 0b10),         mv(1, 0b1)],
    /* PauseIR   */ [mv(5, 0b11111), mv(3, 0b011),    mv(3, 0b111),    mv(4, 0b0111),   mv(5, 0b00111),  mv(5, 0b10111),  mv(6, 0b010111), mv(7, 0b1010111),    mv(6, 0b110111), mv(4, 0b1111),   mv(5, 0b01111),  mv(2, 0b01),     mv(3, 0b101),    mv(1, 0b0),      mv(1, 0b1),          mv(2, 0b11)],
    /* Exit2IR   */ [mv(4, 0b1111),  mv(2, 0b01),     mv(2, 0b11),     mv(3, 0b011),    mv(4, 0b0011),   mv(4, 0b1011),   mv(5, 0b01011),  mv(6, 0b101011),     mv(5, 0b11011),  mv(3, 0b111),    mv(4, 0b0111),   mv(1, 0b0),      mv(2, 0b10),     mv(3, 0b010),    mv(4, 0b1010),       mv(1, 0b1)],
    /* UpdateIR  */ [mv(3, 0b111),   mv(1, 0b0),      mv(1, 0b1),      mv(2, 0b01),     mv(3, 0b001),    mv(3, 0b101),    mv(4, 0b0101),   mv(5, 0b10101),      mv(4, 0b1101),   mv(2, 0b11),     mv(3, 0b011),    mv(4, 0b0011),   mv(4, 0b1011),   mv(5, 0b01011),  mv(6, 0b101011),     mv(5, 0b11011)],
];

/// Look up the TMS sequence that takes the controller from `from` to `to`.
pub fn transition(from: TapState, to: TapState) -> TmsMove {
    TRANSITIONS[from as usize][to as usize]
}

/// Enough TMS=1 clocks to reach TestLogicReset from anywhere (5 would do).
const RESET_MOVE: TmsMove = TmsMove { clocks: 8, pattern: 0xff };

pub struct TapStateMachine<T> {
    pub cable: T,
    state: TapState,
    moves: [u32; TapState::COUNT],
}

impl<T, U> TapStateMachine<T>
    where T: DerefMut<Target=U>,
          U: Cable + ?Sized
{
    /// Create a TAP state machine on top of an existing `Cable`.  The TAP is reset so that the
    /// tracked state matches the hardware.
    pub fn new(cable: T) -> Self {
        let mut sm = Self {
            cable,
            state: TapState::TestLogicReset,
            moves: [0; TapState::COUNT],
        };
        sm.reset();
        sm
    }

    /// The state the TAP is believed to be in.  Nothing is read back from the target.
    pub fn current(&self) -> TapState {
        self.state
    }

    /// Force TestLogicReset by driving TMS high, whatever the current state is.
    pub fn reset(&mut self) {
        self.cable.shift_tms(RESET_MOVE.clocks as u32, RESET_MOVE.pattern as u32);
        self.state = TapState::TestLogicReset;
    }

    /// Use TMS to get into `target` by the shortest path.  The tracked state is updated without
    /// verification.
    pub fn move_to(&mut self, target: TapState) {
        let tms = transition(self.state, target);
        trace!(
            "move {:?} -> {:?}: {} clocks, tms {:#010b}",
            self.state, target, tms.clocks, tms.pattern
        );
        self.cable.shift_tms(tms.clocks as u32, tms.pattern as u32);
        self.state = target;
        self.moves[target as usize] = self.moves[target as usize].wrapping_add(1);
    }

    /// Move to ShiftIR or ShiftDR and shift `bits` bits of `data` through the selected register,
    /// returning what came out.  The TAP is left in the shift state.
    pub fn read_write_reg(&mut self, reg: Register, bits: u32, data: u32) -> u32 {
        if reg == Register::Data {
            self.move_to(TapState::ShiftDr);
        } else {
            self.move_to(TapState::ShiftIr);
        }
        self.cable.shift_data(bits, data)
    }

    /// Number of moves made into each state, indexed by state id.
    pub fn stats(&self) -> &[u32; TapState::COUNT] {
        &self.moves
    }

    pub fn clear_stats(&mut self) {
        self.moves = [0; TapState::COUNT];
    }
}
