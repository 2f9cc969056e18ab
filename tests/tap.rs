mod common;

use tapbang::cable::Cable;
use tapbang::statemachine::{transition, Register};
use tapbang::{TapState, TapStateMachine};

#[test]
fn new_resets_target() {
    let (bus, mut gpio) = common::target();
    bus.borrow_mut().state = TapState::PauseIr;

    let sm = TapStateMachine::new(&mut gpio);
    assert_eq!(sm.current(), TapState::TestLogicReset);
    assert_eq!(bus.borrow().state, TapState::TestLogicReset);
}

#[test]
fn every_move_reaches_target_on_the_wire() {
    let (bus, mut gpio) = common::target();
    let mut sm = TapStateMachine::new(&mut gpio);

    for from in TapState::ALL {
        for to in TapState::ALL {
            sm.move_to(from);
            assert_eq!(bus.borrow().state, from);

            bus.borrow_mut().clear_history();
            sm.move_to(to);
            assert_eq!(sm.current(), to);
            assert_eq!(bus.borrow().state, to, "{:?} -> {:?}", from, to);
            assert_eq!(bus.borrow().edges.len(), transition(from, to).clocks as usize);
        }
    }
}

#[test]
fn reset_from_any_state_is_idempotent() {
    let (bus, mut gpio) = common::target();
    let mut sm = TapStateMachine::new(&mut gpio);

    for from in TapState::ALL {
        sm.move_to(from);
        sm.reset();
        assert_eq!(sm.current(), TapState::TestLogicReset);
        assert_eq!(bus.borrow().state, TapState::TestLogicReset);

        sm.reset();
        assert_eq!(sm.current(), TapState::TestLogicReset);
        assert_eq!(bus.borrow().state, TapState::TestLogicReset);
    }
}

#[test]
fn reset_uses_at_least_five_tms_clocks() {
    let (bus, mut gpio) = common::target();
    let mut sm = TapStateMachine::new(&mut gpio);
    sm.move_to(TapState::ShiftIr);

    bus.borrow_mut().clear_history();
    sm.reset();
    let edges = bus.borrow().edges.clone();
    assert!(edges.len() >= 5);
    assert!(edges.iter().all(|edge| edge.tms && !edge.tdi));
}

#[test]
fn read_idcode() {
    let (bus, mut gpio) = common::target();
    let mut sm = TapStateMachine::new(&mut gpio);

    let idcode = sm.read_write_reg(Register::Data, 32, 0);
    assert_eq!(idcode, common::IDCODE);
    assert_eq!(sm.current(), TapState::ShiftDr);
    assert_eq!(bus.borrow().state, TapState::ShiftDr);
    assert_eq!(bus.borrow().data_clocks, 32);
}

#[test]
fn read_back_instruction_capture() {
    let (_bus, mut gpio) = common::target();
    let mut sm = TapStateMachine::new(&mut gpio);

    assert_eq!(sm.read_write_reg(Register::Instruction, 4, 0b1110), common::IR_CAPTURE);
    assert_eq!(sm.current(), TapState::ShiftIr);
}

#[test]
fn drive_reset_leaves_tracked_state() {
    let (bus, mut gpio) = common::target();
    let mut sm = TapStateMachine::new(&mut gpio);
    sm.move_to(TapState::PauseDr);

    sm.cable.drive_reset(32);
    assert_eq!(bus.borrow().state, TapState::TestLogicReset);
    assert_eq!(bus.borrow().trst_clocks, 32);
    assert_eq!(sm.current(), TapState::PauseDr);

    // Resynchronize
    sm.reset();
    sm.move_to(TapState::RunTestIdle);
    assert_eq!(bus.borrow().state, TapState::RunTestIdle);
}

#[test]
fn counts_moves_per_state() {
    let (_bus, mut gpio) = common::target();
    let mut sm = TapStateMachine::new(&mut gpio);

    sm.move_to(TapState::RunTestIdle);
    sm.move_to(TapState::RunTestIdle);
    sm.move_to(TapState::ShiftDr);
    assert_eq!(sm.stats()[TapState::RunTestIdle as usize], 2);
    assert_eq!(sm.stats()[TapState::ShiftDr as usize], 1);
    assert_eq!(sm.stats().iter().sum::<u32>(), 3);

    sm.clear_stats();
    assert!(sm.stats().iter().all(|&n| n == 0));
}
