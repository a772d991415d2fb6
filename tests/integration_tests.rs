//! Clock and board working together, the way the session drives them.

use std::time::Duration;

use blockbeat::core::{BoardConfig, BoardState, Phase, PieceSequence, SpeedConfig, TimeBase};
use blockbeat::types::{GameAction, PieceKind};

fn four_by_six(kinds: Vec<PieceKind>) -> (TimeBase, BoardState) {
    let board = BoardConfig {
        width: 4,
        height: 6,
        piece_sequence: PieceSequence(kinds),
        ..BoardConfig::default()
    };
    let speed = SpeedConfig {
        gravity_interval: 1.0,
        lock_delay: 0.5,
        ..SpeedConfig::default()
    };
    (
        TimeBase::new(&speed).unwrap(),
        BoardState::new(&board, &speed).unwrap(),
    )
}

fn tick(clock: &mut TimeBase, board: &mut BoardState, dt: Duration) {
    let steps = clock.advance(dt);
    board.advance(dt, steps);
}

#[test]
fn test_flat_piece_lands_after_five_steps_and_locks_half_a_second_later() {
    let (mut clock, mut board) = four_by_six(vec![PieceKind::I]);
    board.start();
    assert_eq!(board.active().unwrap().cells()[0].1, 0);

    for n in 1..=5 {
        tick(&mut clock, &mut board, Duration::from_secs(1));
        assert_eq!(board.active().unwrap().cells()[0].1, n as i16, "after step {n}");
    }
    assert_eq!(clock.step_count(), 5);
    assert_eq!(board.phase(), Phase::Locking);

    tick(&mut clock, &mut board, Duration::from_millis(250));
    assert_eq!(board.phase(), Phase::Locking);
    assert!(board.active().is_some());

    tick(&mut clock, &mut board, Duration::from_millis(250));
    assert_eq!(board.phase(), Phase::Cleared);
    assert!(board.active().is_none());
    // the I filled the bottom row, which cleared
    assert_eq!(board.lines(), 1);
    assert_eq!(board.board().filled(), 0);
    // still inside the first gravity interval after landing: no new step yet
    assert_eq!(clock.step_count(), 5);
}

#[test]
fn test_next_step_respawns_after_commit() {
    let (mut clock, mut board) = four_by_six(vec![PieceKind::I, PieceKind::O]);
    board.start();
    board.apply_action(GameAction::HardDrop);
    tick(&mut clock, &mut board, Duration::from_millis(500));
    assert_eq!(board.phase(), Phase::Cleared);

    tick(&mut clock, &mut board, Duration::from_millis(500));
    assert_eq!(board.active().unwrap().kind, PieceKind::O);
    assert_eq!(board.piece_id(), 2);
}

#[test]
fn test_gravity_change_mid_run_keeps_partial_progress() {
    let (mut clock, mut board) = four_by_six(vec![PieceKind::O]);
    board.start();

    tick(&mut clock, &mut board, Duration::from_millis(700));
    assert_eq!(clock.step_count(), 0);
    clock.set_gravity_interval(0.5).unwrap();
    // the 0.7 s already accumulated covers one 0.5 s step right away
    tick(&mut clock, &mut board, Duration::ZERO);
    assert_eq!(clock.step_count(), 1);
}

#[test]
fn test_rejected_gravity_keeps_last_valid_interval() {
    let (mut clock, _) = four_by_six(vec![PieceKind::O]);
    clock.set_gravity_interval(0.25).unwrap();
    assert!(clock.set_gravity_interval(-1.0).is_err());
    assert!(clock.set_gravity_interval(0.0).is_err());
    assert!(clock.set_gravity_interval(f64::NAN).is_err());
    assert_eq!(clock.gravity_interval(), Duration::from_millis(250));
}

#[test]
fn test_same_inputs_same_board() {
    let run = || {
        let board_cfg = BoardConfig {
            seed: 7,
            ..BoardConfig::default()
        };
        let speed = SpeedConfig {
            gravity_interval: 0.1,
            lock_delay: 0.2,
            ..SpeedConfig::default()
        };
        let mut clock = TimeBase::new(&speed).unwrap();
        let mut board = BoardState::new(&board_cfg, &speed).unwrap();
        board.start();
        for i in 0..600u32 {
            match i % 7 {
                0 => board.apply_action(GameAction::MoveLeft),
                3 => board.apply_action(GameAction::RotateCw),
                5 if i % 3 == 0 => board.apply_action(GameAction::HardDrop),
                _ => false,
            };
            tick(&mut clock, &mut board, Duration::from_millis(33));
        }
        board.snapshot()
    };
    assert_eq!(run(), run());
}
