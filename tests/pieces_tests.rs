//! Shape tables and SRS rotation through the public facade.

use blockbeat::core::pieces::{shape_bounds, Rotated};
use blockbeat::core::{get_shape, try_rotate};
use blockbeat::types::{PieceKind, Rotation};

const ROTATIONS: [Rotation; 4] = [
    Rotation::North,
    Rotation::East,
    Rotation::South,
    Rotation::West,
];

#[test]
fn i_piece_cycles_through_four_orientations() {
    assert_eq!(
        get_shape(PieceKind::I, Rotation::North),
        [(0, 1), (1, 1), (2, 1), (3, 1)]
    );
    assert_eq!(
        get_shape(PieceKind::I, Rotation::East),
        [(2, 0), (2, 1), (2, 2), (2, 3)]
    );
    assert_eq!(
        get_shape(PieceKind::I, Rotation::South),
        [(0, 2), (1, 2), (2, 2), (3, 2)]
    );
    assert_eq!(
        get_shape(PieceKind::I, Rotation::West),
        [(1, 0), (1, 1), (1, 2), (1, 3)]
    );
}

#[test]
fn o_piece_is_rotation_invariant() {
    let north = get_shape(PieceKind::O, Rotation::North);
    for rotation in ROTATIONS {
        assert_eq!(get_shape(PieceKind::O, rotation), north);
    }
}

#[test]
fn every_shape_has_four_distinct_minos_inside_a_4x4_box() {
    for kind in PieceKind::ALL {
        for rotation in ROTATIONS {
            let shape = get_shape(kind, rotation);
            for (i, a) in shape.iter().enumerate() {
                assert!((0..4).contains(&a.0) && (0..4).contains(&a.1));
                assert!(!shape[i + 1..].contains(a), "{:?} {:?}", kind, rotation);
            }
            let (min_x, max_x, min_y, max_y) = shape_bounds(&shape);
            assert!(min_x <= max_x && min_y <= max_y);
        }
    }
}

#[test]
fn rotation_in_open_space_needs_no_kick() {
    let rotated = try_rotate(PieceKind::T, Rotation::North, 3, 5, true, |_, _| true);
    assert_eq!(
        rotated,
        Some(Rotated {
            rotation: Rotation::East,
            x: 3,
            y: 5,
            kick: 0,
        })
    );

    let ccw = try_rotate(PieceKind::T, Rotation::North, 3, 5, false, |_, _| true).unwrap();
    assert_eq!(ccw.rotation, Rotation::West);
}

#[test]
fn blocked_rotation_falls_back_to_a_kick() {
    // (5, 6) is where the east-facing nub would land without a kick.
    let rotated =
        try_rotate(PieceKind::T, Rotation::North, 3, 5, true, |x, y| (x, y) != (5, 6)).unwrap();
    assert_eq!(rotated.rotation, Rotation::East);
    assert_eq!(rotated.kick, 1);
    assert_eq!((rotated.x, rotated.y), (2, 5));
}

#[test]
fn fully_blocked_rotation_fails() {
    assert!(try_rotate(PieceKind::J, Rotation::North, 3, 0, true, |_, _| false).is_none());
}

#[test]
fn o_piece_never_rotates() {
    assert!(try_rotate(PieceKind::O, Rotation::North, 3, 0, true, |_, _| true).is_none());
}
