use deepsquare::board::{LegalityOracle, Position};
use deepsquare::movegen::{divide, perft};

#[test]
fn test_perft_startpos() {
    let pos = Position::startpos();
    assert_eq!(perft(&pos, 1), 20);
    assert_eq!(perft(&pos, 2), 400);
    assert_eq!(perft(&pos, 3), 8902);
    assert_eq!(perft(&pos, 4), 197281);
}

#[test]
fn test_perft_kiwipete() {
    // Castling, en passant, promotions and pins all show up by depth 3.
    let pos = Position::from_fen(
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    )
    .unwrap();
    assert_eq!(perft(&pos, 1), 48);
    assert_eq!(perft(&pos, 2), 2039);
    assert_eq!(perft(&pos, 3), 97862);
}

#[test]
fn test_perft_endgame() {
    let pos = Position::from_fen("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1").unwrap();
    assert_eq!(perft(&pos, 1), 14);
    assert_eq!(perft(&pos, 2), 191);
    assert_eq!(perft(&pos, 3), 2812);
}

#[test]
fn test_perft_promotions() {
    let pos = Position::from_fen("n1n5/PPPk4/8/8/8/8/4Kppp/5N1N b - - 0 1").unwrap();
    assert_eq!(perft(&pos, 1), 24);
    assert_eq!(perft(&pos, 2), 496);
    assert_eq!(perft(&pos, 3), 9483);
}

#[test]
fn test_divide_matches_generation_order() {
    let pos = Position::startpos();
    let split = divide(&pos, 3);
    let moves: Vec<_> = split.iter().map(|(mv, _)| *mv).collect();
    assert_eq!(moves, pos.legal_moves());
    assert_eq!(split.iter().map(|(_, n)| n).sum::<u64>(), 8902);
}
