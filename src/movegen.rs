//! Move generation and perft over the legality contract.

use crate::board::LegalityOracle;
use crate::mv::Move;

/// Every legal move of the side to move.
#[inline]
pub fn generate<P: LegalityOracle>(pos: &P) -> Vec<Move> {
    pos.legal_moves()
}

/// Number of leaf nodes of the legal move tree at `depth`.
pub fn perft<P: LegalityOracle>(pos: &P, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let moves = generate(pos);
    if depth == 1 {
        return moves.len() as u64;
    }
    moves
        .iter()
        .map(|mv| {
            let mut child = pos.clone();
            if child.apply_move(mv) {
                perft(&child, depth - 1)
            } else {
                0
            }
        })
        .sum()
}

/// Perft split by root move, in generation order.
pub fn divide<P: LegalityOracle>(pos: &P, depth: u32) -> Vec<(Move, u64)> {
    if depth == 0 {
        return Vec::new();
    }
    generate(pos)
        .into_iter()
        .filter_map(|mv| {
            let mut child = pos.clone();
            child
                .apply_move(&mv)
                .then(|| (mv, perft(&child, depth - 1)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Position;

    #[test]
    fn test_perft_shallow() {
        let pos = Position::startpos();
        assert_eq!(perft(&pos, 0), 1);
        assert_eq!(perft(&pos, 1), 20);
        assert_eq!(perft(&pos, 2), 400);
    }

    #[test]
    fn test_divide_sums_to_perft() {
        let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let split = divide(&pos, 2);
        assert_eq!(split.len() as u64, perft(&pos, 1));
        assert_eq!(split.iter().map(|(_, n)| n).sum::<u64>(), perft(&pos, 2));
    }

    #[test]
    fn test_checkmate_has_no_moves() {
        let mated = Position::from_fen("7k/6Q1/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert!(generate(&mated).is_empty());
        assert_eq!(perft(&mated, 3), 0);
    }
}
