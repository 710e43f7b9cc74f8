// src/search/ordering.rs
//! Capture/promotion move ordering.

use crate::board::{captured_piece, LegalityOracle};
use crate::constants::{MVV_MULTIPLIER, PROMOTION_BONUS};
use crate::mv::Move;

/// Orders moves by most valuable victim, then promotions. Ties keep their
/// generation order.
pub struct MoveOrderer;

impl MoveOrderer {
    /// 10 x victim value (the en passant pawn counts as a victim) plus 1000 for
    /// any promotion. The attacker is not considered.
    pub fn score<P: LegalityOracle>(pos: &P, mv: &Move) -> i32 {
        let mut score = 0;
        if let Some((victim, _)) = captured_piece(pos, mv) {
            score += MVV_MULTIPLIER * victim.kind.value();
        }
        if mv.promotion.is_some() {
            score += PROMOTION_BONUS;
        }
        score
    }

    /// Fill in `Move::score` and stable-sort descending.
    pub fn order<P: LegalityOracle>(moves: &mut [Move], pos: &P) {
        for mv in moves.iter_mut() {
            mv.score = Self::score(pos, mv);
        }
        moves.sort_by(|a, b| b.score.cmp(&a.score));
    }

    /// Move `hint` to the front, keeping the relative order of everything else.
    /// Returns `false` if `hint` is not in the list.
    pub fn promote(moves: &mut [Move], hint: Move) -> bool {
        match moves.iter().position(|m| *m == hint) {
            Some(i) => {
                moves[..=i].rotate_right(1);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Position;

    #[test]
    fn test_mvv_and_promotion_scores() {
        let pos = Position::from_fen("1r2k3/P7/8/3q4/4P3/8/8/4K3 w - - 0 1").unwrap();
        let take_queen = pos.parse_uci_move("e4d5").unwrap();
        let promo = pos.parse_uci_move("a7a8q").unwrap();
        let promo_capture = pos.parse_uci_move("a7b8n").unwrap();
        let quiet = pos.parse_uci_move("e1f1").unwrap();
        assert_eq!(MoveOrderer::score(&pos, &take_queen), 9000);
        assert_eq!(MoveOrderer::score(&pos, &promo), 1000);
        assert_eq!(MoveOrderer::score(&pos, &promo_capture), 6000);
        assert_eq!(MoveOrderer::score(&pos, &quiet), 0);

        let mut moves = pos.legal_moves();
        MoveOrderer::order(&mut moves, &pos);
        assert_eq!(moves[0], take_queen);
        assert!(moves.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_en_passant_is_a_capture() {
        let pos = Position::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1").unwrap();
        let ep = pos.parse_uci_move("e5d6").unwrap();
        assert_eq!(MoveOrderer::score(&pos, &ep), 1000);
    }

    #[test]
    fn test_order_is_stable_and_promote_keeps_rest() {
        let pos = Position::startpos();
        let generated = pos.legal_moves();
        let mut moves = generated.clone();
        MoveOrderer::order(&mut moves, &pos);
        assert_eq!(moves, generated);

        let hint = moves[7];
        assert!(MoveOrderer::promote(&mut moves, hint));
        assert_eq!(moves[0], hint);
        let rest: Vec<_> = generated.iter().filter(|m| **m != hint).copied().collect();
        assert_eq!(&moves[1..], rest.as_slice());
        assert!(!MoveOrderer::promote(&mut moves, Move::NULL));
    }
}
