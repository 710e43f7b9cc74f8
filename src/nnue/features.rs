// src/nnue/features.rs
//! Feature indexing for the king-bucketed feature transformer.
//!
//! Each perspective sees the board from its own side: Black's view is the
//! point reflection of the board (`63 - sq`) with colors swapped, so "own" pieces
//! always occupy the first half of every 128-feature piece block.
//!
//! Index = bucket * 768 + (kind * 2 + relative_color) * 64 + oriented_square

use crate::board::{captured_piece, castling_rook, LegalityOracle};
use crate::constants::INPUTS_PER_BUCKET;
use crate::defs::{Color, Piece, PieceKind, Square};
use crate::mv::Move;

/// Most features a single move can remove or add (castling, or a capture).
pub const MAX_DELTA: usize = 2;

/// King bucket layout, selected by the feature count of the weight file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KingBuckets {
    /// 768 features: the king square is ignored.
    Single,
    /// 4 x 768 features: back rank, second rank, ranks 3-4, ranks 5-8.
    RankZones,
    /// 64 x 768 features: one bucket per king square.
    PerSquare,
}

impl KingBuckets {
    pub fn from_feature_count(count: u32) -> Option<Self> {
        match count as usize {
            n if n == INPUTS_PER_BUCKET => Some(KingBuckets::Single),
            n if n == 4 * INPUTS_PER_BUCKET => Some(KingBuckets::RankZones),
            n if n == 64 * INPUTS_PER_BUCKET => Some(KingBuckets::PerSquare),
            _ => None,
        }
    }

    #[inline]
    pub fn num_buckets(self) -> usize {
        match self {
            KingBuckets::Single => 1,
            KingBuckets::RankZones => 4,
            KingBuckets::PerSquare => 64,
        }
    }

    #[inline]
    pub fn feature_count(self) -> usize {
        self.num_buckets() * INPUTS_PER_BUCKET
    }

    /// Bucket of a king square already oriented to the perspective.
    #[inline]
    pub fn bucket(self, oriented_king: Square) -> usize {
        match self {
            KingBuckets::Single => 0,
            KingBuckets::RankZones => match oriented_king.rank() {
                0 => 0,
                1 => 1,
                2 | 3 => 2,
                _ => 3,
            },
            KingBuckets::PerSquare => oriented_king.index(),
        }
    }
}

#[inline]
pub fn orient(perspective: Color, sq: Square) -> Square {
    match perspective {
        Color::White => sq,
        Color::Black => sq.mirrored(),
    }
}

/// Feature index of `piece` on `sq` for `perspective`, whose own king stands on
/// `king_sq` (board coordinates). A missing king falls back to bucket 0.
#[inline]
pub fn feature_index(
    layout: KingBuckets,
    perspective: Color,
    king_sq: Option<Square>,
    piece: Piece,
    sq: Square,
) -> usize {
    let bucket = king_sq.map_or(0, |k| layout.bucket(orient(perspective, k)));
    let relative_color = usize::from(piece.color != perspective);
    bucket * INPUTS_PER_BUCKET
        + (piece.kind.index() * 2 + relative_color) * 64
        + orient(perspective, sq).index()
}

/// Board-level change produced by one move, independent of perspective.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureDelta {
    pub removed: [Option<(Piece, Square)>; MAX_DELTA],
    pub added: [Option<(Piece, Square)>; MAX_DELTA],
    /// Color whose king changed square, if any.
    pub king_moved: Option<Color>,
}

impl FeatureDelta {
    /// Delta for `mv` played from `before`. Returns `None` when the origin square
    /// is empty (the move cannot be described incrementally).
    pub fn from_move<P: LegalityOracle>(before: &P, mv: &Move) -> Option<Self> {
        let mover = before.piece_on(mv.from)?;
        let mut delta = FeatureDelta::default();

        let placed = match mv.promotion {
            Some(kind) => Piece::new(kind, mover.color),
            None if mover.kind == PieceKind::Pawn && mv.to.rank() == mover.color.promotion_rank() => {
                Piece::new(PieceKind::Queen, mover.color)
            }
            None => mover,
        };

        delta.removed[0] = Some((mover, mv.from));
        delta.added[0] = Some((placed, mv.to));

        if let Some(rook_move) = castling_rook(before, mv) {
            let rook = Piece::new(PieceKind::Rook, mover.color);
            delta.removed[1] = Some((rook, rook_move.0));
            delta.added[1] = Some((rook, rook_move.1));
        } else if let Some(captured) = captured_piece(before, mv) {
            delta.removed[1] = Some(captured);
        }

        if mover.kind == PieceKind::King {
            delta.king_moved = Some(mover.color);
        }
        Some(delta)
    }

    pub fn removed(&self) -> impl Iterator<Item = (Piece, Square)> + '_ {
        self.removed.iter().flatten().copied()
    }

    pub fn added(&self) -> impl Iterator<Item = (Piece, Square)> + '_ {
        self.added.iter().flatten().copied()
    }
}

/// All active features of `perspective` in `pos`.
pub fn active_features<P: LegalityOracle>(
    pos: &P,
    layout: KingBuckets,
    perspective: Color,
) -> Vec<usize> {
    let king = pos.king_square(perspective);
    Square::all()
        .filter_map(|sq| pos.piece_on(sq).map(|p| feature_index(layout, perspective, king, p, sq)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Position;
    use std::collections::HashSet;

    fn sq(s: &str) -> Square {
        Square::parse(s).unwrap()
    }

    #[test]
    fn test_layout_from_feature_count() {
        assert_eq!(KingBuckets::from_feature_count(768), Some(KingBuckets::Single));
        assert_eq!(KingBuckets::from_feature_count(3072), Some(KingBuckets::RankZones));
        assert_eq!(KingBuckets::from_feature_count(49152), Some(KingBuckets::PerSquare));
        assert_eq!(KingBuckets::from_feature_count(1000), None);
        assert_eq!(KingBuckets::PerSquare.feature_count(), 49152);
    }

    #[test]
    fn test_perspectives_mirror() {
        let layout = KingBuckets::RankZones;
        let white_pawn = Piece::new(PieceKind::Pawn, Color::White);
        let black_pawn = Piece::new(PieceKind::Pawn, Color::Black);
        let w = feature_index(layout, Color::White, Some(sq("e1")), white_pawn, sq("e2"));
        let b = feature_index(layout, Color::Black, Some(sq("d8")), black_pawn, sq("d7"));
        assert_eq!(w, b);
        // Own pawn on e2 seen by White: bucket 0, block 0, square 12.
        assert_eq!(w, 12);
    }

    #[test]
    fn test_indices_unique_per_king_square() {
        for layout in [KingBuckets::Single, KingBuckets::RankZones, KingBuckets::PerSquare] {
            for perspective in Color::ALL {
                for king in [sq("a1"), sq("e4"), sq("h8")] {
                    let mut seen = HashSet::new();
                    for color in Color::ALL {
                        for kind in PieceKind::ALL {
                            for s in Square::all() {
                                let idx = feature_index(
                                    layout,
                                    perspective,
                                    Some(king),
                                    Piece::new(kind, color),
                                    s,
                                );
                                assert!(idx < layout.feature_count());
                                assert!(seen.insert(idx));
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_castling_delta() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
        let mv = pos.parse_uci_move("e1g1").unwrap();
        let delta = FeatureDelta::from_move(&pos, &mv).unwrap();
        let rook = Piece::new(PieceKind::Rook, Color::White);
        assert_eq!(delta.removed[1], Some((rook, sq("h1"))));
        assert_eq!(delta.added[1], Some((rook, sq("f1"))));
        assert_eq!(delta.king_moved, Some(Color::White));
    }

    #[test]
    fn test_promotion_capture_delta() {
        let pos = Position::from_fen("3r3k/4P3/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let mv = pos.parse_uci_move("e7d8n").unwrap();
        let delta = FeatureDelta::from_move(&pos, &mv).unwrap();
        assert_eq!(
            delta.added().collect::<Vec<_>>(),
            vec![(Piece::new(PieceKind::Knight, Color::White), sq("d8"))]
        );
        assert_eq!(delta.removed().count(), 2);
        assert_eq!(delta.king_moved, None);
    }
}
