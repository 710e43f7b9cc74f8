//! Board collaborator: the legality contract the search core consumes, and
//! `Position`, its implementation on top of the `chess` crate.
//!
//! The core never looks inside a position. Everything it needs (piece lookup,
//! move application with full legality checking, check detection, per-square
//! destinations) goes through [`LegalityOracle`].

use crate::defs::{Color, Piece, PieceKind, Square};
use crate::mv::Move;
use chess::{ChessMove, MoveGen, ALL_SQUARES};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// FEN of the standard starting position.
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("invalid FEN: {0}")]
    InvalidFen(String),
    #[error("illegal move: {0}")]
    IllegalMove(String),
}

/// Legality oracle consumed by move generation, ordering, evaluation and search.
///
/// Coordinates are zero-based file (`x`) and rank (`y`) indices in `[0, 8)`.
/// Out-of-range coordinates read as empty squares.
pub trait LegalityOracle: Clone {
    fn piece_at(&self, x: i32, y: i32) -> Option<Piece>;

    /// Apply `mv` if it is legal for the side to move. On rejection the
    /// position is left untouched and `false` is returned.
    fn apply_move(&mut self, mv: &Move) -> bool;

    fn is_in_check(&self) -> bool;

    fn side_to_move(&self) -> Color;

    /// Legal destination squares of the piece on `(x, y)`. Empty when the
    /// square is empty or holds a piece of the side not to move.
    fn legal_destinations(&self, x: i32, y: i32) -> Vec<Square>;

    #[inline]
    fn piece_on(&self, sq: Square) -> Option<Piece> {
        self.piece_at(sq.file() as i32, sq.rank() as i32)
    }

    fn king_square(&self, color: Color) -> Option<Square> {
        Square::all().find(|&sq| self.piece_on(sq) == Some(Piece::new(PieceKind::King, color)))
    }

    /// All legal moves of the side to move, in generation order (a1..h8 by
    /// origin). Pawn moves onto the last rank expand into the four promotions.
    fn legal_moves(&self) -> Vec<Move> {
        let stm = self.side_to_move();
        let mut moves = Vec::with_capacity(64);
        for from in Square::all() {
            let Some(piece) = self.piece_on(from) else {
                continue;
            };
            if piece.color != stm {
                continue;
            }
            for to in self.legal_destinations(from.file() as i32, from.rank() as i32) {
                if piece.kind == PieceKind::Pawn && to.rank() == stm.promotion_rank() {
                    for promo in PieceKind::PROMOTIONS {
                        moves.push(Move::new(from, to, Some(promo)));
                    }
                } else {
                    moves.push(Move::new(from, to, None));
                }
            }
        }
        moves
    }
}

/// Piece removed by `mv` and the square it stood on, handling en passant.
pub fn captured_piece<P: LegalityOracle>(pos: &P, mv: &Move) -> Option<(Piece, Square)> {
    if let Some(victim) = pos.piece_on(mv.to) {
        return Some((victim, mv.to));
    }
    let mover = pos.piece_on(mv.from)?;
    if mover.kind == PieceKind::Pawn && mv.from.file() != mv.to.file() {
        let ep_sq = Square::new(mv.to.file() as i32, mv.from.rank() as i32)?;
        let victim = pos.piece_on(ep_sq)?;
        if victim.kind == PieceKind::Pawn && victim.color != mover.color {
            return Some((victim, ep_sq));
        }
    }
    None
}

/// Rook origin and destination when `mv` is a castling king move.
pub fn castling_rook<P: LegalityOracle>(pos: &P, mv: &Move) -> Option<(Square, Square)> {
    let mover = pos.piece_on(mv.from)?;
    if mover.kind != PieceKind::King || mv.from.file().abs_diff(mv.to.file()) != 2 {
        return None;
    }
    let rank = mv.from.rank() as i32;
    if mv.to.file() > mv.from.file() {
        Some((Square::new(7, rank)?, Square::new(5, rank)?))
    } else {
        Some((Square::new(0, rank)?, Square::new(3, rank)?))
    }
}

// =============================================================================
// POSITION (chess crate adapter)
// =============================================================================

/// Board position backed by `chess::Board`. Cheap to copy, which is how the
/// search descends: every child works on its own copy.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Position {
    board: chess::Board,
}

impl Position {
    pub fn startpos() -> Self {
        Self {
            board: chess::Board::default(),
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self, BoardError> {
        chess::Board::from_str(fen.trim())
            .map(|board| Self { board })
            .map_err(|_| BoardError::InvalidFen(fen.to_string()))
    }

    pub fn to_fen(&self) -> String {
        self.board.to_string()
    }

    /// Resolve a UCI move string against the legal moves of this position.
    pub fn parse_uci_move(&self, s: &str) -> Option<Move> {
        let parsed = Move::parse_uci(s)?;
        self.legal_moves().into_iter().find(|m| {
            m.from == parsed.from
                && m.to == parsed.to
                && (m.promotion == parsed.promotion
                    || (parsed.promotion.is_none() && m.promotion == Some(PieceKind::Queen)))
        })
    }

    pub fn apply_uci(&mut self, s: &str) -> Result<(), BoardError> {
        match self.parse_uci_move(s) {
            Some(mv) if self.apply_move(&mv) => Ok(()),
            _ => Err(BoardError::IllegalMove(s.to_string())),
        }
    }

    #[inline]
    fn to_chess_square(sq: Square) -> chess::Square {
        ALL_SQUARES[sq.index()]
    }

    #[inline]
    fn from_chess_square(sq: chess::Square) -> Square {
        Square::from_index(sq.to_index()).unwrap_or_default()
    }

    fn to_chess_piece(kind: PieceKind) -> chess::Piece {
        match kind {
            PieceKind::Pawn => chess::Piece::Pawn,
            PieceKind::Knight => chess::Piece::Knight,
            PieceKind::Bishop => chess::Piece::Bishop,
            PieceKind::Rook => chess::Piece::Rook,
            PieceKind::Queen => chess::Piece::Queen,
            PieceKind::King => chess::Piece::King,
        }
    }

    fn from_chess_piece(piece: chess::Piece) -> PieceKind {
        match piece {
            chess::Piece::Pawn => PieceKind::Pawn,
            chess::Piece::Knight => PieceKind::Knight,
            chess::Piece::Bishop => PieceKind::Bishop,
            chess::Piece::Rook => PieceKind::Rook,
            chess::Piece::Queen => PieceKind::Queen,
            chess::Piece::King => PieceKind::King,
        }
    }

    fn from_chess_move(cm: ChessMove) -> Move {
        Move::new(
            Self::from_chess_square(cm.get_source()),
            Self::from_chess_square(cm.get_dest()),
            cm.get_promotion().map(Self::from_chess_piece),
        )
    }

    fn to_chess_move(&self, mv: &Move) -> ChessMove {
        let mut promotion = mv.promotion;
        // A bare pawn push onto the last rank promotes to a queen.
        if promotion.is_none() {
            if let Some(p) = self.piece_on(mv.from) {
                if p.kind == PieceKind::Pawn && mv.to.rank() == p.color.promotion_rank() {
                    promotion = Some(PieceKind::Queen);
                }
            }
        }
        ChessMove::new(
            Self::to_chess_square(mv.from),
            Self::to_chess_square(mv.to),
            promotion.map(Self::to_chess_piece),
        )
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::startpos()
    }
}

impl LegalityOracle for Position {
    fn piece_at(&self, x: i32, y: i32) -> Option<Piece> {
        let sq = Square::new(x, y)?;
        self.piece_on(sq)
    }

    fn piece_on(&self, sq: Square) -> Option<Piece> {
        let csq = Self::to_chess_square(sq);
        let kind = Self::from_chess_piece(self.board.piece_on(csq)?);
        let color = match self.board.color_on(csq)? {
            chess::Color::White => Color::White,
            chess::Color::Black => Color::Black,
        };
        Some(Piece::new(kind, color))
    }

    fn apply_move(&mut self, mv: &Move) -> bool {
        if mv.is_null() {
            return false;
        }
        let cm = self.to_chess_move(mv);
        if !self.board.legal(cm) {
            return false;
        }
        self.board = self.board.make_move_new(cm);
        true
    }

    fn is_in_check(&self) -> bool {
        *self.board.checkers() != chess::EMPTY
    }

    fn side_to_move(&self) -> Color {
        match self.board.side_to_move() {
            chess::Color::White => Color::White,
            chess::Color::Black => Color::Black,
        }
    }

    fn legal_destinations(&self, x: i32, y: i32) -> Vec<Square> {
        let Some(sq) = Square::new(x, y) else {
            return Vec::new();
        };
        let src = Self::to_chess_square(sq);
        let mut dests = Vec::new();
        for cm in MoveGen::new_legal(&self.board).filter(|m| m.get_source() == src) {
            let to = Self::from_chess_square(cm.get_dest());
            if !dests.contains(&to) {
                dests.push(to);
            }
        }
        dests
    }

    fn king_square(&self, color: Color) -> Option<Square> {
        let c = match color {
            Color::White => chess::Color::White,
            Color::Black => chess::Color::Black,
        };
        Some(Self::from_chess_square(self.board.king_square(c)))
    }

    fn legal_moves(&self) -> Vec<Move> {
        MoveGen::new_legal(&self.board)
            .map(Self::from_chess_move)
            .collect()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, " +---+---+---+---+---+---+---+---+")?;
        for y in (0..8).rev() {
            for x in 0..8 {
                let c = self.piece_at(x, y).map_or(' ', Piece::to_char);
                write!(f, " | {}", c)?;
            }
            writeln!(f, " | {}", y + 1)?;
            writeln!(f, " +---+---+---+---+---+---+---+---+")?;
        }
        writeln!(f, "   a   b   c   d   e   f   g   h")?;
        write!(f, "Fen: {}", self.to_fen())
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position({})", self.to_fen())
    }
}
