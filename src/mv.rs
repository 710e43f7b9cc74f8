use crate::defs::{PieceKind, Square};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Represents a chess move.
///
/// Identity is origin, destination and promotion piece. `score` is scratch space
/// for move ordering and is ignored by equality and hashing.
#[derive(Debug, Clone, Copy)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
    pub score: i32,
}

impl Move {
    /// Sentinel returned when the side to move has no legal move.
    pub const NULL: Move = Move {
        from: Square::A1,
        to: Square::A1,
        promotion: None,
        score: 0,
    };

    pub fn new(from: Square, to: Square, promotion: Option<PieceKind>) -> Self {
        Move {
            from,
            to,
            promotion,
            score: 0,
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.from == self.to
    }

    /// Parse long algebraic (UCI) notation: `e2e4`, `e7e8q`.
    pub fn parse_uci(s: &str) -> Option<Move> {
        if s.len() < 4 || s.len() > 5 || !s.is_ascii() {
            return None;
        }
        let from = Square::parse(&s[0..2])?;
        let to = Square::parse(&s[2..4])?;
        let promotion = match s[4..].chars().next() {
            None => None,
            Some(c) => match PieceKind::from_char(c)? {
                PieceKind::Pawn | PieceKind::King => return None,
                kind => Some(kind),
            },
        };
        Some(Move::new(from, to, promotion))
    }
}

impl PartialEq for Move {
    fn eq(&self, other: &Self) -> bool {
        self.from == other.from && self.to == other.to && self.promotion == other.promotion
    }
}

impl Eq for Move {}

impl Hash for Move {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.from.hash(state);
        self.to.hash(state);
        self.promotion.hash(state);
    }
}

impl Default for Move {
    fn default() -> Self {
        Move::NULL
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("0000");
        }
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(p) = self.promotion {
            write!(f, "{}", p.to_char())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uci_notation() {
        let mv = Move::parse_uci("e7e8q").unwrap();
        assert_eq!(mv.from.to_string(), "e7");
        assert_eq!(mv.to.to_string(), "e8");
        assert_eq!(mv.promotion, Some(PieceKind::Queen));
        assert_eq!(mv.to_string(), "e7e8q");
        assert!(Move::parse_uci("e7e8k").is_none());
        assert!(Move::parse_uci("e7").is_none());
        assert_eq!(Move::NULL.to_string(), "0000");
    }

    #[test]
    fn test_score_is_not_identity() {
        let mut a = Move::parse_uci("g1f3").unwrap();
        let b = a;
        a.score = 4200;
        assert_eq!(a, b);
    }
}
