// src/nnue/accumulator.rs
//! NNUE Accumulator: the first hidden layer of the feature transformer.
//!
//! Maintains per-perspective (white/black) i16 vectors that are efficiently
//! updatable when pieces move on the board. The stored values are the raw
//! pre-activation sums (wrapping i16); the clamp is applied by the output layer,
//! so an incrementally updated accumulator always equals a full refresh.

use crate::constants::{HIDDEN_CHUNKS, MAX_PLY};
use crate::defs::{Color, Square};
use crate::simd::{HiddenVector, SimdKernel, ZERO_HIDDEN};

/// Feature transformer output for one perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accumulator {
    pub values: HiddenVector,
    /// Whether `values` matches the position. Cleared when the king moves.
    pub computed: bool,
    /// King square the values were bucketed with.
    pub king_square: Option<Square>,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            values: ZERO_HIDDEN,
            computed: false,
            king_square: None,
        }
    }
}

impl Accumulator {
    /// Reset to the zero vector before a refresh.
    #[inline]
    pub fn clear(&mut self, king_square: Option<Square>) {
        self.values = ZERO_HIDDEN;
        self.king_square = king_square;
        self.computed = false;
    }

    /// values += row + bias (bias broadcast to every lane)
    #[inline]
    pub fn add_feature<K: SimdKernel>(&mut self, row: &HiddenVector, bias: i16) {
        let b = K::splat(bias);
        for i in 0..HIDDEN_CHUNKS {
            let v = K::add(K::add(K::load(&self.values[i]), K::load(&row[i])), b);
            K::store(&mut self.values[i], v);
        }
    }

    /// values -= row + bias
    #[inline]
    pub fn sub_feature<K: SimdKernel>(&mut self, row: &HiddenVector, bias: i16) {
        let b = K::splat(bias);
        for i in 0..HIDDEN_CHUNKS {
            let v = K::sub(K::sub(K::load(&self.values[i]), K::load(&row[i])), b);
            K::store(&mut self.values[i], v);
        }
    }
}

/// Both perspectives of one position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccumulatorPair {
    pub white: Accumulator,
    pub black: Accumulator,
}

impl AccumulatorPair {
    #[inline]
    pub fn get(&self, perspective: Color) -> &Accumulator {
        match perspective {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    #[inline]
    pub fn get_mut(&mut self, perspective: Color) -> &mut Accumulator {
        match perspective {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }
}

/// Saved accumulator states, one per ply below the root.
///
/// `push` snapshots both perspectives, `pop` restores the most recent snapshot.
/// Exceeding `MAX_PLY` or popping an empty stack is a logic error and panics.
pub struct AccumulatorStack {
    saved: Vec<AccumulatorPair>,
}

impl AccumulatorStack {
    pub fn new() -> Self {
        Self {
            saved: Vec::with_capacity(MAX_PLY),
        }
    }

    pub fn push(&mut self, current: &AccumulatorPair) {
        assert!(
            self.saved.len() < MAX_PLY,
            "accumulator stack overflow (capacity {})",
            MAX_PLY
        );
        self.saved.push(*current);
    }

    pub fn pop(&mut self) -> AccumulatorPair {
        match self.saved.pop() {
            Some(pair) => pair,
            None => panic!("accumulator stack underflow"),
        }
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    pub fn clear(&mut self) {
        self.saved.clear();
    }
}

impl Default for AccumulatorStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simd::{Lanes, Scalar};

    fn row(value: i16) -> HiddenVector {
        [Lanes([value; 16]); HIDDEN_CHUNKS]
    }

    #[test]
    fn test_add_then_sub_restores() {
        let mut acc = Accumulator::default();
        acc.add_feature::<Scalar>(&row(300), -7);
        assert!(acc.values.iter().all(|l| l.0 == [293; 16]));
        acc.add_feature::<Scalar>(&row(i16::MAX), 0);
        acc.sub_feature::<Scalar>(&row(i16::MAX), 0);
        acc.sub_feature::<Scalar>(&row(300), -7);
        assert_eq!(acc.values, ZERO_HIDDEN);
    }

    #[test]
    fn test_stack_round_trip() {
        let mut stack = AccumulatorStack::new();
        let mut pair = AccumulatorPair::default();
        pair.white.add_feature::<Scalar>(&row(5), 1);
        pair.white.computed = true;
        let snapshot = pair;

        stack.push(&pair);
        pair.white.sub_feature::<Scalar>(&row(9), 0);
        pair.black.computed = true;
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.pop(), snapshot);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    #[should_panic(expected = "underflow")]
    fn test_pop_empty_panics() {
        AccumulatorStack::new().pop();
    }
}
