//! # DeepSquare
//!
//! Alpha-beta chess engine with an incrementally updated, king-bucketed NNUE
//! evaluator running on a 16-lane i16 SIMD kernel.

pub mod board;
pub mod constants;
pub mod defs;
pub mod movegen;
pub mod mv;
pub mod nnue;
pub mod search;
pub mod simd;
pub mod uci;
