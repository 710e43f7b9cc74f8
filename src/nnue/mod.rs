// src/nnue/mod.rs
//! NNUE (Efficiently Updatable Neural Network) for fast position evaluation.
//!
//! Architecture: (F -> 256) x 2 perspectives -> clipped ReLU -> mulhi dot -> 1
//!
//! - Input: F binary features, F = buckets x 768 (6 kinds x 2 colors x 64 squares)
//! - Feature transformer: F -> 256 per perspective (i16 quantized, per-feature bias)
//! - Activation: clamp(x, 0, i16::MAX) at output time
//! - Output: sum of mulhi(activation, w_out) per perspective,
//!   `(white - black) / 64 + bias`, kept strictly inside the mate band and
//!   negated for Black to move
//!
//! Weights are immutable after load and shared through `Arc`. Every evaluator
//! owns its accumulators, so there is no global network state.

pub mod accumulator;
pub mod features;

use crate::board::LegalityOracle;
use crate::constants::{HIDDEN_CHUNKS, HIDDEN_SIZE, MATE_BOUND, OUTPUT_SCALE, SIMD_LANES};
use crate::defs::{Color, Square};
use crate::mv::Move;
use crate::simd::{HiddenVector, NativeKernel, SimdKernel, ZERO_HIDDEN};
use accumulator::{Accumulator, AccumulatorPair, AccumulatorStack};
use features::{feature_index, FeatureDelta, KingBuckets};
use log::{debug, warn};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NnueError {
    #[error("failed to read weight file: {0}")]
    Io(#[from] std::io::Error),
    #[error("weight file truncated while reading {section}")]
    Truncated { section: &'static str },
    #[error("unsupported feature count {0} (expected 768, 3072 or 49152)")]
    UnsupportedFeatureCount(u32),
}

/// Largest static score; anything beyond would read as a forced mate.
pub const MAX_EVAL: i32 = MATE_BOUND - 1;

// ============================================================================
// WEIGHTS
// ============================================================================

/// Weight column and scalar bias of one input feature.
#[derive(Debug, Clone)]
pub struct FeatureWeights {
    pub weights: HiddenVector,
    pub bias: i16,
}

/// Quantized network parameters.
///
/// File layout (native byte order, no header magic):
/// `u32 F`, then F x (256 x i16 weights, i16 bias), then 256 x i16 output
/// weights and one i16 output bias.
#[derive(Debug, Clone)]
pub struct NnueWeights {
    layout: KingBuckets,
    features: Vec<FeatureWeights>,
    output_weights: HiddenVector,
    output_bias: i16,
}

struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn take<const N: usize>(&mut self, section: &'static str) -> Result<[u8; N], NnueError> {
        let end = self.pos + N;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or(NnueError::Truncated { section })?;
        self.pos = end;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn read_u32(&mut self, section: &'static str) -> Result<u32, NnueError> {
        self.take::<4>(section).map(u32::from_ne_bytes)
    }

    fn read_i16(&mut self, section: &'static str) -> Result<i16, NnueError> {
        self.take::<2>(section).map(i16::from_ne_bytes)
    }

    fn read_hidden(&mut self, section: &'static str) -> Result<HiddenVector, NnueError> {
        let mut out = ZERO_HIDDEN;
        for lanes in out.iter_mut() {
            for v in lanes.0.iter_mut() {
                *v = self.read_i16(section)?;
            }
        }
        Ok(out)
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl NnueWeights {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, NnueError> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let weights = Self::from_bytes(&data)?;
        debug!(
            "Loaded NNUE weights from {}: {} features ({:?})",
            path.display(),
            weights.features.len(),
            weights.layout
        );
        Ok(weights)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, NnueError> {
        let mut reader = ByteReader { data, pos: 0 };
        let count = reader.read_u32("feature count")?;
        let layout = KingBuckets::from_feature_count(count)
            .ok_or(NnueError::UnsupportedFeatureCount(count))?;

        let mut features = Vec::with_capacity(layout.feature_count());
        for _ in 0..layout.feature_count() {
            let weights = reader.read_hidden("feature weights")?;
            let bias = reader.read_i16("feature bias")?;
            features.push(FeatureWeights { weights, bias });
        }
        let output_weights = reader.read_hidden("output weights")?;
        let output_bias = reader.read_i16("output bias")?;

        if reader.remaining() > 0 {
            warn!(
                "Ignoring {} trailing bytes after NNUE weights",
                reader.remaining()
            );
        }

        Ok(Self {
            layout,
            features,
            output_weights,
            output_bias,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let record = (HIDDEN_SIZE + 1) * 2;
        let mut buf = Vec::with_capacity(4 + self.features.len() * record + record);
        buf.extend_from_slice(&(self.features.len() as u32).to_ne_bytes());
        let put_hidden = |buf: &mut Vec<u8>, v: &HiddenVector| {
            for x in v.iter().flat_map(|l| l.0.iter()) {
                buf.extend_from_slice(&x.to_ne_bytes());
            }
        };
        for f in &self.features {
            put_hidden(&mut buf, &f.weights);
            buf.extend_from_slice(&f.bias.to_ne_bytes());
        }
        put_hidden(&mut buf, &self.output_weights);
        buf.extend_from_slice(&self.output_bias.to_ne_bytes());
        buf
    }

    /// Deterministic pseudo-random weights for tests and benchmarks.
    pub fn random(layout: KingBuckets, seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        let mut next = |shift: u32| -> i16 {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 48) as i16) >> shift
        };
        let hidden = |shift: u32, next: &mut dyn FnMut(u32) -> i16| {
            let mut v = ZERO_HIDDEN;
            for lanes in v.iter_mut() {
                for x in lanes.0.iter_mut() {
                    *x = next(shift);
                }
            }
            v
        };

        let features = (0..layout.feature_count())
            .map(|_| FeatureWeights {
                weights: hidden(8, &mut next),
                bias: next(12),
            })
            .collect();
        let output_weights = hidden(2, &mut next);
        let output_bias = next(10);

        Self {
            layout,
            features,
            output_weights,
            output_bias,
        }
    }

    #[inline]
    pub fn layout(&self) -> KingBuckets {
        self.layout
    }

    #[inline]
    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    #[inline]
    pub fn feature(&self, index: usize) -> &FeatureWeights {
        &self.features[index]
    }

    #[inline]
    pub fn output_weights(&self) -> &HiddenVector {
        &self.output_weights
    }

    #[inline]
    pub fn output_bias(&self) -> i16 {
        self.output_bias
    }
}

// ============================================================================
// EVALUATOR
// ============================================================================

/// Incrementally updated evaluator over shared weights, generic over the SIMD
/// backend. The default kernel is the one selected for the build target.
pub struct NnueEvaluator<K: SimdKernel = NativeKernel> {
    weights: Arc<NnueWeights>,
    current: AccumulatorPair,
    stack: AccumulatorStack,
    _kernel: PhantomData<K>,
}

impl NnueEvaluator {
    pub fn new(weights: Arc<NnueWeights>) -> Self {
        Self::with_kernel(weights)
    }
}

impl<K: SimdKernel> NnueEvaluator<K> {
    pub fn with_kernel(weights: Arc<NnueWeights>) -> Self {
        Self {
            weights,
            current: AccumulatorPair::default(),
            stack: AccumulatorStack::new(),
            _kernel: PhantomData,
        }
    }

    pub fn weights(&self) -> &Arc<NnueWeights> {
        &self.weights
    }

    #[inline]
    pub fn accumulator(&self, perspective: Color) -> &Accumulator {
        self.current.get(perspective)
    }

    /// Recompute both perspectives from scratch.
    pub fn refresh<P: LegalityOracle>(&mut self, pos: &P) {
        for perspective in Color::ALL {
            self.refresh_perspective(pos, perspective);
        }
    }

    pub fn refresh_perspective<P: LegalityOracle>(&mut self, pos: &P, perspective: Color) {
        let layout = self.weights.layout;
        let king = pos.king_square(perspective);
        let acc = self.current.get_mut(perspective);
        acc.clear(king);
        for sq in Square::all() {
            if let Some(piece) = pos.piece_on(sq) {
                let f = &self.weights.features[feature_index(layout, perspective, king, piece, sq)];
                acc.add_feature::<K>(&f.weights, f.bias);
            }
        }
        acc.computed = true;
    }

    /// Apply `mv`, played from `before`, to the current accumulators.
    ///
    /// A perspective whose own king moves changes bucket and is invalidated
    /// instead; it is rebuilt on the next `evaluate`.
    pub fn update<P: LegalityOracle>(&mut self, before: &P, mv: &Move) {
        let Some(delta) = FeatureDelta::from_move(before, mv) else {
            self.current.white.computed = false;
            self.current.black.computed = false;
            return;
        };
        let layout = self.weights.layout;

        for perspective in Color::ALL {
            let acc = self.current.get_mut(perspective);
            if !acc.computed {
                continue;
            }
            if delta.king_moved == Some(perspective) {
                acc.computed = false;
                continue;
            }
            let king = acc.king_square;
            for (piece, sq) in delta.removed() {
                let f = &self.weights.features[feature_index(layout, perspective, king, piece, sq)];
                acc.sub_feature::<K>(&f.weights, f.bias);
            }
            for (piece, sq) in delta.added() {
                let f = &self.weights.features[feature_index(layout, perspective, king, piece, sq)];
                acc.add_feature::<K>(&f.weights, f.bias);
            }
        }
    }

    /// Score of `pos` in centipawns from `side`'s point of view.
    pub fn evaluate<P: LegalityOracle>(&mut self, pos: &P, side: Color) -> i32 {
        for perspective in Color::ALL {
            if !self.current.get(perspective).computed {
                self.refresh_perspective(pos, perspective);
            }
        }
        let white = self.output(&self.current.white);
        let black = self.output(&self.current.black);
        let white_relative = ((white - black) / OUTPUT_SCALE + self.weights.output_bias as i32)
            .clamp(-MAX_EVAL, MAX_EVAL);
        match side {
            Color::White => white_relative,
            Color::Black => -white_relative,
        }
    }

    fn output(&self, acc: &Accumulator) -> i32 {
        let zero = K::zero();
        let ceiling = K::splat(i16::MAX);
        let w = &self.weights.output_weights;
        let mut sum = 0i32;
        for i in 0..HIDDEN_CHUNKS {
            let activated = K::min(K::max(K::load(&acc.values[i]), zero), ceiling);
            sum += K::hsum(K::mulhi(activated, K::load(&w[i])));
        }
        sum
    }

    /// Save the current accumulators before descending one ply.
    #[inline]
    pub fn push(&mut self) {
        self.stack.push(&self.current);
    }

    /// Restore the accumulators saved by the matching `push`.
    #[inline]
    pub fn pop(&mut self) {
        self.current = self.stack.pop();
    }

    pub fn reset_stack(&mut self) {
        self.stack.clear();
    }

    #[inline]
    pub fn stack_depth(&self) -> usize {
        self.stack.depth()
    }
}

const _: () = assert!(HIDDEN_CHUNKS * SIMD_LANES == HIDDEN_SIZE);
