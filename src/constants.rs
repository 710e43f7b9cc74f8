//! DeepSquare Core Constants
//!
//! Centralized constants for the engine to avoid magic numbers
//! and keep search, evaluation and protocol layers consistent.

/// Engine identification
pub const ENGINE_NAME: &str = "DeepSquare";
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const ENGINE_AUTHOR: &str = "LabWorkShift";

/// Default weight file looked up next to the binary
pub const DEFAULT_WEIGHTS_PATH: &str = "weights.bin";

/// Search constants
pub const MATE_SCORE: i32 = 30_000;
pub const INFINITY: i32 = 32_000;
/// Scores beyond this magnitude are mate scores
pub const MATE_BOUND: i32 = MATE_SCORE - MAX_PLY as i32;
/// Hard limit on iterative deepening depth
pub const MAX_DEPTH: u8 = 64;
/// Accumulator stack capacity, one slot per ply below the root
pub const MAX_PLY: usize = MAX_DEPTH as usize;
/// Depth searched when no `depth` limit is given
pub const DEFAULT_DEPTH: u8 = 6;

/// Node check interval for deadline polling (mask, checked as `nodes & N == 0`)
pub const NODE_CHECK_INTERVAL: u64 = 2047;

/// Default move overhead in milliseconds
pub const DEFAULT_MOVE_OVERHEAD_MS: u64 = 30;
/// Maximum move overhead in milliseconds
pub const MAX_MOVE_OVERHEAD_MS: u64 = 5000;
/// Moves-to-go estimate for sudden death time controls
pub const DEFAULT_MOVES_TO_GO: u64 = 30;

/// Move ordering constants
pub const MVV_MULTIPLIER: i32 = 10;
pub const PROMOTION_BONUS: i32 = 1000;

/// NNUE architecture constants
pub const HIDDEN_SIZE: usize = 256;
/// Lanes per SIMD vector (16 x i16 = 256 bits)
pub const SIMD_LANES: usize = 16;
/// Vector chunks per hidden layer
pub const HIDDEN_CHUNKS: usize = HIDDEN_SIZE / SIMD_LANES;
/// Features per king bucket: 12 piece kinds/colors x 64 squares
pub const INPUTS_PER_BUCKET: usize = 768;
/// Output dequantization divisor
pub const OUTPUT_SCALE: i32 = 64;
