// src/search/mod.rs
//! Alpha-beta search with iterative deepening over the NNUE evaluator.
//!
//! The searcher descends by copying positions: each child works on its own copy,
//! while the evaluator mirrors the descent with `push`/`update`/`pop` on its
//! accumulator stack.

pub mod ordering;
pub mod time;

use crate::board::LegalityOracle;
use crate::constants::{
    DEFAULT_DEPTH, DEFAULT_MOVE_OVERHEAD_MS, INFINITY, MATE_BOUND, MATE_SCORE, MAX_DEPTH, MAX_PLY,
    NODE_CHECK_INTERVAL,
};
use crate::mv::Move;
use crate::nnue::{NnueEvaluator, NnueWeights};
use log::debug;
use ordering::MoveOrderer;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::TimeManager;

// =============================================================================
// TYPES
// =============================================================================

/// Clonable cancellation handle shared between the searcher and its drivers.
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Budget for one search. All clock values are milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub max_depth: u8,
    pub move_time_ms: Option<u64>,
    pub wtime: Option<u64>,
    pub btime: Option<u64>,
    pub winc: Option<u64>,
    pub binc: Option<u64>,
    pub movestogo: Option<u32>,
    pub nodes: Option<u64>,
    pub infinite: bool,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_DEPTH,
            move_time_ms: None,
            wtime: None,
            btime: None,
            winc: None,
            binc: None,
            movestogo: None,
            nodes: None,
            infinite: false,
        }
    }
}

impl SearchLimits {
    pub fn depth(max_depth: u8) -> Self {
        Self {
            max_depth,
            ..Self::default()
        }
    }
}

/// Result of the last completed iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchInfo {
    pub nodes: u64,
    pub depth: u8,
    pub pv: Vec<Move>,
    pub score: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    pub best_move: Move,
    pub info: SearchInfo,
}

/// Progress snapshot handed to the callback after every completed depth.
#[derive(Debug, Clone)]
pub struct SearchReport {
    pub depth: u8,
    pub score: i32,
    pub nodes: u64,
    pub elapsed: Duration,
    pub pv: Vec<Move>,
}

impl SearchReport {
    /// UCI `info` line for this report.
    pub fn to_uci(&self) -> String {
        let ms = self.elapsed.as_millis() as u64;
        let nps = self.nodes * 1000 / ms.max(1);
        let mut line = format!("info depth {} score {}", self.depth, format_score(self.score));
        let _ = write!(line, " nodes {} nps {} time {} pv", self.nodes, nps, ms);
        for mv in &self.pv {
            let _ = write!(line, " {}", mv);
        }
        line
    }
}

/// `cp N` or `mate N` (moves, negative when being mated).
pub fn format_score(score: i32) -> String {
    if score.abs() >= MATE_BOUND {
        let plies = MATE_SCORE - score.abs();
        let moves = (plies + 1) / 2;
        if score > 0 {
            format!("mate {}", moves)
        } else {
            format!("mate -{}", moves)
        }
    } else {
        format!("cp {}", score)
    }
}

pub type ProgressCallback = Box<dyn FnMut(&SearchReport) + Send>;

// =============================================================================
// PV TABLE
// =============================================================================

/// Triangular principal variation table.
struct PvTable {
    lines: Vec<[Move; MAX_PLY + 1]>,
    lengths: [usize; MAX_PLY + 2],
}

impl PvTable {
    fn new() -> Self {
        Self {
            lines: vec![[Move::NULL; MAX_PLY + 1]; MAX_PLY + 2],
            lengths: [0; MAX_PLY + 2],
        }
    }

    #[inline]
    fn clear(&mut self, ply: usize) {
        self.lengths[ply] = 0;
    }

    /// `mv` followed by the child's line becomes the line at `ply`.
    fn update(&mut self, ply: usize, mv: Move) {
        let child_len = self.lengths[ply + 1].min(MAX_PLY - ply);
        let (head, tail) = self.lines.split_at_mut(ply + 1);
        let line = &mut head[ply];
        line[0] = mv;
        line[1..=child_len].copy_from_slice(&tail[0][..child_len]);
        self.lengths[ply] = child_len + 1;
    }

    fn line(&self, ply: usize) -> &[Move] {
        &self.lines[ply][..self.lengths[ply]]
    }
}

// =============================================================================
// SEARCHER
// =============================================================================

pub struct Searcher {
    evaluator: NnueEvaluator,
    limits: SearchLimits,
    move_overhead_ms: u64,
    stop: StopToken,
    progress: Option<ProgressCallback>,
    time: TimeManager,
    pv: PvTable,
    nodes: u64,
    aborted: bool,
}

impl Searcher {
    pub fn new(evaluator: NnueEvaluator) -> Self {
        Self {
            evaluator,
            limits: SearchLimits::default(),
            move_overhead_ms: DEFAULT_MOVE_OVERHEAD_MS,
            stop: StopToken::new(),
            progress: None,
            time: TimeManager::unlimited(),
            pv: PvTable::new(),
            nodes: 0,
            aborted: false,
        }
    }

    pub fn with_weights(weights: Arc<NnueWeights>) -> Self {
        Self::new(NnueEvaluator::new(weights))
    }

    /// Set the budget for subsequent searches. A depth of 0 keeps the default.
    pub fn configure(&mut self, mut limits: SearchLimits) {
        limits.max_depth = match limits.max_depth {
            0 => DEFAULT_DEPTH,
            d => d.min(MAX_DEPTH),
        };
        self.limits = limits;
    }

    pub fn limits(&self) -> &SearchLimits {
        &self.limits
    }

    pub fn set_move_overhead(&mut self, ms: u64) {
        self.move_overhead_ms = ms;
    }

    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    pub fn set_progress<F>(&mut self, callback: F)
    where
        F: FnMut(&SearchReport) + Send + 'static,
    {
        self.progress = Some(Box::new(callback));
    }

    pub fn clear_progress(&mut self) {
        self.progress = None;
    }

    pub fn evaluator_mut(&mut self) -> &mut NnueEvaluator {
        &mut self.evaluator
    }

    /// Nodes visited by the most recent search.
    pub fn nodes(&self) -> u64 {
        self.nodes
    }

    pub fn get_best_move<P: LegalityOracle>(&mut self, pos: &P) -> Move {
        self.search(pos).best_move
    }

    /// Iterative deepening from depth 1 to the configured maximum.
    ///
    /// An iteration interrupted by a stop request or a deadline is discarded.
    /// The result is the best move of the last completed depth, or the first
    /// ordered move if no depth completed, or `Move::NULL` without legal moves.
    pub fn search<P: LegalityOracle>(&mut self, pos: &P) -> SearchOutcome {
        let start = Instant::now();
        self.nodes = 0;
        self.aborted = false;
        self.time = TimeManager::new(&self.limits, pos.side_to_move(), self.move_overhead_ms);

        let mut info = SearchInfo::default();
        let mut moves = pos.legal_moves();
        if moves.is_empty() {
            return SearchOutcome {
                best_move: Move::NULL,
                info,
            };
        }
        MoveOrderer::order(&mut moves, pos);
        let mut best_move = moves[0];

        self.evaluator.reset_stack();
        self.evaluator.refresh(pos);

        for depth in 1..=self.limits.max_depth {
            if self.stop.is_stopped() || (depth > 1 && self.time.should_stop_soft()) {
                break;
            }
            MoveOrderer::promote(&mut moves, best_move);

            let mut alpha = -INFINITY;
            let mut best_score = -INFINITY;
            let mut iteration_best = None;
            self.pv.clear(0);

            for mv in &moves {
                let mut child = pos.clone();
                if !child.apply_move(mv) {
                    continue;
                }
                self.evaluator.push();
                self.evaluator.update(pos, mv);
                let score = -self.alpha_beta(&child, depth - 1, -INFINITY, -alpha, 1);
                self.evaluator.pop();

                if self.aborted {
                    break;
                }
                if score > best_score {
                    best_score = score;
                    iteration_best = Some(*mv);
                    self.pv.update(0, *mv);
                    alpha = alpha.max(score);
                }
            }

            if self.aborted {
                debug!("depth {} interrupted after {} nodes", depth, self.nodes);
                break;
            }
            let Some(mv) = iteration_best else {
                break;
            };

            best_move = mv;
            info = SearchInfo {
                nodes: self.nodes,
                depth,
                pv: self.pv.line(0).to_vec(),
                score: best_score,
            };
            debug!(
                "depth {} score {} nodes {} best {}",
                depth, best_score, self.nodes, best_move
            );

            if let Some(callback) = self.progress.as_mut() {
                callback(&SearchReport {
                    depth,
                    score: best_score,
                    nodes: self.nodes,
                    elapsed: start.elapsed(),
                    pv: info.pv.clone(),
                });
            }
        }

        info.nodes = self.nodes;
        SearchOutcome { best_move, info }
    }

    /// One full-window search of `pos` to `depth`, without deadlines.
    pub fn search_depth<P: LegalityOracle>(&mut self, pos: &P, depth: u8) -> i32 {
        self.nodes = 0;
        self.aborted = false;
        self.time = TimeManager::unlimited();
        self.evaluator.reset_stack();
        self.evaluator.refresh(pos);
        self.alpha_beta(pos, depth.min(MAX_DEPTH), -INFINITY, INFINITY, 0)
    }

    /// Fail-soft negamax. The result is meaningless once the search is aborted.
    pub fn alpha_beta<P: LegalityOracle>(
        &mut self,
        pos: &P,
        depth: u8,
        mut alpha: i32,
        beta: i32,
        ply: usize,
    ) -> i32 {
        self.nodes += 1;
        if self.check_abort() {
            return 0;
        }
        self.pv.clear(ply);

        if depth == 0 || ply >= MAX_PLY {
            return self.evaluator.evaluate(pos, pos.side_to_move());
        }

        let mut moves = pos.legal_moves();
        if moves.is_empty() {
            return if pos.is_in_check() {
                -MATE_SCORE + ply as i32
            } else {
                0
            };
        }
        MoveOrderer::order(&mut moves, pos);

        let mut best_score = -INFINITY;
        for mv in &moves {
            let mut child = pos.clone();
            if !child.apply_move(mv) {
                continue;
            }
            self.evaluator.push();
            self.evaluator.update(pos, mv);
            let score = -self.alpha_beta(&child, depth - 1, -beta, -alpha, ply + 1);
            self.evaluator.pop();

            if self.aborted {
                return 0;
            }
            if score > best_score {
                best_score = score;
                if score > alpha {
                    alpha = score;
                    self.pv.update(ply, *mv);
                }
            }
            if alpha >= beta {
                break;
            }
        }
        best_score
    }

    fn check_abort(&mut self) -> bool {
        if self.aborted {
            return true;
        }
        if self.stop.is_stopped() || self.limits.nodes.is_some_and(|n| self.nodes > n) {
            self.aborted = true;
        } else if self.nodes & NODE_CHECK_INTERVAL == 0 && self.time.should_stop() {
            self.aborted = true;
        }
        self.aborted
    }
}
