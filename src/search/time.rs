// src/search/time.rs
//
// Time allocation with a soft bound (checked between iterations) and a hard
// bound (polled inside the tree).

use super::SearchLimits;
use crate::constants::DEFAULT_MOVES_TO_GO;
use crate::defs::Color;
use std::time::{Duration, Instant};

pub struct TimeManager {
    start_time: Instant,
    /// Optimum time (soft bound) in ms; `None` means no limit
    optimum_ms: Option<f64>,
    /// Maximum time (hard bound) in ms; `None` means no limit
    maximum_ms: Option<f64>,
}

impl TimeManager {
    pub fn new(limits: &SearchLimits, side: Color, move_overhead_ms: u64) -> Self {
        let overhead = move_overhead_ms as f64;
        let (clock, inc) = match side {
            Color::White => (limits.wtime, limits.winc),
            Color::Black => (limits.btime, limits.binc),
        };

        let (optimum, maximum) = if limits.infinite {
            (None, None)
        } else if let Some(movetime) = limits.move_time_ms {
            let t = (movetime as f64 - overhead).max(1.0);
            (Some(t), Some(t))
        } else if let Some(time_ms) = clock {
            let time_ms = time_ms as f64;
            let inc_ms = inc.unwrap_or(0) as f64;
            let mtg = limits
                .movestogo
                .filter(|&m| m > 0)
                .map_or(DEFAULT_MOVES_TO_GO as f64, |m| m as f64);

            let opt = time_ms / mtg + inc_ms / 2.0;
            // Never burn more than a quarter of the remaining clock on one move
            let max = (3.0 * opt).min(time_ms / 4.0);

            let maximum = (max - overhead).max(1.0);
            let optimum = (opt - overhead).max(1.0).min(maximum);
            (Some(optimum), Some(maximum))
        } else {
            (None, None)
        };

        Self {
            start_time: Instant::now(),
            optimum_ms: optimum,
            maximum_ms: maximum,
        }
    }

    /// No deadline at all.
    pub fn unlimited() -> Self {
        Self {
            start_time: Instant::now(),
            optimum_ms: None,
            maximum_ms: None,
        }
    }

    /// Elapsed time in milliseconds
    #[inline]
    pub fn elapsed_ms(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64() * 1000.0
    }

    /// Hard stop: abort the search in progress. Checked periodically inside search.
    #[inline]
    pub fn should_stop(&self) -> bool {
        self.maximum_ms.is_some_and(|max| self.elapsed_ms() >= max)
    }

    /// Soft stop: do not start another iteration.
    pub fn should_stop_soft(&self) -> bool {
        self.optimum_ms.is_some_and(|opt| self.elapsed_ms() >= opt)
    }

    pub fn optimum(&self) -> Option<f64> {
        self.optimum_ms
    }

    pub fn maximum(&self) -> Option<f64> {
        self.maximum_ms
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movetime_sets_both_bounds() {
        let limits = SearchLimits {
            move_time_ms: Some(1000),
            ..SearchLimits::default()
        };
        let tm = TimeManager::new(&limits, Color::White, 30);
        assert_eq!(tm.optimum(), Some(970.0));
        assert_eq!(tm.maximum(), Some(970.0));
    }

    #[test]
    fn test_clock_allocation_uses_side_to_move() {
        let limits = SearchLimits {
            wtime: Some(60_000),
            btime: Some(6_000),
            winc: Some(1_000),
            ..SearchLimits::default()
        };
        let white = TimeManager::new(&limits, Color::White, 0);
        // 60000/30 + 1000/2
        assert_eq!(white.optimum(), Some(2500.0));
        assert_eq!(white.maximum(), Some(7500.0));

        let black = TimeManager::new(&limits, Color::Black, 0);
        // min(3 * 200, 6000 / 4)
        assert_eq!(black.optimum(), Some(200.0));
        assert_eq!(black.maximum(), Some(600.0));
    }

    #[test]
    fn test_infinite_and_depth_only_have_no_deadline() {
        let infinite = SearchLimits {
            infinite: true,
            wtime: Some(10),
            ..SearchLimits::default()
        };
        assert_eq!(TimeManager::new(&infinite, Color::White, 30).maximum(), None);
        let depth_only = TimeManager::new(&SearchLimits::default(), Color::Black, 30);
        assert!(!depth_only.should_stop());
        assert!(!depth_only.should_stop_soft());
    }
}
