// src/uci/mod.rs
//! Line-oriented UCI front end.
//!
//! Output goes through an mpsc channel drained by a printer thread, so the
//! search worker and the command loop never interleave partial lines. Each
//! `go` runs on a worker thread that holds the searcher lock for the duration
//! of the search. Commands that touch the searcher stop and join it first;
//! `position` only replaces the handler's copy and never waits.

use crate::board::{BoardError, LegalityOracle, Position};
use crate::constants::{
    DEFAULT_DEPTH, DEFAULT_MOVE_OVERHEAD_MS, DEFAULT_WEIGHTS_PATH, ENGINE_AUTHOR, ENGINE_NAME,
    ENGINE_VERSION, MAX_DEPTH, MAX_MOVE_OVERHEAD_MS,
};
use crate::movegen;
use crate::mv::Move;
use crate::nnue::{NnueError, NnueWeights};
use crate::search::{SearchLimits, Searcher, StopToken};
use anyhow::Context;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::io::{self, BufRead};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UciError {
    #[error("evaluator not loaded (set EvalFile or start with --weights)")]
    EvaluatorNotLoaded,
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error(transparent)]
    Nnue(#[from] NnueError),
}

/// Parsed arguments of a `go` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoCommand {
    pub limits: SearchLimits,
    pub perft: Option<u32>,
    pub ponder: bool,
    pub searchmoves: Vec<Move>,
}

pub fn parse_go(parts: &[&str]) -> GoCommand {
    let mut limits = SearchLimits::default();
    let mut depth: Option<u32> = None;
    let mut mate: Option<u32> = None;
    let mut perft = None;
    let mut ponder = false;
    let mut searchmoves = Vec::new();

    fn ms(v: Option<&&str>) -> Option<u64> {
        v.and_then(|s| s.parse::<i64>().ok()).map(|t| t.max(0) as u64)
    }

    let mut it = parts.iter().peekable();
    while let Some(&tok) = it.next() {
        match tok {
            "depth" => depth = it.next().and_then(|v| v.parse().ok()),
            "mate" => mate = it.next().and_then(|v| v.parse().ok()),
            "movetime" => limits.move_time_ms = ms(it.next()),
            "wtime" => limits.wtime = ms(it.next()),
            "btime" => limits.btime = ms(it.next()),
            "winc" => limits.winc = ms(it.next()),
            "binc" => limits.binc = ms(it.next()),
            "movestogo" => limits.movestogo = it.next().and_then(|v| v.parse().ok()),
            "nodes" => limits.nodes = it.next().and_then(|v| v.parse().ok()),
            "perft" => perft = it.next().and_then(|v| v.parse().ok()),
            "infinite" => limits.infinite = true,
            "ponder" => ponder = true,
            "searchmoves" => {
                while let Some(mv) = it.peek().and_then(|s| Move::parse_uci(s)) {
                    searchmoves.push(mv);
                    it.next();
                }
            }
            _ => {}
        }
    }

    let open_ended = limits.infinite
        || limits.move_time_ms.is_some()
        || limits.wtime.is_some()
        || limits.btime.is_some()
        || limits.nodes.is_some();
    let fallback = if open_ended { MAX_DEPTH } else { DEFAULT_DEPTH };
    limits.max_depth = depth
        .or_else(|| mate.map(|m| m.saturating_mul(2)))
        .map_or(fallback, |d| d.min(MAX_DEPTH as u32) as u8);

    GoCommand {
        limits,
        perft,
        ponder,
        searchmoves,
    }
}

pub struct UciHandler {
    position: Position,
    searcher: Option<Arc<Mutex<Searcher>>>,
    worker: Option<JoinHandle<()>>,
    stop: StopToken,
    tx: mpsc::Sender<String>,
    printer: Option<JoinHandle<()>>,
    move_overhead_ms: u64,
    debug: bool,
    hash_mb: usize,
    threads: usize,
    multipv: usize,
    skill_level: u8,
    ponder: bool,
}

impl UciHandler {
    /// Handler printing to stdout.
    pub fn new(weights: Option<Arc<NnueWeights>>) -> Self {
        let (tx, rx) = mpsc::channel::<String>();
        let printer = thread::spawn(move || {
            while let Ok(msg) = rx.recv() {
                println!("{}", msg);
            }
        });
        let mut handler = Self::with_sender(weights, tx);
        handler.printer = Some(printer);
        handler
    }

    /// Handler sending every output line to `tx`.
    pub fn with_sender(weights: Option<Arc<NnueWeights>>, tx: mpsc::Sender<String>) -> Self {
        let mut handler = Self {
            position: Position::startpos(),
            searcher: None,
            worker: None,
            stop: StopToken::new(),
            tx,
            printer: None,
            move_overhead_ms: DEFAULT_MOVE_OVERHEAD_MS,
            debug: false,
            hash_mb: 16,
            threads: 1,
            multipv: 1,
            skill_level: 20,
            ponder: false,
        };
        if let Some(w) = weights {
            handler.install_weights(w);
        }
        handler
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn run(mut self) -> anyhow::Result<()> {
        info!("{} {} ready", ENGINE_NAME, ENGINE_VERSION);
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = line.context("failed to read command from stdin")?;
            if !self.handle_command(&line) {
                break;
            }
        }
        self.shutdown();
        Ok(())
    }

    /// Stop any search, then flush and close the output channel.
    pub fn shutdown(mut self) {
        self.stop_search();
        self.searcher = None;
        let UciHandler { tx, printer, .. } = self;
        drop(tx);
        if let Some(printer) = printer {
            let _ = printer.join();
        }
    }

    fn send(&self, line: impl Into<String>) {
        let _ = self.tx.send(line.into());
    }

    /// Block until the current search worker, if any, has finished.
    pub fn wait_for_search(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("search worker panicked");
            }
        }
    }

    /// Interrupt the running search, if any, and wait for its `bestmove`.
    fn stop_search(&mut self) {
        if self.worker.is_some() {
            self.stop.request_stop();
            self.wait_for_search();
        }
    }

    fn install_weights(&mut self, weights: Arc<NnueWeights>) {
        let mut searcher = Searcher::with_weights(weights);
        searcher.set_move_overhead(self.move_overhead_ms);
        self.stop = searcher.stop_token();
        self.searcher = Some(Arc::new(Mutex::new(searcher)));
    }

    /// Handle one command line. Returns `false` on `quit`.
    pub fn handle_command(&mut self, line: &str) -> bool {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((&cmd, args)) = parts.split_first() else {
            return true;
        };
        if self.debug {
            self.send(format!("info string received {}", line.trim()));
        }

        match cmd {
            "uci" => self.handle_uci(),
            "debug" => self.debug = args.first() == Some(&"on"),
            "isready" => self.send("readyok"),
            "setoption" => {
                self.stop_search();
                self.handle_setoption(args);
            }
            "register" => self.send("info string registration not required"),
            "ucinewgame" => {
                self.stop_search();
                self.position = Position::startpos();
            }
            "position" => {
                if let Err(e) = self.handle_position(args) {
                    warn!("{}", e);
                    self.send(format!("info string {}", e));
                }
            }
            "go" => {
                if let Err(e) = self.handle_go(args) {
                    warn!("go rejected: {}", e);
                    self.send(format!("info string {}", e));
                    self.send(format!("bestmove {}", Move::NULL));
                }
            }
            "stop" => self.stop.request_stop(),
            "ponderhit" => debug!("ponderhit ignored: pondering searches normally"),
            "quit" => {
                self.stop_search();
                return false;
            }
            "d" => {
                for row in self.position.to_string().lines() {
                    self.send(row.to_string());
                }
            }
            "eval" => {
                self.stop_search();
                match self.static_eval() {
                    Ok(cp) => self.send(format!("info string eval cp {} (side to move)", cp)),
                    Err(e) => self.send(format!("info string {}", e)),
                }
            }
            _ => debug!("unknown command: {}", line.trim()),
        }
        true
    }

    fn handle_uci(&self) {
        self.send(format!("id name {} {}", ENGINE_NAME, ENGINE_VERSION));
        self.send(format!("id author {}", ENGINE_AUTHOR));
        self.send("option name Hash type spin default 16 min 1 max 1024");
        self.send("option name Threads type spin default 1 min 1 max 1");
        self.send("option name MultiPV type spin default 1 min 1 max 1");
        self.send("option name Skill Level type spin default 20 min 0 max 20");
        self.send("option name Ponder type check default false");
        self.send(format!(
            "option name Move Overhead type spin default {} min 0 max {}",
            DEFAULT_MOVE_OVERHEAD_MS, MAX_MOVE_OVERHEAD_MS
        ));
        self.send(format!(
            "option name EvalFile type string default {}",
            DEFAULT_WEIGHTS_PATH
        ));
        self.send("uciok");
    }

    fn handle_setoption(&mut self, parts: &[&str]) {
        let Some(value_idx) = parts.iter().position(|&p| p == "value") else {
            return;
        };
        if parts.first() != Some(&"name") || value_idx < 2 || value_idx + 1 >= parts.len() {
            return;
        }

        let name = parts[1..value_idx].join(" ").to_lowercase();
        let value = parts[(value_idx + 1)..].join(" ");

        match name.as_str() {
            "hash" => {
                if let Ok(mb) = value.parse::<usize>() {
                    self.hash_mb = mb.clamp(1, 1024);
                    debug!("Hash={} MB accepted, there is no transposition table", self.hash_mb);
                }
            }
            "threads" => {
                if let Ok(n) = value.parse::<usize>() {
                    self.threads = n.max(1);
                    if self.threads > 1 {
                        debug!("Threads={} accepted, search is single-threaded", self.threads);
                    }
                }
            }
            "multipv" => {
                if let Ok(n) = value.parse::<usize>() {
                    self.multipv = n.max(1);
                    debug!("MultiPV={} accepted, a single line is reported", self.multipv);
                }
            }
            "skill level" => {
                if let Ok(n) = value.parse::<u8>() {
                    self.skill_level = n.min(20);
                    debug!("Skill Level={} accepted, search strength is fixed", self.skill_level);
                }
            }
            "ponder" => {
                self.ponder = value.eq_ignore_ascii_case("true");
                debug!("Ponder={} accepted", self.ponder);
            }
            "move overhead" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.move_overhead_ms = ms.min(MAX_MOVE_OVERHEAD_MS);
                    if let Some(searcher) = &self.searcher {
                        searcher.lock().set_move_overhead(self.move_overhead_ms);
                    }
                }
            }
            "evalfile" => match NnueWeights::load(&value) {
                Ok(weights) => {
                    info!("Loaded evaluation weights from {}", value);
                    self.install_weights(Arc::new(weights));
                    self.send(format!("info string loaded {}", value));
                }
                Err(e) => {
                    error!("Failed to load {}: {}", value, e);
                    self.send(format!("info string failed to load {}: {}", value, e));
                }
            },
            _ => debug!("unknown option: {}", name),
        }
    }

    fn handle_position(&mut self, parts: &[&str]) -> Result<(), UciError> {
        let moves_idx = parts.iter().position(|&p| p == "moves");
        let setup = &parts[..moves_idx.unwrap_or(parts.len())];

        let mut position = match setup.split_first() {
            Some((&"startpos", _)) => Position::startpos(),
            Some((&"fen", fen)) => Position::from_fen(&fen.join(" "))?,
            _ => return Err(BoardError::InvalidFen(setup.join(" ")).into()),
        };

        if let Some(idx) = moves_idx {
            for mv in &parts[idx + 1..] {
                if let Err(e) = position.apply_uci(mv) {
                    // Keep the position reached so far.
                    self.position = position;
                    return Err(e.into());
                }
            }
        }
        self.position = position;
        Ok(())
    }

    fn handle_go(&mut self, parts: &[&str]) -> Result<(), UciError> {
        self.stop_search();
        let go = parse_go(parts);

        if let Some(depth) = go.perft {
            self.run_perft(depth);
            return Ok(());
        }
        if !go.searchmoves.is_empty() {
            debug!("searchmoves ignored ({} moves)", go.searchmoves.len());
        }
        if go.ponder {
            debug!("go ponder searches as a normal go");
        }

        let searcher = self
            .searcher
            .as_ref()
            .map(Arc::clone)
            .ok_or(UciError::EvaluatorNotLoaded)?;

        {
            let mut s = searcher.lock();
            s.configure(go.limits);
            s.set_move_overhead(self.move_overhead_ms);
            let tx = self.tx.clone();
            s.set_progress(move |report| {
                let _ = tx.send(report.to_uci());
            });
        }

        self.stop.reset();
        let tx = self.tx.clone();
        let position = self.position;
        self.worker = Some(thread::spawn(move || {
            let mut s = searcher.lock();
            let best = s.get_best_move(&position);
            s.clear_progress();
            let _ = tx.send(format!("bestmove {}", best));
        }));
        Ok(())
    }

    fn run_perft(&self, depth: u32) {
        let mut total = 0;
        for (mv, nodes) in movegen::divide(&self.position, depth) {
            self.send(format!("{}: {}", mv, nodes));
            total += nodes;
        }
        if depth == 0 {
            total = 1;
        }
        self.send(String::new());
        self.send(format!("Nodes searched: {}", total));
    }

    fn static_eval(&self) -> Result<i32, UciError> {
        let searcher = self.searcher.as_ref().ok_or(UciError::EvaluatorNotLoaded)?;
        let mut s = searcher.lock();
        let evaluator = s.evaluator_mut();
        evaluator.reset_stack();
        evaluator.refresh(&self.position);
        Ok(evaluator.evaluate(&self.position, self.position.side_to_move()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nnue::features::KingBuckets;
    use std::time::Duration;

    fn handler(with_weights: bool) -> (UciHandler, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel();
        let weights =
            with_weights.then(|| Arc::new(NnueWeights::random(KingBuckets::Single, 42)));
        (UciHandler::with_sender(weights, tx), rx)
    }

    #[test]
    fn test_parse_go() {
        let go = parse_go(&["wtime", "1000", "btime", "-5", "winc", "10", "movestogo", "12"]);
        assert_eq!(go.limits.wtime, Some(1000));
        assert_eq!(go.limits.btime, Some(0));
        assert_eq!(go.limits.winc, Some(10));
        assert_eq!(go.limits.movestogo, Some(12));
        assert_eq!(go.limits.max_depth, MAX_DEPTH);

        assert_eq!(parse_go(&[]).limits.max_depth, DEFAULT_DEPTH);
        assert_eq!(parse_go(&["depth", "3"]).limits.max_depth, 3);
        assert_eq!(parse_go(&["mate", "2"]).limits.max_depth, 4);
        assert_eq!(parse_go(&["perft", "4"]).perft, Some(4));

        let go = parse_go(&["searchmoves", "e2e4", "d2d4", "infinite"]);
        assert_eq!(go.searchmoves.len(), 2);
        assert!(go.limits.infinite);
    }

    #[test]
    fn test_uci_handshake() {
        let (mut h, rx) = handler(false);
        assert!(h.handle_command("uci"));
        let lines: Vec<String> = rx.try_iter().collect();
        assert!(lines[0].starts_with("id name DeepSquare"));
        assert!(lines.iter().any(|l| l.starts_with("option name EvalFile")));
        assert_eq!(lines.last().map(String::as_str), Some("uciok"));
    }

    #[test]
    fn test_position_with_moves() {
        let (mut h, _rx) = handler(false);
        h.handle_command("position startpos moves e2e4 e7e5 g1f3");
        assert!(h
            .position()
            .to_fen()
            .starts_with("rnbqkbnr/pppp1ppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq"));
        h.handle_command("position fen 4k3/8/8/8/8/8/4P3/4K3 w - - 0 1 moves e2e4");
        assert!(h.position().to_fen().starts_with("4k3/8/8/8/4P3/8/8/4K3 b"));
    }

    #[test]
    fn test_go_without_weights_reports_error() {
        let (mut h, rx) = handler(false);
        h.handle_command("go depth 1");
        let lines: Vec<String> = rx.try_iter().collect();
        assert!(lines[0].starts_with("info string evaluator not loaded"));
        assert_eq!(lines[1], "bestmove 0000");
    }

    #[test]
    fn test_go_depth_prints_info_and_bestmove() {
        let (mut h, rx) = handler(true);
        h.handle_command("position startpos");
        h.handle_command("go depth 2");
        h.wait_for_search();
        let lines: Vec<String> = rx.try_iter().collect();
        assert!(lines[0].starts_with("info depth 1 score cp"));
        assert!(lines[1].starts_with("info depth 2 score cp"));
        let best = lines[2].strip_prefix("bestmove ").unwrap();
        assert!(h.position().parse_uci_move(best).is_some());
    }

    #[test]
    fn test_go_perft() {
        let (mut h, rx) = handler(false);
        h.handle_command("go perft 2");
        let lines: Vec<String> = rx.try_iter().collect();
        assert_eq!(lines.len(), 22);
        assert_eq!(lines.last().map(String::as_str), Some("Nodes searched: 400"));
    }

    /// Runs `commands` on a separate thread and reports whether they all
    /// returned within `timeout` while a `go infinite` search is active.
    fn returns_during_infinite(commands: Vec<&'static str>, timeout: Duration) -> bool {
        let (mut h, rx) = handler(true);
        let (done_tx, done_rx) = mpsc::channel();
        thread::spawn(move || {
            h.handle_command("position startpos");
            h.handle_command("go infinite");
            for cmd in commands {
                h.handle_command(cmd);
            }
            let _ = done_tx.send(h.position().to_fen());
            h.handle_command("quit");
            drop(rx);
        });
        done_rx.recv_timeout(timeout).is_ok()
    }

    #[test]
    fn test_position_does_not_wait_for_infinite_search() {
        assert!(returns_during_infinite(
            vec!["position startpos moves e2e4"],
            Duration::from_secs(5)
        ));
    }

    #[test]
    fn test_commands_interrupt_infinite_search() {
        for cmd in ["setoption name Move Overhead value 10", "ucinewgame", "eval", "go depth 1"] {
            assert!(
                returns_during_infinite(vec![cmd], Duration::from_secs(5)),
                "{} blocked",
                cmd
            );
        }
    }

    #[test]
    fn test_new_position_while_searching() {
        let (mut h, rx) = handler(true);
        h.handle_command("position startpos");
        h.handle_command("go infinite");
        h.handle_command("position startpos moves e2e4");
        assert!(h.position().to_fen().starts_with("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b"));
        h.handle_command("stop");
        h.wait_for_search();
        let lines: Vec<String> = rx.try_iter().collect();
        let best = lines.last().unwrap().strip_prefix("bestmove ").unwrap();
        assert!(Position::startpos().parse_uci_move(best).is_some());
    }

    #[test]
    fn test_quit_after_stop() {
        let (mut h, rx) = handler(true);
        h.handle_command("go infinite");
        h.handle_command("stop");
        assert!(!h.handle_command("quit"));
        let lines: Vec<String> = rx.try_iter().collect();
        assert!(lines.last().unwrap().starts_with("bestmove "));
        assert_ne!(lines.last().unwrap(), "bestmove 0000");
    }
}
