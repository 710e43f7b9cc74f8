//! DeepSquare - Main Entry Point
//!
//! Loads the evaluation weights, then either runs the UCI loop (default) or one
//! of the offline tools. Diagnostics go to stderr through `RUST_LOG`; stdout is
//! reserved for protocol output.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use deepsquare::board::{Position, START_FEN};
use deepsquare::constants::{DEFAULT_DEPTH, DEFAULT_WEIGHTS_PATH, ENGINE_NAME, ENGINE_VERSION};
use deepsquare::movegen;
use deepsquare::nnue::features::KingBuckets;
use deepsquare::nnue::NnueWeights;
use deepsquare::search::{SearchLimits, Searcher};
use deepsquare::uci::UciHandler;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "deepsquare", version, about = "NNUE alpha-beta chess engine")]
struct Args {
    /// Weight file to load (defaults to weights.bin when present)
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Search depth used by `bench`
    #[arg(long, default_value_t = DEFAULT_DEPTH)]
    depth: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Speak UCI on stdin/stdout
    Uci,
    /// Count leaf nodes of the legal move tree, split by root move
    Perft {
        #[arg(long, default_value = START_FEN)]
        fen: String,
        #[arg(long, default_value_t = 5)]
        depth: u32,
    },
    /// Fixed-depth search over a few positions, reporting nodes and speed
    Bench {
        #[arg(long)]
        depth: Option<u8>,
    },
}

const BENCH_FENS: [&str; 4] = [
    START_FEN,
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
    "r1bq1rk1/pp2bppp/2n1pn2/3p4/2PP4/2N1PN2/PP1B1PPP/R2QKB1R w KQ - 0 8",
];

fn load_weights(path: Option<&Path>) -> Result<Option<Arc<NnueWeights>>> {
    match path {
        Some(p) => {
            let weights = NnueWeights::load(p)
                .with_context(|| format!("failed to load weights from {}", p.display()))?;
            Ok(Some(Arc::new(weights)))
        }
        None if Path::new(DEFAULT_WEIGHTS_PATH).exists() => {
            let weights = NnueWeights::load(DEFAULT_WEIGHTS_PATH)
                .with_context(|| format!("failed to load {}", DEFAULT_WEIGHTS_PATH))?;
            Ok(Some(Arc::new(weights)))
        }
        None => {
            warn!("No weight file found; set EvalFile or pass --weights before searching");
            Ok(None)
        }
    }
}

fn run_perft(fen: &str, depth: u32) -> Result<()> {
    let pos = Position::from_fen(fen).context("invalid --fen")?;
    let start = Instant::now();
    let mut total = 0;
    for (mv, nodes) in movegen::divide(&pos, depth) {
        println!("{}: {}", mv, nodes);
        total += nodes;
    }
    let ms = start.elapsed().as_millis().max(1) as u64;
    println!();
    println!("Nodes searched: {}", total);
    println!("Time: {} ms ({} nps)", ms, total * 1000 / ms);
    Ok(())
}

fn run_bench(weights: Option<Arc<NnueWeights>>, depth: u8) -> Result<()> {
    let weights = weights.unwrap_or_else(|| {
        warn!("bench: no weights loaded, using deterministic random weights");
        Arc::new(NnueWeights::random(KingBuckets::RankZones, 0))
    });
    let mut searcher = Searcher::with_weights(weights);
    searcher.configure(SearchLimits::depth(depth));

    let start = Instant::now();
    let mut nodes = 0;
    for fen in BENCH_FENS {
        let pos = Position::from_fen(fen)?;
        let outcome = searcher.search(&pos);
        println!(
            "{:<72} bestmove {} nodes {}",
            fen, outcome.best_move, outcome.info.nodes
        );
        nodes += outcome.info.nodes;
    }
    let ms = start.elapsed().as_millis().max(1) as u64;
    println!("{} nodes {} nps", nodes, nodes * 1000 / ms);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let args = Args::parse();
    info!("{} {} starting", ENGINE_NAME, ENGINE_VERSION);

    match args.command.unwrap_or(Command::Uci) {
        Command::Uci => {
            let weights = load_weights(args.weights.as_deref())?;
            UciHandler::new(weights).run()
        }
        Command::Perft { fen, depth } => run_perft(&fen, depth),
        Command::Bench { depth } => {
            let weights = load_weights(args.weights.as_deref())?;
            run_bench(weights, depth.unwrap_or(args.depth))
        }
    }
}
