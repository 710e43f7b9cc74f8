use criterion::{black_box, criterion_group, criterion_main, Criterion};
use deepsquare::board::{LegalityOracle, Position};
use deepsquare::defs::Color;
use deepsquare::nnue::features::KingBuckets;
use deepsquare::nnue::{NnueEvaluator, NnueWeights};
use deepsquare::search::{SearchLimits, Searcher};
use deepsquare::simd::{NativeKernel, Scalar, SimdKernel};
use std::sync::Arc;

const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

fn weights() -> Arc<NnueWeights> {
    Arc::new(NnueWeights::random(KingBuckets::RankZones, 0))
}

fn bench_refresh<K: SimdKernel>(c: &mut Criterion, name: &str) {
    let pos = Position::from_fen(KIWIPETE).unwrap();
    let mut eval = NnueEvaluator::<K>::with_kernel(weights());
    c.bench_function(name, |b| {
        b.iter(|| {
            eval.refresh(black_box(&pos));
        })
    });
}

fn bench_refresh_scalar(c: &mut Criterion) {
    bench_refresh::<Scalar>(c, "refresh_scalar");
}

fn bench_refresh_native(c: &mut Criterion) {
    bench_refresh::<NativeKernel>(c, "refresh_native");
}

fn bench_update_evaluate(c: &mut Criterion) {
    let pos = Position::from_fen(KIWIPETE).unwrap();
    let moves = pos.legal_moves();
    let mut eval = NnueEvaluator::new(weights());
    eval.refresh(&pos);
    c.bench_function("update_evaluate_all_moves", |b| {
        b.iter(|| {
            let mut total = 0;
            for mv in &moves {
                let mut child = pos;
                child.apply_move(mv);
                eval.push();
                eval.update(&pos, mv);
                total += eval.evaluate(&child, Color::Black);
                eval.pop();
            }
            black_box(total)
        })
    });
}

fn bench_search_depth4(c: &mut Criterion) {
    let pos = Position::startpos();
    let mut searcher = Searcher::with_weights(weights());
    searcher.configure(SearchLimits::depth(4));
    let mut group = c.benchmark_group("search");
    group.sample_size(10);
    group.bench_function("startpos_depth4", |b| {
        b.iter(|| black_box(searcher.get_best_move(black_box(&pos))))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_refresh_scalar,
    bench_refresh_native,
    bench_update_evaluate,
    bench_search_depth4
);
criterion_main!(benches);
