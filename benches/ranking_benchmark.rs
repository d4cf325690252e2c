use assurly::models::analysis::{CoverageComparison, PriceComparison};
use assurly::models::{CompetitorComparison, PolicyComparison, Tier};
use assurly::services::ranking::{impact_score, rank, reveal, score_comparison};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn comparison(pct: f64, better: usize, worse: usize) -> CompetitorComparison {
    CompetitorComparison {
        price_comparison: PriceComparison {
            current_premium: 5000.0,
            competitor_premium: 5000.0 + 50.0 * pct,
            difference: 50.0 * pct,
            percentage_difference: pct,
        },
        coverage_comparison: CoverageComparison {
            better_coverage: (0..better).map(|i| format!("Better {}", i)).collect(),
            worse_coverage: (0..worse).map(|i| format!("Worse {}", i)).collect(),
            similar_coverage: vec!["Liability".to_string()],
        },
        ..Default::default()
    }
}

/// A batch shaped like real uploads: mixed price deltas, a few coverage items.
fn scored_batch(n: usize) -> Vec<PolicyComparison> {
    (0..n)
        .map(|i| {
            let pct = (i as f64 * 7.3) % 40.0 - 20.0;
            score_comparison(
                i as u64,
                &format!("quote-{}.pdf", i),
                comparison(pct, i % 3, i % 2),
            )
        })
        .collect()
}

fn benchmark_impact_score(c: &mut Criterion) {
    let typical = comparison(-12.5, 2, 1);
    let capped = comparison(80.0, 10, 10);

    let mut group = c.benchmark_group("impact_score");
    group.bench_function("typical", |b| b.iter(|| impact_score(black_box(&typical))));
    group.bench_function("capped", |b| b.iter(|| impact_score(black_box(&capped))));
    group.finish();
}

fn benchmark_rank_and_reveal(c: &mut Criterion) {
    // Annual uploads allow at most 4 competitor quotes; 64 stresses the sort.
    let small = scored_batch(4);
    let large = scored_batch(64);

    let mut group = c.benchmark_group("rank_and_reveal");
    group.bench_function("free_tier_4", |b| {
        b.iter(|| reveal(rank(black_box(small.clone())), Tier::Free, 5))
    });
    group.bench_function("annual_tier_4", |b| {
        b.iter(|| reveal(rank(black_box(small.clone())), Tier::Annual, 5))
    });
    group.bench_function("free_tier_64", |b| {
        b.iter(|| reveal(rank(black_box(large.clone())), Tier::Free, 65))
    });
    group.finish();
}

criterion_group!(benches, benchmark_impact_score, benchmark_rank_and_reveal);
criterion_main!(benches);
