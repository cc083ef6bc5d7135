//! Inference benchmark: request → features → classifier (per-request latency target).

use botscore::features::{FeatureVector, NormalizationStats, RequestRecord, FEATURE_DIM};
use botscore::model::BotClassifier;
use botscore::serving::LoadedModel;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn stats() -> NormalizationStats {
    NormalizationStats {
        mean: [2.0, 40.0, 3.0, 4.0, 6.0, 90.0, 10.0],
        std: [1.5, 30.0, 2.0, 5.0, 6.0, 45.0, 7.0],
    }
}

fn bench_score_request(c: &mut Criterion) {
    let model = LoadedModel::new(stats(), BotClassifier::new(&mut StdRng::seed_from_u64(3))).unwrap();
    let record = RequestRecord::new(
        "/search?q=shoes&page=2",
        "GET",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36",
    );

    c.bench_function("score_single_request", |b| {
        b.iter(|| model.score(black_box(&record)))
    });
}

fn bench_predict_batch(c: &mut Criterion) {
    let clf = BotClassifier::new(&mut StdRng::seed_from_u64(4));
    let row = FeatureVector([0.1; FEATURE_DIM]);

    let mut g = c.benchmark_group("predict_by_batch");
    for n in [1usize, 16, 64, 256] {
        let x = Array2::from_shape_fn((n, FEATURE_DIM), |(_, j)| row.0[j]);
        g.bench_function(format!("batch_{}", n).as_str(), |b| {
            b.iter(|| clf.predict(black_box(&x)))
        });
    }
    g.finish();
}

criterion_group!(benches, bench_score_request, bench_predict_batch);
criterion_main!(benches);
