//! Criterion benchmarks for textclf.
//!
//! Covers the hot path of an experiment:
//! - Lexical vectorization (fit and transform)
//! - Feature fusion
//! - Classifier training

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use textclf::bert::BertOutput;
use textclf::classifier::{Estimator, LinearSvc, LogisticRegression};
use textclf::feature::{LexicalConfig, LexicalKind, build_lexical_extractor};
use textclf::fusion::fuse;
use textclf::matrix::FeatureMatrix;

/// Generate labeled test comments for benchmarking.
fn generate_comments(count: usize) -> (Vec<String>, Vec<bool>) {
    let words = [
        "the", "council", "budget", "article", "city", "today", "great", "thanks", "helpful",
        "idiot", "moron", "loser", "road", "school", "mayor", "vote", "tax", "park",
    ];

    let mut texts = Vec::with_capacity(count);
    let mut labels = Vec::with_capacity(count);
    for i in 0..count {
        let length = 8 + (i % 20);
        let text = (0..length)
            .map(|j| words[(i * 7 + j * 13) % words.len()])
            .collect::<Vec<_>>()
            .join(" ");
        labels.push(text.contains("idiot") || text.contains("moron"));
        texts.push(text);
    }
    (texts, labels)
}

fn bench_vectorizers(c: &mut Criterion) {
    let mut group = c.benchmark_group("vectorizers");
    let (texts, _) = generate_comments(1000);
    group.throughput(Throughput::Elements(texts.len() as u64));

    for (name, kind, bigrams) in [
        ("wcount_fit_transform", LexicalKind::Count, false),
        ("tfidf_fit_transform", LexicalKind::Tfidf, false),
        ("tfidf_bigrams_fit_transform", LexicalKind::Tfidf, true),
    ] {
        let config = LexicalConfig {
            kind,
            bigrams,
            ..Default::default()
        };
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut extractor = build_lexical_extractor(&config).unwrap();
                black_box(extractor.fit_transform(black_box(&texts)).unwrap())
            })
        });
    }
    group.finish();
}

fn bench_fusion(c: &mut Criterion) {
    let (texts, _) = generate_comments(1000);
    let mut extractor = build_lexical_extractor(&LexicalConfig::default()).unwrap();
    let lexical = extractor.fit_transform(&texts).unwrap();
    let bert = BertOutput::Embeddings(
        FeatureMatrix::from_dense_rows(
            (0..texts.len())
                .map(|i| (0..64).map(|j| ((i * j) as f64 * 0.01).sin()).collect())
                .collect(),
        )
        .unwrap(),
    );

    c.bench_function("fuse_lexical_with_embeddings", |b| {
        b.iter(|| black_box(fuse(black_box(&lexical), black_box(&bert)).unwrap()))
    });
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(20);

    let (texts, labels) = generate_comments(1000);
    let mut extractor = build_lexical_extractor(&LexicalConfig::default()).unwrap();
    let features = extractor.fit_transform(&texts).unwrap();

    group.bench_function("logreg_l2", |b| {
        b.iter(|| {
            let mut model = LogisticRegression::new();
            model.fit(black_box(&features), black_box(&labels)).unwrap();
            black_box(model)
        })
    });
    group.bench_function("linear_svc", |b| {
        b.iter(|| {
            let mut model = LinearSvc::new();
            model.fit(black_box(&features), black_box(&labels)).unwrap();
            black_box(model)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_vectorizers, bench_fusion, bench_training);
criterion_main!(benches);
