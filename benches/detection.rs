//! Detection benchmark: batch analysis and the per-tick online check.

use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use procwatch::config::DetectionConfig;
use procwatch::detector::{AnomalyDetector, HourWindow};
use procwatch::series::Sample;

fn make_series(n: usize) -> Vec<Sample> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    (0..n)
        .map(|i| Sample {
            timestamp: start + Duration::seconds(i as i64 * 30),
            process_id: 1000,
            process_name: "bench".to_string(),
            cpu_usage_percent: if i % 97 == 0 { 95.0 } else { (i % 13) as f64 },
            memory_usage_percent: 10.0 + (i % 7) as f64 * 0.1,
            memory_usage_mb: 512.0,
            io_reads: i as u64,
            io_writes: i as u64 / 2,
            network_connections: (i % 5) as u64,
        })
        .collect()
}

fn bench_batch_analysis(c: &mut Criterion) {
    let series = make_series(10_000);
    let detector = AnomalyDetector::new(DetectionConfig::default());

    c.bench_function("analyze_10k_samples", |b| {
        b.iter(|| black_box(detector.analyze(black_box(&series)).anomalies()))
    });
}

fn bench_business_hours(c: &mut Criterion) {
    let series = make_series(10_000);
    let detector = AnomalyDetector::new(DetectionConfig {
        business_hours: Some(HourWindow::new(9, 17)),
        ..DetectionConfig::default()
    });

    c.bench_function("analyze_10k_samples_with_business_hours", |b| {
        b.iter(|| black_box(detector.analyze(black_box(&series)).anomalies()))
    });
}

fn bench_online_tick(c: &mut Criterion) {
    let series = make_series(3_600);
    let detector = AnomalyDetector::new(DetectionConfig::default());

    c.bench_function("online_check_1h_at_1s", |b| {
        b.iter(|| black_box(detector.newest_anomalies(black_box(&series))))
    });
}

criterion_group!(
    benches,
    bench_batch_analysis,
    bench_business_hours,
    bench_online_tick
);
criterion_main!(benches);
