use criterion::{black_box, criterion_group, criterion_main, Criterion};
use renderscreenshot::{
    canonical_query, expected_signature, parse_webhook, verify_webhook, ApiError, RequestSigner,
    TakeOptions,
};
use serde_json::json;
use std::time::Duration;

// Fast settings for all benchmarks
fn configure_fast_group(group: &mut criterion::BenchmarkGroup<criterion::measurement::WallTime>) {
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_millis(500));
    group.sample_size(20);
}

fn sample_options() -> TakeOptions {
    TakeOptions::url("https://example.com/pricing?plan=pro&ref=newsletter")
        .width(1200)
        .height(630)
        .scale(2.0)
        .full_page(true)
        .block_ads(true)
        .cache_ttl(86_400)
}

fn benchmark_signing(c: &mut Criterion) {
    let mut group = c.benchmark_group("signing");
    configure_fast_group(&mut group);

    let signer = RequestSigner::new("rs_secret_bench", "rs_pub_bench").unwrap();
    let params = sample_options().to_flat_map();

    group.bench_function("canonical_query", |b| {
        b.iter(|| black_box(canonical_query(black_box(&params))));
    });

    group.bench_function("sign", |b| {
        b.iter(|| black_box(signer.sign(black_box(&params), 1_700_000_000)));
    });

    group.bench_function("signed_url_from_options", |b| {
        let options = sample_options();
        b.iter(|| {
            let url = signer.signed_url(
                "https://api.renderscreenshot.com",
                "/v1/screenshot",
                &options.to_flat_map(),
                1_700_000_000,
            );
            black_box(url);
        });
    });

    group.finish();
}

fn benchmark_webhook(c: &mut Criterion) {
    let mut group = c.benchmark_group("webhook");
    configure_fast_group(&mut group);

    let payload = json!({
        "type": "screenshot.completed",
        "id": "evt_bench",
        "timestamp": 1_700_000_000,
        "data": {"screenshot_id": "scr_bench", "url": "https://example.com"}
    })
    .to_string();
    let secret = "whsec_bench";
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let signature = expected_signature(&payload, &timestamp, secret);

    group.bench_function("verify_valid", |b| {
        b.iter(|| black_box(verify_webhook(&payload, &signature, &timestamp, secret, None)));
    });

    group.bench_function("verify_tampered", |b| {
        let tampered = payload.replace("scr_bench", "scr_other");
        b.iter(|| black_box(verify_webhook(&tampered, &signature, &timestamp, secret, None)));
    });

    group.bench_function("parse", |b| {
        b.iter(|| black_box(parse_webhook(black_box(&payload))));
    });

    group.finish();
}

fn benchmark_error_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("error_classification");
    configure_fast_group(&mut group);

    let structured = json!({
        "error": {"code": "rate_limited", "message": "Too many requests", "request_id": "req_1"}
    });
    let empty = serde_json::Value::Null;

    group.bench_function("structured_body", |b| {
        b.iter(|| {
            let err = ApiError::from_response(429, black_box(&structured), Some("30"), None);
            black_box(err.is_retryable());
        });
    });

    group.bench_function("status_only", |b| {
        b.iter(|| {
            let err = ApiError::from_response(503, black_box(&empty), None, Some("req_2"));
            black_box(err.is_retryable());
        });
    });

    group.finish();
}

fn benchmark_options(c: &mut Criterion) {
    let mut group = c.benchmark_group("options");
    configure_fast_group(&mut group);

    let options = sample_options();

    group.bench_function("to_params", |b| {
        b.iter(|| black_box(options.to_params()));
    });

    group.bench_function("to_query_string", |b| {
        b.iter(|| black_box(options.to_query_string()));
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_signing,
    benchmark_webhook,
    benchmark_error_classification,
    benchmark_options
);
criterion_main!(benches);
