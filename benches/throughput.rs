use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use deskgate::auth::{Identity, Role};
use deskgate::scopes::{ScopeEvaluator, ScopeRegistry, ScopeSet};
use deskgate::security::RateLimiter;
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

// Hot-path costs the gateway pays on every admitted request, without I/O.

fn rate_limit_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_limit");
    group.throughput(Throughput::Elements(1));

    let limiter = RateLimiter::new(Duration::from_secs(3600));
    group.bench_function("check_single_key", |b| {
        b.iter(|| limiter.check(black_box("token:0a1b2c3d"), u32::MAX))
    });

    let keys: Vec<String> = (0..10_000).map(|i| format!("token:{i:08x}")).collect();
    let mut next = 0usize;
    group.bench_function("check_spread_keys", |b| {
        b.iter(|| {
            next = (next + 1) % keys.len();
            limiter.check(black_box(&keys[next]), 1000)
        })
    });

    group.finish();
}

fn scope_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("scopes");
    group.throughput(Throughput::Elements(1));

    let evaluator = ScopeEvaluator::new(Arc::new(ScopeRegistry::new()));
    let narrow = Identity::agent(
        1,
        Role::Agent,
        ScopeSet::new(vec!["tickets:read".into(), "articles:*".into()]),
        "0a1b2c3d".into(),
    );
    let admin = Identity::agent(2, Role::Admin, ScopeSet::all(), "4e5f6a7b".into());

    group.bench_function("check_prefix_match", |b| {
        b.iter(|| evaluator.check(black_box(&narrow), Some("articles:write")))
    });
    group.bench_function("check_restricted_scope", |b| {
        b.iter(|| evaluator.check(black_box(&admin), Some("admin:*")))
    });

    group.finish();
}

criterion_group!(benches, rate_limit_benchmark, scope_benchmark);
criterion_main!(benches);
