use criterion::{black_box, criterion_group, criterion_main, Criterion};
use request_governor::{
    Category, GovernedLayer, GovernorConfig, LimitPolicy, ManualClock, RateGovernor,
};

use futures::future::Ready;
use std::convert::Infallible;
use std::time::Duration;
use tower::{Service, ServiceBuilder};

// Answers 200 with an empty body.
#[derive(Clone)]
struct OkService;

impl Service<http::Request<()>> for OkService {
    type Response = http::Response<String>;
    type Error = Infallible;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: http::Request<()>) -> Self::Future {
        futures::future::ready(Ok(http::Response::new(String::new())))
    }
}

fn roomy_governor() -> RateGovernor {
    let policy = LimitPolicy::new(u32::MAX, Duration::from_secs(3600), Duration::ZERO).unwrap();
    RateGovernor::new(GovernorConfig::default().with_default_policy(policy).with_policy("auth", policy))
        .unwrap()
}

fn check_admission_allowed(c: &mut Criterion) {
    let governor = roomy_governor();
    let auth = Category::new("auth");

    c.bench_function("check_admission_allowed", |b| {
        b.iter(|| black_box(governor.check_admission(black_box(&auth))));
    });
}

fn check_admission_blocked(c: &mut Criterion) {
    let policy = LimitPolicy::new(1, Duration::from_secs(60), Duration::from_secs(3600)).unwrap();
    let governor = RateGovernor::new(GovernorConfig::empty().with_policy("auth", policy))
        .unwrap()
        .with_clock(ManualClock::new());
    let auth = Category::new("auth");
    governor.check_admission(&auth);

    c.bench_function("check_admission_blocked", |b| {
        b.iter(|| black_box(governor.check_admission(black_box(&auth))));
    });
}

fn resolve_category(c: &mut Criterion) {
    let governor = roomy_governor();

    c.bench_function("resolve_category", |b| {
        b.iter(|| black_box(governor.resolve(black_box("https://api.example.com/v1/exports/42"))));
    });
}

fn governed_service_throughput(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let svc = ServiceBuilder::new()
        .layer(GovernedLayer::new(roomy_governor()))
        .service(OkService);

    c.bench_function("governed_service_admitted", |b| {
        b.to_async(&rt).iter(|| async {
            let mut local_svc = svc.clone();
            let req = http::Request::builder().uri("/auth/login").body(()).unwrap();
            let _ = black_box(local_svc.call(black_box(req))).await;
        });
    });
}

criterion_group!(
    benches,
    check_admission_allowed,
    check_admission_blocked,
    resolve_category,
    governed_service_throughput
);
criterion_main!(benches);
