//! Benchmark for manifest rendering and full reconcile passes

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use onecloud_operator::controlplane::{default_drivers, ComponentDriver, StaticCatalogProvider};
use onecloud_operator::crd::{Mysql, OnecloudCluster, OnecloudClusterSpec};
use onecloud_operator::{MemoryCatalog, MemoryPlatform, Metrics, OperatorConfig, Orchestrator};
use std::sync::Arc;

fn sample_cluster() -> OnecloudCluster {
    let mut cluster = OnecloudCluster::new(
        "bench",
        OnecloudClusterSpec {
            mysql: Mysql {
                host: "10.0.0.2".into(),
                port: 3306,
                username: "root".into(),
                password: "secret".into(),
            },
            version: "v3.0.0".into(),
            image_repository: "registry.example.com/yunion".into(),
            load_balancer_endpoint: "10.0.0.10".into(),
            ..Default::default()
        },
    );
    cluster.metadata.namespace = Some("onecloud".into());
    cluster.spec.keystone.bootstrap_password = "admin@123".into();
    cluster
}

fn bench_render_manifests(c: &mut Criterion) {
    let mut group = c.benchmark_group("resource_builder");
    let drivers = default_drivers();
    let cluster = sample_cluster();
    group.throughput(Throughput::Elements(drivers.len() as u64));

    group.bench_function("render_all_components", |b| {
        b.iter(|| {
            for driver in &drivers {
                let options = driver.render_options(black_box(&cluster)).ok();
                if let Some(options) = options {
                    let _ = black_box(driver.render_manifests(&cluster, &options));
                }
            }
        });
    });

    group.finish();
}

fn bench_reconcile_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("orchestrator");
    let runtime = tokio::runtime::Runtime::new().unwrap();

    let orchestrator = Orchestrator::new(
        OperatorConfig::default(),
        Arc::new(MemoryPlatform::new()),
        Arc::new(StaticCatalogProvider::new(Arc::new(MemoryCatalog::new()))),
        Metrics::new().unwrap(),
    );
    let mut cluster = sample_cluster();
    runtime.block_on(orchestrator.reconcile(&mut cluster)).unwrap();

    group.bench_function("converged_pass", |b| {
        b.iter(|| {
            runtime
                .block_on(orchestrator.reconcile(black_box(&mut cluster)))
                .unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_render_manifests, bench_reconcile_pass);
criterion_main!(benches);
