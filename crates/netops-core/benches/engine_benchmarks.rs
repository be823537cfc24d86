use criterion::{criterion_group, criterion_main, Criterion};
use netops_core::{Engine, SliceGwInfo};
use netops_schema::{ClassType, GatewayId, GatewayRole, LifecycleEvent, SliceId, SliceName, SliceQosProfile};
use netops_tc::MockBackend;
use std::sync::Arc;

fn profile(ceil: u32) -> SliceQosProfile {
    SliceQosProfile {
        class: ClassType::Htb,
        bw_ceiling: ceil,
        bw_guaranteed: ceil / 4,
        priority: 1,
        ..SliceQosProfile::default()
    }
}

fn engine_with_slices(n: usize) -> Engine {
    let engine = Engine::new(Arc::new(MockBackend::new("eth0")));
    for i in 0..n {
        let id = SliceId::new(format!("s{i}"));
        engine
            .apply_qos_profile(&id, &SliceName::new(format!("slice-{i}")), &profile(5000))
            .unwrap();
        engine
            .apply_connection_context(
                &id,
                SliceGwInfo::new(
                    GatewayId::new(format!("gw-{i}")),
                    GatewayRole::Client,
                    "31000",
                    (32000 + i).to_string(),
                ),
            )
            .unwrap();
    }
    engine
}

fn bench_new_slice(c: &mut Criterion) {
    c.bench_function("engine_apply_new_slice", |b| {
        b.iter_with_setup(
            || engine_with_slices(0),
            |engine| {
                engine
                    .apply_qos_profile(&SliceId::new("s"), &SliceName::new("slice"), &profile(5000))
                    .unwrap();
            },
        );
    });
}

fn bench_unchanged_profile(c: &mut Criterion) {
    let engine = engine_with_slices(50);
    let id = SliceId::new("s25");
    let name = SliceName::new("slice-25");
    engine.apply_qos_profile(&id, &name, &profile(5000)).unwrap();

    c.bench_function("engine_apply_unchanged_profile", |b| {
        b.iter(|| engine.apply_qos_profile(&id, &name, &profile(5000)).unwrap());
    });
}

fn bench_delete_slice(c: &mut Criterion) {
    c.bench_function("engine_delete_slice_of_50", |b| {
        b.iter_with_setup(
            || engine_with_slices(50),
            |engine| {
                engine
                    .handle_lifecycle_event(&SliceName::new("slice-0"), LifecycleEvent::Delete)
                    .unwrap();
            },
        );
    });
}

fn bench_snapshot(c: &mut Criterion) {
    let engine = engine_with_slices(100);
    c.bench_function("engine_snapshot_100", |b| {
        b.iter(|| engine.snapshot().unwrap());
    });
}

criterion_group!(
    benches,
    bench_new_slice,
    bench_unchanged_profile,
    bench_delete_slice,
    bench_snapshot,
);
criterion_main!(benches);
