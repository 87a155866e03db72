//! Benchmarks for the hot domain operations: tree writes, tree joins, and
//! call-site instantiation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use sift_analysis::access_path::{Path, PathElement};
use sift_analysis::domain::AbstractDomain;
use sift_analysis::factories::Factories;
use sift_analysis::feature::FeatureMayAlwaysSet;
use sift_analysis::interval::ClassIntervalContext;
use sift_analysis::taint::{CallKind, Frame, PropagateContext, Taint, TaintTree};
use sift_analysis::tree::UpdateKind;
use sift_core::types::collections::FxHashMap;

fn build_tree(factories: &Factories, seed: u64, paths: usize) -> TaintTree {
    let mut tree = TaintTree::bottom();
    for index in 0..paths {
        let path: Path = (0..(index % 3 + 1))
            .map(|depth| {
                PathElement::Field(factories.field(&format!("f{}", (seed as usize + index + depth) % 8)))
            })
            .collect();
        let taint = Taint::singleton(Frame::with_call_kind(
            factories.kinds.named(&format!("Kind{}", index % 4)),
            factories.access_paths.leaf(),
            CallKind::Origin,
        ));
        tree.write_value(&path, taint, UpdateKind::Weak);
    }
    tree
}

fn bench_tree_writes(c: &mut Criterion) {
    let factories = Factories::new();
    c.bench_function("taint_tree_write_64_paths", |b| {
        b.iter(|| black_box(build_tree(&factories, 1, 64)))
    });
}

fn bench_tree_join(c: &mut Criterion) {
    let factories = Factories::new();
    let left = build_tree(&factories, 1, 64);
    let right = build_tree(&factories, 5, 64);
    c.bench_function("taint_tree_join_64_paths", |b| {
        b.iter(|| {
            let mut joined = left.clone();
            joined.join_with(black_box(&right));
            black_box(joined)
        })
    });
}

fn bench_propagate(c: &mut Criterion) {
    let factories = Factories::new();
    let types = FxHashMap::default();
    let constants = FxHashMap::default();

    let mut taint = Taint::bottom();
    for index in 0usize..32 {
        taint.add(
            Frame::with_call_kind(
                factories.kinds.named(&format!("Kind{}", index % 8)),
                factories.access_paths.argument((index % 4) as u8),
                CallKind::CallSite,
            )
            .with_callee(factories.method(&format!("LCallee{};.run:()V", index)))
            .with_call_position(factories.positions.get_line(index as i32))
            .with_distance((index % 5) as u32),
        );
    }

    let context = PropagateContext {
        factories: &factories,
        callee: factories.method("LCaller;.target:()V"),
        callee_port: factories.access_paths.argument(0),
        call_position: factories.positions.get_line(1),
        max_source_sink_distance: 100,
        extra_features: FeatureMayAlwaysSet::new(),
        source_register_types: &types,
        source_constant_arguments: &constants,
        caller_interval: ClassIntervalContext::top(),
    };

    c.bench_function("taint_propagate_32_frames", |b| {
        b.iter(|| black_box(taint.propagate(black_box(&context))))
    });
}

criterion_group!(benches, bench_tree_writes, bench_tree_join, bench_propagate);
criterion_main!(benches);
