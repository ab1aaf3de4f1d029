//! # Pipeline Benchmarks
//!
//! Measures one sensing-stack cycle without bus I/O: pipeline, constant merge
//! and key prefixing.
//!
//! Run: `cargo bench --bench pipeline_bench`

use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sensa_calc::{CurrentToPower, CurrentToPowerConfig, PeakToRms, PtRtd, PtRtdConfig};
use sensa_core::{Blackboard, BusHandle, Variables};
use sensa_devices::MockDevice;
use sensa_orchestration::{Pipeline, SensingStack};

fn vars(pairs: &[(&str, &str)]) -> Variables {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn electrical_pipeline() -> Pipeline {
    Pipeline::new("electrical")
        .with(
            "rms",
            Box::new(PeakToRms::new(&vars(&[("var_out", "peak"), ("var_in", "current")])).unwrap()),
        )
        .with(
            "power",
            Box::new(
                CurrentToPower::new(
                    CurrentToPowerConfig::default(),
                    &vars(&[("rms_current_out", "current"), ("power_in", "power")]),
                )
                .unwrap(),
            ),
        )
        .with(
            "rtd",
            Box::new(PtRtd::new(PtRtdConfig::default(), &Variables::new()).unwrap()),
        )
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    let pipeline = electrical_pipeline();

    let mut seed = Blackboard::new();
    seed.insert("peak", 14.14);
    seed.insert("resistance", 138.5);

    group.bench_function("run_3_modules", |b| {
        b.iter(|| {
            let mut board = seed.clone();
            pipeline.run(&mut board);
            black_box(board)
        })
    });

    let mut missing = Blackboard::new();
    missing.insert("unrelated", 1);
    group.bench_function("run_all_inputs_missing", |b| {
        b.iter(|| {
            let mut board = missing.clone();
            pipeline.run(&mut board);
            black_box(board)
        })
    });

    group.finish();
}

fn bench_stack(c: &mut Criterion) {
    let mut group = c.benchmark_group("sensing_stack");

    for constants in [0usize, 8, 64] {
        let mut board = Blackboard::new();
        for i in 0..constants {
            board.insert(format!("c{}", i), i as i64);
        }
        let mut stack = SensingStack::new(
            "bench",
            Box::new(MockDevice::with_value("peak", 14.14)),
            Rc::new(electrical_pipeline()),
        )
        .with_constants(board)
        .with_prefix("lab_");
        stack.initialise(BusHandle::None).unwrap();

        group.bench_with_input(BenchmarkId::new("execute", constants), &constants, |b, _| {
            b.iter(|| black_box(stack.execute().unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pipeline, bench_stack);
criterion_main!(benches);
