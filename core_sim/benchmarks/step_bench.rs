use std::sync::Arc;

use core_sim::policy::Policy;
use core_sim::{templates, DynamicsConfig, RandomPolicy, SimulationRun, TemplateKind};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");
    let config = Arc::new(DynamicsConfig::default());

    for kind in TemplateKind::ALL {
        let scenario = Arc::new(templates::build(kind, 42));
        group.bench_with_input(BenchmarkId::new("template", kind), &scenario, |b, scenario| {
            b.iter_batched(
                || {
                    let run = SimulationRun::new(Arc::clone(scenario), Arc::clone(&config))
                        .expect("template is valid");
                    (run, RandomPolicy::new(7).with_actions_per_step(3))
                },
                |(mut run, mut policy)| {
                    for _ in 0..10 {
                        let actions =
                            policy.decide(run.state().timestep(), run.layout(), &run.observe());
                        run.step(&actions).expect("run is live");
                    }
                    run
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let config = Arc::new(DynamicsConfig::default());
    let scenario = Arc::new(templates::build(TemplateKind::TropicalCyclone, 42));
    let run = SimulationRun::new(scenario, config).expect("template is valid");
    c.bench_function("encode/tropical_cyclone", |b| b.iter(|| run.observe()));
}

criterion_group!(step_benches, bench_step, bench_encode);
criterion_main!(step_benches);
