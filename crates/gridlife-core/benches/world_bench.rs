use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use gridlife_core::{GridLifeConfig, World, evaluate};
use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(fallback)
}

fn bench_world_steps(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");
    group.sample_size(env_or("GL_BENCH_SAMPLES", 30_usize).max(10));
    group.warm_up_time(Duration::from_secs(env_or("GL_BENCH_WARMUP_SECS", 2)));
    group.measurement_time(Duration::from_secs(env_or("GL_BENCH_MEASURE_SECS", 8)));
    let steps: usize = env_or("GL_BENCH_STEPS", 64_usize).max(1);
    let agents_list: Vec<usize> = std::env::var("GL_BENCH_AGENTS")
        .ok()
        .map(|s| {
            s.split(',')
                .filter_map(|t| t.trim().parse::<usize>().ok())
                .collect::<Vec<_>>()
        })
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| vec![50_usize, 200, 800]);

    for &agents in &agents_list {
        group.bench_function(format!("steps{steps}_agents{agents}"), |b| {
            b.iter_batched(
                || {
                    let config = GridLifeConfig {
                        rows: 80,
                        cols: 80,
                        rng_seed: Some(0xBEEF),
                        initial_agents: agents,
                        food: agents * 4,
                        history_capacity: 1,
                        ..GridLifeConfig::default()
                    };
                    World::new(config).expect("world")
                },
                |mut world| {
                    for _ in 0..steps {
                        if !world.step().expect("step") {
                            break;
                        }
                    }
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_rule_evaluation(c: &mut Criterion) {
    let config = GridLifeConfig {
        rows: 30,
        cols: 30,
        rng_seed: Some(7),
        initial_agents: 20,
        max_steps: 200,
        ..GridLifeConfig::default()
    };
    c.bench_function("evaluate_rule", |b| {
        b.iter(|| evaluate(&config, "31100460101103").expect("evaluate"));
    });
}

criterion_group!(benches, bench_world_steps, bench_rule_evaluation);
criterion_main!(benches);
