//! Scheduler benchmark suite.
//!
//! Benchmarks the cost of scheduling decisions and of whole controlled runs:
//! - Strategy decisions over growing live sets
//! - Program-model recording overhead
//! - End-to-end lab iterations (thread handshakes included)

#![allow(missing_docs)]
#![allow(clippy::semicolon_if_nothing_returned)]

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};

use coopsched::lab::{ActorContext, Event, LabRuntime, TestingEngine};
use coopsched::{
    DfsStrategy, EntityId, OperationGroupId, OperationType, OperationView, ProgramModelStrategy,
    RandomStrategy, RoundRobinStrategy, ScheduleResult, SchedulerConfig, SchedulingStrategy,
    StrategyKind, TargetKind,
};
use std::sync::Arc;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Views of `count` entities, every other one enabled.
fn views(count: u64) -> Vec<OperationView> {
    (1..=count)
        .map(|id| OperationView {
            id: EntityId::new(id),
            name: Arc::from(format!("e{id}")),
            is_enabled: id % 2 == 1,
            is_waiting_to_receive: false,
            next_operation: OperationType::Send,
            target_kind: TargetKind::Inbox,
            target_id: EntityId::new(id),
            matching_send_index: 0,
            operation_group: OperationGroupId::default(),
        })
        .collect()
}

fn decide(strategy: &mut dyn SchedulingStrategy, ops: &[OperationView], rounds: usize) {
    for _ in 0..rounds {
        black_box(strategy.next_operation(ops, EntityId::new(1)));
    }
}

fn ping_pong(ctx: &ActorContext) -> ScheduleResult<()> {
    let server = ctx.create_actor("Server", |ctx| loop {
        let ping = ctx.next_event()?;
        let client = EntityId::new(ping.value().unwrap_or_default());
        ctx.send(client, Event::new("Pong"))?;
    })?;
    for _ in 0..10 {
        ctx.send(server, Event::with_value("Ping", ctx.id().as_u64()))?;
        ctx.receive()?;
    }
    Ok(())
}

// =============================================================================
// STRATEGY BENCHMARKS
// =============================================================================

fn bench_strategy_decisions(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler/strategy");

    for &count in &[4_u64, 32, 256] {
        let ops = views(count);
        group.throughput(Throughput::Elements(100));
        group.bench_with_input(BenchmarkId::new("random", count), &ops, |b, ops| {
            b.iter_batched(
                || RandomStrategy::new(42, 0),
                |mut strategy| decide(&mut strategy, ops, 100),
                BatchSize::SmallInput,
            )
        });
        group.bench_with_input(BenchmarkId::new("round_robin", count), &ops, |b, ops| {
            b.iter_batched(
                || RoundRobinStrategy::new(0),
                |mut strategy| decide(&mut strategy, ops, 100),
                BatchSize::SmallInput,
            )
        });
        group.bench_with_input(BenchmarkId::new("dfs", count), &ops, |b, ops| {
            b.iter_batched(
                || DfsStrategy::new(0),
                |mut strategy| decide(&mut strategy, ops, 100),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_recording_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler/recording");
    let ops = views(8);

    group.bench_function("plain_choices", |b| {
        b.iter_batched(
            || RandomStrategy::new(7, 0),
            |mut strategy| {
                for _ in 0..100 {
                    black_box(strategy.next_boolean_choice(EntityId::new(1), 2));
                }
            },
            BatchSize::SmallInput,
        )
    });

    group.bench_function("recorded_choices", |b| {
        b.iter_batched(
            || ProgramModelStrategy::new(Box::new(RandomStrategy::new(7, 0))),
            |mut strategy| {
                for _ in 0..100 {
                    black_box(strategy.next_boolean_choice(EntityId::new(1), 2));
                }
            },
            BatchSize::SmallInput,
        )
    });

    group.bench_function("recorded_decisions", |b| {
        b.iter_batched(
            || ProgramModelStrategy::new(Box::new(RandomStrategy::new(7, 0))),
            |mut strategy| decide(&mut strategy, &ops, 100),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

// =============================================================================
// END-TO-END BENCHMARKS
// =============================================================================

fn bench_lab_iterations(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler/lab");
    group.sample_size(20);

    group.bench_function("ping_pong_single_run", |b| {
        let runtime = LabRuntime::new(SchedulerConfig::new(1));
        b.iter(|| black_box(runtime.run(ping_pong).map(|outcome| outcome.steps)))
    });

    for kind in [StrategyKind::Random, StrategyKind::RoundRobin] {
        group.bench_with_input(
            BenchmarkId::new("engine_10_iterations", format!("{kind:?}")),
            &kind,
            |b, &kind| {
                b.iter(|| {
                    let config = SchedulerConfig::new(1).strategy(kind).iterations(10);
                    let mut engine = TestingEngine::new(config);
                    black_box(engine.run(ping_pong).map(|summary| summary.iterations))
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_strategy_decisions,
    bench_recording_overhead,
    bench_lab_iterations
);
criterion_main!(benches);
