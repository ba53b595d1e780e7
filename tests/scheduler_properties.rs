//! Scheduler property tests.
//!
//! Run whole actor programs under the lab and check the guarantees the
//! cooperative scheduler makes about every run: one active entity at a time,
//! step bounds honored exactly, livelocks and rogue threads reported, and only
//! the first bug kept.

#[macro_use]
mod common;

use coopsched::lab::{Event, LabRuntime, TestingEngine};
use coopsched::{BugKind, EntityId, SchedulerConfig, StrategyKind, Termination};
use common::*;
use parking_lot::Mutex;
use std::sync::Arc;

fn init_test(test_name: &str) {
    init_test_logging();
    test_phase!(test_name);
}

#[test]
fn at_most_one_entity_is_active() {
    init_test("at_most_one_entity_is_active");
    let config = test_config().iterations(40).stop_on_first_bug(false);
    let mut engine = TestingEngine::new(config);
    let summary = engine
        .run(|ctx| {
            let main = ctx.id();
            for name in ["Left", "Right", "Middle"] {
                ctx.create_actor(name, move |ctx| {
                    for round in 0..3 {
                        let active = ctx.active_entities();
                        ctx.assert(
                            active == vec![ctx.id()],
                            "another entity is active at a scheduling point",
                        )?;
                        ctx.send(main, Event::with_value("Round", round))?;
                    }
                    Ok(())
                })?;
            }
            for _ in 0..9 {
                ctx.receive()?;
                ctx.assert(ctx.active_entities() == vec![ctx.id()], "main shares the cpu")?;
            }
            Ok(())
        })
        .unwrap();
    assert_with_log!(!summary.found_bug(), "exclusive", false, summary.found_bug());
    assert_with_log!(summary.iterations == 40, "all iterations", 40, summary.iterations);
    test_complete!("at_most_one_entity_is_active");
}

#[test]
fn executed_order_is_the_strategy_order() {
    init_test("executed_order_is_the_strategy_order");
    // Every actor logs its id on start and whenever a scheduling point returns.
    let order = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&order);
    let runtime = LabRuntime::new(test_config());
    let outcome = runtime
        .run(move |ctx| {
            seen.lock().push(ctx.id());
            let main = ctx.id();
            for name in ["P", "Q"] {
                let log = Arc::clone(&seen);
                ctx.create_actor(name, move |ctx| {
                    log.lock().push(ctx.id());
                    for _ in 0..4 {
                        ctx.send(main, Event::new("Beat"))?;
                        log.lock().push(ctx.id());
                    }
                    Ok(())
                })?;
                seen.lock().push(main);
            }
            for _ in 0..8 {
                ctx.receive()?;
                seen.lock().push(main);
            }
            Ok(())
        })
        .unwrap();
    assert_with_log!(outcome.bug.is_none(), "no bug", "none", outcome.bug);

    let executed = order.lock().clone();
    let (first, resumed) = executed.split_first().unwrap();
    let chosen: Vec<EntityId> = outcome.schedule_trace.scheduling_choices().collect();
    assert_with_log!(*first == EntityId::new(1), "main runs first", 1, first);
    assert_with_log!(resumed == chosen.as_slice(), "strategy order", chosen, resumed);
    test_complete!("executed_order_is_the_strategy_order");
}

#[test]
fn step_bound_stops_cleanly_at_exactly_k() {
    init_test("step_bound_stops_cleanly_at_exactly_k");
    let config = test_config().max_steps(25);
    let outcome = LabRuntime::new(config)
        .run(|ctx| loop {
            ctx.send(ctx.id(), Event::new("Again"))?;
            ctx.receive()?;
        })
        .unwrap();
    assert_with_log!(outcome.bug.is_none(), "not a bug", "none", outcome.bug);
    assert_with_log!(
        outcome.termination == Termination::StepBoundReached,
        "bound reached",
        Termination::StepBoundReached,
        outcome.termination
    );
    assert_with_log!(outcome.steps == 25, "exactly k", 25, outcome.steps);
    assert_with_log!(
        outcome.schedule_trace.len() == 25,
        "trace holds k decisions",
        25,
        outcome.schedule_trace.len()
    );
    test_complete!("step_bound_stops_cleanly_at_exactly_k");
}

#[test]
fn step_bound_can_be_reported_as_a_bug() {
    init_test("step_bound_can_be_reported_as_a_bug");
    let config = test_config().max_steps(12).depth_bound_is_bug(true);
    let outcome = LabRuntime::new(config)
        .run(|ctx| loop {
            ctx.send(ctx.id(), Event::new("Again"))?;
            ctx.receive()?;
        })
        .unwrap();
    let bug = outcome.bug.unwrap();
    assert_with_log!(bug.kind == BugKind::StepBound, "kind", BugKind::StepBound, bug.kind);
    assert_with_log!(
        bug.message == "Scheduling steps bound of 12 reached.",
        "message",
        "Scheduling steps bound of 12 reached.",
        bug.message
    );
    assert_with_log!(bug.steps == 12, "steps", 12, bug.steps);
    test_complete!("step_bound_can_be_reported_as_a_bug");
}

#[test]
fn receivers_with_no_sender_livelock() {
    init_test("receivers_with_no_sender_livelock");
    let outcome = LabRuntime::new(test_config())
        .run(|ctx| {
            ctx.create_actor("a", |ctx| ctx.receive().map(drop))?;
            ctx.create_actor("b", |ctx| ctx.receive().map(drop))?;
            Ok(())
        })
        .unwrap();
    let bug = outcome.bug.unwrap();
    assert_with_log!(bug.kind == BugKind::Livelock, "kind", BugKind::Livelock, bug.kind);
    let expected = "Livelock detected. 'a' and 'b' are waiting for an event, \
                    but no other schedulable choices are enabled.";
    assert_with_log!(bug.message == expected, "message", expected, bug.message);
    test_complete!("receivers_with_no_sender_livelock");
}

#[test]
fn idle_handlers_are_not_a_livelock() {
    init_test("idle_handlers_are_not_a_livelock");
    let outcome = LabRuntime::new(test_config()).run(ping_pong(3)).unwrap();
    assert_with_log!(outcome.bug.is_none(), "no bug", "none", outcome.bug);
    assert_with_log!(
        outcome.termination == Termination::Quiescent,
        "quiescent",
        Termination::Quiescent,
        outcome.termination
    );
    test_complete!("idle_handlers_are_not_a_livelock");
}

#[test]
fn rogue_thread_is_uncontrolled_concurrency() {
    init_test("rogue_thread_is_uncontrolled_concurrency");
    let outcome = LabRuntime::new(test_config())
        .run(|ctx| {
            let rogue = ctx.clone();
            let target = ctx.id();
            let handle = std::thread::spawn(move || rogue.send(target, Event::new("Sneaky")));
            let rogue_result = handle.join().unwrap_or(Ok(()));
            ctx.assert(rogue_result.is_err(), "rogue send was not stopped")?;
            ctx.send(target, Event::new("Late"))
        })
        .unwrap();
    let bug = outcome.bug.unwrap();
    assert_with_log!(
        bug.kind == BugKind::UncontrolledConcurrency,
        "kind",
        BugKind::UncontrolledConcurrency,
        bug.kind
    );
    assert_with_log!(
        bug.message.contains("not controlled by the scheduler"),
        "message",
        "not controlled by the scheduler",
        bug.message
    );
    test_complete!("rogue_thread_is_uncontrolled_concurrency");
}

#[test]
fn only_the_first_bug_is_reported() {
    init_test("only_the_first_bug_is_reported");
    let outcome = LabRuntime::new(test_config().strategy(StrategyKind::RoundRobin))
        .run(|ctx| {
            ctx.create_actor("Complainer", |ctx| {
                ctx.soft_assert(false, "complainer objects")?;
                ctx.send(ctx.id(), Event::new("Echo"))
            })?;
            ctx.soft_assert(false, "main objects")?;
            ctx.send(ctx.id(), Event::new("Echo"))?;
            ctx.soft_assert(false, "main objects again")
        })
        .unwrap();
    let bugs = &outcome.report.bug_reports;
    assert_with_log!(bugs.len() == 1, "one bug", 1, bugs.len());
    // Main keeps running after creating the complainer, so it objects first.
    let kept = outcome.bug.as_ref().map(|bug| bug.message.as_str());
    assert_with_log!(kept == Some("main objects"), "first message kept", "main objects", kept);
    assert_with_log!(
        bugs[0].message == "main objects",
        "report holds the first message",
        "main objects",
        bugs[0].message
    );
    assert_with_log!(
        outcome.report.bugs_found == 1,
        "one counted",
        1,
        outcome.report.bugs_found
    );
    test_complete!("only_the_first_bug_is_reported");
}

#[test]
fn engine_finds_lost_update() {
    init_test("engine_finds_lost_update");
    let config = test_config().iterations(300);
    let mut engine = TestingEngine::new(config);
    let summary = engine.run(lost_update).unwrap();
    assert_with_log!(summary.found_bug(), "bug found", true, summary.found_bug());
    let bug = summary.first_bug.and_then(|outcome| outcome.bug).unwrap();
    assert_with_log!(
        bug.message == "lost update: counter is not 2",
        "message",
        "lost update: counter is not 2",
        bug.message
    );
    test_complete!("engine_finds_lost_update");
}

#[test]
fn state_cache_counts_revisits() {
    init_test("state_cache_counts_revisits");
    let config = SchedulerConfig::new(3).cache_program_state(true).max_steps(60);
    // Children halt right away, so "only main, about to create" recurs.
    let outcome = LabRuntime::new(config)
        .run(|ctx| loop {
            ctx.create_actor("Child", |_| Ok(()))?;
        })
        .unwrap();
    assert_with_log!(
        outcome.revisited_states() > 0,
        "loop revisits states",
        "> 0",
        outcome.revisited_states()
    );
    test_complete!("state_cache_counts_revisits");
}
