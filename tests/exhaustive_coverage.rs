//! Exhaustive exploration tests.
//!
//! The depth-first strategy must enumerate every distinct interleaving and
//! every nondeterministic value of a small program before reporting that it
//! is exhausted.

#[macro_use]
mod common;

use coopsched::lab::TestingEngine;
use coopsched::{SchedulerConfig, StrategyKind};
use common::*;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

fn init_test(test_name: &str) {
    init_test_logging();
    test_phase!(test_name);
}

fn dfs_config() -> SchedulerConfig {
    test_config()
        .strategy(StrategyKind::Dfs)
        .iterations(0)
        .stop_on_first_bug(false)
}

#[test]
fn dfs_covers_both_orders_and_all_coin_values() {
    init_test("dfs_covers_both_orders_and_all_coin_values");
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut signatures = BTreeSet::new();
    let mut engine = TestingEngine::new(dfs_config());
    let summary = engine
        .run_each(coin_pair(Arc::clone(&log)), |_| {
            let run: Vec<(String, bool)> = std::mem::take(&mut *log.lock());
            signatures.insert(run);
        })
        .unwrap();

    assert_with_log!(summary.exhausted, "exhausted", true, summary.exhausted);
    assert_with_log!(!summary.found_bug(), "no bug", false, summary.found_bug());
    // Two orders times two values per coin.
    assert_with_log!(signatures.len() == 8, "distinct runs", 8, signatures.len());
    for first in ["A", "B"] {
        for a in [false, true] {
            for b in [false, true] {
                let (x, y) = if first == "A" { (a, b) } else { (b, a) };
                let second = if first == "A" { "B" } else { "A" };
                let run = vec![(first.to_owned(), x), (second.to_owned(), y)];
                assert_with_log!(signatures.contains(&run), "run covered", run, signatures.len());
            }
        }
    }
    assert_with_log!(
        summary.report.explored_unfair_schedules == summary.iterations,
        "dfs runs are unfair",
        summary.iterations,
        summary.report.explored_unfair_schedules
    );
    test_complete!("dfs_covers_both_orders_and_all_coin_values");
}

#[test]
fn dfs_runs_are_all_distinct() {
    init_test("dfs_runs_are_all_distinct");
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut traces = Vec::new();
    let mut engine = TestingEngine::new(dfs_config());
    let summary = engine
        .run_each(coin_pair(log), |outcome| {
            traces.push(outcome.schedule_trace.clone());
        })
        .unwrap();
    let distinct: BTreeSet<String> = traces
        .iter()
        .map(|trace| serde_json::to_string(trace).unwrap())
        .collect();
    assert_with_log!(
        distinct.len() == traces.len(),
        "no schedule explored twice",
        traces.len(),
        distinct.len()
    );
    assert_with_log!(
        summary.iterations == traces.len() as u64,
        "one trace per iteration",
        summary.iterations,
        traces.len()
    );
    test_complete!("dfs_runs_are_all_distinct");
}

#[test]
fn dfs_finds_the_lost_update() {
    init_test("dfs_finds_the_lost_update");
    let config = dfs_config().stop_on_first_bug(true);
    let mut engine = TestingEngine::new(config);
    let summary = engine.run(lost_update).unwrap();
    assert_with_log!(summary.found_bug(), "bug found", true, summary.found_bug());
    assert_with_log!(!summary.exhausted, "stopped early", false, summary.exhausted);
    test_complete!("dfs_finds_the_lost_update");
}
