//! Exhaustive depth-first strategy.
//!
//! Every decision (scheduling, boolean, integer) is a frame on a stack holding
//! the options seen at that depth and the index of the option taken. An
//! iteration replays the stack from the bottom, extending it with first options
//! once past its top. Between iterations the deepest frame with untried options
//! advances and everything above it is discarded. Exploration is complete when
//! the stack empties.
//!
//! The program must be deterministic given its decisions; when a replayed
//! prefix sees different options than recorded, the frame is rebuilt and the
//! subtree below it restarts.

use super::{enabled, OperationView, SchedulingStrategy};
use crate::tracing_compat::warn;
use crate::types::EntityId;
use smallvec::SmallVec;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Frame {
    options: SmallVec<[u64; 4]>,
    taken: usize,
}

impl Frame {
    fn fresh(options: SmallVec<[u64; 4]>) -> Self {
        Self { options, taken: 0 }
    }

    fn exhausted(&self) -> bool {
        self.taken + 1 >= self.options.len()
    }
}

/// Depth-first enumeration of all schedules and choice values.
#[derive(Debug, Clone, Default)]
pub struct DfsStrategy {
    stack: Vec<Frame>,
    depth: usize,
    max_steps: u64,
    scheduled_steps: u64,
    explored: u64,
}

impl DfsStrategy {
    /// Creates a strategy; `max_steps == 0` means unbounded.
    #[must_use]
    pub fn new(max_steps: u64) -> Self {
        Self {
            max_steps,
            ..Self::default()
        }
    }

    /// Schedules fully explored so far.
    #[must_use]
    pub const fn explored_schedules(&self) -> u64 {
        self.explored
    }

    fn decide(&mut self, options: SmallVec<[u64; 4]>) -> Option<u64> {
        if options.is_empty() {
            return None;
        }
        if let Some(frame) = self.stack.get(self.depth) {
            if frame.options != options {
                warn!(
                    depth = self.depth,
                    "dfs prefix diverged; program is not deterministic given its decisions"
                );
                self.stack.truncate(self.depth);
            }
        }
        if self.depth == self.stack.len() {
            self.stack.push(Frame::fresh(options));
        }
        let frame = &self.stack[self.depth];
        let value = frame.options[frame.taken];
        self.depth += 1;
        self.scheduled_steps += 1;
        Some(value)
    }
}

impl SchedulingStrategy for DfsStrategy {
    fn next_operation(&mut self, ops: &[OperationView], _current: EntityId) -> Option<EntityId> {
        let options = enabled(ops).map(|op| op.id.as_u64()).collect();
        self.decide(options).map(EntityId::new)
    }

    fn next_boolean_choice(&mut self, _current: EntityId, _max_value: u32) -> Option<bool> {
        self.decide(smallvec::smallvec![0, 1]).map(|v| v == 1)
    }

    fn next_integer_choice(&mut self, _current: EntityId, max_value: u32) -> Option<u32> {
        let options = (0..u64::from(max_value.max(1))).collect();
        self.decide(options).map(|v| v as u32)
    }

    fn prepare_for_next_iteration(&mut self) -> bool {
        self.explored += 1;
        self.stack.truncate(self.depth);
        while self.stack.last().is_some_and(Frame::exhausted) {
            self.stack.pop();
        }
        self.depth = 0;
        self.scheduled_steps = 0;
        match self.stack.last_mut() {
            Some(frame) => {
                frame.taken += 1;
                true
            }
            None => false,
        }
    }

    fn reset(&mut self) {
        self.stack.clear();
        self.depth = 0;
        self.scheduled_steps = 0;
        self.explored = 0;
    }

    fn scheduled_steps(&self) -> u64 {
        self.scheduled_steps
    }

    fn has_reached_max_scheduling_steps(&self) -> bool {
        self.max_steps > 0 && self.scheduled_steps >= self.max_steps
    }

    fn is_fair(&self) -> bool {
        false
    }

    fn description(&self) -> String {
        format!("DFS[depth '{}']", self.stack.len())
    }
}
