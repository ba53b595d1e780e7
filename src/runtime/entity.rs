//! Schedulable entity records.
//!
//! One record per live actor. The record is mutated either by the owning worker
//! right before it yields, or by the scheduler while that worker is parked, so a
//! single writer touches it at a time by construction of the handshake.

use crate::types::{EntityId, OperationGroupId, OperationType, TargetKind};
use std::sync::Arc;
use std::thread::ThreadId;

/// Runtime state of one schedulable entity.
#[derive(Debug, Clone)]
pub struct SchedulableEntity {
    /// Entity id.
    pub id: EntityId,
    /// Human-readable name used in bug reports.
    pub name: Arc<str>,
    /// Worker thread currently bound to the entity.
    pub task: Option<ThreadId>,
    /// Whether the entity can be chosen.
    pub is_enabled: bool,
    /// Whether the entity is currently allowed to run.
    pub is_active: bool,
    /// Set once the handler's worker reported in.
    pub has_started: bool,
    /// Set when the entity halted.
    pub is_completed: bool,
    /// Blocked in an explicit receive with an empty inbox.
    pub is_waiting_to_receive: bool,
    /// Operation the entity will perform once chosen.
    pub next_operation: OperationType,
    /// What `next_target_id` refers to.
    pub next_target_kind: TargetKind,
    /// Target of the pending operation.
    pub next_target_id: EntityId,
    /// Send index of the event a pending receive will dequeue.
    pub matching_send_index: u64,
    /// The next receive point was already accounted for at handler exit.
    pub skip_next_receive_point: bool,
    /// Operations performed over the entity's lifetime.
    pub operation_count: u64,
    /// Operations performed by the current handler run.
    pub handler_operation_count: u64,
    /// Group of the operation currently being handled.
    pub operation_group: OperationGroupId,
    /// Nondeterministic choices made by the entity.
    pub program_counter: u64,
}

impl SchedulableEntity {
    /// Creates a disabled, inactive record.
    #[must_use]
    pub fn new(id: EntityId, name: impl Into<Arc<str>>) -> Self {
        Self {
            id,
            name: name.into(),
            task: None,
            is_enabled: false,
            is_active: false,
            has_started: false,
            is_completed: false,
            is_waiting_to_receive: false,
            next_operation: OperationType::Start,
            next_target_kind: TargetKind::Schedulable,
            next_target_id: id,
            matching_send_index: 0,
            skip_next_receive_point: false,
            operation_count: 0,
            handler_operation_count: 0,
            operation_group: OperationGroupId::default(),
            program_counter: 0,
        }
    }

    /// Records the operation the entity is about to perform.
    pub fn set_next_operation(
        &mut self,
        operation: OperationType,
        target_kind: TargetKind,
        target_id: EntityId,
    ) {
        self.next_operation = operation;
        self.next_target_kind = target_kind;
        self.next_target_id = target_id;
        self.operation_count += 1;
        self.handler_operation_count += 1;
    }

    /// A new handler run is about to begin.
    ///
    /// `task` rebinds the worker; `None` keeps the current binding (a fresh
    /// actor's worker binds itself when it reports started). A non-zero
    /// `matching_send_index` means the handler was re-created by a send, so its
    /// first operation is the receive of that event.
    pub fn notify_event_handler_created(
        &mut self,
        task: Option<ThreadId>,
        matching_send_index: u64,
    ) {
        if task.is_some() {
            self.task = task;
        }
        self.is_enabled = true;
        self.is_waiting_to_receive = false;
        self.handler_operation_count = 0;
        self.matching_send_index = matching_send_index;
        if matching_send_index == 0 {
            self.has_started = false;
            self.next_operation = OperationType::Start;
            self.next_target_kind = TargetKind::Schedulable;
            self.next_target_id = self.id;
        } else {
            self.next_operation = OperationType::Receive;
            self.next_target_kind = TargetKind::Inbox;
            self.next_target_id = self.id;
        }
    }

    /// The handler ran out of events.
    ///
    /// The receive scheduling point that follows is skipped: the handler's
    /// completion already yielded control.
    pub fn notify_event_handler_completed(&mut self) {
        self.is_enabled = false;
        self.skip_next_receive_point = true;
    }

    /// The entity blocks in an explicit receive with an empty inbox.
    pub fn notify_waiting_to_receive(&mut self) {
        self.is_enabled = false;
        self.is_waiting_to_receive = true;
        self.next_operation = OperationType::Receive;
        self.next_target_kind = TargetKind::Inbox;
        self.next_target_id = self.id;
    }

    /// Whether the handler completed and waits to be re-created by a send.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        !self.is_enabled
            && self.skip_next_receive_point
            && !self.is_waiting_to_receive
            && !self.is_completed
    }

    /// An event with `send_index` arrived while the entity was waiting.
    pub fn notify_event_received(&mut self, send_index: u64) {
        self.is_enabled = true;
        self.is_waiting_to_receive = false;
        self.matching_send_index = send_index;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn set_next_operation_bumps_both_counters() {
        init_test("set_next_operation_bumps_both_counters");
        let mut entity = SchedulableEntity::new(EntityId::new(1), "a");
        entity.set_next_operation(OperationType::Send, TargetKind::Inbox, EntityId::new(2));
        entity.set_next_operation(OperationType::Receive, TargetKind::Inbox, EntityId::new(1));
        crate::assert_with_log!(
            entity.operation_count == 2,
            "lifetime counter",
            2,
            entity.operation_count
        );
        crate::assert_with_log!(
            entity.handler_operation_count == 2,
            "handler counter",
            2,
            entity.handler_operation_count
        );
        crate::assert_with_log!(
            entity.next_operation == OperationType::Receive,
            "pending op",
            OperationType::Receive,
            entity.next_operation
        );
        crate::test_complete!("set_next_operation_bumps_both_counters");
    }

    #[test]
    fn handler_recreation_resets_transients() {
        init_test("handler_recreation_resets_transients");
        let mut entity = SchedulableEntity::new(EntityId::new(3), "server");
        let task = std::thread::current().id();
        entity.notify_event_handler_created(Some(task), 0);
        entity.set_next_operation(OperationType::Send, TargetKind::Inbox, EntityId::new(1));
        entity.notify_event_handler_completed();
        crate::assert_with_log!(!entity.is_enabled, "disabled", false, entity.is_enabled);
        crate::assert_with_log!(
            entity.skip_next_receive_point,
            "skip flag",
            true,
            entity.skip_next_receive_point
        );

        crate::assert_with_log!(entity.is_idle(), "idle handler", true, entity.is_idle());

        entity.notify_event_handler_created(None, 9);
        crate::assert_with_log!(entity.task == Some(task), "binding kept", Some(task), entity.task);
        crate::assert_with_log!(entity.is_enabled, "re-enabled", true, entity.is_enabled);
        crate::assert_with_log!(
            entity.handler_operation_count == 0,
            "handler counter reset",
            0,
            entity.handler_operation_count
        );
        crate::assert_with_log!(
            entity.next_operation == OperationType::Receive,
            "re-created handler receives first",
            OperationType::Receive,
            entity.next_operation
        );
        crate::assert_with_log!(
            entity.matching_send_index == 9,
            "matching send",
            9,
            entity.matching_send_index
        );
        crate::assert_with_log!(
            entity.operation_count == 1,
            "lifetime counter kept",
            1,
            entity.operation_count
        );
        crate::test_complete!("handler_recreation_resets_transients");
    }

    #[test]
    fn waiting_then_receiving() {
        init_test("waiting_then_receiving");
        let mut entity = SchedulableEntity::new(EntityId::new(2), "b");
        entity.is_enabled = true;
        entity.notify_waiting_to_receive();
        crate::assert_with_log!(
            entity.is_waiting_to_receive && !entity.is_enabled,
            "waiting",
            (true, false),
            (entity.is_waiting_to_receive, entity.is_enabled)
        );
        entity.notify_event_received(4);
        crate::assert_with_log!(
            !entity.is_waiting_to_receive && entity.is_enabled,
            "woken",
            (false, true),
            (entity.is_waiting_to_receive, entity.is_enabled)
        );
        crate::test_complete!("waiting_then_receiving");
    }
}
