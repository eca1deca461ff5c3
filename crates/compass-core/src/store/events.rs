//! Store event types and the listener registry.

use std::panic::{catch_unwind, AssertUnwindSafe};

use jiff::Timestamp;
use serde_json::Value;

/// Discrete event names emitted by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEventKind {
    /// A plan was created
    PlanCreated,
    /// A plan's status changed
    PlanUpdated,
    /// A plan was deleted
    PlanDeleted,
    /// A task was added to a plan
    TaskCreated,
    /// A task changed without completing or failing
    TaskUpdated,
    /// A task reached completed for the first time
    TaskCompleted,
    /// A task reached failed for the first time
    TaskFailed,
    /// A blocked task became pending after its dependencies resolved
    TaskUnblocked,
    /// Evidence was recorded
    EvidenceAdded,
    /// A decision was appended to the audit log
    DecisionLogged,
}

impl StoreEventKind {
    /// Wire name of the event, `scope:verb`.
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreEventKind::PlanCreated => "plan:created",
            StoreEventKind::PlanUpdated => "plan:updated",
            StoreEventKind::PlanDeleted => "plan:deleted",
            StoreEventKind::TaskCreated => "task:created",
            StoreEventKind::TaskUpdated => "task:updated",
            StoreEventKind::TaskCompleted => "task:completed",
            StoreEventKind::TaskFailed => "task:failed",
            StoreEventKind::TaskUnblocked => "task:unblocked",
            StoreEventKind::EvidenceAdded => "evidence:added",
            StoreEventKind::DecisionLogged => "decision:logged",
        }
    }

    /// Events that should schedule a persistence auto-save: every `task:*`
    /// event plus evidence and decision appends.
    pub fn triggers_auto_save(&self) -> bool {
        matches!(
            self,
            StoreEventKind::TaskCreated
                | StoreEventKind::TaskUpdated
                | StoreEventKind::TaskCompleted
                | StoreEventKind::TaskFailed
                | StoreEventKind::TaskUnblocked
                | StoreEventKind::EvidenceAdded
                | StoreEventKind::DecisionLogged
        )
    }
}

/// A single store mutation, delivered synchronously to all listeners in
/// mutation order.
#[derive(Debug, Clone)]
pub struct StoreEvent {
    /// What happened
    pub kind: StoreEventKind,
    /// Plan the mutation belongs to
    pub plan_id: String,
    /// Task involved, when the event is task-scoped
    pub task_id: Option<String>,
    /// When the event was emitted
    pub timestamp: Timestamp,
    /// Small event-specific payload (e.g. the new plan status)
    pub data: Option<Value>,
}

/// Callback invoked for every store event.
pub type StoreEventListener = Box<dyn Fn(&StoreEvent) + Send>;

/// Handle identifying a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Ordered set of event listeners.
///
/// Delivery is synchronous and in subscription order. A panicking listener
/// is isolated: the panic is caught and logged, and delivery continues with
/// the remaining listeners.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: Vec<(ListenerId, StoreEventListener)>,
    next_id: u64,
}

impl ListenerRegistry {
    pub(crate) fn subscribe(&mut self, listener: StoreEventListener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub(crate) fn emit(&self, event: &StoreEvent) {
        for (id, listener) in &self.listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                log::error!(
                    "store event listener {id:?} panicked handling {}",
                    event.kind.as_str()
                );
            }
        }
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.listeners.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}
