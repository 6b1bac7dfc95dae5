//! Capabilities the trackers consume from their host
//!
//! The trackers never touch a browser, a timer wheel or a network stack
//! directly. The host hands them:
//! - an [`EventSink`] that receives emitted events (fire-and-forget),
//! - a [`Scheduler`] that arms and cancels one-shot timers,
//! - optionally a [`SubtreeWatch`] handle per embed container.
//!
//! [`RecordingSink`] and [`VirtualClock`] are deterministic in-memory
//! implementations used by the CLI replay and by tests.

use crate::types::{AnalyticsEvent, Milestone, Properties};
use std::collections::{BTreeSet, HashMap};

/// Destination for analytics events and page-level side signals
pub trait EventSink {
    /// Deliver one event. No response is expected.
    fn emit(&mut self, name: &str, properties: Properties);

    /// Called on every accepted observation to keep the session alive
    fn mark_activity(&mut self) {}

    /// Report a page-view milestone to the user-attribute collaborator
    fn record_milestone(&mut self, _milestone: Milestone) {}
}

/// Handle identifying one armed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// One-shot timer capability
///
/// Fired timers are delivered back to the engine by the host
/// (see `InteractionEngine::on_timer`).
pub trait Scheduler {
    /// Current time in milliseconds since the Unix epoch
    fn now_ms(&self) -> u64;

    /// Arm a timer that fires once after `delay_ms`
    fn schedule(&mut self, delay_ms: u64) -> TimerId;

    /// Disarm a timer. Cancelling an unknown or fired timer is a no-op.
    fn cancel(&mut self, id: TimerId);
}

/// Unsubscribe handle for a structural-change observer
pub trait SubtreeWatch {
    /// Stop delivering mutation batches. Called at most once.
    fn disconnect(&mut self);
}

/// Sink that keeps everything in memory
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub events: Vec<AnalyticsEvent>,
    pub milestones: Vec<Milestone>,
    pub activity_marks: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events with the given name, in emission order
    pub fn named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a AnalyticsEvent> + 'a {
        self.events.iter().filter(move |e| e.name == name)
    }

    pub fn count(&self, name: &str) -> usize {
        self.named(name).count()
    }

    /// Move the recorded events out, leaving the sink empty
    pub fn drain(&mut self) -> Vec<AnalyticsEvent> {
        std::mem::take(&mut self.events)
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, name: &str, properties: Properties) {
        self.events.push(AnalyticsEvent::new(name, properties));
    }

    fn mark_activity(&mut self) {
        self.activity_marks += 1;
    }

    fn record_milestone(&mut self, milestone: Milestone) {
        self.milestones.push(milestone);
    }
}

/// Deterministic scheduler driven by explicit time advancement
///
/// Timers fire in deadline order; timers sharing a deadline fire in the
/// order they were armed.
#[derive(Debug, Default)]
pub struct VirtualClock {
    now_ms: u64,
    next_id: u64,
    queue: BTreeSet<(u64, TimerId)>,
    deadlines: HashMap<TimerId, u64>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock reading `epoch_ms`
    pub fn starting_at(epoch_ms: u64) -> Self {
        Self {
            now_ms: epoch_ms,
            ..Self::default()
        }
    }

    /// Pop the earliest timer due at or before `until_ms`, moving the
    /// clock to its deadline
    pub fn pop_due(&mut self, until_ms: u64) -> Option<TimerId> {
        let &(deadline, id) = self.queue.iter().next()?;
        if deadline > until_ms {
            return None;
        }
        self.queue.remove(&(deadline, id));
        self.deadlines.remove(&id);
        self.now_ms = self.now_ms.max(deadline);
        Some(id)
    }

    /// Move the clock forward without firing anything. Never goes backwards.
    pub fn set_now(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    /// Deadline of the latest armed timer, if any
    pub fn last_deadline(&self) -> Option<u64> {
        self.queue.iter().next_back().map(|(deadline, _)| *deadline)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl Scheduler for VirtualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn schedule(&mut self, delay_ms: u64) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        let deadline = self.now_ms.saturating_add(delay_ms);
        self.queue.insert((deadline, id));
        self.deadlines.insert(id, deadline);
        id
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(deadline) = self.deadlines.remove(&id) {
            self.queue.remove(&(deadline, id));
        }
    }
}
