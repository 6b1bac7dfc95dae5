//! Field interaction tracking
//!
//! Every input, focus and blur on a tracked field updates that field's
//! [`FieldState`]. Only *significant* changes are reported right away:
//! - the field went from empty to non-empty or back,
//! - the value length crossed a bucket boundary (`floor(len / K)` changed),
//! - the field gained or lost focus.
//!
//! Other input is debounced: each keystroke re-arms a per-field timer and
//! only the last one in the window is reported, as trigger `debounced`.

use crate::config::FieldConfig;
use crate::host::{EventSink, Scheduler, TimerId};
use crate::privacy::{length_category, value_preview, SensitiveFieldMatcher};
use crate::signal::FieldRef;
use crate::types::{format_event_time, Properties, TriggerKind, FIELD_INTERACTION, FORM_SUBMIT_ERROR};
use serde_json::json;
use std::collections::HashMap;

/// Identity of a tracked field: (container id, field identifier)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldKey {
    pub container_id: String,
    pub field: String,
}

impl FieldKey {
    pub fn new(container_id: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            field: field.into(),
        }
    }
}

/// Per-field state, replaced on every observation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldState {
    /// Current value length
    pub length: usize,
    pub has_value: bool,
    /// Length at the last significant change
    pub last_tracked_length: usize,
    /// Number of observations so far
    pub interaction_count: u64,
}

/// What an observation led to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOutcome {
    /// Not tracked (no container, do-not-track, or not an observable trigger)
    Ignored,
    /// Reported immediately
    Emitted,
    /// Deferred behind the debounce timer
    Debounced,
}

struct PendingEmission {
    timer: TimerId,
    field: FieldRef,
}

/// Debounced per-field interaction tracker
pub struct FieldTracker {
    config: FieldConfig,
    matcher: SensitiveFieldMatcher,
    states: HashMap<FieldKey, FieldState>,
    pending: HashMap<FieldKey, PendingEmission>,
    timer_owners: HashMap<TimerId, FieldKey>,
}

impl FieldTracker {
    pub fn new(config: FieldConfig) -> Self {
        let matcher = SensitiveFieldMatcher::new(&config.extra_sensitive_terms);
        Self {
            config,
            matcher,
            states: HashMap::new(),
            pending: HashMap::new(),
            timer_owners: HashMap::new(),
        }
    }

    /// Record one input/focus/blur on `field`
    pub fn observe(
        &mut self,
        field: &FieldRef,
        trigger: TriggerKind,
        scheduler: &mut dyn Scheduler,
        sink: &mut dyn EventSink,
    ) -> FieldOutcome {
        if trigger == TriggerKind::Debounced {
            log::warn!("Ignoring field observation with synthetic trigger 'debounced'");
            return FieldOutcome::Ignored;
        }
        let Some(key) = self.key_for(field) else {
            return FieldOutcome::Ignored;
        };
        sink.mark_activity();

        let previous = self.states.get(&key).copied().unwrap_or_default();
        let length = field.value_length();
        let has_value = !field.value.is_empty();
        let significant = self.is_significant(&previous, length, has_value, trigger);

        let state = FieldState {
            length,
            has_value,
            last_tracked_length: if significant { length } else { previous.last_tracked_length },
            interaction_count: previous.interaction_count + 1,
        };
        self.states.insert(key.clone(), state);

        if !significant && trigger == TriggerKind::Input && self.config.enable_debouncing {
            self.cancel_pending(&key, scheduler);
            let timer = scheduler.schedule(self.config.debounce_delay_ms);
            log::trace!(
                "Debouncing {}/{} (length {}) until +{}ms",
                key.container_id,
                key.field,
                length,
                self.config.debounce_delay_ms
            );
            self.timer_owners.insert(timer, key.clone());
            self.pending.insert(
                key,
                PendingEmission {
                    timer,
                    field: field.clone(),
                },
            );
            return FieldOutcome::Debounced;
        }

        self.cancel_pending(&key, scheduler);
        self.emit(field, &state, trigger, scheduler.now_ms(), sink);
        FieldOutcome::Emitted
    }

    /// Deliver a fired timer. Returns false if the timer is not ours.
    pub fn on_timer(&mut self, timer: TimerId, scheduler: &dyn Scheduler, sink: &mut dyn EventSink) -> bool {
        let Some(key) = self.timer_owners.remove(&timer) else {
            return false;
        };
        let Some(pending) = self.pending.remove(&key) else {
            return true;
        };
        if let Some(state) = self.states.get(&key).copied() {
            self.emit(&pending.field, &state, TriggerKind::Debounced, scheduler.now_ms(), sink);
        }
        true
    }

    /// Report a browser validation failure on `field`
    pub fn observe_invalid(
        &mut self,
        field: &FieldRef,
        message: &str,
        scheduler: &dyn Scheduler,
        sink: &mut dyn EventSink,
    ) -> bool {
        let Some(key) = self.key_for(field) else {
            return false;
        };
        sink.mark_activity();

        let mut props = Properties::new();
        props.insert("form_id".into(), json!(key.container_id));
        if let Some(container) = &field.container {
            container.insert_metadata(&mut props);
        }
        props.insert("error_type".into(), json!("validation_error"));
        props.insert("field_name".into(), json!(key.field));
        props.insert("field_type".into(), json!(field.field_type));
        props.insert("error_message".into(), json!(message));
        props.insert("error_time".into(), json!(format_event_time(scheduler.now_ms())));

        log::debug!("Validation error on {}/{}: {}", key.container_id, key.field, message);
        sink.emit(FORM_SUBMIT_ERROR, props);
        true
    }

    pub fn state(&self, key: &FieldKey) -> Option<&FieldState> {
        self.states.get(key)
    }

    /// Number of armed debounce timers
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn key_for(&self, field: &FieldRef) -> Option<FieldKey> {
        let Some(container) = field.container.as_ref() else {
            log::trace!("Field '{}' has no container, ignoring", field.identifier());
            return None;
        };
        if container.do_not_track {
            log::trace!("Container '{}' is do-not-track, ignoring", container.key_id());
            return None;
        }
        Some(FieldKey::new(container.key_id(), field.identifier()))
    }

    fn is_significant(&self, previous: &FieldState, length: usize, has_value: bool, trigger: TriggerKind) -> bool {
        let bucket = self.config.length_bucket.max(1);
        previous.has_value != has_value
            || length / bucket != previous.last_tracked_length / bucket
            || trigger.is_focus_change()
    }

    fn cancel_pending(&mut self, key: &FieldKey, scheduler: &mut dyn Scheduler) {
        if let Some(pending) = self.pending.remove(key) {
            scheduler.cancel(pending.timer);
            self.timer_owners.remove(&pending.timer);
        }
    }

    fn emit(&self, field: &FieldRef, state: &FieldState, trigger: TriggerKind, now_ms: u64, sink: &mut dyn EventSink) {
        let identifier = field.identifier();
        let container_id = field.container.as_ref().map(|c| c.key_id()).unwrap_or("form");

        let mut props = Properties::new();
        props.insert("form_id".into(), json!(container_id));
        if let Some(container) = &field.container {
            container.insert_metadata(&mut props);
        }
        props.insert("field_name".into(), json!(identifier));
        props.insert("field_type".into(), json!(field.field_type));
        props.insert("field_value_length".into(), json!(state.length));
        props.insert("field_has_value".into(), json!(state.has_value));
        props.insert("interaction_count".into(), json!(state.interaction_count));
        props.insert("trigger_type".into(), json!(trigger.as_str()));

        if self.config.enable_preview && !self.matcher.is_sensitive(identifier) {
            props.insert(
                "field_value_preview".into(),
                json!(value_preview(&field.value, self.config.preview_chars)),
            );
        }
        if self.config.enable_length_category {
            props.insert("length_category".into(), json!(length_category(state.length)));
        }
        props.insert("interaction_time".into(), json!(format_event_time(now_ms)));

        log::debug!(
            "Field interaction ({}) {}/{} length {}",
            trigger,
            container_id,
            identifier,
            state.length
        );
        sink.emit(FIELD_INTERACTION, props);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{RecordingSink, VirtualClock};
    use crate::signal::FormContainer;

    struct Harness {
        tracker: FieldTracker,
        clock: VirtualClock,
        sink: RecordingSink,
    }

    impl Harness {
        fn new(config: FieldConfig) -> Self {
            Self {
                tracker: FieldTracker::new(config),
                clock: VirtualClock::new(),
                sink: RecordingSink::new(),
            }
        }

        fn observe(&mut self, field: &FieldRef, trigger: TriggerKind) -> FieldOutcome {
            self.tracker.observe(field, trigger, &mut self.clock, &mut self.sink)
        }

        fn advance(&mut self, ms: u64) {
            let until = self.clock.now_ms() + ms;
            while let Some(timer) = self.clock.pop_due(until) {
                self.tracker.on_timer(timer, &self.clock, &mut self.sink);
            }
            self.clock.set_now(until);
        }

        fn emitted(&self) -> Vec<(u64, String)> {
            self.sink
                .named(FIELD_INTERACTION)
                .map(|e| {
                    (
                        e.get("field_value_length").and_then(|v| v.as_u64()).unwrap(),
                        e.get("trigger_type").and_then(|v| v.as_str()).unwrap().to_string(),
                    )
                })
                .collect()
        }
    }

    fn field(name: &str, value: &str) -> FieldRef {
        FieldRef::new(FormContainer::new("ask"), name).with_value(value)
    }

    #[test]
    fn test_interaction_count_counts_every_observation() {
        let mut h = Harness::new(FieldConfig::default());
        let triggers = [
            TriggerKind::Focus,
            TriggerKind::Input,
            TriggerKind::Input,
            TriggerKind::Input,
            TriggerKind::Blur,
        ];
        for (i, trigger) in triggers.iter().enumerate() {
            h.observe(&field("memo", &"x".repeat(i)), *trigger);
        }

        let state = h.tracker.state(&FieldKey::new("ask", "memo")).unwrap();
        assert_eq!(state.interaction_count, 5);
        assert_eq!(h.sink.activity_marks, 5);
    }

    #[test]
    fn test_significant_at_bucket_boundaries() {
        let mut h = Harness::new(FieldConfig::default());
        for value in ["", "a", "ab", "abc", "abcdef"] {
            h.observe(&field("email", value), TriggerKind::Input);
            h.advance(100);
        }
        h.advance(5_000);

        // 1 flips has-value, 3 and 6 cross buckets; 0 and 2 were superseded
        assert_eq!(
            h.emitted(),
            vec![(1, "input".into()), (3, "input".into()), (6, "input".into())]
        );
        assert_eq!(h.tracker.pending_count(), 0);
    }

    #[test]
    fn test_debounce_within_bucket() {
        let mut h = Harness::new(FieldConfig::default());
        h.observe(&field("company", "abc"), TriggerKind::Input);
        assert_eq!(h.emitted().len(), 1);

        assert_eq!(h.observe(&field("company", "abcd"), TriggerKind::Input), FieldOutcome::Debounced);
        h.advance(1_000);
        assert_eq!(h.observe(&field("company", "abcde"), TriggerKind::Input), FieldOutcome::Debounced);
        h.advance(1_999);
        assert_eq!(h.emitted().len(), 1, "nothing before the delay elapses");

        h.advance(1);
        assert_eq!(h.emitted(), vec![(3, "input".into()), (5, "debounced".into())]);

        h.advance(10_000);
        assert_eq!(h.emitted().len(), 2, "exactly one debounced emission");
    }

    #[test]
    fn test_debounced_event_uses_state_at_fire_time() {
        let mut h = Harness::new(FieldConfig::default());
        h.observe(&field("company", "abc"), TriggerKind::Input);
        h.observe(&field("company", "abcd"), TriggerKind::Input);
        h.advance(2_000);

        let event = h.sink.named(FIELD_INTERACTION).last().unwrap();
        assert_eq!(event.get("interaction_count"), Some(&json!(2)));
        assert_eq!(event.get("field_value_preview"), Some(&json!("abcd...")));
        assert_eq!(event.get("length_category"), Some(&json!("short")));
        assert_eq!(event.get("interaction_time"), Some(&json!("1970-01-01 00:00:02.000")));
    }

    #[test]
    fn test_significant_change_cancels_pending_timer() {
        let mut h = Harness::new(FieldConfig::default());
        h.observe(&field("company", "abc"), TriggerKind::Input);
        h.observe(&field("company", "abcd"), TriggerKind::Input);
        assert_eq!(h.tracker.pending_count(), 1);

        h.observe(&field("company", "abcd"), TriggerKind::Blur);
        assert_eq!(h.tracker.pending_count(), 0);
        assert_eq!(h.clock.pending(), 0);

        h.advance(5_000);
        assert_eq!(h.emitted(), vec![(3, "input".into()), (4, "blur".into())]);
    }

    #[test]
    fn test_focus_and_blur_always_emit() {
        let mut h = Harness::new(FieldConfig::default());
        assert_eq!(h.observe(&field("memo", ""), TriggerKind::Focus), FieldOutcome::Emitted);
        assert_eq!(h.observe(&field("memo", ""), TriggerKind::Blur), FieldOutcome::Emitted);
        assert_eq!(h.emitted(), vec![(0, "focus".into()), (0, "blur".into())]);
    }

    #[test]
    fn test_debouncing_disabled_emits_everything() {
        let config = FieldConfig {
            enable_debouncing: false,
            ..FieldConfig::default()
        };
        let mut h = Harness::new(config);
        h.observe(&field("memo", "abc"), TriggerKind::Input);
        h.observe(&field("memo", "abcd"), TriggerKind::Input);
        h.observe(&field("memo", "abcde"), TriggerKind::Input);
        assert_eq!(h.emitted().len(), 3);
        assert_eq!(h.clock.pending(), 0);

        let state = h.tracker.state(&FieldKey::new("ask", "memo")).unwrap();
        assert_eq!(state.last_tracked_length, 3);
    }

    #[test]
    fn test_fields_are_keyed_independently() {
        let mut h = Harness::new(FieldConfig::default());
        h.observe(&field("company", "abc"), TriggerKind::Input);
        h.observe(&field("budget", "abc"), TriggerKind::Input);
        h.observe(&field("company", "abcd"), TriggerKind::Input);
        h.observe(&field("budget", "abcd"), TriggerKind::Input);
        assert_eq!(h.tracker.pending_count(), 2);

        h.advance(2_000);
        assert_eq!(h.sink.count(FIELD_INTERACTION), 4);
    }

    #[test]
    fn test_do_not_track_and_missing_container() {
        let mut h = Harness::new(FieldConfig::default());
        let mut container = FormContainer::new("newsletter");
        container.do_not_track = true;
        let hidden = FieldRef::new(container, "memo").with_value("abc");
        assert_eq!(h.observe(&hidden, TriggerKind::Focus), FieldOutcome::Ignored);

        let mut orphan = field("memo", "abc");
        orphan.container = None;
        assert_eq!(h.observe(&orphan, TriggerKind::Focus), FieldOutcome::Ignored);

        assert!(h.sink.events.is_empty());
        assert_eq!(h.sink.activity_marks, 0);
    }

    #[test]
    fn test_sensitive_fields_have_no_preview() {
        let mut h = Harness::new(FieldConfig::default());
        h.observe(&field("email", "kim@example.com"), TriggerKind::Blur);
        h.observe(&field("message", "hello"), TriggerKind::Blur);

        let events: Vec<_> = h.sink.named(FIELD_INTERACTION).collect();
        assert!(events[0].get("field_value_preview").is_none());
        assert_eq!(events[0].get("length_category"), Some(&json!("medium")));
        assert_eq!(events[1].get("field_value_preview"), Some(&json!("hello...")));
    }

    #[test]
    fn test_validation_error_event() {
        let mut h = Harness::new(FieldConfig::default());
        let mut f = field("email", "kim@");
        f.field_type = "email".into();
        assert!(h.tracker.observe_invalid(&f, "Please include an '@'", &h.clock, &mut h.sink));

        let event = h.sink.named(FORM_SUBMIT_ERROR).next().unwrap();
        assert_eq!(event.get("error_type"), Some(&json!("validation_error")));
        assert_eq!(event.get("field_type"), Some(&json!("email")));
        assert_eq!(event.get("form_id"), Some(&json!("ask")));
    }

    #[test]
    fn test_form_metadata_is_attached() {
        let mut h = Harness::new(FieldConfig::default());
        let container = FormContainer::new("ask")
            .with_name("문의하기 폼")
            .with_form_type("contact_inquiry");
        let named = FieldRef::new(container, "message").with_value("hi");
        h.observe(&named, TriggerKind::Focus);
        h.tracker.observe_invalid(&named, "required", &h.clock, &mut h.sink);
        h.observe(&field("message", "hi"), TriggerKind::Blur);

        for event in h.sink.events.iter().take(2) {
            assert_eq!(event.get("form_name"), Some(&json!("문의하기 폼")));
            assert_eq!(event.get("form_type"), Some(&json!("contact_inquiry")));
        }
        let bare = &h.sink.events[2];
        assert!(bare.get("form_name").is_none());
        assert!(bare.get("form_type").is_none());
    }

    #[test]
    fn test_foreign_timer_is_not_handled() {
        let mut h = Harness::new(FieldConfig::default());
        let foreign = h.clock.schedule(10);
        assert!(!h.tracker.on_timer(foreign, &h.clock, &mut h.sink));
    }
}
