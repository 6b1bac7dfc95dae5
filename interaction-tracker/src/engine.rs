//! Main engine API
//!
//! [`InteractionEngine`] owns the trackers, the host's scheduler and
//! its event sink. It exposes one entry point per kind of raw observation
//! and routes fired timers back to whichever tracker armed them.

use crate::completion::CompletionDetector;
use crate::config::TrackerConfig;
use crate::field::{FieldOutcome, FieldTracker};
use crate::host::{EventSink, Scheduler, SubtreeWatch, TimerId, VirtualClock};
use crate::scroll::ScrollTracker;
use crate::signal::{ContainerSnapshot, FieldRef, FormSnapshot, ScrollSnapshot, Signal, SignalRecord};
use crate::submission::SubmissionTracker;
use crate::types::{Result, TriggerKind};
use serde_json::Value;

/// The interaction engine - entry point for all observations
pub struct InteractionEngine<C: Scheduler, S: EventSink> {
    clock: C,
    sink: S,
    fields: FieldTracker,
    scroll: ScrollTracker,
    submissions: SubmissionTracker,
    embeds: Vec<CompletionDetector>,
}

impl<C: Scheduler, S: EventSink> InteractionEngine<C, S> {
    /// Create an engine after validating `config`
    pub fn new(config: TrackerConfig, clock: C, sink: S) -> Result<Self> {
        config.validate()?;

        let embeds = config
            .embeds
            .iter()
            .cloned()
            .map(|embed| CompletionDetector::new(embed, config.page.clone()))
            .collect::<Vec<_>>();
        log::info!("Interaction engine ready ({} monitored embeds)", embeds.len());

        Ok(Self {
            clock,
            sink,
            fields: FieldTracker::new(config.field),
            scroll: ScrollTracker::new(config.scroll, config.page.clone()),
            submissions: SubmissionTracker::new(config.page),
            embeds,
        })
    }

    /// Input, focus or blur on a form field
    pub fn observe_field_event(&mut self, field: &FieldRef, trigger: TriggerKind) -> FieldOutcome {
        self.fields.observe(field, trigger, &mut self.clock, &mut self.sink)
    }

    /// Browser validation failure on a form field
    pub fn observe_field_invalid(&mut self, field: &FieldRef, message: &str) -> bool {
        self.fields.observe_invalid(field, message, &self.clock, &mut self.sink)
    }

    /// Submit of a page-rendered form
    pub fn observe_form_submit(&mut self, form: &FormSnapshot) -> bool {
        self.submissions.observe(form, &self.clock, &mut self.sink)
    }

    /// Raw scroll event; sampled after the coalescing window closes
    pub fn observe_scroll_signal(&mut self, snapshot: ScrollSnapshot) {
        self.scroll.observe_signal(snapshot, &mut self.clock);
    }

    /// Process one scroll sample immediately, returning the thresholds crossed
    pub fn observe_scroll_sample(&mut self, snapshot: &ScrollSnapshot) -> Vec<u8> {
        self.scroll.sample(snapshot, &self.clock, &mut self.sink)
    }

    /// Cross-document message; offered to every embed whose origin matches
    ///
    /// Returns true if the message completed one of the embeds.
    pub fn observe_cross_origin_message(&mut self, origin: &str, payload: &Value) -> bool {
        let mut completed = false;
        for detector in &mut self.embeds {
            completed |= detector.observe_message(origin, payload, &self.clock, &mut self.sink);
        }
        completed
    }

    /// The embed's inline frame finished loading
    pub fn observe_frame_load(&mut self, embed: &str) -> bool {
        let Some(detector) = find_embed(&mut self.embeds, embed) else {
            return false;
        };
        detector.observe_frame_load(&self.clock, &mut self.sink)
    }

    /// A batch of mutations landed in the embed's container
    pub fn observe_container_mutation(&mut self, embed: &str, container: &ContainerSnapshot) -> bool {
        let Some(detector) = find_embed(&mut self.embeds, embed) else {
            return false;
        };
        detector.observe_mutation(container, &self.clock, &mut self.sink)
    }

    /// Intersection update for the embed's section
    pub fn observe_embed_visibility(&mut self, embed: &str, ratio: f64) -> bool {
        let Some(detector) = find_embed(&mut self.embeds, embed) else {
            return false;
        };
        detector.observe_visibility(ratio, &self.clock, &mut self.sink)
    }

    /// Click on a call-to-action leading to the embed
    pub fn observe_cta_click(&mut self, embed: &str, text: &str) {
        if let Some(detector) = find_embed(&mut self.embeds, embed) {
            detector.observe_cta_click(text, &self.clock, &mut self.sink);
        }
    }

    /// Give the embed's detector ownership of its container observer
    pub fn attach_container_watch(&mut self, embed: &str, mut watch: Box<dyn SubtreeWatch>) -> bool {
        match find_embed(&mut self.embeds, embed) {
            Some(detector) => {
                detector.attach_watch(watch);
                true
            }
            None => {
                watch.disconnect();
                false
            }
        }
    }

    /// Deliver a fired timer to the tracker that armed it
    pub fn on_timer(&mut self, timer: TimerId) -> bool {
        self.fields.on_timer(timer, &self.clock, &mut self.sink)
            || self.scroll.on_timer(timer, &self.clock, &mut self.sink)
    }

    /// Route a recorded signal to its entry point
    pub fn dispatch(&mut self, signal: &Signal) {
        match signal {
            Signal::Field { field, trigger } => {
                self.observe_field_event(field, *trigger);
            }
            Signal::FieldInvalid { field, message } => {
                self.observe_field_invalid(field, message);
            }
            Signal::FormSubmit { form } => {
                self.observe_form_submit(form);
            }
            Signal::Scroll { snapshot } => self.observe_scroll_signal(*snapshot),
            Signal::Message { origin, payload } => {
                self.observe_cross_origin_message(origin, payload);
            }
            Signal::FrameLoad { embed } => {
                self.observe_frame_load(embed);
            }
            Signal::Mutation { embed, container } => {
                self.observe_container_mutation(embed, container);
            }
            Signal::Visibility { embed, ratio } => {
                self.observe_embed_visibility(embed, *ratio);
            }
            Signal::CtaClick { embed, text } => self.observe_cta_click(embed, text),
        }
    }

    pub fn embed(&self, id: &str) -> Option<&CompletionDetector> {
        self.embeds.iter().find(|d| d.id() == id)
    }

    pub fn field_tracker(&self) -> &FieldTracker {
        &self.fields
    }

    pub fn scroll_tracker(&self) -> &ScrollTracker {
        &self.scroll
    }

    pub fn submission_tracker(&self) -> &SubmissionTracker {
        &self.submissions
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Tear the engine down, returning the host capabilities
    pub fn into_parts(self) -> (C, S) {
        (self.clock, self.sink)
    }
}

impl<S: EventSink> InteractionEngine<VirtualClock, S> {
    /// Fire every timer due at or before `until_ms`, then move the clock there
    pub fn advance_to(&mut self, until_ms: u64) {
        while let Some(timer) = self.clock.pop_due(until_ms) {
            if !self.on_timer(timer) {
                log::trace!("Timer {:?} had no owner", timer);
            }
        }
        self.clock.set_now(until_ms);
    }

    /// Advance the clock by `ms`
    pub fn advance(&mut self, ms: u64) {
        let until = self.clock.now_ms().saturating_add(ms);
        self.advance_to(until);
    }

    /// Fire all armed timers
    pub fn drain_timers(&mut self) {
        while let Some(deadline) = self.clock.last_deadline() {
            self.advance_to(deadline);
        }
    }

    /// Replay records in order, then let pending timers fire
    pub fn replay(&mut self, records: &[SignalRecord]) {
        for record in records {
            self.advance_to(record.at_ms);
            self.dispatch(&record.signal);
        }
        self.drain_timers();
    }
}

fn find_embed<'a>(embeds: &'a mut [CompletionDetector], id: &str) -> Option<&'a mut CompletionDetector> {
    let found = embeds.iter_mut().find(|d| d.id() == id);
    if found.is_none() {
        log::trace!("No monitored embed '{}'", id);
    }
    found
}
