//! Completion detection for cross-origin form embeds
//!
//! A form hosted by a third-party widget gives the page no submit callback.
//! Three independent channels each infer completion on their own:
//! - **message**: the widget posts a message that reads like a success,
//! - **frame navigation**: the widget's inline frame loads a second page,
//! - **mutation**: an inlined widget's container shows the thank-you text
//!   and no longer holds visible inputs.
//!
//! All channels go through one latch. The first signal emits `form_submit`;
//! everything after it is dropped.

use crate::config::{EmbedConfig, PageConfig};
use crate::host::{EventSink, Scheduler, SubtreeWatch};
use crate::intent::{classify_intent, Intent};
use crate::signal::ContainerSnapshot;
use crate::types::{format_event_time, DetectionMethod, Milestone, Properties, FORM_CTA_CLICK, FORM_SUBMIT, FORM_VIEW};
use serde_json::{json, Value};

/// Submission latch for one embed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionState {
    /// Set once, never cleared
    pub submitted: bool,
}

/// Multi-channel completion detector for one embed
pub struct CompletionDetector {
    config: EmbedConfig,
    page: PageConfig,
    state: CompletionState,
    frame_loads: u32,
    watch: Option<Box<dyn SubtreeWatch>>,
    watching: bool,
    viewed: bool,
}

/// Host part of an origin string, lower-cased (`https://a.b:443/x` -> `a.b`)
fn origin_host(origin: &str) -> String {
    let without_scheme = origin.split_once("://").map_or(origin, |(_, rest)| rest);
    let authority = without_scheme.split('/').next().unwrap_or_default();
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = host.split(':').next().unwrap_or_default();
    host.trim_end_matches('.').to_lowercase()
}

/// True when `origin`'s host is `expected` or one of its subdomains
pub fn origin_matches(origin: &str, expected: &str) -> bool {
    let host = origin_host(origin);
    let expected = origin_host(expected);
    if host.is_empty() || expected.is_empty() {
        return false;
    }
    host == expected || host.ends_with(&format!(".{}", expected))
}

// Falsy in the sense the widget protocol uses: nothing worth reading.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Decode a message payload: serialized strings are parsed, anything else
/// is taken as-is. Unparsable or blank payloads yield `None`.
pub fn decode_payload(payload: &Value) -> Option<Value> {
    let value = match payload {
        Value::String(text) => serde_json::from_str(text).ok()?,
        other => other.clone(),
    };
    if is_blank(&value) {
        None
    } else {
        Some(value)
    }
}

/// The message's declared `type`, `event` or `action`, whichever is set first
pub fn declared_type(message: &Value) -> String {
    let Value::Object(map) = message else {
        return String::new();
    };
    ["type", "event", "action"]
        .iter()
        .filter_map(|key| map.get(*key))
        .find(|value| !is_blank(value))
        .map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}

impl CompletionDetector {
    pub fn new(config: EmbedConfig, page: PageConfig) -> Self {
        Self {
            config,
            page,
            state: CompletionState::default(),
            frame_loads: 0,
            watch: None,
            watching: true,
            viewed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn is_completed(&self) -> bool {
        self.state.submitted
    }

    pub fn state(&self) -> CompletionState {
        self.state
    }

    /// Hand over the container observer's unsubscribe handle
    ///
    /// If the latch is already set the observer is disconnected right away.
    pub fn attach_watch(&mut self, mut watch: Box<dyn SubtreeWatch>) {
        if self.state.submitted || !self.watching {
            watch.disconnect();
            return;
        }
        if let Some(mut previous) = self.watch.replace(watch) {
            previous.disconnect();
        }
    }

    /// Message channel. Returns true if this message completed the form.
    pub fn observe_message(
        &mut self,
        origin: &str,
        payload: &Value,
        scheduler: &dyn Scheduler,
        sink: &mut dyn EventSink,
    ) -> bool {
        if !origin_matches(origin, &self.config.expected_origin) {
            log::trace!("[{}] Dropping message from untrusted origin {}", self.config.id, origin);
            return false;
        }
        sink.mark_activity();
        if self.state.submitted {
            log::trace!("[{}] Already completed, ignoring message", self.config.id);
            return false;
        }
        let Some(message) = decode_payload(payload) else {
            log::trace!("[{}] Ignoring unparsable or empty message", self.config.id);
            return false;
        };

        let message_type = declared_type(&message);
        let serialized = serde_json::to_string(&message).unwrap_or_default();

        match classify_intent(&message_type, &serialized, &self.config.intent) {
            Intent::Success => {
                let tag = if message_type.is_empty() {
                    "unknown".to_string()
                } else {
                    message_type.to_lowercase()
                };
                let mut extra = Properties::new();
                extra.insert("iframe_message_type".into(), json!(tag));
                self.complete(DetectionMethod::PostMessage, extra, scheduler, sink)
            }
            intent => {
                log::debug!(
                    "[{}] Non-completion message ({:?}): {}",
                    self.config.id,
                    intent,
                    if message_type.is_empty() { "untyped" } else { message_type.as_str() }
                );
                false
            }
        }
    }

    /// Navigation channel. The first load is the initial render; any later
    /// load is the post-submit page.
    pub fn observe_frame_load(&mut self, scheduler: &dyn Scheduler, sink: &mut dyn EventSink) -> bool {
        sink.mark_activity();
        self.frame_loads = self.frame_loads.saturating_add(1);
        if self.frame_loads <= 1 {
            log::trace!("[{}] Initial frame load", self.config.id);
            return false;
        }
        self.complete(DetectionMethod::IframeNavigation, Properties::new(), scheduler, sink)
    }

    /// Mutation channel, called once per batch of container changes
    pub fn observe_mutation(
        &mut self,
        container: &ContainerSnapshot,
        scheduler: &dyn Scheduler,
        sink: &mut dyn EventSink,
    ) -> bool {
        sink.mark_activity();
        if self.state.submitted || !self.watching {
            self.release_watch();
            return false;
        }

        let phrases = &self.config.completion_phrases;
        let thanked = !phrases.is_empty() && phrases.iter().all(|p| container.text.contains(p.as_str()));
        if !thanked || container.visible_inputs > 0 {
            return false;
        }
        self.complete(DetectionMethod::DomMutation, Properties::new(), scheduler, sink)
    }

    /// Advisory: report the embed as viewed the first time enough of it is visible
    pub fn observe_visibility(&mut self, ratio: f64, scheduler: &dyn Scheduler, sink: &mut dyn EventSink) -> bool {
        if self.viewed || ratio < self.config.visibility_ratio {
            return false;
        }
        self.viewed = true;

        let mut props = self.form_properties();
        props.insert("form_section_visible".into(), json!(true));
        props.insert("view_time".into(), json!(format_event_time(scheduler.now_ms())));
        log::debug!("[{}] Form section viewed", self.config.id);
        sink.emit(FORM_VIEW, props);
        true
    }

    /// Advisory: report a click on a call-to-action leading to the embed
    pub fn observe_cta_click(&mut self, text: &str, scheduler: &dyn Scheduler, sink: &mut dyn EventSink) {
        sink.mark_activity();
        let mut props = self.form_properties();
        props.insert("cta_text".into(), json!(text.trim()));
        props.insert("cta_action".into(), json!("scroll_to_form"));
        props.insert("click_time".into(), json!(format_event_time(scheduler.now_ms())));
        sink.emit(FORM_CTA_CLICK, props);
    }

    fn complete(
        &mut self,
        method: DetectionMethod,
        extra: Properties,
        scheduler: &dyn Scheduler,
        sink: &mut dyn EventSink,
    ) -> bool {
        if self.state.submitted {
            log::trace!("[{}] Completion via {} suppressed, already latched", self.config.id, method);
            return false;
        }
        self.state.submitted = true;
        self.release_watch();

        let mut props = self.form_properties();
        props.insert(
            "form_id".into(),
            json!(self.config.form_id.as_deref().unwrap_or(&self.config.id)),
        );
        if let Some(title) = &self.page.title {
            props.insert("form_page_title".into(), json!(title));
        }
        props.insert("detection_method".into(), json!(method.as_str()));
        props.insert("submission_status".into(), json!("success"));
        props.insert(
            "form_submission_time".into(),
            json!(format_event_time(scheduler.now_ms())),
        );
        props.extend(extra);

        log::info!("[{}] Form submission detected via {}", self.config.id, method);
        sink.emit(FORM_SUBMIT, props);
        sink.record_milestone(Milestone::FormSubmission);
        true
    }

    fn release_watch(&mut self) {
        self.watching = false;
        if let Some(mut watch) = self.watch.take() {
            log::trace!("[{}] Disconnecting container observer", self.config.id);
            watch.disconnect();
        }
    }

    fn form_properties(&self) -> Properties {
        let mut props = Properties::new();
        if let Some(name) = &self.config.form_name {
            props.insert("form_name".into(), json!(name));
        }
        if let Some(form_type) = &self.config.form_type {
            props.insert("form_type".into(), json!(form_type));
        }
        if let Some(url) = &self.page.url {
            props.insert("form_url".into(), json!(url));
        }
        if let Some(source) = &self.config.form_source {
            props.insert("form_source".into(), json!(source));
        }
        props
    }
}
