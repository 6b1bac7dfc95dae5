//! Core types for the interaction tracker library
//!
//! This module defines the fundamental types the trackers emit and consume:
//! analytics events with their property maps, the trigger kinds a field
//! observation can carry, the completion detection methods, and the crate
//! error type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Property map attached to an analytics event
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Event name for field interaction events
pub const FIELD_INTERACTION: &str = "field_interaction";
/// Event name for scroll milestone events
pub const SCROLL_DEPTH: &str = "scroll_depth";
/// Event name for completed form submissions
pub const FORM_SUBMIT: &str = "form_submit";
/// Event name for client-side validation failures
pub const FORM_SUBMIT_ERROR: &str = "form_submit_error";
/// Event name for the first sighting of an embedded form
pub const FORM_VIEW: &str = "form_view";
/// Event name for call-to-action clicks pointing at an embedded form
pub const FORM_CTA_CLICK: &str = "form_cta_click";

/// Errors that can occur while configuring the engine or reading traces
///
/// Observation entry points never return these: a bad observation simply
/// produces no event.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse trace line {line}: {message}")]
    TraceParse { line: usize, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A single analytics event handed to the sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    /// Event name (`field_interaction`, `scroll_depth`, `form_submit`, ...)
    pub name: String,
    /// Event properties
    pub properties: Properties,
}

impl AnalyticsEvent {
    pub fn new(name: impl Into<String>, properties: Properties) -> Self {
        Self {
            name: name.into(),
            properties,
        }
    }

    /// Look up a property by key
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }
}

/// What caused a field observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Input,
    Focus,
    Blur,
    /// Emission produced by an expired debounce timer (never observed directly)
    Debounced,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Input => "input",
            TriggerKind::Focus => "focus",
            TriggerKind::Blur => "blur",
            TriggerKind::Debounced => "debounced",
        }
    }

    /// Focus changes always count as significant
    pub fn is_focus_change(&self) -> bool {
        matches!(self, TriggerKind::Focus | TriggerKind::Blur)
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which channel of the completion detector produced the completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    #[serde(rename = "postmessage")]
    PostMessage,
    IframeNavigation,
    DomMutation,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::PostMessage => "postmessage",
            DetectionMethod::IframeNavigation => "iframe_navigation",
            DetectionMethod::DomMutation => "dom_mutation",
        }
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Page-view milestones reported to the user-attribute collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    /// The 100% scroll threshold was crossed
    FullScroll,
    /// An embedded form was submitted
    FormSubmission,
}

/// Format a clock reading the way event `*_time` properties expect it
///
/// Produces `YYYY-MM-DD HH:MM:SS.mmm` in UTC.
pub fn format_event_time(epoch_ms: u64) -> String {
    let millis = i64::try_from(epoch_ms).unwrap_or(i64::MAX);
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .format("%Y-%m-%d %H:%M:%S%.3f")
        .to_string()
}
