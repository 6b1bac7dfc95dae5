//! Interaction Tracker Library
//!
//! Turns noisy, high-frequency page signals (keystrokes, scroll positions,
//! cross-origin widget messages) into a small set of deduplicated analytics
//! events.
//!
//! # Architecture
//!
//! Three independent trackers, each owning its own state:
//! - [`FieldTracker`]: debounced per-field interaction events
//! - [`ScrollTracker`]: once-only scroll depth milestones with speed
//! - [`CompletionDetector`]: at-most-once completion of a cross-origin form,
//!   fused from message, frame-navigation and mutation channels
//!
//! Submits of forms the page renders itself are reported by
//! [`SubmissionTracker`].
//!
//! The library does NOT:
//! - Query the DOM or register browser listeners
//! - Own real timers (the host supplies a [`Scheduler`])
//! - Transport events (the host supplies an [`EventSink`])
//!
//! Everything runs on the caller's thread; no handler blocks or locks.
//!
//! # Example Usage
//!
//! ```
//! use interaction_tracker::{
//!     EmbedConfig, FieldRef, FormContainer, InteractionEngine, RecordingSink,
//!     TrackerConfig, TriggerKind, VirtualClock,
//! };
//! use serde_json::json;
//!
//! let config = TrackerConfig::new()
//!     .add_embed(EmbedConfig::new("salesmap", "salesmap.kr"));
//! let mut engine =
//!     InteractionEngine::new(config, VirtualClock::new(), RecordingSink::new()).unwrap();
//!
//! let field = FieldRef::new(FormContainer::new("contact"), "company").with_value("Acme");
//! engine.observe_field_event(&field, TriggerKind::Focus);
//!
//! engine.observe_cross_origin_message("https://salesmap.kr", &json!({"type": "form_submitted"}));
//! engine.advance(5_000);
//!
//! assert_eq!(engine.sink().count("form_submit"), 1);
//! ```

// Public modules
pub mod completion;
pub mod config;
pub mod engine;
pub mod field;
pub mod host;
pub mod intent;
pub mod privacy;
pub mod scroll;
pub mod signal;
pub mod submission;
pub mod types;

// Re-export main types for convenience
pub use completion::{CompletionDetector, CompletionState};
pub use config::{EmbedConfig, FieldConfig, PageConfig, ScrollConfig, TrackerConfig};
pub use engine::InteractionEngine;
pub use field::{FieldKey, FieldOutcome, FieldState, FieldTracker};
pub use host::{EventSink, RecordingSink, Scheduler, SubtreeWatch, TimerId, VirtualClock};
pub use intent::{classify_intent, Intent, IntentVocabulary};
pub use scroll::{ScrollState, ScrollTracker};
pub use signal::{
    read_trace, ContainerSnapshot, FieldRef, FormContainer, FormSnapshot, ScrollSnapshot, Signal, SignalRecord,
    SubmittedField,
};
pub use submission::SubmissionTracker;
pub use types::{
    AnalyticsEvent, DetectionMethod, Milestone, Properties, Result, TrackerError, TriggerKind,
    FIELD_INTERACTION, FORM_CTA_CLICK, FORM_SUBMIT, FORM_SUBMIT_ERROR, FORM_VIEW, SCROLL_DEPTH,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
