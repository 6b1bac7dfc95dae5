//! Raw observations supplied by the signal source
//!
//! These are the shapes the host marshals browser callbacks into before
//! handing them to the engine. They also define the JSON Lines trace
//! format replayed by the CLI: one [`SignalRecord`] per line.

use crate::types::{Properties, Result, TrackerError, TriggerKind};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::BufRead;

/// The form (or other container) a field belongs to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormContainer {
    /// Container id attribute (may be absent)
    #[serde(default)]
    pub id: Option<String>,

    /// Container `name` attribute
    #[serde(default)]
    pub name: Option<String>,

    /// Form classification reported as `form_type` (`contact_inquiry`, ...)
    #[serde(default)]
    pub form_type: Option<String>,

    /// Container carries the do-not-track marker
    #[serde(default)]
    pub do_not_track: bool,
}

impl FormContainer {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Builder method: set the human-readable form name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder method: set the form classification
    pub fn with_form_type(mut self, form_type: impl Into<String>) -> Self {
        self.form_type = Some(form_type.into());
        self
    }

    /// Container id, or `form` when the container has none
    pub fn key_id(&self) -> &str {
        non_empty(self.id.as_deref()).unwrap_or("form")
    }

    /// Add `form_name` and `form_type` to `props` when known
    pub(crate) fn insert_metadata(&self, props: &mut Properties) {
        if let Some(name) = non_empty(self.name.as_deref()) {
            props.insert("form_name".into(), json!(name));
        }
        if let Some(form_type) = non_empty(self.form_type.as_deref()) {
            props.insert("form_type".into(), json!(form_type));
        }
    }
}

/// A text input or textarea as seen at observation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRef {
    /// Enclosing container; `None` when the field is not inside one
    #[serde(default)]
    pub container: Option<FormContainer>,

    /// `data-name` attribute
    #[serde(default)]
    pub data_name: Option<String>,

    /// `name` attribute
    #[serde(default)]
    pub name: Option<String>,

    /// `id` attribute
    #[serde(default)]
    pub id: Option<String>,

    /// Input type (`text`, `email`, `textarea`, ...)
    #[serde(default = "default_field_type")]
    pub field_type: String,

    /// Current value
    #[serde(default)]
    pub value: String,
}

fn default_field_type() -> String {
    "text".to_string()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

impl FieldRef {
    /// Field named `name` inside `container`
    pub fn new(container: FormContainer, name: impl Into<String>) -> Self {
        Self {
            container: Some(container),
            data_name: None,
            name: Some(name.into()),
            id: None,
            field_type: default_field_type(),
            value: String::new(),
        }
    }

    /// Builder method: set the current value
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Builder method: set the `data-name` attribute
    pub fn with_data_name(mut self, data_name: impl Into<String>) -> Self {
        self.data_name = Some(data_name.into());
        self
    }

    /// Identifier resolution: `data-name`, then `name`, then `id`, else `field`
    pub fn identifier(&self) -> &str {
        non_empty(self.data_name.as_deref())
            .or_else(|| non_empty(self.name.as_deref()))
            .or_else(|| non_empty(self.id.as_deref()))
            .unwrap_or("field")
    }

    /// Value length in characters
    pub fn value_length(&self) -> usize {
        self.value.chars().count()
    }
}

/// One control of a form at submit time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedField {
    #[serde(default)]
    pub data_name: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub id: Option<String>,

    #[serde(default = "default_field_type")]
    pub field_type: String,

    #[serde(default)]
    pub value: String,

    /// Carries the `required` attribute
    #[serde(default)]
    pub required: bool,

    /// Checked state (checkboxes and radios only)
    #[serde(default)]
    pub checked: bool,
}

impl SubmittedField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            data_name: None,
            name: Some(name.into()),
            id: None,
            field_type: default_field_type(),
            value: value.into(),
            required: false,
            checked: false,
        }
    }

    /// Builder method: set the `data-name` attribute
    pub fn with_data_name(mut self, data_name: impl Into<String>) -> Self {
        self.data_name = Some(data_name.into());
        self
    }

    /// Builder method: set the input type
    pub fn with_type(mut self, field_type: impl Into<String>) -> Self {
        self.field_type = field_type.into();
        self
    }

    /// Builder method: mark the control as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Builder method: set the checked state
    pub fn with_checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }
}

/// A form's controls at the moment it was submitted
///
/// Hidden inputs and submit buttons are not part of the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormSnapshot {
    #[serde(default)]
    pub container: FormContainer,

    #[serde(default)]
    pub fields: Vec<SubmittedField>,
}

impl FormSnapshot {
    pub fn new(container: FormContainer) -> Self {
        Self {
            container,
            fields: Vec::new(),
        }
    }

    /// Builder method: add a control
    pub fn add_field(mut self, field: SubmittedField) -> Self {
        self.fields.push(field);
        self
    }

    /// Form id, then form name, else `unknown_form`
    pub fn form_id(&self) -> &str {
        non_empty(self.container.id.as_deref())
            .or_else(|| non_empty(self.container.name.as_deref()))
            .unwrap_or("unknown_form")
    }

    /// First non-empty value of a control whose `data-name`, then `name`,
    /// equals one of `candidates`
    pub fn value_of(&self, candidates: &[&str]) -> Option<&str> {
        let filled = || self.fields.iter().filter(|f| !f.value.is_empty());
        filled()
            .find(|f| matches_any(f.data_name.as_deref(), candidates))
            .or_else(|| filled().find(|f| matches_any(f.name.as_deref(), candidates)))
            .map(|f| f.value.as_str())
    }
}

fn matches_any(attr: Option<&str>, candidates: &[&str]) -> bool {
    attr.is_some_and(|a| candidates.contains(&a))
}

/// Viewport metrics at the time of a scroll sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollSnapshot {
    /// Vertical scroll offset in pixels
    pub offset_px: f64,
    /// Viewport height in pixels
    pub viewport_height_px: f64,
    /// Full document height in pixels
    pub document_height_px: f64,
}

impl ScrollSnapshot {
    pub fn new(offset_px: f64, viewport_height_px: f64, document_height_px: f64) -> Self {
        Self {
            offset_px,
            viewport_height_px,
            document_height_px,
        }
    }
}

/// State of an inlined embed's container after a batch of mutations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerSnapshot {
    /// Text content of the container subtree
    #[serde(default)]
    pub text: String,

    /// Count of visible input/textarea elements (hidden and radio excluded)
    #[serde(default)]
    pub visible_inputs: usize,
}

/// One raw observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Signal {
    /// Input, focus or blur on a field
    Field { field: FieldRef, trigger: TriggerKind },

    /// The browser rejected a field during submission
    FieldInvalid { field: FieldRef, message: String },

    /// A page-rendered form was submitted
    FormSubmit { form: FormSnapshot },

    /// Raw scroll event (coalesced before sampling)
    Scroll { snapshot: ScrollSnapshot },

    /// Cross-document message addressed to the page
    Message {
        origin: String,
        payload: serde_json::Value,
    },

    /// The embed's inline frame finished loading
    FrameLoad { embed: String },

    /// The embed's container subtree changed
    Mutation {
        embed: String,
        container: ContainerSnapshot,
    },

    /// Intersection update for the embed's section
    Visibility { embed: String, ratio: f64 },

    /// Click on a call-to-action pointing at the embed
    CtaClick { embed: String, text: String },
}

/// A signal stamped with the time it was observed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    /// Observation time in milliseconds (same timeline as the scheduler)
    pub at_ms: u64,
    pub signal: Signal,
}

/// Read a JSON Lines trace
///
/// Blank lines and lines starting with `#` are skipped. Records must be in
/// non-decreasing `at_ms` order.
pub fn read_trace<R: BufRead>(reader: R) -> Result<Vec<SignalRecord>> {
    let mut records: Vec<SignalRecord> = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let record: SignalRecord =
            serde_json::from_str(trimmed).map_err(|e| TrackerError::TraceParse {
                line: line_no,
                message: e.to_string(),
            })?;

        if let Some(previous) = records.last() {
            if record.at_ms < previous.at_ms {
                return Err(TrackerError::TraceParse {
                    line: line_no,
                    message: format!(
                        "timestamp {} is earlier than previous record at {}",
                        record.at_ms, previous.at_ms
                    ),
                });
            }
        }

        records.push(record);
    }

    log::debug!("Read {} trace records", records.len());
    Ok(records)
}
