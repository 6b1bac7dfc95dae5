//! Tracker configuration types
//!
//! Every knob the trackers read lives here. All sections deserialize with
//! defaults so an empty TOML document yields a working configuration.

use crate::intent::IntentVocabulary;
use crate::types::{Result, TrackerError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Configuration for the whole engine
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TrackerConfig {
    /// Field interaction tracking
    #[serde(default)]
    pub field: FieldConfig,

    /// Scroll milestone tracking
    #[serde(default)]
    pub scroll: ScrollConfig,

    /// Page context attached to page-level events
    #[serde(default)]
    pub page: PageConfig,

    /// Cross-origin embeds to monitor for completion
    #[serde(default)]
    pub embeds: Vec<EmbedConfig>,
}

/// Field interaction tracker settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldConfig {
    /// Delay before a non-significant input is reported (default: 2000ms)
    #[serde(default = "default_debounce_delay")]
    pub debounce_delay_ms: u64,

    /// Length bucket width; crossing a bucket boundary is significant (default: 3)
    #[serde(default = "default_length_bucket")]
    pub length_bucket: usize,

    /// Whether non-significant input is debounced (false = emit everything)
    #[serde(default = "default_true")]
    pub enable_debouncing: bool,

    /// Attach a coarse `length_category` property
    #[serde(default = "default_true")]
    pub enable_length_category: bool,

    /// Attach a truncated value preview for non-sensitive fields
    #[serde(default = "default_true")]
    pub enable_preview: bool,

    /// Number of characters kept in the value preview
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,

    /// Additional substrings marking a field as sensitive
    #[serde(default)]
    pub extra_sensitive_terms: Vec<String>,
}

/// Scroll milestone tracker settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrollConfig {
    /// Depth thresholds in percent, strictly ascending
    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<u8>,

    /// Trailing coalescing window for raw scroll signals (default: 100ms)
    #[serde(default = "default_coalesce")]
    pub coalesce_ms: u64,
}

/// Page-level context copied into scroll and form events
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PageConfig {
    pub url: Option<String>,
    pub title: Option<String>,
}

/// One monitored cross-origin form embed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbedConfig {
    /// Identifier used by the signal source to address this embed
    pub id: String,

    /// Host the embed's messages must come from (subdomains accepted)
    pub expected_origin: String,

    #[serde(default)]
    pub form_id: Option<String>,

    #[serde(default)]
    pub form_name: Option<String>,

    #[serde(default)]
    pub form_type: Option<String>,

    /// Vendor tag reported as `form_source`
    #[serde(default)]
    pub form_source: Option<String>,

    /// Phrases that must all appear in the container text for the
    /// mutation channel to report completion
    #[serde(default = "default_completion_phrases")]
    pub completion_phrases: Vec<String>,

    /// Intersection ratio at which the embed counts as viewed (default: 0.3)
    #[serde(default = "default_visibility_ratio")]
    pub visibility_ratio: f64,

    /// Message classification vocabulary
    #[serde(default)]
    pub intent: IntentVocabulary,
}

fn default_true() -> bool {
    true
}

fn default_debounce_delay() -> u64 {
    2000
}

fn default_length_bucket() -> usize {
    3
}

fn default_preview_chars() -> usize {
    10
}

fn default_thresholds() -> Vec<u8> {
    vec![0, 25, 50, 75, 90, 100]
}

fn default_coalesce() -> u64 {
    100
}

fn default_completion_phrases() -> Vec<String> {
    vec!["감사합니다".to_string(), "완료".to_string()]
}

fn default_visibility_ratio() -> f64 {
    0.3
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            debounce_delay_ms: default_debounce_delay(),
            length_bucket: default_length_bucket(),
            enable_debouncing: true,
            enable_length_category: true,
            enable_preview: true,
            preview_chars: default_preview_chars(),
            extra_sensitive_terms: Vec::new(),
        }
    }
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            thresholds: default_thresholds(),
            coalesce_ms: default_coalesce(),
        }
    }
}

impl EmbedConfig {
    /// Create an embed configuration with default vocabulary and phrases
    pub fn new(id: impl Into<String>, expected_origin: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            expected_origin: expected_origin.into(),
            form_id: None,
            form_name: None,
            form_type: None,
            form_source: None,
            completion_phrases: default_completion_phrases(),
            visibility_ratio: default_visibility_ratio(),
            intent: IntentVocabulary::default(),
        }
    }

    /// Builder method: set the form metadata reported with events
    pub fn with_form(
        mut self,
        form_id: impl Into<String>,
        form_name: impl Into<String>,
        form_type: impl Into<String>,
    ) -> Self {
        self.form_id = Some(form_id.into());
        self.form_name = Some(form_name.into());
        self.form_type = Some(form_type.into());
        self
    }

    /// Builder method: set the vendor tag
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.form_source = Some(source.into());
        self
    }

    /// Builder method: replace the mutation-channel completion phrases
    pub fn with_completion_phrases(mut self, phrases: Vec<String>) -> Self {
        self.completion_phrases = phrases;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(TrackerError::InvalidConfig("embed id must not be empty".into()));
        }
        if self.expected_origin.trim().is_empty() {
            return Err(TrackerError::InvalidConfig(format!(
                "embed '{}' has an empty expected_origin",
                self.id
            )));
        }
        if !(self.visibility_ratio > 0.0 && self.visibility_ratio <= 1.0) {
            return Err(TrackerError::InvalidConfig(format!(
                "embed '{}' visibility_ratio must be in (0, 1], got {}",
                self.id, self.visibility_ratio
            )));
        }
        if self.completion_phrases.is_empty() {
            log::warn!(
                "Embed '{}' has no completion phrases; mutation channel will never fire",
                self.id
            );
        }
        Ok(())
    }
}

impl TrackerConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the debounce delay
    pub fn with_debounce_delay(mut self, delay_ms: u64) -> Self {
        self.field.debounce_delay_ms = delay_ms;
        self
    }

    /// Builder method: enable or disable debouncing
    pub fn with_debouncing(mut self, enabled: bool) -> Self {
        self.field.enable_debouncing = enabled;
        self
    }

    /// Builder method: set the length bucket width
    pub fn with_length_bucket(mut self, bucket: usize) -> Self {
        self.field.length_bucket = bucket;
        self
    }

    /// Builder method: set the scroll coalescing window
    pub fn with_scroll_coalesce(mut self, window_ms: u64) -> Self {
        self.scroll.coalesce_ms = window_ms;
        self
    }

    /// Builder method: set the page context
    pub fn with_page(mut self, url: impl Into<String>, title: impl Into<String>) -> Self {
        self.page = PageConfig {
            url: Some(url.into()),
            title: Some(title.into()),
        };
        self
    }

    /// Builder method: add a monitored embed
    pub fn add_embed(mut self, embed: EmbedConfig) -> Self {
        self.embeds.push(embed);
        self
    }

    /// Check the configuration for values the trackers cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.field.length_bucket == 0 {
            return Err(TrackerError::InvalidConfig(
                "field.length_bucket must be greater than zero".into(),
            ));
        }

        let thresholds = &self.scroll.thresholds;
        if thresholds.iter().any(|t| *t > 100) {
            return Err(TrackerError::InvalidConfig(
                "scroll thresholds must be within 0..=100".into(),
            ));
        }
        if thresholds.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(TrackerError::InvalidConfig(
                "scroll thresholds must be strictly ascending".into(),
            ));
        }

        let mut ids = HashSet::new();
        for embed in &self.embeds {
            embed.validate()?;
            if !ids.insert(embed.id.as_str()) {
                return Err(TrackerError::InvalidConfig(format!(
                    "duplicate embed id '{}'",
                    embed.id
                )));
            }
        }

        Ok(())
    }
}
