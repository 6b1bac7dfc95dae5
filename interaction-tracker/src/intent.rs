//! Message intent classification
//!
//! Cross-origin widgets talk to the host page through loosely structured
//! messages. Whether a message means "the form was submitted" is decided
//! here by plain vocabulary matching. The vocabulary is data so it can be
//! tuned per embed from configuration.

use serde::{Deserialize, Serialize};

/// What a message appears to say about the embedded form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// The message reports a failure; never a completion
    Error,
    /// The message reports a successful submission
    Success,
    /// Anything else (resize notices, heartbeats, field updates, ...)
    Unknown,
}

/// Token lists used by [`classify_intent`]
///
/// All matching is case-insensitive substring matching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntentVocabulary {
    /// Tokens that mark a message as an error anywhere in the payload
    #[serde(default = "default_error_tokens")]
    pub error_tokens: Vec<String>,

    /// Tokens that mark the declared message type as a success
    #[serde(default = "default_success_tokens")]
    pub success_tokens: Vec<String>,

    /// Phrases that mark the payload text as a thank-you screen
    #[serde(default = "default_thank_you_phrases")]
    pub thank_you_phrases: Vec<String>,
}

fn to_strings(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}

fn default_error_tokens() -> Vec<String> {
    to_strings(&["error", "fail", "invalid", "validation", "required"])
}

// "submit" alone is too broad: widgets send it for attempts that may fail.
fn default_success_tokens() -> Vec<String> {
    to_strings(&["submitted", "success", "complete", "conversion"])
}

fn default_thank_you_phrases() -> Vec<String> {
    to_strings(&["감사", "완료"])
}

impl Default for IntentVocabulary {
    fn default() -> Self {
        Self {
            error_tokens: default_error_tokens(),
            success_tokens: default_success_tokens(),
            thank_you_phrases: default_thank_you_phrases(),
        }
    }
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles
        .iter()
        .any(|needle| !needle.is_empty() && haystack.contains(&needle.to_lowercase()))
}

/// Classify a message from its declared type and its full serialized text
///
/// Error tokens anywhere in the declared type or payload win over success
/// tokens. Otherwise a success token in the declared type, or a thank-you
/// phrase in the payload, means success.
pub fn classify_intent(declared_type: &str, payload_text: &str, vocab: &IntentVocabulary) -> Intent {
    let declared = declared_type.to_lowercase();
    let payload = payload_text.to_lowercase();

    if contains_any(&declared, &vocab.error_tokens) || contains_any(&payload, &vocab.error_tokens) {
        return Intent::Error;
    }

    if contains_any(&declared, &vocab.success_tokens)
        || contains_any(&payload, &vocab.thank_you_phrases)
    {
        return Intent::Success;
    }

    Intent::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(declared: &str, payload: &str) -> Intent {
        classify_intent(declared, payload, &IntentVocabulary::default())
    }

    #[test]
    fn test_success_from_declared_type() {
        assert_eq!(
            classify("form_submitted", r#"{"type":"form_submitted"}"#),
            Intent::Success
        );
        assert_eq!(classify("CONVERSION", r#"{"event":"CONVERSION"}"#), Intent::Success);
    }

    #[test]
    fn test_error_takes_precedence() {
        assert_eq!(
            classify("error_submission_failed", r#"{"type":"error_submission_failed"}"#),
            Intent::Error
        );
        assert_eq!(
            classify("form_submitted", r#"{"type":"form_submitted","errors":["email required"]}"#),
            Intent::Error
        );
    }

    #[test]
    fn test_thank_you_phrase_in_payload() {
        assert_eq!(
            classify("", r#"{"html":"<p>신청이 완료되었습니다</p>"}"#),
            Intent::Success
        );
    }

    #[test]
    fn test_plain_submit_is_not_enough() {
        assert_eq!(classify("submit", r#"{"type":"submit"}"#), Intent::Unknown);
        assert_eq!(classify("resize", r#"{"type":"resize","height":640}"#), Intent::Unknown);
    }

    #[test]
    fn test_custom_vocabulary() {
        let vocab = IntentVocabulary {
            error_tokens: vec!["oops".into()],
            success_tokens: vec!["done".into()],
            thank_you_phrases: vec!["Thank You".into()],
        };
        assert_eq!(classify_intent("Done", "{}", &vocab), Intent::Success);
        assert_eq!(classify_intent("", "thank you for applying", &vocab), Intent::Success);
        assert_eq!(classify_intent("done", "oops", &vocab), Intent::Error);
    }
}
