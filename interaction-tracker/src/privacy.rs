//! Field classification helpers
//!
//! Decides which fields are too sensitive to preview and buckets value
//! lengths into coarse categories.

/// Substrings that mark a field identifier as personal information
const SENSITIVE_TERMS: &[&str] = &[
    "email",
    "phone",
    "name",
    "password",
    "ssn",
    "birthday",
    "tel",
    "mobile",
    "contact",
    "phone_number",
    "이메일",
    "연락처",
    "이름",
    "비밀번호",
    "생년월일",
    "휴대폰",
];

/// Case-insensitive substring matcher over a fixed vocabulary
#[derive(Debug, Clone)]
pub struct SensitiveFieldMatcher {
    terms: Vec<String>,
}

impl SensitiveFieldMatcher {
    /// Matcher over the built-in vocabulary plus `extra` terms
    pub fn new(extra: &[String]) -> Self {
        let terms = SENSITIVE_TERMS
            .iter()
            .map(|t| t.to_string())
            .chain(extra.iter().map(|t| t.to_lowercase()))
            .filter(|t| !t.is_empty())
            .collect();
        Self { terms }
    }

    pub fn is_sensitive(&self, identifier: &str) -> bool {
        if identifier.is_empty() {
            return false;
        }
        let lowered = identifier.to_lowercase();
        self.terms.iter().any(|term| lowered.contains(term.as_str()))
    }
}

impl Default for SensitiveFieldMatcher {
    fn default() -> Self {
        Self::new(&[])
    }
}

/// Coarse length bucket: `empty`, `short`, `medium`, `long`, `very_long`
pub fn length_category(length: usize) -> &'static str {
    match length {
        0 => "empty",
        1..=5 => "short",
        6..=20 => "medium",
        21..=50 => "long",
        _ => "very_long",
    }
}

/// First `max_chars` characters followed by `...`, or empty for an empty value
pub fn value_preview(value: &str, max_chars: usize) -> String {
    if value.is_empty() {
        return String::new();
    }
    let mut preview: String = value.chars().take(max_chars).collect();
    preview.push_str("...");
    preview
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensitive_matching() {
        let matcher = SensitiveFieldMatcher::default();
        assert!(matcher.is_sensitive("email"));
        assert!(matcher.is_sensitive("Company_Email"));
        assert!(matcher.is_sensitive("회사 이메일"));
        assert!(matcher.is_sensitive("username"));
        assert!(!matcher.is_sensitive("message"));
        assert!(!matcher.is_sensitive("budget"));
        assert!(!matcher.is_sensitive(""));
    }

    #[test]
    fn test_extra_terms() {
        let matcher = SensitiveFieldMatcher::new(&["Address".to_string()]);
        assert!(matcher.is_sensitive("home_address"));
    }

    #[test]
    fn test_length_category_bounds() {
        assert_eq!(length_category(0), "empty");
        assert_eq!(length_category(1), "short");
        assert_eq!(length_category(5), "short");
        assert_eq!(length_category(6), "medium");
        assert_eq!(length_category(20), "medium");
        assert_eq!(length_category(21), "long");
        assert_eq!(length_category(50), "long");
        assert_eq!(length_category(51), "very_long");
    }

    #[test]
    fn test_value_preview() {
        assert_eq!(value_preview("", 10), "");
        assert_eq!(value_preview("hello", 10), "hello...");
        assert_eq!(value_preview("abcdefghijklmno", 10), "abcdefghij...");
        assert_eq!(value_preview("데이터바우처도입문의드립니다", 3), "데이터...");
    }
}
