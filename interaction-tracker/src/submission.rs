//! Native form submission events
//!
//! Forms rendered by the page itself report their own submit. The event
//! describes what was submitted without carrying personal values: name,
//! email and phone are reduced to presence flags and the message to its
//! length. The outcome is unknown at submit time, so the status is
//! `pending`.

use crate::config::PageConfig;
use crate::host::{EventSink, Scheduler};
use crate::signal::{FormSnapshot, SubmittedField};
use crate::types::{format_event_time, Milestone, Properties, FORM_SUBMIT};
use serde_json::json;

const NAME_KEYS: &[&str] = &["이름", "Name", "name", "gameplus_Name"];
const EMAIL_KEYS: &[&str] = &["이메일", "회사 이메일", "Email", "email", "gameplus_email"];
const PHONE_KEYS: &[&str] = &["연락처", "휴대폰 번호", "Phone", "phone", "gameplus_phone"];
const COMPANY_KEYS: &[&str] = &["회사명", "Company", "company", "gameplus_company"];
const SOURCE_KEYS: &[&str] = &["씽킹데이터를 어떻게 아셨나요?", "알게된경로", "source"];
const MESSAGE_KEYS: &[&str] = &["문의사항", "Message", "message"];

const AGREEMENT_NAME_TERMS: &[&str] = &["privacy", "agreement", "동의"];
const AGREEMENT_DATA_NAME_TERMS: &[&str] = &["동의", "개인정보"];

fn is_privacy_agreement(field: &SubmittedField) -> bool {
    if field.field_type != "checkbox" {
        return false;
    }
    let name = field.name.as_deref().unwrap_or_default().to_lowercase();
    let data_name = field.data_name.as_deref().unwrap_or_default();
    AGREEMENT_NAME_TERMS.iter().any(|t| name.contains(t))
        || AGREEMENT_DATA_NAME_TERMS.iter().any(|t| data_name.contains(t))
}

/// Reports submits of page-rendered forms
pub struct SubmissionTracker {
    page: PageConfig,
    submitted: u32,
}

impl SubmissionTracker {
    pub fn new(page: PageConfig) -> Self {
        Self { page, submitted: 0 }
    }

    /// Emit `form_submit` for `form`. Returns false for do-not-track forms.
    pub fn observe(&mut self, form: &FormSnapshot, scheduler: &dyn Scheduler, sink: &mut dyn EventSink) -> bool {
        if form.container.do_not_track {
            log::trace!("Form '{}' is do-not-track, ignoring submit", form.form_id());
            return false;
        }
        sink.mark_activity();

        let has = |keys: &[&str]| form.value_of(keys).is_some();
        let message_length = form.value_of(MESSAGE_KEYS).map_or(0, |m| m.chars().count());
        let submitted_info = json!({
            "company_name": form.value_of(COMPANY_KEYS).unwrap_or_default(),
            "inquiry_source": form.value_of(SOURCE_KEYS).unwrap_or_default(),
            "message_length": message_length,
            "has_name": has(NAME_KEYS),
            "has_email": has(EMAIL_KEYS),
            "has_phone": has(PHONE_KEYS),
        });

        let agreement = form.fields.iter().find(|f| is_privacy_agreement(f));
        let required = form.fields.iter().filter(|f| f.required).count();
        let form_info = json!({
            "form_field_count": form.fields.len(),
            "form_required_field_count": required,
            "form_has_required_fields": required > 0,
            "form_has_privacy_agreement": agreement.is_some(),
        });

        let mut props = Properties::new();
        props.insert("form_id".into(), json!(form.form_id()));
        form.container.insert_metadata(&mut props);
        if let Some(url) = &self.page.url {
            props.insert("form_url".into(), json!(url));
        }
        if let Some(title) = &self.page.title {
            props.insert("form_page_title".into(), json!(title));
        }
        props.insert("form_fields_submitted_info".into(), submitted_info);
        props.insert(
            "privacy_agreement_checked".into(),
            json!(agreement.is_some_and(|f| f.checked)),
        );
        props.insert("submission_status".into(), json!("pending"));
        props.insert("form_info".into(), form_info);
        props.insert("form_validation_passed".into(), json!(true));
        props.insert(
            "form_submission_time".into(),
            json!(format_event_time(scheduler.now_ms())),
        );

        self.submitted = self.submitted.saturating_add(1);
        log::info!("Form '{}' submitted ({} fields)", form.form_id(), form.fields.len());
        sink.emit(FORM_SUBMIT, props);
        sink.record_milestone(Milestone::FormSubmission);
        true
    }

    /// Number of submits reported so far
    pub fn submitted_count(&self) -> u32 {
        self.submitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{RecordingSink, VirtualClock};
    use crate::signal::FormContainer;

    fn contact_form() -> FormSnapshot {
        FormSnapshot::new(
            FormContainer::new("ask-form")
                .with_name("문의하기 폼")
                .with_form_type("contact_inquiry"),
        )
        .add_field(SubmittedField::new("field", "김데이터").with_data_name("이름").required())
        .add_field(
            SubmittedField::new("field", "kim@example.com")
                .with_data_name("회사 이메일")
                .with_type("email")
                .required(),
        )
        .add_field(SubmittedField::new("field", "").with_data_name("연락처"))
        .add_field(SubmittedField::new("company", "Acme"))
        .add_field(SubmittedField::new("message", "도입 문의드립니다").with_type("textarea"))
        .add_field(
            SubmittedField::new("privacy_agreement", "on")
                .with_type("checkbox")
                .with_checked(true)
                .required(),
        )
    }

    fn tracker() -> SubmissionTracker {
        SubmissionTracker::new(PageConfig {
            url: Some("https://example.com/form-ask".into()),
            title: Some("Contact".into()),
        })
    }

    #[test]
    fn test_submit_summarises_without_personal_values() {
        let mut tracker = tracker();
        let clock = VirtualClock::starting_at(1_700_000_000_000);
        let mut sink = RecordingSink::new();

        assert!(tracker.observe(&contact_form(), &clock, &mut sink));

        let event = sink.named(FORM_SUBMIT).next().unwrap();
        assert_eq!(event.get("form_id"), Some(&json!("ask-form")));
        assert_eq!(event.get("form_name"), Some(&json!("문의하기 폼")));
        assert_eq!(event.get("form_type"), Some(&json!("contact_inquiry")));
        assert_eq!(event.get("form_url"), Some(&json!("https://example.com/form-ask")));
        assert_eq!(event.get("submission_status"), Some(&json!("pending")));
        assert_eq!(event.get("privacy_agreement_checked"), Some(&json!(true)));
        assert_eq!(event.get("form_submission_time"), Some(&json!("2023-11-14 22:13:20.000")));
        assert_eq!(
            event.get("form_fields_submitted_info"),
            Some(&json!({
                "company_name": "Acme",
                "inquiry_source": "",
                "message_length": 9,
                "has_name": true,
                "has_email": true,
                "has_phone": false,
            }))
        );
        assert_eq!(
            event.get("form_info"),
            Some(&json!({
                "form_field_count": 6,
                "form_required_field_count": 3,
                "form_has_required_fields": true,
                "form_has_privacy_agreement": true,
            }))
        );

        let text = serde_json::to_string(&event.properties).unwrap();
        assert!(!text.contains("kim@example.com"));
        assert!(!text.contains("김데이터"));

        assert_eq!(sink.milestones, vec![Milestone::FormSubmission]);
        assert_eq!(sink.activity_marks, 1);
        assert_eq!(tracker.submitted_count(), 1);
    }

    #[test]
    fn test_unchecked_or_missing_agreement() {
        let mut tracker = tracker();
        let clock = VirtualClock::new();
        let mut sink = RecordingSink::new();

        let unchecked = FormSnapshot::new(FormContainer::default()).add_field(
            SubmittedField::new("field", "on")
                .with_data_name("개인정보 수집 동의")
                .with_type("checkbox"),
        );
        tracker.observe(&unchecked, &clock, &mut sink);
        tracker.observe(&FormSnapshot::default(), &clock, &mut sink);

        let events: Vec<_> = sink.named(FORM_SUBMIT).collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].get("form_id"), Some(&json!("unknown_form")));
        assert_eq!(events[0].get("privacy_agreement_checked"), Some(&json!(false)));
        let info = |i: usize| events[i].get("form_info").cloned().unwrap();
        assert_eq!(info(0)["form_has_privacy_agreement"], json!(true));
        assert_eq!(info(1)["form_has_privacy_agreement"], json!(false));
        assert_eq!(info(1)["form_field_count"], json!(0));
    }

    #[test]
    fn test_do_not_track_form_is_ignored() {
        let mut tracker = tracker();
        let clock = VirtualClock::new();
        let mut sink = RecordingSink::new();

        let mut form = contact_form();
        form.container.do_not_track = true;
        assert!(!tracker.observe(&form, &clock, &mut sink));
        assert!(sink.events.is_empty());
        assert!(sink.milestones.is_empty());
        assert_eq!(sink.activity_marks, 0);
    }
}
