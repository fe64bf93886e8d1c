//! Signed consent records.

use serde::{Deserialize, Serialize};

use clinic_ops_consent::RenderedConsent;

use super::{new_id, now};

/// A consent document signed by a patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsentForm {
    pub id: String,
    pub patient_id: String,
    pub treatment_id: Option<String>,
    pub template_id: String,
    /// Language tags of the rendered sections
    pub languages: Vec<String>,
    /// Plain-text document exactly as shown at signing
    pub document_text: String,
    /// SHA-256 of `document_text`
    pub content_hash: String,
    /// Encoded signature capture (e.g., PNG data URI)
    pub signature_data: String,
    pub signed_at: String,
}

impl ConsentForm {
    /// Record a signature against a rendered document.
    pub fn sign(
        patient_id: String,
        treatment_id: Option<String>,
        document: &RenderedConsent,
        signature_data: String,
    ) -> Self {
        Self {
            id: new_id(),
            patient_id,
            treatment_id,
            template_id: document.template_id.clone(),
            languages: document.languages(),
            document_text: document.to_plain_text(),
            content_hash: document.content_hash(),
            signature_data,
            signed_at: now(),
        }
    }

    /// True when the stored text still matches the hash taken at signing.
    pub fn is_intact(&self) -> bool {
        clinic_ops_consent::verify_text(&self.document_text, &self.content_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_ops_consent::RenderedSection;

    #[test]
    fn test_sign_captures_hash() {
        let document = RenderedConsent {
            template_id: "tpl-1".into(),
            sections: vec![RenderedSection {
                language: "en".into(),
                title: "Consent".into(),
                body: "I, Jane Doe, agree.".into(),
            }],
        };

        let mut form = ConsentForm::sign(
            "patient-1".into(),
            None,
            &document,
            "data:image/png;base64,AAAA".into(),
        );
        assert_eq!(form.template_id, "tpl-1");
        assert_eq!(form.languages, vec!["en"]);
        assert!(form.is_intact());

        form.document_text.push_str(" Not really.");
        assert!(!form.is_intact());
    }
}
