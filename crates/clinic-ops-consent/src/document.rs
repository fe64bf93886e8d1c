//! Rendered consent documents and their content hashes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Separator placed between language sections in the plain-text form.
pub const SECTION_SEPARATOR: &str = "\n\n---\n\n";

/// One rendered language section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderedSection {
    pub language: String,
    pub title: String,
    pub body: String,
}

/// A consent document with every placeholder filled in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderedConsent {
    /// Template this document was rendered from
    pub template_id: String,
    /// Rendered sections, in template order
    pub sections: Vec<RenderedSection>,
}

impl RenderedConsent {
    /// Languages present, in order.
    pub fn languages(&self) -> Vec<String> {
        self.sections.iter().map(|s| s.language.clone()).collect()
    }

    /// Plain-text form stored with the signed record.
    pub fn to_plain_text(&self) -> String {
        self.sections
            .iter()
            .map(|s| format!("{}\n\n{}", s.title, s.body))
            .collect::<Vec<_>>()
            .join(SECTION_SEPARATOR)
    }

    /// SHA-256 of the plain-text form.
    pub fn content_hash(&self) -> String {
        hash_text(&self.to_plain_text())
    }
}

/// Hex SHA-256 of a document's text.
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check stored text against the hash captured at signing time.
pub fn verify_text(text: &str, expected_hash: &str) -> bool {
    hash_text(text).eq_ignore_ascii_case(expected_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_document() -> RenderedConsent {
        RenderedConsent {
            template_id: "tpl-1".into(),
            sections: vec![
                RenderedSection {
                    language: "en".into(),
                    title: "Consent".into(),
                    body: "I agree.".into(),
                },
                RenderedSection {
                    language: "ar".into(),
                    title: "موافقة".into(),
                    body: "أوافق.".into(),
                },
            ],
        }
    }

    #[test]
    fn test_plain_text_joins_sections() {
        let text = make_document().to_plain_text();
        assert!(text.starts_with("Consent\n\nI agree."));
        assert!(text.contains(SECTION_SEPARATOR));
        assert!(text.ends_with("أوافق."));
    }

    #[test]
    fn test_hash_is_stable_and_hex() {
        let doc = make_document();
        let h1 = doc.content_hash();
        let h2 = doc.content_hash();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_verify_detects_edits() {
        let doc = make_document();
        let text = doc.to_plain_text();
        let hash = doc.content_hash();

        assert!(verify_text(&text, &hash));
        assert!(verify_text(&text, &hash.to_uppercase()));
        assert!(!verify_text(&text.replace("agree", "disagree"), &hash));
    }

    #[test]
    fn test_languages() {
        assert_eq!(make_document().languages(), vec!["en", "ar"]);
    }
}
