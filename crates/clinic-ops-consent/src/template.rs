//! Consent templates with `{{placeholder}}` substitution.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::{RenderedConsent, RenderedSection};

/// Template errors.
#[derive(Error, Debug, PartialEq)]
pub enum TemplateError {
    #[error("JSON parse error: {0}")]
    JsonParse(String),

    #[error("Invalid template format: {0}")]
    InvalidFormat(String),

    #[error("Unclosed placeholder at byte {0}")]
    UnclosedPlaceholder(usize),

    #[error("Invalid placeholder name: {0:?}")]
    InvalidPlaceholder(String),

    #[error("No value supplied for placeholder: {0}")]
    MissingValue(String),
}

impl From<serde_json::Error> for TemplateError {
    fn from(e: serde_json::Error) -> Self {
        TemplateError::JsonParse(e.to_string())
    }
}

pub type TemplateResult<T> = Result<T, TemplateError>;

/// Most templates carry a primary and a secondary language.
pub const MAX_SECTIONS: usize = 2;

/// One language version of a consent template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateSection {
    /// Language tag (e.g., "en", "ar")
    pub language: String,
    /// Section heading
    pub title: String,
    /// Body text with `{{placeholder}}` markers
    pub body: String,
}

/// A reusable consent template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsentTemplate {
    pub id: String,
    pub name: String,
    pub sections: Vec<TemplateSection>,
}

impl ConsentTemplate {
    /// Create a single-language template.
    pub fn new(id: String, name: String, section: TemplateSection) -> Self {
        Self {
            id,
            name,
            sections: vec![section],
        }
    }

    /// Add the secondary language version.
    pub fn with_section(mut self, section: TemplateSection) -> Self {
        self.sections.push(section);
        self
    }

    /// Check section count, language uniqueness and placeholder syntax.
    pub fn validate(&self) -> TemplateResult<()> {
        if self.sections.is_empty() {
            return Err(TemplateError::InvalidFormat(
                "template has no sections".into(),
            ));
        }
        if self.sections.len() > MAX_SECTIONS {
            return Err(TemplateError::InvalidFormat(format!(
                "template has {} sections, at most {} allowed",
                self.sections.len(),
                MAX_SECTIONS
            )));
        }

        let mut seen = BTreeSet::new();
        for section in &self.sections {
            let language = section.language.trim().to_lowercase();
            if language.is_empty() {
                return Err(TemplateError::InvalidFormat(
                    "section language is empty".into(),
                ));
            }
            if !seen.insert(language) {
                return Err(TemplateError::InvalidFormat(format!(
                    "duplicate language: {}",
                    section.language
                )));
            }
            scan(&section.title)?;
            scan(&section.body)?;
        }
        Ok(())
    }

    /// All placeholder names used across every section, sorted.
    pub fn placeholders(&self) -> TemplateResult<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for section in &self.sections {
            for segment in scan(&section.title)?.into_iter().chain(scan(&section.body)?) {
                if let Segment::Placeholder(name) = segment {
                    names.insert(name.to_string());
                }
            }
        }
        Ok(names)
    }

    /// Render every section, substituting placeholder values.
    pub fn render(&self, values: &BTreeMap<String, String>) -> TemplateResult<RenderedConsent> {
        self.validate()?;

        let sections = self
            .sections
            .iter()
            .map(|section| {
                Ok(RenderedSection {
                    language: section.language.clone(),
                    title: substitute(&section.title, values)?,
                    body: substitute(&section.body, values)?,
                })
            })
            .collect::<TemplateResult<Vec<_>>>()?;

        Ok(RenderedConsent {
            template_id: self.id.clone(),
            sections,
        })
    }

    /// Serialize for storage.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Parse a template from JSON, tolerating text around the object.
pub fn parse_template_json(json: &str) -> TemplateResult<ConsentTemplate> {
    let start = json.find('{').ok_or_else(|| {
        TemplateError::InvalidFormat("No JSON object found in input".into())
    })?;
    let end = json.rfind('}').ok_or_else(|| {
        TemplateError::InvalidFormat("No closing brace found in input".into())
    })?;
    if end < start {
        return Err(TemplateError::InvalidFormat("Malformed JSON object".into()));
    }

    let template: ConsentTemplate = serde_json::from_str(&json[start..=end])?;
    template.validate()?;
    Ok(template)
}

#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

fn scan(text: &str) -> TemplateResult<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    let mut rest = text;
    let mut offset = 0;

    while let Some(open) = rest.find("{{") {
        if open > 0 {
            segments.push(Segment::Text(&rest[..open]));
        }
        let after_open = &rest[open + 2..];
        let close = after_open
            .find("}}")
            .ok_or(TemplateError::UnclosedPlaceholder(offset + open))?;

        let name = after_open[..close].trim();
        if !is_valid_name(name) {
            return Err(TemplateError::InvalidPlaceholder(name.to_string()));
        }
        segments.push(Segment::Placeholder(name));

        let consumed = open + 2 + close + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Text(rest));
    }
    Ok(segments)
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn substitute(text: &str, values: &BTreeMap<String, String>) -> TemplateResult<String> {
    let mut out = String::with_capacity(text.len());
    for segment in scan(text)? {
        match segment {
            Segment::Text(t) => out.push_str(t),
            Segment::Placeholder(name) => {
                let value = values
                    .get(name)
                    .ok_or_else(|| TemplateError::MissingValue(name.to_string()))?;
                out.push_str(value);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(language: &str, body: &str) -> TemplateSection {
        TemplateSection {
            language: language.into(),
            title: "Treatment Consent".into(),
            body: body.into(),
        }
    }

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_placeholders_collected_across_sections() {
        let template = ConsentTemplate::new(
            "tpl-1".into(),
            "IV therapy".into(),
            section("en", "I, {{patient_name}}, consent to {{treatment_name}}."),
        )
        .with_section(section("ar", "{{ patient_name }} / {{date}}"));

        let names = template.placeholders().unwrap();
        let names: Vec<_> = names.into_iter().collect();
        assert_eq!(names, vec!["date", "patient_name", "treatment_name"]);
    }

    #[test]
    fn test_render_substitutes_values() {
        let template = ConsentTemplate::new(
            "tpl-1".into(),
            "IV therapy".into(),
            section("en", "I, {{patient_name}}, consent to {{treatment_name}}."),
        );

        let rendered = template
            .render(&values(&[
                ("patient_name", "Jane Doe"),
                ("treatment_name", "Vitamin C drip"),
                ("unused", "ignored"),
            ]))
            .unwrap();

        assert_eq!(rendered.sections.len(), 1);
        assert_eq!(
            rendered.sections[0].body,
            "I, Jane Doe, consent to Vitamin C drip."
        );
    }

    #[test]
    fn test_render_missing_value() {
        let template = ConsentTemplate::new(
            "tpl-1".into(),
            "IV therapy".into(),
            section("en", "Signed by {{patient_name}}"),
        );

        let err = template.render(&BTreeMap::new()).unwrap_err();
        assert_eq!(err, TemplateError::MissingValue("patient_name".into()));
    }

    #[test]
    fn test_unclosed_placeholder() {
        let template = ConsentTemplate::new(
            "tpl-1".into(),
            "Broken".into(),
            section("en", "Hello {{patient_name"),
        );
        assert_eq!(
            template.validate().unwrap_err(),
            TemplateError::UnclosedPlaceholder(6)
        );
    }

    #[test]
    fn test_invalid_placeholder_name() {
        let template = ConsentTemplate::new(
            "tpl-1".into(),
            "Broken".into(),
            section("en", "Hello {{Patient Name}}"),
        );
        assert!(matches!(
            template.validate(),
            Err(TemplateError::InvalidPlaceholder(_))
        ));
    }

    #[test]
    fn test_duplicate_language_rejected() {
        let template = ConsentTemplate::new("tpl-1".into(), "Dup".into(), section("en", "a"))
            .with_section(section("EN", "b"));
        assert!(matches!(
            template.validate(),
            Err(TemplateError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_too_many_sections_rejected() {
        let template = ConsentTemplate::new("tpl-1".into(), "Three".into(), section("en", "a"))
            .with_section(section("ar", "b"))
            .with_section(section("fr", "c"));
        assert!(template.validate().is_err());
    }

    #[test]
    fn test_parse_template_json_with_prefix() {
        let json = r#"Template export:
{"id":"tpl-9","name":"Botox","sections":[{"language":"en","title":"Consent","body":"{{patient_name}}"}]}"#;

        let template = parse_template_json(json).unwrap();
        assert_eq!(template.id, "tpl-9");
        assert_eq!(template.sections.len(), 1);
    }

    proptest::proptest! {
        #[test]
        fn prop_render_inserts_value(name in "[a-z][a-z0-9_]{0,10}", value in "[^{}]{0,20}") {
            let body = format!("A {{{{{}}}}} B", name);
            let template = ConsentTemplate::new("t".into(), "n".into(), section("en", &body));
            let rendered = template
                .render(&values(&[(name.as_str(), value.as_str())]))
                .unwrap();
            proptest::prop_assert_eq!(&rendered.sections[0].body, &format!("A {} B", value));
        }
    }

    #[test]
    fn test_parse_template_json_rejects_garbage() {
        assert!(matches!(
            parse_template_json("no json here"),
            Err(TemplateError::InvalidFormat(_))
        ));
    }
}
