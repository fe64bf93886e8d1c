//! Bilingual consent templates.
//!
//! A template holds one or two language sections with `{{placeholder}}` markers.
//! Rendering fills every marker and yields a [`RenderedConsent`] whose plain-text
//! form is hashed so a signed record can later be checked for edits.

pub mod document;
pub mod template;

pub use document::*;
pub use template::*;
