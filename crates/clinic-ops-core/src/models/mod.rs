//! Domain models for the clinic operations core.

mod appointment;
mod consent;
mod package;
mod patient;
mod stock;
mod treatment;
mod visit;

pub use appointment::*;
pub use consent::*;
pub use package::*;
pub use patient::*;
pub use stock::*;
pub use treatment::*;
pub use visit::*;

use thiserror::Error;

/// A status change that the entity's lifecycle does not allow.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid {entity} transition: {from} -> {to}")]
pub struct TransitionError {
    pub entity: &'static str,
    pub from: &'static str,
    pub to: &'static str,
}

/// Current time as an RFC 3339 string.
pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// New random record ID.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
