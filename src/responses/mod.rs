//! Local response generation: templates, channel formatting, quick actions.

pub mod actions;
pub mod format;
pub mod generator;
pub mod templates;

pub use generator::{Draft, ResponseGenerator};
pub use templates::{TemplateFamily, select_family};
