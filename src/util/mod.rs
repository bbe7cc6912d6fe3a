//! Small shared helpers.

mod endpoint;

pub use endpoint::{validate_endpoint, UrlValidationError};
