//! Single-attempt retrieval and outcome classification.
//!
//! - [`transport`] - The [`Transport`] seam and its reqwest implementation
//! - [`executor`] - [`attempt_fetch`]: request, classify, parse `data`

mod executor;
mod transport;

pub use executor::{attempt_fetch, FetchError, FetchOutcome};
pub use transport::{HttpTransport, Transport, TransportError, TransportResponse};
