//! # eventpoll
//!
//! A recurring fetch scheduler for a centers/events JSON feed.
//!
//! ```text
//! Fetcher (poller task) → attempt_fetch → normalize → SubscriptionHub → callbacks
//!        ▲                                                              │
//!        └──────────────────── rearm timer ─────────────────────────────┘
//! ```
//!
//! - [`feed`]: payload model and the flattening normalizer
//! - [`fetch`]: transport seam, HTTP transport, outcome classification
//! - [`scheduler`]: per-source poll loop, subscription hub, diagnostics
//! - [`config`]: TOML configuration
//! - [`util`]: endpoint validation
//!
//! ```ignore
//! let transport = Arc::new(HttpTransport::new(reqwest::Client::new()));
//! let fetcher = Fetcher::spawn(
//!     FetchSource::new("http://localhost:8080/events", Duration::from_secs(300)),
//!     transport,
//!     Some(FeedPayload::from_file(Path::new("data.json"))?),
//! );
//! fetcher.on_items_received(|view| println!("{} items", view.items().len()));
//! fetcher.start_fetch().await?;
//! ```

pub mod config;
pub mod feed;
pub mod fetch;
pub mod scheduler;
pub mod util;

pub use feed::{normalize, DisplayItem, FeedPayload};
pub use fetch::{attempt_fetch, FetchError, FetchOutcome, HttpTransport, Transport};
pub use scheduler::{CycleState, FeedView, FetchSource, FetchStatus, Fetcher};
