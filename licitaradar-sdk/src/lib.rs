//! Client SDK for the LicitaRadar search API.
//!
//! Three independent resilience concerns layer over the raw HTTP calls:
//!
//! - **Top-level retry**: the whole-search request is retried on
//!   gateway-class failures (HTTP 500/502) with increasing backoff,
//!   distinct from the per-region retries the server performs.
//! - **Progress aggregation**: the per-search event stream folds into a
//!   per-region status view with totals, completion, and the
//!   partial-results prompt.
//! - **Graceful degradation**: when the search ultimately fails, a
//!   de-technicalized fallback offers a manual retry with a cooldown and
//!   the last successfully completed search, if any.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use licitaradar_sdk::{SearchClient, SdkConfig, SearchRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SearchClient::new(SdkConfig::new("http://localhost:8080"))?;
//!
//!     let response = client
//!         .search(SearchRequest::new("pregão eletrônico merenda"))
//!         .await?;
//!     println!("{} records", response.total);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod fallback;
pub mod progress;
pub mod stream;

pub use client::{CancelToken, SearchClient, SearchRequest, SearchResponse, SearchStatus};
pub use config::SdkConfig;
pub use error::{SdkError, SdkResult};
pub use fallback::FallbackView;
pub use progress::{record_phrase, region_phrase, RegionSnapshot, SearchProgressState};
pub use stream::EventStream;
