//! Feed acquisition: subscription parsing, fetching and normalization.
//!
//! - [`opml`] - reads the subscription list into [`FeedDescriptor`]s
//! - [`fetcher`] - HTTP GET with bounded retry, HEAD probing
//! - [`parser`] - RSS/Atom payloads via `feed-rs`
//! - [`favicon`] - icon URL heuristics per feed
//! - [`aggregator`] - drives the above per feed and collects entries and summaries
//!
//! [`FeedDescriptor`]: crate::types::FeedDescriptor

pub mod aggregator;
pub mod favicon;
pub mod fetcher;
pub mod opml;
pub mod parser;

pub use aggregator::{AggregateError, Aggregation, Aggregator};
pub use favicon::FaviconResolver;
pub use fetcher::{FetchError, Fetcher, RetryPolicy, DEFAULT_USER_AGENT};
pub use opml::OpmlError;
pub use parser::{parse_feed, ParseError};
