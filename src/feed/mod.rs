//! Feed retrieval and ingestion.
//!
//! - [`fetcher`]: HTTP retrieval of RSS documents with timeout and size limit
//! - [`document`]: decoding RSS XML into typed channel/item records
//! - [`dates`]: normalizing free-form `pubDate` text
//! - [`ingest`]: turning fetched items into stored posts
//! - [`scheduler`]: the periodic select/fetch/store loop behind `agg`

pub mod dates;
pub mod document;
pub mod fetcher;
pub mod ingest;
pub mod scheduler;

pub use dates::parse_pub_date;
pub use document::{decode_feed, DecodeError, RssChannel, RssFeed, RssItem};
pub use fetcher::{FeedFetcher, FetchError};
pub use ingest::{ingest_items, IngestReport};
pub use scheduler::{
    scrape_once, CycleEvent, CycleReport, RunSummary, Scheduler, SchedulerError, SchedulerState,
};
