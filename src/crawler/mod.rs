//! Crawl engine
//!
//! This module contains the core crawling machinery:
//! - The frontier (FIFO work queue with deduplication)
//! - HTTP fetching with retry logic and size limits
//! - HTML parsing and link extraction
//! - Run orchestration: worker pool, per-host pacing, pause and
//!   cancellation
//!
//! The entry point is [`start_crawl`], which returns a [`CrawlRunHandle`]
//! for observing and controlling the run.

mod fetcher;
mod frontier;
mod parser;
mod scheduler;

pub use fetcher::{build_http_client, fetch, FetchFailure, FetchFailureKind, FetchOutcome, UserAgentPool};
pub use frontier::{Frontier, FrontierEntry};
pub use parser::{decode_body, parse_page, Document, PageLink, ParseFailure};
pub use scheduler::{start_crawl, CrawlRunHandle, Progress, RunStatus};
