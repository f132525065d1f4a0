//! Harvestman: a configurable crawl-and-extract engine
//!
//! This crate implements a single-process web crawler that walks hyperlinks
//! from a seed URL under depth and domain-scope constraints, builds a link
//! graph of the pages it visits, and runs selector-based extraction rules
//! against every fetched document. The UI, project persistence, and on-disk
//! serializers are external collaborators; this crate owns the crawl engine
//! and the format-neutral result shapes they consume.

pub mod config;
pub mod crawler;
pub mod export;
pub mod extract;
pub mod graph;
pub mod url;

use thiserror::Error;

/// Main error type for Harvestman operations
///
/// Only configuration problems surface here: per-page fetch and parse
/// failures, and per-field extraction errors, are recorded in the data
/// model (see [`graph::PageNode`] and [`extract::FieldValue`]) and never
/// abort a run.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid seed URL: {0}")]
    InvalidSeed(String),

    #[error("Invalid extraction rule '{field}': {message}")]
    InvalidRule { field: String, message: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Harvestman operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{CrawlConfig, DomainScope, ExtractionRule, SelectorKind};
pub use crawler::{start_crawl, CrawlRunHandle, Progress, RunStatus};
pub use export::ExportSnapshot;
pub use extract::{ExtractedRecord, FieldValue};
pub use graph::{Edge, NodeStatus, PageNode};
pub use url::{extract_host, normalize_url, ScopeMatcher};
