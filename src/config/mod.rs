//! Configuration module for Harvestman
//!
//! This module defines the immutable crawl configuration and extraction
//! rule set, TOML loading, and validation.
//!
//! # Example
//!
//! ```no_run
//! use harvestman::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawl.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawl.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ConfigFile, CrawlConfig, DomainScope, ExtractionRule, SelectorKind};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};

// Re-export validation entry points used by start_crawl
pub use validation::{validate_crawl_config, validate_rules, validate_seed};
