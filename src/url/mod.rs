//! URL handling module for Harvestman
//!
//! This module provides URL normalization (the crawl's dedup key), host
//! extraction, and domain-scope matching against the seed URL.

mod domain;
mod normalize;
mod scope;

// Re-export main functions
pub use domain::extract_host;
pub use normalize::normalize_url;
pub use scope::ScopeMatcher;
