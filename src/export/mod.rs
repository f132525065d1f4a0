//! Format-neutral export representation
//!
//! An [`ExportSnapshot`] bundles everything a run accumulated (graph,
//! records, counts, configuration) into one serializable value. Format
//! serializers (JSON, CSV, HTML, XML) consume this shape; the engine
//! itself only guarantees the shape is stable.

use crate::config::CrawlConfig;
use crate::crawler::RunStatus;
use crate::extract::ExtractedRecord;
use crate::graph::{Edge, GraphCounts, PageNode};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Everything a crawl run produced, in one serializable value
///
/// Built by [`CrawlRunHandle::export_snapshot`]; the graph and record
/// data are point-in-time copies, so the snapshot stays valid after the
/// handle is dropped.
///
/// [`CrawlRunHandle::export_snapshot`]: crate::crawler::CrawlRunHandle::export_snapshot
#[derive(Debug, Clone, Serialize)]
pub struct ExportSnapshot {
    /// When the snapshot was taken
    pub generated_at: DateTime<Utc>,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// Normalized seed URL
    pub seed: String,

    /// Run status at snapshot time
    pub status: RunStatus,

    /// The configuration the run used
    pub config: CrawlConfig,

    /// Hash of the config file the run was loaded from, if any
    pub config_hash: Option<String>,

    pub counts: GraphCounts,

    /// Nodes ordered by (depth, url)
    pub nodes: Vec<PageNode>,

    /// Edges in lexicographic order
    pub edges: Vec<Edge>,

    /// Extraction records in completion order
    pub records: Vec<ExtractedRecord>,
}
