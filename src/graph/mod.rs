//! Link graph accumulated during a crawl
//!
//! Nodes are pages keyed by normalized URL; edges are directed links
//! discovered while parsing. Workers mutate the graph concurrently through
//! a single guard, and `snapshot()` hands out point-in-time copies for
//! rendering or export without stopping the crawl.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Status of a page node in the link graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Enqueued but not yet processed
    Pending,

    /// Fetch succeeded; title/content hash recorded
    Fetched,

    /// Fetch failed; the failure kind is recorded on the node
    Failed,
}

impl NodeStatus {
    /// Returns true once the node has been processed either way
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Fetched => write!(f, "fetched"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A page discovered during the crawl
///
/// Created Pending when the URL is first enqueued; transitioned to
/// Fetched or Failed exactly once by the worker that processes it; never
/// removed while the run lives.
#[derive(Debug, Clone, Serialize)]
pub struct PageNode {
    /// Normalized URL (the graph key)
    pub url: String,

    /// Link depth from the seed
    pub depth: u32,

    pub status: NodeStatus,

    /// When the fetch completed
    pub fetched_at: Option<DateTime<Utc>>,

    /// Page title, if the document had one
    pub title: Option<String>,

    /// Hex SHA-256 of the response body
    pub content_hash: Option<String>,

    /// Failure kind for Failed nodes, or a parse note for fetched
    /// non-HTML pages
    pub error: Option<String>,
}

impl PageNode {
    fn pending(url: String, depth: u32) -> Self {
        Self {
            url,
            depth,
            status: NodeStatus::Pending,
            fetched_at: None,
            title: None,
            content_hash: None,
            error: None,
        }
    }
}

/// A directed link between two pages (set semantics)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

/// Point-in-time node counts for progress reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphCounts {
    pub discovered: usize,
    pub fetched: usize,
    pub failed: usize,
}

#[derive(Default)]
struct GraphInner {
    nodes: HashMap<String, PageNode>,
    edges: HashSet<Edge>,
    counts: GraphCounts,
}

/// Thread-safe accumulator for nodes and edges
///
/// All mutation happens under one mutex with short critical sections;
/// no lock is held across await points or I/O.
#[derive(Default)]
pub struct LinkGraph {
    inner: Mutex<GraphInner>,
}

impl LinkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a Pending node for a newly enqueued URL
    ///
    /// Returns false without touching the graph if the node already
    /// exists. The frontier's visited-set makes duplicates impossible in
    /// practice; this is the graph's own guarantee that nodes are created
    /// once.
    pub fn insert_pending(&self, url: &str, depth: u32) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.nodes.contains_key(url) {
            return false;
        }
        inner
            .nodes
            .insert(url.to_string(), PageNode::pending(url.to_string(), depth));
        inner.counts.discovered += 1;
        true
    }

    /// Transitions a node to Fetched, recording title and content hash
    ///
    /// `note` carries a parse-failure message for pages that fetched fine
    /// but were not parseable HTML. Ignored (with a warning) if the node
    /// is missing or already terminal.
    pub fn mark_fetched(
        &self,
        url: &str,
        title: Option<String>,
        content_hash: Option<String>,
        note: Option<String>,
    ) {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        match inner.nodes.get_mut(url) {
            Some(node) if node.status == NodeStatus::Pending => {
                node.status = NodeStatus::Fetched;
                node.fetched_at = Some(Utc::now());
                node.title = title;
                node.content_hash = content_hash;
                node.error = note;
                inner.counts.fetched += 1;
            }
            Some(node) => {
                tracing::warn!("Ignoring repeat transition for {} ({})", url, node.status);
            }
            None => {
                tracing::warn!("mark_fetched for unknown node {}", url);
            }
        }
    }

    /// Transitions a node to Failed, recording the failure kind
    pub fn mark_failed(&self, url: &str, error: String) {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        match inner.nodes.get_mut(url) {
            Some(node) if node.status == NodeStatus::Pending => {
                node.status = NodeStatus::Failed;
                node.fetched_at = Some(Utc::now());
                node.error = Some(error);
                inner.counts.failed += 1;
            }
            Some(node) => {
                tracing::warn!("Ignoring repeat transition for {} ({})", url, node.status);
            }
            None => {
                tracing::warn!("mark_failed for unknown node {}", url);
            }
        }
    }

    /// Records a directed link; duplicate edges merge silently
    ///
    /// The source node always exists already (edges are only added during
    /// the source page's parse step); the target may still be Pending.
    pub fn add_edge(&self, source: &str, target: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        debug_assert!(inner.nodes.contains_key(source));
        inner.edges.insert(Edge {
            source: source.to_string(),
            target: target.to_string(),
        })
    }

    /// Current node counts, safe to poll concurrently with mutation
    pub fn counts(&self) -> GraphCounts {
        self.inner.lock().unwrap().counts
    }

    /// Point-in-time copy of the graph for rendering or export
    ///
    /// Nodes are ordered by (depth, url) and edges lexicographically so
    /// snapshots of the same graph are identical.
    pub fn snapshot(&self) -> (Vec<PageNode>, Vec<Edge>) {
        let inner = self.inner.lock().unwrap();

        let mut nodes: Vec<PageNode> = inner.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.url.cmp(&b.url)));

        let mut edges: Vec<Edge> = inner.edges.iter().cloned().collect();
        edges.sort();

        (nodes, edges)
    }

    /// Looks up a single node by normalized URL
    pub fn node(&self, url: &str) -> Option<PageNode> {
        self.inner.lock().unwrap().nodes.get(url).cloned()
    }
}
