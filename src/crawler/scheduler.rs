//! Crawl run orchestration
//!
//! `start_crawl` validates the configuration synchronously, seeds the
//! frontier, and spawns the worker pool. Everything after that is
//! asynchronous: workers drain the frontier until it closes itself
//! (exhaustion) or is closed by cancellation, and a supervisor task
//! settles the terminal status once the last worker exits.
//!
//! Per-host politeness is enforced here rather than in the fetcher: a
//! worker reserves the next send slot for the target host under a lock,
//! then sleeps outside it, so pacing one host never stalls another.

use crate::config::{
    validate_crawl_config, validate_rules, validate_seed, CrawlConfig, ExtractionRule,
};
use crate::crawler::fetcher::{self, UserAgentPool};
use crate::crawler::frontier::{Frontier, FrontierEntry};
use crate::crawler::parser::{self, Document};
use crate::export::ExportSnapshot;
use crate::extract::{ExtractedRecord, SelectorEvaluator};
use crate::graph::{Edge, LinkGraph, PageNode};
use crate::url::{extract_host, normalize_url, ScopeMatcher};
use crate::UrlError;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use url::Url;

/// Lifecycle status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Point-in-time view of a run, safe to poll while it executes
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Progress {
    pub discovered: usize,
    pub fetched: usize,
    pub failed: usize,
    pub queued: usize,
    pub in_flight: usize,
    pub status: RunStatus,
}

/// State shared between the handle and the worker pool
struct RunShared {
    config: CrawlConfig,
    seed: Url,
    scope: ScopeMatcher,
    frontier: Frontier,
    graph: LinkGraph,
    evaluator: SelectorEvaluator,
    records: Mutex<Vec<ExtractedRecord>>,
    client: Client,
    agents: UserAgentPool,
    /// Earliest Instant each host may be contacted next
    host_slots: Mutex<HashMap<String, Instant>>,
    status: Mutex<RunStatus>,
    cancelled: AtomicBool,
    pause: watch::Sender<bool>,
    started_at: DateTime<Utc>,
}

impl RunShared {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn status(&self) -> RunStatus {
        *self.status.lock().unwrap()
    }

    /// Parks the worker while the run is paused
    ///
    /// Cancellation wins over pause, so cancelled workers never stay
    /// parked.
    async fn wait_while_paused(&self) {
        let mut rx = self.pause.subscribe();
        loop {
            if self.is_cancelled() || !*rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Reserves the next politeness slot for `host` and waits for it
    ///
    /// The slot is claimed under the lock and the sleep happens outside
    /// it, so two workers pacing the same host queue up behind each
    /// other while other hosts proceed untouched.
    async fn reserve_host_slot(&self, host: &str) {
        let delay = self.config.per_host_delay();
        if delay.is_zero() {
            return;
        }

        let wait = {
            let mut slots = self.host_slots.lock().unwrap();
            let now = Instant::now();
            let slot = slots.entry(host.to_string()).or_insert(now);
            let start = (*slot).max(now);
            *slot = start + delay;
            start.saturating_duration_since(now)
        };

        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}

/// Handle to a running (or finished) crawl
///
/// Obtained from [`start_crawl`]. All accessors are safe to call while
/// the run is still executing; `wait()` drives it to a terminal status.
pub struct CrawlRunHandle {
    shared: Arc<RunShared>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl CrawlRunHandle {
    /// Cancels the run
    ///
    /// Idempotent. By the time this returns the frontier is closed and no
    /// further dequeues can occur; fetches already dispatched are allowed
    /// to finish and be recorded.
    pub fn cancel(&self) {
        if self.shared.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }

        {
            let mut status = self.shared.status.lock().unwrap();
            if *status == RunStatus::Running {
                *status = RunStatus::Cancelled;
            }
        }

        self.shared.frontier.close();
        // Wake anyone parked on pause so they observe cancellation
        self.shared.pause.send_replace(false);
        tracing::info!("Crawl cancelled");
    }

    /// Pauses dispatch; workers finish their current fetch and park
    pub fn pause(&self) {
        self.shared.pause.send_replace(true);
        tracing::info!("Crawl paused");
    }

    /// Resumes a paused run
    pub fn resume(&self) {
        self.shared.pause.send_replace(false);
        tracing::info!("Crawl resumed");
    }

    pub fn is_paused(&self) -> bool {
        *self.shared.pause.borrow()
    }

    pub fn status(&self) -> RunStatus {
        self.shared.status()
    }

    /// Point-in-time progress snapshot
    pub fn progress(&self) -> Progress {
        let counts = self.shared.graph.counts();
        Progress {
            discovered: counts.discovered,
            fetched: counts.fetched,
            failed: counts.failed,
            queued: self.shared.frontier.queued(),
            in_flight: self.shared.frontier.in_flight(),
            status: self.shared.status(),
        }
    }

    /// Point-in-time copy of the link graph
    pub fn graph_snapshot(&self) -> (Vec<PageNode>, Vec<Edge>) {
        self.shared.graph.snapshot()
    }

    /// Records extracted so far, in completion order
    pub fn records(&self) -> Vec<ExtractedRecord> {
        self.shared.records.lock().unwrap().clone()
    }

    /// Waits for the run to reach a terminal status
    ///
    /// With several concurrent callers only one actually joins the worker
    /// pool; the others return the status as of their call. Poll
    /// `status()` if you need a terminal guarantee from a second waiter.
    pub async fn wait(&self) -> RunStatus {
        let supervisor = self.supervisor.lock().unwrap().take();
        if let Some(supervisor) = supervisor {
            let _ = supervisor.await;
        }
        self.shared.status()
    }

    /// Builds the format-neutral export representation of the run
    ///
    /// Usually called after `wait()`, but valid mid-run too; the snapshot
    /// is simply whatever has been accumulated so far.
    pub fn export_snapshot(&self, config_hash: Option<String>) -> ExportSnapshot {
        let (nodes, edges) = self.shared.graph.snapshot();
        ExportSnapshot {
            generated_at: Utc::now(),
            started_at: self.shared.started_at,
            seed: self.shared.seed.to_string(),
            status: self.shared.status(),
            config: self.shared.config.clone(),
            config_hash,
            counts: self.shared.graph.counts(),
            nodes,
            edges,
            records: self.records(),
        }
    }
}

/// Starts a crawl and returns a handle to it
///
/// Validates the seed, configuration, and rule set synchronously; a run
/// never starts with an invalid configuration. Must be called from within
/// a tokio runtime.
///
/// # Arguments
///
/// * `seed` - The URL to start from
/// * `config` - Crawl settings, immutable for the run's lifetime
/// * `rules` - Extraction rules applied to every fetched page
///
/// # Example
///
/// ```no_run
/// use harvestman::config::CrawlConfig;
/// use harvestman::crawler::start_crawl;
///
/// # async fn run() -> harvestman::Result<()> {
/// let handle = start_crawl("https://example.com/", CrawlConfig::default(), &[])?;
/// let status = handle.wait().await;
/// println!("{}: {} pages", status, handle.progress().fetched);
/// # Ok(())
/// # }
/// ```
pub fn start_crawl(
    seed: &str,
    config: CrawlConfig,
    rules: &[ExtractionRule],
) -> crate::Result<CrawlRunHandle> {
    validate_crawl_config(&config)?;
    validate_rules(rules)?;
    let seed = validate_seed(seed)?;

    let scope = ScopeMatcher::new(&seed, config.scope, &config.allowed_hosts)
        .ok_or(UrlError::MissingHost)?;
    let client = fetcher::build_http_client(&config)?;
    let agents = UserAgentPool::from_config(&config);
    let (pause, _) = watch::channel(false);

    let shared = Arc::new(RunShared {
        seed: seed.clone(),
        scope,
        frontier: Frontier::new(),
        graph: LinkGraph::new(),
        evaluator: SelectorEvaluator::compile(rules),
        records: Mutex::new(Vec::new()),
        client,
        agents,
        host_slots: Mutex::new(HashMap::new()),
        status: Mutex::new(RunStatus::Running),
        cancelled: AtomicBool::new(false),
        pause,
        started_at: Utc::now(),
        config,
    });

    shared.graph.insert_pending(seed.as_str(), 0);
    shared.frontier.enqueue(seed.as_str(), 0);

    tracing::info!(
        "Starting crawl of {} (max depth {}, {} workers)",
        seed,
        shared.config.max_depth,
        shared.config.max_concurrency
    );

    let workers: Vec<JoinHandle<()>> = (0..shared.config.max_concurrency)
        .map(|id| {
            let shared = shared.clone();
            tokio::spawn(worker_loop(shared, id))
        })
        .collect();

    let supervisor = tokio::spawn(supervise(shared.clone(), workers));

    Ok(CrawlRunHandle {
        shared,
        supervisor: Mutex::new(Some(supervisor)),
    })
}

/// Waits for all workers, then settles the terminal status
async fn supervise(shared: Arc<RunShared>, workers: Vec<JoinHandle<()>>) {
    for worker in workers {
        let _ = worker.await;
    }

    {
        let mut status = shared.status.lock().unwrap();
        if *status == RunStatus::Running {
            *status = RunStatus::Completed;
        }
    }

    let counts = shared.graph.counts();
    tracing::info!(
        "Crawl {}: {} discovered, {} fetched, {} failed",
        shared.status(),
        counts.discovered,
        counts.fetched,
        counts.failed
    );
}

async fn worker_loop(shared: Arc<RunShared>, id: usize) {
    tracing::debug!("Worker {} started", id);

    while let Some(entry) = shared.frontier.next().await {
        shared.wait_while_paused().await;

        if !shared.is_cancelled() {
            process_entry(&shared, &entry).await;
        }

        shared.frontier.task_done();
    }

    tracing::debug!("Worker {} finished", id);
}

async fn process_entry(shared: &RunShared, entry: &FrontierEntry) {
    // Frontier entries are normalized strings; a parse failure here means
    // the entry was corrupted, which we record rather than panic over
    let url = match Url::parse(&entry.url) {
        Ok(url) => url,
        Err(e) => {
            shared.graph.mark_failed(&entry.url, format!("invalid url: {}", e));
            return;
        }
    };

    if let Some(host) = extract_host(&url) {
        shared.reserve_host_slot(&host).await;
    }

    tracing::debug!("Fetching {} (depth {})", entry.url, entry.depth);

    match fetcher::fetch(&shared.client, &shared.agents, &shared.config, &url).await {
        Ok(outcome) => handle_fetched(shared, entry, outcome),
        Err(failure) => {
            tracing::debug!("Fetch of {} failed: {}", entry.url, failure);
            shared.graph.mark_failed(&entry.url, failure.to_string());
        }
    }
}

/// Parses, extracts, and follows links for a successful fetch
///
/// Synchronous on purpose: the parsed document is not `Send`, so it must
/// not live across an await point.
fn handle_fetched(shared: &RunShared, entry: &FrontierEntry, outcome: fetcher::FetchOutcome) {
    let content_type = outcome.content_type();
    let body = parser::decode_body(&outcome.body, &content_type);

    match parser::parse_page(&body, &content_type, &outcome.final_url) {
        Ok(document) => {
            if !shared.evaluator.is_empty() {
                let record = shared.evaluator.extract(&body, &entry.url);
                shared.records.lock().unwrap().push(record);
            }

            shared.graph.mark_fetched(
                &entry.url,
                document.title.clone(),
                Some(outcome.content_hash),
                None,
            );

            follow_links(shared, entry, &document);
        }
        Err(failure) => {
            // The page fetched fine but yielded no parseable document;
            // record the note and move on without links or extraction
            shared.graph.mark_fetched(
                &entry.url,
                None,
                Some(outcome.content_hash),
                Some(failure.to_string()),
            );
        }
    }
}

/// Enqueues in-scope discovered links and records their edges
///
/// Links beyond the depth limit or outside the domain scope produce
/// neither a node nor an edge.
fn follow_links(shared: &RunShared, entry: &FrontierEntry, document: &Document) {
    let next_depth = entry.depth + 1;
    if next_depth > shared.config.max_depth {
        return;
    }

    for link in &document.links {
        let Ok(target) = normalize_url(link.url.as_str()) else {
            continue;
        };

        if !shared.scope.in_scope(&target) {
            continue;
        }

        shared.graph.insert_pending(target.as_str(), next_depth);
        shared.frontier.enqueue(target.as_str(), next_depth);
        shared.graph.add_edge(&entry.url, target.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HarvestError;

    #[test]
    fn test_status_display() {
        assert_eq!(RunStatus::Running.to_string(), "running");
        assert_eq!(RunStatus::Completed.to_string(), "completed");
        assert_eq!(RunStatus::Cancelled.to_string(), "cancelled");
    }

    #[tokio::test]
    async fn test_invalid_seed_fails_synchronously() {
        let result = start_crawl("not a url", CrawlConfig::default(), &[]);
        assert!(matches!(result, Err(HarvestError::Config(_))));
    }

    #[tokio::test]
    async fn test_invalid_config_fails_synchronously() {
        let config = CrawlConfig {
            max_concurrency: 0,
            ..CrawlConfig::default()
        };
        let result = start_crawl("https://example.com/", config, &[]);
        assert!(matches!(result, Err(HarvestError::Config(_))));
    }

    #[tokio::test]
    async fn test_invalid_rules_fail_synchronously() {
        let rules = vec![ExtractionRule {
            field_name: String::new(),
            selector: "h1".to_string(),
            kind: crate::config::SelectorKind::Css,
            attribute: None,
            multiple: false,
        }];
        let result = start_crawl("https://example.com/", CrawlConfig::default(), &rules);
        assert!(matches!(result, Err(HarvestError::Config(_))));
    }

    // End-to-end crawl behavior (scope, depth, cancellation, politeness)
    // is covered by the wiremock integration tests.
}
