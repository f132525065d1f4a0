use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root structure of a Harvestman TOML config file
///
/// A config file carries the crawl settings and the extraction rule set,
/// plus an optional seed URL (which the CLI can override).
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    /// Seed URL to start crawling from
    #[serde(default)]
    pub seed: Option<String>,

    pub crawl: CrawlConfig,

    /// Extraction rules, one `[[rule]]` table per field
    #[serde(default, rename = "rule")]
    pub rules: Vec<ExtractionRule>,
}

/// Immutable configuration snapshot for a crawl run
///
/// Constructed (and validated) once before a run starts; read-only
/// thereafter. Every worker holds it behind an `Arc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Maximum link depth from the seed (0 = seed only)
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Which hosts discovered links may be followed to
    #[serde(default)]
    pub scope: DomainScope,

    /// Extra hosts allowed regardless of scope (exact matches)
    #[serde(default, rename = "allowed-hosts")]
    pub allowed_hosts: Vec<String>,

    /// Number of concurrent fetch workers
    #[serde(default = "default_max_concurrency", rename = "max-concurrency")]
    pub max_concurrency: usize,

    /// Minimum time between requests to the same host (milliseconds)
    #[serde(default = "default_per_host_delay_ms", rename = "per-host-delay-ms")]
    pub per_host_delay_ms: u64,

    /// Hard deadline per fetch attempt (seconds)
    #[serde(default = "default_request_timeout_secs", rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Whether HTTP redirects are followed (up to 10 hops)
    #[serde(default = "default_true", rename = "follow-redirects")]
    pub follow_redirects: bool,

    /// User agent sent with every request
    #[serde(default = "default_user_agent", rename = "user-agent")]
    pub user_agent: String,

    /// Rotate through a pool of browser user agents instead of the fixed one
    #[serde(default, rename = "rotate-user-agents")]
    pub rotate_user_agents: bool,

    /// Response bodies larger than this are rejected as TooLarge (bytes)
    #[serde(default = "default_max_body_bytes", rename = "max-body-bytes")]
    pub max_body_bytes: u64,
}

impl CrawlConfig {
    /// Per-host politeness delay as a Duration
    pub fn per_host_delay(&self) -> Duration {
        Duration::from_millis(self.per_host_delay_ms)
    }

    /// Per-attempt request timeout as a Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            scope: DomainScope::default(),
            allowed_hosts: Vec::new(),
            max_concurrency: default_max_concurrency(),
            per_host_delay_ms: default_per_host_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            follow_redirects: true,
            user_agent: default_user_agent(),
            rotate_user_agents: false,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Which hosts a crawl is allowed to visit, relative to the seed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DomainScope {
    /// Seed host and its subdomains
    #[default]
    SameDomain,

    /// Exactly the seed host
    SameHost,

    /// Any HTTP(S) host
    Unrestricted,
}

/// A single structured-data extraction rule
///
/// Applied to every fetched document; `field_name` keys the resulting
/// value in the extracted record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRule {
    /// Field name, unique within a rule set
    #[serde(rename = "field")]
    pub field_name: String,

    /// Selector expression evaluated against the document
    pub selector: String,

    /// Selector language
    #[serde(default, rename = "type")]
    pub kind: SelectorKind,

    /// Attribute to extract (e.g. "href"); absent means text content
    #[serde(default)]
    pub attribute: Option<String>,

    /// Collect every match instead of just the first
    #[serde(default)]
    pub multiple: bool,
}

/// Selector language of an extraction rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    #[default]
    Css,
    XPath,
}

fn default_max_concurrency() -> usize {
    4
}

fn default_per_host_delay_ms() -> u64 {
    500
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    format!("Harvestman/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_body_bytes() -> u64 {
    5 * 1024 * 1024
}
