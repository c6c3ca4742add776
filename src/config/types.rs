use serde::Deserialize;

/// Main configuration structure for Catalog-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    pub remote: RemoteConfig,
    pub output: OutputConfig,
}

/// Catalog traversal configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// Maximum number of traversal passes before giving up
    #[serde(rename = "max-iterations", default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Pause after an interrupted pass (milliseconds)
    #[serde(rename = "retry-pause-ms", default = "default_retry_pause_ms")]
    pub retry_pause_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            retry_pause_ms: default_retry_pause_ms(),
        }
    }
}

/// Dispatch pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Identities per batch
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,

    /// Attempts per identity before it is given up
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between consecutive fetch starts inside a batch (milliseconds)
    #[serde(rename = "stagger-ms", default = "default_stagger_ms")]
    pub stagger_ms: u64,

    /// Pause between batches (milliseconds)
    #[serde(rename = "batch-pause-ms", default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,

    /// Requests sent to the submit endpoint before the first batch
    #[serde(rename = "warm-up-requests", default = "default_warm_up_requests")]
    pub warm_up_requests: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            stagger_ms: default_stagger_ms(),
            batch_pause_ms: default_batch_pause_ms(),
            warm_up_requests: default_warm_up_requests(),
        }
    }
}

/// Remote endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// Detail endpoint; `{id}` is replaced by the identity
    #[serde(rename = "fetch-url-template")]
    pub fetch_url_template: String,

    /// Endpoint that accepts a detail object
    #[serde(rename = "submit-url")]
    pub submit_url: String,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Shell command run once per batch to rotate the network identity
    #[serde(rename = "rotate-command", default)]
    pub rotate_command: Option<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the JSON snapshot of scanned markers
    #[serde(rename = "snapshot-path")]
    pub snapshot_path: String,
}

fn default_max_iterations() -> u32 {
    80
}

fn default_retry_pause_ms() -> u64 {
    1000
}

fn default_batch_size() -> usize {
    35
}

fn default_max_attempts() -> u32 {
    crate::state::DEFAULT_MAX_ATTEMPTS
}

fn default_stagger_ms() -> u64 {
    100
}

fn default_batch_pause_ms() -> u64 {
    10_000
}

fn default_warm_up_requests() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    5
}
