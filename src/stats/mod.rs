// Statistics collector module

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Thread-safe, run-scoped outcome collector using atomic operations.
/// Latency recording uses sharded buffers to reduce lock contention
/// under high concurrency. One instance per load-test run; never shared
/// across runs.
pub struct StatsCollector {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    active_users: AtomicU64,
    status_codes: DashMap<u16, AtomicU64>,
    error_kinds: DashMap<String, AtomicU64>,
    latency_shards: Vec<Mutex<Vec<Duration>>>,
    shard_count: usize,
    start_time: Instant,
}

/// Aggregate latency statistics over all recorded outcomes.
/// All-zero when no outcome carried a latency sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyStats {
    pub min: Duration,
    pub max: Duration,
    pub mean: Duration,
    pub p50: Duration,
    pub p90: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

impl LatencyStats {
    pub const ZERO: LatencyStats = LatencyStats {
        min: Duration::ZERO,
        max: Duration::ZERO,
        mean: Duration::ZERO,
        p50: Duration::ZERO,
        p90: Duration::ZERO,
        p95: Duration::ZERO,
        p99: Duration::ZERO,
    };
}

/// A point-in-time snapshot of collected statistics.
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub timestamp: Instant,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub active_users: u64,
    pub rps: f64,
    pub latency: LatencyStats,
    pub status_codes: HashMap<u16, u64>,
    pub error_kinds: HashMap<String, u64>,
}

impl StatsCollector {
    /// Create a new StatsCollector.
    pub fn new() -> Self {
        let shard_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let latency_shards = (0..shard_count)
            .map(|_| Mutex::new(Vec::new()))
            .collect();
        Self {
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            active_users: AtomicU64::new(0),
            status_codes: DashMap::new(),
            error_kinds: DashMap::new(),
            latency_shards,
            shard_count,
            start_time: Instant::now(),
        }
    }

    /// Record a successful request with its status code and latency.
    pub fn record_success(&self, status_code: u16, latency: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
        self.status_codes
            .entry(status_code)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
        self.push_latency(latency);
    }

    /// Record a failed request. Failure latencies are included in the
    /// latency statistics.
    pub fn record_failure(&self, kind: &str, latency: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
        self.bump_error_kind(kind);
        self.push_latency(latency);
    }

    /// Record a failed outcome with no meaningful latency sample
    /// (a user that panicked or never acknowledged cancellation).
    pub fn record_lost(&self, kind: &str) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
        self.bump_error_kind(kind);
    }

    fn bump_error_kind(&self, kind: &str) {
        self.error_kinds
            .entry(kind.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    fn push_latency(&self, latency: Duration) {
        let idx = self.shard_index();
        self.latency_shards[idx].lock().unwrap().push(latency);
    }

    /// Select a shard based on the current thread ID.
    fn shard_index(&self) -> usize {
        let thread_id = std::thread::current().id();
        let hash = format!("{:?}", thread_id);
        let mut h: usize = 0;
        for b in hash.bytes() {
            h = h.wrapping_mul(31).wrapping_add(b as usize);
        }
        h % self.shard_count
    }

    /// Increment the active user count.
    pub fn increment_active_users(&self) {
        self.active_users.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement the active user count.
    pub fn decrement_active_users(&self) {
        self.active_users.fetch_sub(1, Ordering::Relaxed);
    }

    /// Take a snapshot of the current statistics. `rps` is computed
    /// against the collector's own lifetime; callers that need the
    /// deadline-bounded rate recompute it from their measured elapsed.
    pub fn snapshot(&self) -> StatsSnapshot {
        let now = Instant::now();
        let total = self.total_requests.load(Ordering::Relaxed);
        let elapsed = now.duration_since(self.start_time).as_secs_f64();
        let rps = if elapsed > 0.0 {
            total as f64 / elapsed
        } else {
            0.0
        };

        // Merge all shards into a single Vec for aggregate calculation
        let mut all_latencies = Vec::new();
        for shard in &self.latency_shards {
            let guard = shard.lock().unwrap();
            all_latencies.extend_from_slice(&guard);
        }
        let latency = latency_stats(&all_latencies);

        let mut status_map = HashMap::new();
        for entry in self.status_codes.iter() {
            status_map.insert(*entry.key(), entry.value().load(Ordering::Relaxed));
        }
        let mut error_map = HashMap::new();
        for entry in self.error_kinds.iter() {
            error_map.insert(entry.key().clone(), entry.value().load(Ordering::Relaxed));
        }

        StatsSnapshot {
            timestamp: now,
            total_requests: total,
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            active_users: self.active_users.load(Ordering::Relaxed),
            rps,
            latency,
            status_codes: status_map,
            error_kinds: error_map,
        }
    }

    /// Display a formatted stats snapshot to stdout.
    pub fn display_snapshot(snapshot: &StatsSnapshot) {
        println!("--- Stats Snapshot ---");
        println!(
            "Total: {} | Success: {} | Failed: {} | Active users: {}",
            snapshot.total_requests,
            snapshot.successful_requests,
            snapshot.failed_requests,
            snapshot.active_users
        );
        println!("RPS: {:.1}", snapshot.rps);
        println!(
            "Latency mean: {:.1}ms | p50: {:.1}ms | p95: {:.1}ms | p99: {:.1}ms",
            snapshot.latency.mean.as_secs_f64() * 1000.0,
            snapshot.latency.p50.as_secs_f64() * 1000.0,
            snapshot.latency.p95.as_secs_f64() * 1000.0,
            snapshot.latency.p99.as_secs_f64() * 1000.0,
        );
        if !snapshot.status_codes.is_empty() {
            let mut codes: Vec<_> = snapshot.status_codes.iter().collect();
            codes.sort_by_key(|(k, _)| *k);
            let code_strs: Vec<String> = codes.iter().map(|(k, v)| format!("{}:{}", k, v)).collect();
            println!("Status Codes: {}", code_strs.join(" | "));
        }
        println!("---------------------");
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Calculate aggregate latency statistics from a slice of durations.
/// Returns all-zero stats for empty input rather than dividing by zero.
pub fn latency_stats(latencies: &[Duration]) -> LatencyStats {
    if latencies.is_empty() {
        return LatencyStats::ZERO;
    }

    let mut sorted = latencies.to_vec();
    sorted.sort();

    let len = sorted.len();
    let sum: Duration = sorted.iter().sum();
    let mean = sum / len as u32;

    LatencyStats {
        min: sorted[0],
        max: sorted[len - 1],
        mean,
        p50: percentile_at(&sorted, len, 50.0),
        p90: percentile_at(&sorted, len, 90.0),
        p95: percentile_at(&sorted, len, 95.0),
        p99: percentile_at(&sorted, len, 99.0),
    }
}

/// Get the value at a given percentile from a sorted slice using nearest-rank method.
fn percentile_at(sorted: &[Duration], len: usize, pct: f64) -> Duration {
    if len == 1 {
        return sorted[0];
    }
    // Nearest-rank: index = ceil(pct/100 * len) - 1
    let rank = (pct / 100.0 * len as f64).ceil() as usize;
    let idx = rank.saturating_sub(1).min(len - 1);
    sorted[idx]
}
