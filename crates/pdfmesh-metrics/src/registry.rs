use crate::snapshot::{MetricsSnapshot, OperationMetrics, ServerInfo, ServiceMetrics};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::{Instant, SystemTime};

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Per-operation counters.
#[derive(Debug, Default)]
struct OperationStats {
    call_count: AtomicU64,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    total_latency_us: AtomicU64,
    max_latency_us: AtomicU64,
}

impl OperationStats {
    fn record(&self, latency_us: u64, success: bool) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if success {
            self.success_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failure_count.fetch_add(1, Ordering::Relaxed);
        }
        self.total_latency_us.fetch_add(latency_us, Ordering::Relaxed);
        self.max_latency_us.fetch_max(latency_us, Ordering::Relaxed);
    }

    fn snapshot(&self) -> OperationMetrics {
        let call_count = self.call_count.load(Ordering::Relaxed);
        let total = self.total_latency_us.load(Ordering::Relaxed);
        OperationMetrics {
            call_count,
            success_count: self.success_count.load(Ordering::Relaxed),
            failure_count: self.failure_count.load(Ordering::Relaxed),
            avg_latency_us: if call_count == 0 { 0 } else { total / call_count },
            max_latency_us: self.max_latency_us.load(Ordering::Relaxed),
        }
    }
}

/// Per-worker counters.
#[derive(Debug, Default)]
struct ServiceStats {
    request_count: AtomicU64,
    last_request_ms: AtomicU64,
}

impl ServiceStats {
    fn record_request(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.last_request_ms.store(unix_millis(), Ordering::Relaxed);
    }

    fn snapshot(&self, service_id: &str) -> ServiceMetrics {
        ServiceMetrics {
            service_id: service_id.to_string(),
            request_count: self.request_count.load(Ordering::Relaxed),
            last_request_ms: self.last_request_ms.load(Ordering::Relaxed),
        }
    }
}

/// Thread-safe metrics storage for the orchestrator.
///
/// # Concurrency
///
/// Global counters are plain atomics updated with `Relaxed` ordering; the
/// snapshot is best-effort and eventually consistent. The operation and
/// service tables sit behind a std `RwLock` that is only held long enough to
/// find or create an entry; the entry's own counters are updated after the
/// lock is released.
#[derive(Debug)]
pub struct MetricsRegistry {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    active_requests: AtomicU64,
    operations: StdRwLock<HashMap<String, Arc<OperationStats>>>,
    services: StdRwLock<HashMap<String, Arc<ServiceStats>>>,
    start_time: Instant,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            active_requests: AtomicU64::new(0),
            operations: StdRwLock::new(HashMap::new()),
            services: StdRwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Marks a proxied request as in flight.
    pub fn request_started(&self) {
        self.active_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Marks a proxied request as finished, successful or not.
    pub fn request_finished(&self) {
        // Saturate so a stray double-finish cannot wrap the gauge.
        let _ = self
            .active_requests
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some(n.saturating_sub(1)));
    }

    /// Records the outcome of one proxied call for `operation`.
    ///
    /// # Arguments
    /// * `operation` - Wire name of the operation type
    /// * `start_time` - When the request was received
    /// * `success` - Whether the client got a success response
    pub fn record_call(&self, operation: &str, start_time: Instant, success: bool) {
        let latency_us = start_time.elapsed().as_micros() as u64;

        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }

        let stats = {
            let mut operations = self.operations.write().unwrap_or_else(|e| e.into_inner());
            operations
                .entry(operation.to_string())
                .or_insert_with(|| Arc::new(OperationStats::default()))
                .clone()
        };
        stats.record(latency_us, success);
    }

    /// Records that a request was forwarded to the worker `service_id`.
    pub fn record_service_request(&self, service_id: &str) {
        let stats = {
            let mut services = self.services.write().unwrap_or_else(|e| e.into_inner());
            services
                .entry(service_id.to_string())
                .or_insert_with(|| Arc::new(ServiceStats::default()))
                .clone()
        };
        stats.record_request();
    }

    pub fn uptime_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let operations = {
            let guard = self.operations.read().unwrap_or_else(|e| e.into_inner());
            guard
                .iter()
                .map(|(name, stats)| (name.clone(), stats.snapshot()))
                .collect()
        };

        let services = {
            let guard = self.services.read().unwrap_or_else(|e| e.into_inner());
            guard
                .iter()
                .map(|(id, stats)| (id.clone(), stats.snapshot(id)))
                .collect()
        };

        MetricsSnapshot {
            info: ServerInfo::new(self.uptime_ms()),
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            active_requests: self.active_requests.load(Ordering::Relaxed),
            operations,
            services,
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
