//! Prometheus metrics for the consistency engine

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Engine counters
#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    /// Units of work committed
    pub commits: u64,

    /// Units of work rolled back, including failed commits
    pub rollbacks: u64,

    /// Operations abandoned at the transaction deadline
    pub timeouts: u64,

    /// Employee to Manager role changes
    pub promotions: u64,

    /// Manager to Employee role changes
    pub demotions: u64,

    /// Snapshots written
    pub snapshots: u64,

    pub latency_p50_ms: f64,
    pub latency_p99_ms: f64,
    pub avg_latency_ms: f64,
}

impl EngineMetrics {
    pub fn commit_rate(&self) -> f64 {
        let total = self.commits + self.rollbacks + self.timeouts;
        if total == 0 {
            0.0
        } else {
            self.commits as f64 / total as f64
        }
    }
}

/// Metrics collector with Prometheus-compatible export
pub struct MetricsCollector {
    metrics: Arc<RwLock<EngineMetrics>>,

    /// Latency samples for percentile calculation
    latency_samples: Arc<RwLock<Vec<f64>>>,

    max_samples: usize,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(RwLock::new(EngineMetrics::default())),
            latency_samples: Arc::new(RwLock::new(Vec::with_capacity(1_000))),
            max_samples: 1_000,
        }
    }

    /// Record a committed unit and what it changed
    pub async fn record_commit(&self, promotions: u64, demotions: u64, snapshots: u64) {
        let mut metrics = self.metrics.write().await;
        metrics.commits += 1;
        metrics.promotions += promotions;
        metrics.demotions += demotions;
        metrics.snapshots += snapshots;
    }

    pub async fn record_rollback(&self) {
        self.metrics.write().await.rollbacks += 1;
    }

    pub async fn record_timeout(&self) {
        self.metrics.write().await.timeouts += 1;
    }

    /// Record operation latency
    pub async fn record_latency(&self, latency: Duration) {
        let latency_ms = latency.as_secs_f64() * 1000.0;

        let mut samples = self.latency_samples.write().await;
        samples.push(latency_ms);

        if samples.len() > self.max_samples {
            samples.drain(0..100);
        }

        let mut metrics = self.metrics.write().await;

        let sum: f64 = samples.iter().sum();
        metrics.avg_latency_ms = sum / samples.len() as f64;

        let mut sorted = samples.clone();
        sorted.sort_by(f64::total_cmp);

        metrics.latency_p50_ms = Self::percentile(&sorted, 0.50);
        metrics.latency_p99_ms = Self::percentile(&sorted, 0.99);
    }

    /// Current metrics snapshot
    pub async fn get_metrics(&self) -> EngineMetrics {
        self.metrics.read().await.clone()
    }

    /// Export metrics in Prometheus format
    pub async fn export_prometheus(&self) -> String {
        let metrics = self.metrics.read().await;

        format!(
            r#"# HELP hrms_org_commits_total Units of work committed
# TYPE hrms_org_commits_total counter
hrms_org_commits_total {}

# HELP hrms_org_rollbacks_total Units of work rolled back
# TYPE hrms_org_rollbacks_total counter
hrms_org_rollbacks_total {}

# HELP hrms_org_timeouts_total Operations that hit the transaction deadline
# TYPE hrms_org_timeouts_total counter
hrms_org_timeouts_total {}

# HELP hrms_org_promotions_total Employee to Manager role changes
# TYPE hrms_org_promotions_total counter
hrms_org_promotions_total {}

# HELP hrms_org_demotions_total Manager to Employee role changes
# TYPE hrms_org_demotions_total counter
hrms_org_demotions_total {}

# HELP hrms_org_snapshots_total Department snapshots written
# TYPE hrms_org_snapshots_total counter
hrms_org_snapshots_total {}

# HELP hrms_org_latency_seconds Operation latency percentiles
# TYPE hrms_org_latency_seconds summary
hrms_org_latency_seconds{{quantile="0.5"}} {}
hrms_org_latency_seconds{{quantile="0.99"}} {}
"#,
            metrics.commits,
            metrics.rollbacks,
            metrics.timeouts,
            metrics.promotions,
            metrics.demotions,
            metrics.snapshots,
            metrics.latency_p50_ms / 1000.0,
            metrics.latency_p99_ms / 1000.0,
        )
    }

    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }

        let idx = ((sorted.len() as f64) * p) as usize;
        let idx = idx.min(sorted.len() - 1);
        sorted[idx]
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_commit() {
        let collector = MetricsCollector::new();

        collector.record_commit(1, 0, 1).await;
        collector.record_commit(1, 1, 1).await;
        collector.record_rollback().await;

        let metrics = collector.get_metrics().await;
        assert_eq!(metrics.commits, 2);
        assert_eq!(metrics.promotions, 2);
        assert_eq!(metrics.demotions, 1);
        assert_eq!(metrics.snapshots, 2);
        assert!((metrics.commit_rate() - 0.666).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_record_latency() {
        let collector = MetricsCollector::new();

        collector.record_latency(Duration::from_millis(5)).await;
        collector.record_latency(Duration::from_millis(10)).await;
        collector.record_latency(Duration::from_millis(15)).await;

        let metrics = collector.get_metrics().await;
        assert!((metrics.avg_latency_ms - 10.0).abs() < 1.0);
        assert!(metrics.latency_p99_ms >= metrics.latency_p50_ms);
    }

    #[tokio::test]
    async fn test_prometheus_export() {
        let collector = MetricsCollector::new();

        collector.record_commit(1, 0, 1).await;
        collector.record_timeout().await;

        let prometheus = collector.export_prometheus().await;
        assert!(prometheus.contains("hrms_org_commits_total 1"));
        assert!(prometheus.contains("hrms_org_promotions_total 1"));
        assert!(prometheus.contains("hrms_org_timeouts_total 1"));
    }
}
