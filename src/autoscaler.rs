//! The Autoscaler: adjusts the target worker count from a rolling ops/sec
//! average (§4.6, C6).
//!
//! Scaling is cooperative — a Worker above the target steps down on its own
//! between pages (see `Worker::should_terminate_early`); the Autoscaler
//! never cancels a task directly.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time;
use tracing::debug;

use crate::metrics::Metrics;

const ROLLING_WINDOW: usize = 60;
const MIN_WORKERS_WHEN_IDLE: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct AutoscalerConfig {
    pub interval: Duration,
    pub scale_up_factor: f64,
    pub scale_down_factor: f64,
}

impl Default for AutoscalerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            scale_up_factor: 1.2,
            scale_down_factor: 0.8,
        }
    }
}

pub struct Autoscaler {
    metrics: Arc<Metrics>,
    config: AutoscalerConfig,
}

impl Autoscaler {
    pub fn new(metrics: Arc<Metrics>, config: AutoscalerConfig) -> Self {
        Self { metrics, config }
    }

    /// Runs until `shutdown` resolves, recomputing `metrics.target_workers`
    /// once per tick.
    pub async fn run(&self, mut shutdown: oneshot::Receiver<()>) {
        let mut ticker = time::interval(self.config.interval);
        let mut samples: VecDeque<f64> = VecDeque::with_capacity(ROLLING_WINDOW);
        let mut last_total_ops = self.metrics.snapshot_total_ops();
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let total_ops = self.metrics.snapshot_total_ops();
                    let delta = total_ops.saturating_sub(last_total_ops) as f64;
                    last_total_ops = total_ops;
                    let ops_per_sec = delta / self.config.interval.as_secs_f64();

                    if samples.len() == ROLLING_WINDOW {
                        samples.pop_front();
                    }
                    samples.push_back(ops_per_sec);
                    let mean_ops_per_sec = samples.iter().sum::<f64>() / samples.len() as f64;

                    let current = self.metrics.active_workers();
                    let desired = desired_workers(
                        current,
                        mean_ops_per_sec,
                        self.config.scale_up_factor,
                        self.config.scale_down_factor,
                    );
                    if desired != self.metrics.target_workers() {
                        debug!(current, desired, ops_per_sec = mean_ops_per_sec, "adjusting target worker count");
                    }
                    self.metrics.set_target_workers(desired);
                }
                _ = &mut shutdown => break,
            }
        }
    }
}

/// The scaling decision rule (§4.6, §8 S6): below one op/sec, scale up to
/// at least [`MIN_WORKERS_WHEN_IDLE`] regardless of current size; below
/// demand, grow toward it; well above demand (more than 1.5x), shrink
/// toward it; otherwise hold steady.
fn desired_workers(current: usize, ops_per_sec: f64, scale_up_factor: f64, scale_down_factor: f64) -> usize {
    if ops_per_sec < 1.0 {
        return current.max(MIN_WORKERS_WHEN_IDLE);
    }
    let current_f = current as f64;
    if current_f < ops_per_sec {
        return (current_f * scale_up_factor).max(ops_per_sec).ceil() as usize;
    }
    if current_f > 1.5 * ops_per_sec {
        return (current_f * scale_down_factor).max(ops_per_sec).ceil() as usize;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    /// S6 — the literal fixtures, exercised through the crate's actual
    /// default factors (1.2 up, 0.8 down).
    #[test]
    fn literal_fixtures_through_default_config() {
        let cfg = AutoscalerConfig::default();
        assert_eq!(desired_workers(10, 15.0, cfg.scale_up_factor, cfg.scale_down_factor), 15);
        assert_eq!(desired_workers(20, 5.0, cfg.scale_up_factor, cfg.scale_down_factor), 16);
    }

    /// S6 — below 1 op/sec, always scale up to the idle floor.
    #[test]
    fn below_one_op_per_sec_scales_to_idle_floor() {
        assert_eq!(desired_workers(3, 0.5, 1.2, 0.8), 10);
        assert_eq!(desired_workers(20, 0.0, 1.2, 0.8), 20);
    }

    /// S6 — under capacity grows toward demand.
    #[test]
    fn under_capacity_grows_toward_demand() {
        assert_eq!(desired_workers(5, 20.0, 1.2, 0.8), 20);
        assert_eq!(desired_workers(5, 6.0, 1.2, 0.8), 6); // ceil(max(6.0, 6.0))
    }

    /// S6 — well over capacity (>1.5x demand) shrinks toward demand.
    #[test]
    fn over_capacity_shrinks_toward_demand() {
        assert_eq!(desired_workers(30, 10.0, 1.2, 0.8), 24); // ceil(max(24.0, 10.0))
    }

    /// S6 — within the [demand, 1.5x demand] band, hold steady.
    #[test]
    fn within_band_holds_steady() {
        assert_eq!(desired_workers(10, 10.0, 1.2, 0.8), 10);
        assert_eq!(desired_workers(14, 10.0, 1.2, 0.8), 14);
    }
}
