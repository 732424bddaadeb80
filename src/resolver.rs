//! Endpoint resolution cache with a 60-second TTL and single-flight refresh
//! (§3, §4.3, C3).
//!
//! A stale read is always served immediately; at most one background task
//! refreshes the cached address set at a time, gated by a compare-and-swap
//! on `refreshing` so concurrent workers hitting a stale entry don't each
//! kick off their own DNS lookup.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use tokio::net::lookup_host;
use tracing::{debug, warn};

use crate::error::S3Error;

const TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ResolvedEndpoint {
    pub addrs: Arc<Vec<SocketAddr>>,
    created: Instant,
}

impl ResolvedEndpoint {
    fn is_stale(&self) -> bool {
        self.created.elapsed() > TTL
    }
}

/// Caches the resolved address set for one `host:port` pair.
pub struct EndpointResolver {
    host: String,
    port: u16,
    current: ArcSwap<ResolvedEndpoint>,
    refreshing: AtomicBool,
}

impl EndpointResolver {
    pub async fn new(host: impl Into<String>, port: u16) -> Result<Arc<Self>, S3Error> {
        let host = host.into();
        let addrs = resolve(&host, port).await?;
        Ok(Arc::new(Self {
            host,
            port,
            current: ArcSwap::from_pointee(ResolvedEndpoint {
                addrs: Arc::new(addrs),
                created: Instant::now(),
            }),
            refreshing: AtomicBool::new(false),
        }))
    }

    /// Return the cached address set. If it is stale, a background refresh
    /// is kicked off (if one isn't already in flight) but the stale value
    /// is returned regardless — callers never block on DNS.
    pub fn resolve(self: &Arc<Self>) -> Arc<Vec<SocketAddr>> {
        let snapshot = self.current.load();
        if snapshot.is_stale()
            && self
                .refreshing
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                match resolve(&this.host, this.port).await {
                    Ok(addrs) => {
                        this.current.store(Arc::new(ResolvedEndpoint {
                            addrs: Arc::new(addrs),
                            created: Instant::now(),
                        }));
                        debug!(host = %this.host, "endpoint cache refreshed");
                    }
                    Err(err) => warn!(host = %this.host, %err, "endpoint refresh failed, keeping stale entry"),
                }
                this.refreshing.store(false, Ordering::SeqCst);
            });
        }
        snapshot.addrs.clone()
    }
}

async fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>, S3Error> {
    lookup_host((host, port))
        .await
        .map(|it| it.collect())
        .map_err(|err| S3Error::Transport(format!("resolving {host}:{port}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_flight_gate_admits_exactly_one_winner() {
        let gate = AtomicBool::new(false);
        let first = gate
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        let second = gate
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        assert!(first);
        assert!(!second);
    }

    #[test]
    fn freshly_created_endpoint_is_not_stale() {
        let endpoint = ResolvedEndpoint {
            addrs: Arc::new(vec![]),
            created: Instant::now(),
        };
        assert!(!endpoint.is_stale());
    }
}
