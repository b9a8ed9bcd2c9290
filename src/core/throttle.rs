//! Request pacing shared by every adapter call in a batch: per-host
//! concurrency limits, minimum spacing between requests to the same host,
//! hosts that blocked us, and the user-agent pool.

use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

pub const DEFAULT_USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

struct HostSlot {
    permits: Arc<Semaphore>,
    last_request: Mutex<Option<Instant>>,
}

/// Held for the duration of one request to a host.
pub struct HostPermit {
    _permit: Option<OwnedSemaphorePermit>,
}

pub struct HostThrottle {
    max_per_host: usize,
    hosts: Mutex<HashMap<String, Arc<HostSlot>>>,
}

impl HostThrottle {
    pub fn new(max_per_host: usize) -> Self {
        Self {
            max_per_host: max_per_host.max(1),
            hosts: Mutex::new(HashMap::new()),
        }
    }

    async fn slot(&self, host: &str) -> Arc<HostSlot> {
        let mut hosts = self.hosts.lock().await;
        hosts
            .entry(host.to_string())
            .or_insert_with(|| {
                Arc::new(HostSlot {
                    permits: Arc::new(Semaphore::new(self.max_per_host)),
                    last_request: Mutex::new(None),
                })
            })
            .clone()
    }

    /// Waits for a free slot on `host`, then until `min_interval` has passed
    /// since the previous request to it.
    pub async fn acquire(&self, host: &str, min_interval: Duration) -> HostPermit {
        let slot = self.slot(host).await;
        let permit = slot.permits.clone().acquire_owned().await.ok();

        let mut last = slot.last_request.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + min_interval;
            if ready_at > Instant::now() {
                tracing::debug!(
                    host,
                    wait_ms = (ready_at - Instant::now()).as_millis() as u64,
                    "Politeness delay"
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());

        HostPermit { _permit: permit }
    }
}

/// Hosts that served a block page; skipped for the rest of the batch.
#[derive(Default)]
pub struct BlockedHosts {
    hosts: Mutex<HashSet<String>>,
}

impl BlockedHosts {
    pub async fn block(&self, host: &str) {
        let newly = self.hosts.lock().await.insert(host.to_string());
        if newly {
            tracing::warn!(host, "Host blocked us; skipping it for the rest of the run");
        }
    }

    pub async fn is_blocked(&self, host: &str) -> bool {
        self.hosts.lock().await.contains(host)
    }
}

/// Fixed pool of client identity strings, one picked per identifier run.
#[derive(Debug, Clone)]
pub struct IdentityPool {
    agents: Vec<String>,
}

impl Default for IdentityPool {
    fn default() -> Self {
        Self::new(DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect())
    }
}

impl IdentityPool {
    pub fn new(agents: Vec<String>) -> Self {
        let agents: Vec<String> = agents.into_iter().filter(|a| !a.trim().is_empty()).collect();
        if agents.is_empty() {
            return Self::default();
        }
        Self { agents }
    }

    pub fn agents(&self) -> &[String] {
        &self.agents
    }

    pub fn pick(&self) -> String {
        self.agents
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| DEFAULT_USER_AGENTS[0].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_politeness_spaces_requests_to_same_host() {
        let throttle = HostThrottle::new(1);
        let interval = Duration::from_millis(120);

        let start = Instant::now();
        drop(throttle.acquire("shop.example", interval).await);
        drop(throttle.acquire("shop.example", interval).await);

        assert!(start.elapsed() >= interval);
    }

    #[tokio::test]
    async fn test_distinct_hosts_do_not_wait() {
        let throttle = HostThrottle::new(1);
        let interval = Duration::from_secs(5);

        let start = Instant::now();
        let _a = throttle.acquire("a.example", interval).await;
        let _b = throttle.acquire("b.example", interval).await;

        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_blocked_hosts() {
        let blocked = BlockedHosts::default();
        assert!(!blocked.is_blocked("a.example").await);
        blocked.block("a.example").await;
        assert!(blocked.is_blocked("a.example").await);
        assert!(!blocked.is_blocked("b.example").await);
    }

    #[test]
    fn test_identity_pool_picks_from_pool() {
        let pool = IdentityPool::new(vec!["ua-1".to_string(), "ua-2".to_string()]);
        for _ in 0..10 {
            let ua = pool.pick();
            assert!(pool.agents().contains(&ua));
        }
    }

    #[test]
    fn test_empty_identity_pool_falls_back() {
        let pool = IdentityPool::new(vec![" ".to_string()]);
        assert_eq!(pool.agents().len(), DEFAULT_USER_AGENTS.len());
    }
}
