//! Caching DNS resolver for the upstream client

use parking_lot::RwLock;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// DNS cache configuration
#[derive(Clone, Debug)]
pub struct DnsCacheConfig {
    /// Age after which a cached entry is resolved again
    pub refresh_interval: Duration,
    /// Upper bound for a single lookup
    pub lookup_timeout: Duration,
}

impl Default for DnsCacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(100 * 60 * 60),
            lookup_timeout: Duration::from_secs(5),
        }
    }
}

struct CachedAddrs {
    addrs: Vec<SocketAddr>,
    resolved_at: Instant,
}

/// Resolver that remembers lookups per host name.
///
/// Entries older than the refresh interval are looked up again on next use.
/// If that lookup fails the stale addresses keep being served, so a DNS
/// outage does not take down upstreams that were already known.
#[derive(Clone)]
pub struct CachingResolver {
    config: DnsCacheConfig,
    cache: Arc<RwLock<HashMap<String, CachedAddrs>>>,
}

impl CachingResolver {
    pub fn new(config: DnsCacheConfig) -> Self {
        Self {
            config,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Addresses currently cached for `host`, fresh or stale
    pub fn cached(&self, host: &str) -> Option<Vec<SocketAddr>> {
        self.cache.read().get(host).map(|c| c.addrs.clone())
    }

    /// Resolve `host`, consulting the cache first
    pub async fn lookup(&self, host: &str) -> Result<Vec<SocketAddr>, std::io::Error> {
        let stale = {
            let cache = self.cache.read();
            match cache.get(host) {
                Some(entry) if entry.resolved_at.elapsed() < self.config.refresh_interval => {
                    return Ok(entry.addrs.clone());
                }
                Some(entry) => Some(entry.addrs.clone()),
                None => None,
            }
        };

        debug!("Resolving upstream host {}", host);
        let resolved = tokio::time::timeout(
            self.config.lookup_timeout,
            tokio::net::lookup_host((host, 0)),
        )
        .await
        .map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("DNS lookup for {} timed out", host),
            )
        })
        .and_then(|r| r.map(|addrs| addrs.collect::<Vec<_>>()));

        match resolved {
            Ok(addrs) if !addrs.is_empty() => {
                self.cache.write().insert(
                    host.to_string(),
                    CachedAddrs {
                        addrs: addrs.clone(),
                        resolved_at: Instant::now(),
                    },
                );
                Ok(addrs)
            }
            Ok(_) => stale.ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no addresses found for {}", host),
                )
            }),
            Err(e) => match stale {
                Some(addrs) => {
                    warn!("DNS refresh for {} failed, serving cached addresses: {}", host, e);
                    Ok(addrs)
                }
                None => Err(e),
            },
        }
    }
}

impl Resolve for CachingResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = self.clone();
        Box::pin(async move {
            let addrs = resolver.lookup(name.as_str()).await?;
            let addrs: Addrs = Box::new(addrs.into_iter());
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(addrs)
        })
    }
}
