//! Cached hostname resolution over an ordered chain of naming methods.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use serde::Serialize;
use tokio::sync::RwLock;

use crossnet_core::{NamingKind, NamingMethod};

/// Snapshot of the hostname cache.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached addresses, including those without a name.
    pub size: usize,
    /// Addresses with a non-empty name, sorted by address.
    pub resolved: Vec<(Ipv4Addr, String)>,
}

/// Resolves addresses to host names and remembers every answer.
///
/// An empty string is cached for addresses no method could name, so each
/// address is looked up at most once until [`HostnameResolver::clear`].
pub struct HostnameResolver {
    methods: Vec<Box<dyn NamingMethod>>,
    cache: RwLock<HashMap<Ipv4Addr, String>>,
}

impl HostnameResolver {
    pub fn new(methods: Vec<Box<dyn NamingMethod>>) -> Self {
        Self {
            methods,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn method_kinds(&self) -> Vec<NamingKind> {
        self.methods.iter().map(|m| m.kind()).collect()
    }

    /// Name for `address`, or an empty string when none is known.
    pub async fn resolve(&self, address: Ipv4Addr) -> String {
        if let Some(name) = self.cache.read().await.get(&address) {
            return name.clone();
        }

        let name = self.lookup(address).await.unwrap_or_default();

        // Another task may have filled the entry while we were looking it up.
        self.cache
            .write()
            .await
            .entry(address)
            .or_insert(name)
            .clone()
    }

    async fn lookup(&self, address: Ipv4Addr) -> Option<String> {
        for method in &self.methods {
            if let Some(name) = method.resolve(address).await.filter(|n| !n.is_empty()) {
                tracing::debug!(
                    ip = %address,
                    method = %method.kind(),
                    hostname = %name,
                    "Resolved hostname"
                );
                return Some(name);
            }
        }
        tracing::trace!(ip = %address, "No hostname found");
        None
    }

    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        let cache = self.cache.read().await;
        let mut resolved: Vec<_> = cache
            .iter()
            .filter(|(_, name)| !name.is_empty())
            .map(|(address, name)| (*address, name.clone()))
            .collect();
        resolved.sort_unstable();

        CacheStats {
            size: cache.len(),
            resolved,
        }
    }
}
