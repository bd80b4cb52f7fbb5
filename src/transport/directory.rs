//! Host name to address directory.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::IpAddr;

/// Resolves logical host names to connectable addresses
pub trait HostDirectory: Send + Sync + std::fmt::Debug {
    fn resolve(&self, host: &str) -> Option<IpAddr>;
}

/// In-memory directory with forward and reverse lookups.
///
/// A host may carry several addresses; [`HostDirectory::resolve`] returns the
/// first one.
#[derive(Debug, Default)]
pub struct StaticHostDirectory {
    inner: RwLock<DirectoryMaps>,
}

#[derive(Debug, Default)]
struct DirectoryMaps {
    host_to_addresses: HashMap<String, Vec<IpAddr>>,
    address_to_host: HashMap<IpAddr, String>,
}

impl StaticHostDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(hosts: HashMap<String, Vec<IpAddr>>) -> Self {
        let directory = Self::new();
        directory.update_mappings(hosts);
        directory
    }

    /// Insert or replace mappings for every host in `hosts`
    pub fn update_mappings(&self, hosts: HashMap<String, Vec<IpAddr>>) {
        let mut maps = self.inner.write();
        for (host, addresses) in hosts {
            if let Some(previous) = maps.host_to_addresses.remove(&host) {
                for address in previous {
                    maps.address_to_host.remove(&address);
                }
            }
            for address in &addresses {
                maps.address_to_host.insert(*address, host.clone());
            }
            maps.host_to_addresses.insert(host, addresses);
        }
    }

    pub fn add_mapping(&self, host: impl Into<String>, addresses: Vec<IpAddr>) {
        self.update_mappings(HashMap::from([(host.into(), addresses)]));
    }

    pub fn remove_host(&self, host: &str) -> bool {
        let mut maps = self.inner.write();
        match maps.host_to_addresses.remove(host) {
            Some(addresses) => {
                for address in addresses {
                    maps.address_to_host.remove(&address);
                }
                true
            }
            None => false,
        }
    }

    pub fn addresses(&self, host: &str) -> Option<Vec<IpAddr>> {
        self.inner.read().host_to_addresses.get(host).cloned()
    }

    /// Reverse lookup
    pub fn resolve_address(&self, address: &IpAddr) -> Option<String> {
        self.inner.read().address_to_host.get(address).cloned()
    }

    pub fn hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self.inner.read().host_to_addresses.keys().cloned().collect();
        hosts.sort();
        hosts
    }

    pub fn len(&self) -> usize {
        self.inner.read().host_to_addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HostDirectory for StaticHostDirectory {
    fn resolve(&self, host: &str) -> Option<IpAddr> {
        self.inner
            .read()
            .host_to_addresses
            .get(host)
            .and_then(|addresses| addresses.first().copied())
    }
}
