use std::collections::BTreeMap;

use crate::config::{DaemonConfig, RegistryConfig};

static DEFAULT_REGISTRY: &str = "docker.io";

/// Registry options a worker uses when pulling or pushing a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
    pub host: String,
    pub mirrors: Vec<String>,
    pub plain_http: bool,
    pub insecure: bool,
}

/// Looks up per-registry settings from the daemon config.
///
/// Activation only hands this to the worker; it never resolves anything itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryResolver {
    registries: BTreeMap<String, RegistryConfig>,
}

impl RegistryResolver {
    pub fn new(config: &DaemonConfig) -> Self {
        Self {
            registries: config.registries.clone(),
        }
    }

    pub fn resolve(&self, reference: &str) -> ResolveOptions {
        let host = registry_host(reference);
        let registry = self.registries.get(&host).cloned().unwrap_or_default();
        ResolveOptions {
            host,
            mirrors: registry.mirrors,
            plain_http: registry.http,
            insecure: registry.insecure,
        }
    }
}

fn registry_host(reference: &str) -> String {
    match reference.split_once('/') {
        Some((first, _)) if first.contains(['.', ':']) || first == "localhost" => first.to_string(),
        _ => DEFAULT_REGISTRY.to_string(),
    }
}
