//! Secret reference tracking.
//!
//! Resolves the secrets an instance mounts (SASL credentials and TLS
//! certificates), reports which are missing and computes a content hash so
//! credential rotation can roll the pods.

use std::collections::{BTreeMap, BTreeSet};

use k8s_openapi::api::core::v1::Secret;
use kube::Api;
use sha2::{Digest, Sha256};

use crate::crd::MemcachedSpec;

/// Source of secrets by name within one namespace.
pub trait SecretLookup {
    /// `Ok(None)` when the secret does not exist.
    fn lookup(&self, name: &str)
    -> impl Future<Output = Result<Option<Secret>, kube::Error>> + Send;
}

impl SecretLookup for Api<Secret> {
    async fn lookup(&self, name: &str) -> Result<Option<Secret>, kube::Error> {
        self.get_opt(name).await
    }
}

impl SecretLookup for BTreeMap<String, Secret> {
    async fn lookup(&self, name: &str) -> Result<Option<Secret>, kube::Error> {
        Ok(self.get(name).cloned())
    }
}

/// Outcome of resolving an instance's secret references.
#[derive(Clone, Debug, Default)]
pub struct SecretResolution {
    /// Secrets that exist, keyed by name.
    pub found: BTreeMap<String, Secret>,
    /// Referenced names that do not exist.
    pub missing: Vec<String>,
    /// Content hash of `found`, empty when they hold no data.
    pub hash: String,
}

/// Distinct secret names referenced by the enabled SASL and TLS blocks.
pub fn referenced_secret_names(spec: &MemcachedSpec) -> BTreeSet<String> {
    spec.sasl_secret_name()
        .into_iter()
        .chain(spec.tls_secret_name())
        .map(str::to_string)
        .collect()
}

/// Fetch every referenced secret.
///
/// A missing secret is recorded and does not stop the others from being
/// fetched. Other API errors are returned.
pub async fn resolve_secrets<L: SecretLookup>(
    spec: &MemcachedSpec,
    lookup: &L,
) -> Result<SecretResolution, kube::Error> {
    let mut found = BTreeMap::new();
    let mut missing = Vec::new();

    for name in referenced_secret_names(spec) {
        match lookup.lookup(&name).await {
            Ok(Some(secret)) => {
                found.insert(name, secret);
            }
            Ok(None) => missing.push(name),
            Err(kube::Error::Api(e)) if e.code == 404 => missing.push(name),
            Err(e) => return Err(e),
        }
    }

    let hash = secret_hash(&found);
    Ok(SecretResolution {
        found,
        missing,
        hash,
    })
}

/// Order-independent SHA-256 over secret name, key and value.
///
/// Secrets are visited by name and keys within a secret in sorted order.
/// Empty values are skipped. Returns an empty string when no secret carries
/// any non-empty value.
pub fn secret_hash(secrets: &BTreeMap<String, Secret>) -> String {
    let mut hasher = Sha256::new();
    let mut wrote = false;

    for (name, secret) in secrets {
        let Some(data) = secret.data.as_ref() else {
            continue;
        };
        // BTreeMap iteration is already key-sorted
        for (key, value) in data {
            if value.0.is_empty() {
                continue;
            }
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
            hasher.update(key.as_bytes());
            hasher.update([0u8]);
            hasher.update(&value.0);
            hasher.update([0u8]);
            wrote = true;
        }
    }

    if !wrote {
        return String::new();
    }

    format!("{:x}", hasher.finalize())
}
