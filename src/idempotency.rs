use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn file_fingerprint(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(sha256_hex(&bytes))
}

/// Fingerprints of one run's input and materialized relations.
///
/// Two runs over the same input must produce equal fingerprints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFingerprints {
    pub source: Option<String>,
    pub relations: BTreeMap<String, String>,
}

impl RunFingerprints {
    pub fn record(&mut self, relation: &str, fingerprint: String) {
        self.relations.insert(relation.to_string(), fingerprint);
    }

    /// Relations whose fingerprint differs from `previous` (or is missing there).
    pub fn changed_since(&self, previous: &RunFingerprints) -> Vec<String> {
        self.relations
            .iter()
            .filter(|(name, fp)| previous.relations.get(*name) != Some(*fp))
            .map(|(name, _)| name.clone())
            .collect()
    }
}
