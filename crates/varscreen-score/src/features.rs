//! Persisted feature order.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::artifact::{read_json, write_json};
use crate::error::Result;

/// Ordered encoded feature names, as written by the encoding stage.
///
/// Serialized as a plain JSON array of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureList {
    names: Vec<String>,
}

impl FeatureList {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn load(path: &Path) -> Result<Self> {
        read_json("feature list", path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// SHA-256 over the names in order, newline separated.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for name in &self.names {
            hasher.update(name.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

impl FromIterator<String> for FeatureList {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_depends_on_order() {
        let a = FeatureList::new(vec!["f1".into(), "f2".into()]);
        let b = FeatureList::new(vec!["f2".into(), "f1".into()]);
        assert_ne!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
        assert_eq!(a.digest(), a.clone().digest());
    }

    #[test]
    fn digest_separates_names() {
        let joined = FeatureList::new(vec!["ab".into()]);
        let split = FeatureList::new(vec!["a".into(), "b".into()]);
        assert_ne!(joined.digest(), split.digest());
    }
}
