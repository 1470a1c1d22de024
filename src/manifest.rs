//! Resource manifest and shell set
//!
//! The manifest maps logical resource keys (`/` for the application root,
//! otherwise a path relative to the origin) to content fingerprints. It is
//! produced at build time and is the only authority on what may be cached.

use crate::error::{ShellCacheError, ShellCacheResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Logical key of the application root document
pub const ROOT_KEY: &str = "/";

/// Length of a fingerprint in hex characters
pub const FINGERPRINT_LEN: usize = 32;

/// Entry point document whose fingerprint is reused for the root key
const INDEX_DOCUMENT: &str = "index.html";

/// Files never listed in a generated manifest
pub const DEFAULT_EXCLUDES: &[&str] = &["flutter_service_worker.js", ".last_build_id"];

/// Mapping from logical resource key to content fingerprint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceManifest {
    resources: BTreeMap<String, String>,
}

impl ResourceManifest {
    /// Build a manifest from key/fingerprint pairs, validating every fingerprint
    pub fn from_entries<I, K, V>(entries: I) -> ShellCacheResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let resources: BTreeMap<String, String> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let manifest = Self { resources };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parse a manifest from its JSON form (a flat object of strings)
    pub fn parse(json: &str) -> ShellCacheResult<Self> {
        let resources: BTreeMap<String, String> = serde_json::from_str(json)
            .map_err(|e| ShellCacheError::ManifestInvalid(e.to_string()))?;
        let manifest = Self { resources };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Read and parse a manifest file
    pub async fn from_file(path: &Path) -> ShellCacheResult<Self> {
        if !path.exists() {
            return Err(ShellCacheError::PathNotFound(path.to_path_buf()));
        }
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ShellCacheError::io(format!("reading manifest {}", path.display()), e)
        })?;
        Self::parse(&content)
    }

    /// Serialize to the flat JSON object stored in the snapshot partition
    pub fn to_json(&self) -> ShellCacheResult<String> {
        Ok(serde_json::to_string(&self.resources)?)
    }

    /// Fingerprint registered for a key
    pub fn fingerprint(&self, key: &str) -> Option<&str> {
        self.resources.get(key).map(String::as_str)
    }

    /// Whether a key is part of the manifest
    pub fn contains(&self, key: &str) -> bool {
        self.resources.contains_key(key)
    }

    /// All keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Short id identifying the worker version built from this manifest
    ///
    /// BTreeMap serialization is key-ordered, so equal manifests always
    /// produce the same id.
    pub fn version(&self) -> String {
        let json = serde_json::to_string(&self.resources).unwrap_or_default();
        let digest = Sha256::digest(json.as_bytes());
        hex::encode(&digest[..6])
    }

    /// Keys whose fingerprint differs from `previous`, or which `previous` lacks
    pub fn changed_since(&self, previous: &ResourceManifest) -> Vec<&str> {
        self.resources
            .iter()
            .filter(|(key, fp)| previous.fingerprint(key) != Some(fp.as_str()))
            .map(|(key, _)| key.as_str())
            .collect()
    }

    /// Keys present in `previous` but no longer in this manifest
    pub fn removed_since<'a>(&self, previous: &'a ResourceManifest) -> Vec<&'a str> {
        previous
            .keys()
            .filter(|key| !self.contains(key))
            .collect()
    }

    /// Generate a manifest by fingerprinting every file under a build directory
    ///
    /// Keys are `/`-separated paths relative to `root`. When the build
    /// contains `index.html`, the root key `/` is added with the same
    /// fingerprint so navigations to the bare origin are versioned too.
    pub fn generate(root: &Path, excludes: &[&str]) -> ShellCacheResult<Self> {
        if !root.is_dir() {
            return Err(ShellCacheError::PathNotFound(root.to_path_buf()));
        }

        let mut resources = BTreeMap::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(|e| {
                ShellCacheError::ManifestInvalid(format!("walking {}: {}", root.display(), e))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry.path().strip_prefix(root).map_err(|e| {
                ShellCacheError::Internal(format!("{} outside build root: {}", entry.path().display(), e))
            })?;
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            if excludes.contains(&key.as_str()) {
                debug!("Skipping excluded file {}", key);
                continue;
            }

            let contents = std::fs::read(entry.path()).map_err(|e| {
                ShellCacheError::io(format!("reading {}", entry.path().display()), e)
            })?;
            resources.insert(key, fingerprint_bytes(&contents));
        }

        if let Some(index) = resources.get(INDEX_DOCUMENT).cloned() {
            resources.insert(ROOT_KEY.to_string(), index);
        }

        debug!("Fingerprinted {} file(s) under {}", resources.len(), root.display());
        Ok(Self { resources })
    }

    fn validate(&self) -> ShellCacheResult<()> {
        for (key, fingerprint) in &self.resources {
            if key.is_empty() {
                return Err(ShellCacheError::ManifestInvalid(
                    "empty resource key".to_string(),
                ));
            }
            if !is_fingerprint(fingerprint) {
                return Err(ShellCacheError::FingerprintInvalid {
                    key: key.clone(),
                    fingerprint: fingerprint.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Check the fingerprint format: 32 lowercase hex characters
pub fn is_fingerprint(value: &str) -> bool {
    value.len() == FINGERPRINT_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Fingerprint file contents: first 16 bytes of SHA-256, hex-encoded
pub fn fingerprint_bytes(contents: &[u8]) -> String {
    let digest = Sha256::digest(contents);
    hex::encode(&digest[..FINGERPRINT_LEN / 2])
}

/// Ordered set of keys required for a first paint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellSet {
    keys: Vec<String>,
}

impl ShellSet {
    /// Build a shell set, requiring every key to be a manifest key
    ///
    /// Duplicates are dropped while keeping first-seen order.
    pub fn new<I, S>(keys: I, manifest: &ResourceManifest) -> ShellCacheResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = BTreeSet::new();
        let mut ordered = Vec::new();
        for key in keys {
            let key = key.into();
            if !manifest.contains(&key) {
                return Err(ShellCacheError::ShellKeyMissing(key));
            }
            if seen.insert(key.clone()) {
                ordered.push(key);
            }
        }
        Ok(Self { keys: ordered })
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FP_A: &str = "f31737fb005cd3a3c6bd9355efd33061";
    const FP_B: &str = "03d892178b1c75fefd94a51c411031b5";

    #[test]
    fn parse_flat_object() {
        let json = format!(r#"{{"flutter.js": "{FP_A}", "/": "{FP_B}"}}"#);
        let manifest = ResourceManifest::parse(&json).unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.fingerprint("/"), Some(FP_B));
        assert!(!manifest.contains("index.html"));
    }

    #[test]
    fn rejects_bad_fingerprints() {
        for bad in ["ABCDEF", "F31737FB005CD3A3C6BD9355EFD33061", "g31737fb005cd3a3c6bd9355efd33061"] {
            let json = format!(r#"{{"a.js": "{bad}"}}"#);
            assert!(matches!(
                ResourceManifest::parse(&json),
                Err(ShellCacheError::FingerprintInvalid { .. })
            ));
        }
    }

    #[test]
    fn rejects_non_object() {
        assert!(matches!(
            ResourceManifest::parse(r#"["a.js"]"#),
            Err(ShellCacheError::ManifestInvalid(_))
        ));
    }

    #[test]
    fn snapshot_json_roundtrip() {
        let manifest =
            ResourceManifest::from_entries([("a.js", FP_A), ("b.js", FP_B)]).unwrap();
        let parsed = ResourceManifest::parse(&manifest.to_json().unwrap()).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn version_ignores_insertion_order() {
        let one = ResourceManifest::from_entries([("a.js", FP_A), ("b.js", FP_B)]).unwrap();
        let two = ResourceManifest::from_entries([("b.js", FP_B), ("a.js", FP_A)]).unwrap();
        assert_eq!(one.version(), two.version());
        assert_eq!(one.version().len(), 12);

        let three = ResourceManifest::from_entries([("a.js", FP_B), ("b.js", FP_B)]).unwrap();
        assert_ne!(one.version(), three.version());
    }

    #[test]
    fn diff_against_previous() {
        let previous =
            ResourceManifest::from_entries([("a.js", FP_A), ("b.js", FP_A), ("old.js", FP_A)])
                .unwrap();
        let current =
            ResourceManifest::from_entries([("a.js", FP_A), ("b.js", FP_B), ("new.js", FP_B)])
                .unwrap();
        assert_eq!(current.changed_since(&previous), vec!["b.js", "new.js"]);
        assert_eq!(current.removed_since(&previous), vec!["old.js"]);
    }

    #[test]
    fn generate_from_build_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("assets/fonts")).unwrap();
        std::fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        std::fs::write(dir.path().join("main.dart.js"), "main()").unwrap();
        std::fs::write(dir.path().join("assets/fonts/icons.otf"), [0u8, 1, 2]).unwrap();
        std::fs::write(dir.path().join("flutter_service_worker.js"), "sw").unwrap();

        let manifest = ResourceManifest::generate(dir.path(), DEFAULT_EXCLUDES).unwrap();

        let keys: Vec<&str> = manifest.keys().collect();
        assert_eq!(
            keys,
            vec!["/", "assets/fonts/icons.otf", "index.html", "main.dart.js"]
        );
        assert_eq!(manifest.fingerprint("/"), manifest.fingerprint("index.html"));
        assert_eq!(
            manifest.fingerprint("main.dart.js").unwrap(),
            fingerprint_bytes(b"main()")
        );
    }

    #[test]
    fn generate_missing_dir() {
        let dir = TempDir::new().unwrap();
        let result = ResourceManifest::generate(&dir.path().join("nope"), DEFAULT_EXCLUDES);
        assert!(matches!(result, Err(ShellCacheError::PathNotFound(_))));
    }

    #[test]
    fn generated_fingerprints_are_valid() {
        assert!(is_fingerprint(&fingerprint_bytes(b"")));
        assert!(is_fingerprint(&fingerprint_bytes(b"anything at all")));
    }

    #[test]
    fn shell_set_requires_manifest_keys() {
        let manifest = ResourceManifest::from_entries([("a.js", FP_A), ("b.js", FP_B)]).unwrap();
        let shell = ShellSet::new(["b.js", "a.js", "b.js"], &manifest).unwrap();
        assert_eq!(shell.keys(), &["b.js".to_string(), "a.js".to_string()]);

        let err = ShellSet::new(["c.js"], &manifest).unwrap_err();
        assert!(matches!(err, ShellCacheError::ShellKeyMissing(k) if k == "c.js"));
    }
}
