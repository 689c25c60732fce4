//! Canonical links for stored artifact references.
//!
//! Rows written by different versions of the submit flow hold a bare object
//! key, a `public/<bucket>/`-prefixed key, or a full public URL. All of
//! them denote the same object; this resolver maps any shape to the one
//! canonical retrieval URL.

use crate::config::StoreConfig;

#[derive(Debug, Clone)]
pub struct ArtifactLinkResolver {
    base_url: String,
    bucket: String,
}

impl ArtifactLinkResolver {
    pub fn new(store: &StoreConfig) -> ArtifactLinkResolver {
        ArtifactLinkResolver {
            base_url: store.base_url.trim_end_matches('/').to_string(),
            bucket: store.bucket.clone(),
        }
    }

    /// `None` for absent references and references that normalize to an
    /// empty key; the caller renders an "unavailable" affordance, never an
    /// error.
    pub fn resolve(&self, reference: Option<&str>) -> Option<String> {
        let key = self.object_key(reference?)?;
        Some(self.public_url(&key))
    }

    /// Public, unsigned retrieval URL for a bare key. Pure and
    /// deterministic.
    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, key
        )
    }

    // Strips, in order: a full public-URL prefix, the legacy
    // "public/<bucket>/" segment, a bare "<bucket>/" segment, one leading
    // slash.
    fn object_key(&self, raw: &str) -> Option<String> {
        let mut key = self.strip_public_url(raw).unwrap_or(raw);
        let legacy = format!("public/{}/", self.bucket);
        if key.starts_with(legacy.as_str()) {
            key = &key[legacy.len()..];
        }
        let bare = format!("{}/", self.bucket);
        if key.starts_with(bare.as_str()) {
            key = &key[bare.len()..];
        }
        if key.starts_with('/') {
            key = &key[1..];
        }
        if key.is_empty() {
            None
        } else {
            Some(key.to_string())
        }
    }

    fn strip_public_url<'a>(&self, raw: &'a str) -> Option<&'a str> {
        let rest = raw
            .strip_prefix("https://")
            .or_else(|| raw.strip_prefix("http://"))?;
        let path_start = rest.find('/')?;
        let path = &rest[path_start + 1..];
        let marker = format!("storage/v1/object/public/{}/", self.bucket);
        path.strip_prefix(marker.as_str())
    }
}
