//! Key-addressed blob store seam.

use crate::config::StoreConfig;
use anyhow::bail;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` under `key`. Without `overwrite`, hitting an existing
    /// object is an error.
    async fn upload(&self, key: &str, bytes: Vec<u8>, overwrite: bool) -> anyhow::Result<()>;
    /// Public, unsigned retrieval URL for `key`. Pure and deterministic.
    fn public_url(&self, key: &str) -> String;
}

/// In-process store for tests and development.
pub struct MemoryBlobStore {
    cfg: StoreConfig,
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new(cfg: StoreConfig) -> MemoryBlobStore {
        MemoryBlobStore {
            cfg,
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, key: &str, bytes: Vec<u8>, overwrite: bool) -> anyhow::Result<()> {
        let mut objects = self.objects.lock().unwrap();
        if !overwrite && objects.contains_key(key) {
            bail!("object already exists: {}", key);
        }
        objects.insert(key.to_string(), bytes);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        self.cfg.public_object_url(key)
    }
}
