//! In-memory Cache Store.
//!
//! Uses a map of generations behind a tokio RwLock. Removing a generation
//! drops its whole entry map under one write lock.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::store::{CacheEntry, CacheStore};
use crate::Error;

type Generations = HashMap<String, HashMap<String, CacheEntry>>;

/// Cache Store kept entirely in process memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    generations: Arc<RwLock<Generations>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn open_generation(&self, name: &str) -> Result<(), Error> {
        let mut generations = self.generations.write().await;
        generations.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn generation_names(&self) -> Result<Vec<String>, Error> {
        let generations = self.generations.read().await;
        let mut names: Vec<String> = generations.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        Ok(self.generations.write().await.remove(name).is_some())
    }

    async fn get(&self, generation: &str, request_key: &str) -> Result<Option<CacheEntry>, Error> {
        let generations = self.generations.read().await;
        Ok(generations
            .get(generation)
            .and_then(|entries| entries.get(request_key))
            .cloned())
    }

    async fn put(&self, generation: &str, entry: &CacheEntry) -> Result<(), Error> {
        let mut generations = self.generations.write().await;
        generations
            .entry(generation.to_string())
            .or_default()
            .insert(entry.request_key.clone(), entry.clone());
        Ok(())
    }

    async fn entry_count(&self, generation: &str) -> Result<u64, Error> {
        let generations = self.generations.read().await;
        Ok(generations.get(generation).map(|e| e.len() as u64).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::HttpResponse;
    use chrono::Utc;

    fn entry(key: &str, body: &'static str) -> CacheEntry {
        CacheEntry {
            request_key: key.into(),
            url: format!("https://example.com/{key}"),
            response: HttpResponse::new(200, Vec::new(), body),
            stored_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_put_creates_generation() {
        let store = MemoryStore::new();
        store.put("g1", &entry("a", "A")).await.unwrap();
        assert_eq!(store.generation_names().await.unwrap(), vec!["g1".to_string()]);
        assert_eq!(store.entry_count("g1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = MemoryStore::new();
        store.put("g1", &entry("a", "old")).await.unwrap();
        store.put("g1", &entry("a", "new")).await.unwrap();

        let got = store.get("g1", "a").await.unwrap().unwrap();
        assert_eq!(got.response.body, "new");
        assert_eq!(store.entry_count("g1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_generation() {
        let store = MemoryStore::new();
        store.put("g1", &entry("a", "A")).await.unwrap();
        store.open_generation("g2").await.unwrap();

        assert!(store.delete_generation("g1").await.unwrap());
        assert!(!store.delete_generation("g1").await.unwrap());
        assert!(store.get("g1", "a").await.unwrap().is_none());
        assert_eq!(store.generation_names().await.unwrap(), vec!["g2".to_string()]);
    }

    #[tokio::test]
    async fn test_count_missing_generation() {
        let store = MemoryStore::new();
        assert_eq!(store.entry_count("nope").await.unwrap(), 0);
    }
}
