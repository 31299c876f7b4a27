use super::matching::{profile_similarity, ProfileMatch};
use super::storage::Storage;
use super::Profile;
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{RwLock, Semaphore};

#[derive(Default)]
struct Roster {
    list: Vec<String>,
    slots: HashMap<String, usize>,
}

impl Roster {
    fn from_list(list: Vec<String>) -> Self {
        // a username stored twice resolves to its last slot
        let slots = list
            .iter()
            .enumerate()
            .map(|(i, username)| (username.clone(), i))
            .collect();
        Roster { list, slots }
    }
}

#[derive(Debug, PartialEq)]
pub enum Comparison {
    Matched(ProfileMatch),
    Missing(Vec<String>),
}

/// Username-keyed profile lookup and upsert on top of [`Storage`].
#[derive(Clone)]
pub struct Directory {
    storage: Storage,
    roster: Arc<RwLock<Roster>>,
    semaphore: Arc<Semaphore>,
}

impl Directory {
    pub async fn new(datadir: impl AsRef<Path>) -> Result<Self> {
        Self::with_storage(Storage::new(datadir)?).await
    }

    async fn with_storage(storage: Storage) -> Result<Self> {
        let list = storage.get_usernames().await?;
        info!("directory init, recover: len: {}, list: {:?}", list.len(), list);

        Ok(Self {
            storage,
            roster: Arc::new(RwLock::new(Roster::from_list(list))),
            semaphore: Arc::new(Semaphore::new(1)),
        })
    }

    pub async fn upsert(&self, profile: Profile) -> Result<()> {
        profile.validate()?;

        let _permit = self.semaphore.acquire().await?;
        let start = Instant::now();
        let (index, existing) = {
            let read = self.roster.read().await;
            match read.slots.get(&profile.username) {
                Some(index) => (*index, true),
                None => (read.list.len(), false),
            }
        };
        self.storage.store(index, &profile).await?;
        if !existing {
            let mut write = self.roster.write().await;
            write.list.push(profile.username.clone());
            write.slots.insert(profile.username.clone(), index);
        }
        let elapsed = start.elapsed().as_secs_f64();
        info!(
            "index: {} upsert {} (existing: {}) spends {}s",
            index, profile.username, existing, elapsed
        );

        Ok(())
    }

    pub async fn get(&self, username: &str) -> Result<Option<Profile>> {
        let index = {
            let read = self.roster.read().await;
            read.slots.get(username).copied()
        };
        match index {
            Some(index) => Ok(Some(self.storage.load(index).await?)),
            None => {
                debug!("profile not found: {}", username);
                Ok(None)
            }
        }
    }

    pub async fn compare(&self, username_a: &str, username_b: &str) -> Result<Comparison> {
        let a = self.get(username_a).await?;
        let b = self.get(username_b).await?;
        match (a, b) {
            (Some(a), Some(b)) => {
                let matched = profile_similarity(&a, &b);
                debug!("compare {} with {}: {}", username_a, username_b, matched);
                Ok(Comparison::Matched(matched))
            }
            (a, b) => {
                let mut missing = vec![];
                if a.is_none() {
                    missing.push(username_a.to_string());
                }
                if b.is_none() {
                    missing.push(username_b.to_string());
                }
                Ok(Comparison::Missing(missing))
            }
        }
    }

    pub async fn get_list(&self) -> Vec<String> {
        let read = self.roster.read().await;
        read.list.clone()
    }
}
