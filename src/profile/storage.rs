// storage protocol:
// count -> count of profiles
// [i]/username -> username owning slot i
// [i]/profile -> json encoded profile
//
// a new username takes slot `count`, `count` is written last
// writes should be mutually exclusive, but one write and some reads are allowed to be concurrent

use super::Profile;
use anyhow::{Context, Result};
use opendal::services::Sled;
use opendal::{ErrorKind, Operator};
use std::path::Path;

#[derive(Clone)]
pub struct Storage {
    pub operator: Operator,
}

impl Storage {
    pub fn new(datadir: impl AsRef<Path>) -> Result<Self> {
        let datadir = datadir.as_ref().to_string_lossy().to_string();
        let mut builder = Sled::default();
        builder.datadir(&datadir);

        let operator = Operator::new(builder)
            .with_context(|| format!("open sled storage at {}", datadir))?
            .finish();
        Ok(Storage { operator })
    }

    pub async fn count(&self) -> Result<usize> {
        match self.operator.read("count").await {
            Ok(bytes) => usize_decode(&bytes),
            Err(e) if matches!(e.kind(), ErrorKind::NotFound) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes `profile` into `index`. `index` must be an existing slot or the next free one.
    pub async fn store(&self, index: usize, profile: &Profile) -> Result<()> {
        let count = self.count().await?;
        if index > count {
            return Err(anyhow::anyhow!(
                "slot {} out of range, count: {}",
                index,
                count
            ));
        }

        self.operator
            .write(
                &(index.to_string() + "/username"),
                profile.username.clone(),
            )
            .await?;
        self.operator
            .write(
                &(index.to_string() + "/profile"),
                serde_json::to_vec(profile)?,
            )
            .await?;
        if index == count {
            self.operator
                .write("count", (count + 1).to_be_bytes().to_vec())
                .await?;
        }
        debug!("store profile: index: {}, username: {}", index, profile.username);

        Ok(())
    }

    pub async fn load(&self, index: usize) -> Result<Profile> {
        let key = index.to_string() + "/profile";
        let bytes = self.operator.read(&key).await?;
        let profile =
            serde_json::from_slice(&bytes).with_context(|| format!("decode {}", key))?;
        Ok(profile)
    }

    pub async fn get_usernames(&self) -> Result<Vec<String>> {
        let mut list = vec![];
        let count = self.count().await?;
        for i in 0..count {
            let username = string_decode(
                &self
                    .operator
                    .read(&(i.to_string() + "/username"))
                    .await?,
            );
            list.push(username);
        }
        Ok(list)
    }
}

fn usize_decode(data: &[u8]) -> Result<usize> {
    let bytes = data
        .try_into()
        .map_err(|_| anyhow::anyhow!("count has {} bytes", data.len()))?;
    Ok(usize::from_be_bytes(bytes))
}

fn string_decode(bytes: &[u8]) -> String {
    let s = String::from_utf8_lossy(bytes);
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Category;

    #[tokio::test]
    async fn test_store_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(temp_dir.path()).unwrap();
        assert_eq!(storage.count().await.unwrap(), 0);

        let profile = Profile::new("ann", vec![Category::new("Music", vec!["Rock".into()])]);
        storage.store(0, &profile).await.unwrap();

        assert_eq!(storage.count().await.unwrap(), 1);
        assert_eq!(storage.load(0).await.unwrap(), profile);
        assert_eq!(storage.get_usernames().await.unwrap(), vec!["ann"]);
    }

    #[tokio::test]
    async fn test_rewrite_slot_keeps_count() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(temp_dir.path()).unwrap();

        storage.store(0, &Profile::new("ann", vec![])).await.unwrap();
        let replaced = Profile::new("ann", vec![Category::new("Books", vec!["Dune".into()])]);
        storage.store(0, &replaced).await.unwrap();

        assert_eq!(storage.count().await.unwrap(), 1);
        assert_eq!(storage.load(0).await.unwrap(), replaced);
    }

    #[tokio::test]
    async fn test_store_rejects_gap() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(temp_dir.path()).unwrap();

        assert!(storage.store(1, &Profile::new("ann", vec![])).await.is_err());
        assert_eq!(storage.count().await.unwrap(), 0);
    }
}
