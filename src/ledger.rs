//! Append-only record of keys that must never be produced twice.
//!
//! The same store backs the verse-range ledger (`used_verses.txt`) and the
//! downloaded background id log (`downloaded_ids.txt`): one key per line,
//! loaded fully at open, appended and synced on every commit.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

#[async_trait]
pub trait RangeLedger: Send {
    fn contains(&self, key: &str) -> bool;

    /// Keys in commit order (file order for keys loaded at open).
    fn snapshot(&self) -> Vec<String>;

    /// Durably records `key`. Returns only after the key is on stable
    /// storage.
    async fn commit(&mut self, key: &str) -> io::Result<()>;
}

#[derive(Debug)]
pub struct FileLedger {
    path: PathBuf,
    keys: HashSet<String>,
    order: Vec<String>,
}

impl FileLedger {
    /// Opens the ledger at `path`, creating an empty file when missing.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create dir {}", parent.display()))?;
        }

        let content = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                fs::write(&path, b"")
                    .await
                    .with_context(|| format!("Failed to create ledger: {}", path.display()))?;
                crate::logi(format!("Created ledger file: {}", path.display()));
                String::new()
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to read ledger: {}", path.display()));
            }
        };

        let mut ledger = Self {
            path,
            keys: HashSet::new(),
            order: Vec::new(),
        };
        for line in content.lines() {
            let key = line.trim();
            if !key.is_empty() {
                ledger.remember(key);
            }
        }
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn remember(&mut self, key: &str) {
        if self.keys.insert(key.to_string()) {
            self.order.push(key.to_string());
        }
    }
}

#[async_trait]
impl RangeLedger for FileLedger {
    fn contains(&self, key: &str) -> bool {
        self.keys.contains(key.trim())
    }

    fn snapshot(&self) -> Vec<String> {
        self.order.clone()
    }

    async fn commit(&mut self, key: &str) -> io::Result<()> {
        let key = key.trim();
        if self.keys.contains(key) {
            return Ok(());
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{}\n", key).as_bytes()).await?;
        file.sync_all().await?;
        self.remember(key);
        Ok(())
    }
}

/// Ledger that lives only in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryLedger {
    keys: HashSet<String>,
    order: Vec<String>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ledger = Self::default();
        for key in keys {
            let key = key.into();
            if ledger.keys.insert(key.clone()) {
                ledger.order.push(key);
            }
        }
        ledger
    }
}

#[async_trait]
impl RangeLedger for MemoryLedger {
    fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    fn snapshot(&self) -> Vec<String> {
        self.order.clone()
    }

    async fn commit(&mut self, key: &str) -> io::Result<()> {
        if self.keys.insert(key.to_string()) {
            self.order.push(key.to_string());
        }
        Ok(())
    }
}
