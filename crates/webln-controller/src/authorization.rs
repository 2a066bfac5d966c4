//! Per-domain authorization state.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use webln_core::ActionKind;

use crate::error::StoreError;

/// What an authorized domain may request without re-enabling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Info,
    Pay,
    Invoice,
}

impl Scope {
    pub fn all() -> BTreeSet<Scope> {
        [Scope::Info, Scope::Pay, Scope::Invoice].into_iter().collect()
    }

    /// Scope an action needs. `Enable` needs none.
    pub fn required_by(kind: &ActionKind) -> Option<Scope> {
        match kind {
            ActionKind::Enable => None,
            ActionKind::Info => Some(Scope::Info),
            ActionKind::Pay { .. } => Some(Scope::Pay),
            ActionKind::Invoice(_) => Some(Scope::Invoice),
        }
    }
}

/// A granted authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationEntry {
    pub granted_at: DateTime<Utc>,
    pub scopes: BTreeSet<Scope>,
}

impl AuthorizationEntry {
    pub fn now(scopes: BTreeSet<Scope>) -> Self {
        Self {
            granted_at: Utc::now(),
            scopes,
        }
    }

    pub fn allows(&self, scope: Scope) -> bool {
        self.scopes.contains(&scope)
    }
}

/// Stored state of a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DomainRecord {
    Allowed(AuthorizationEntry),
    Blocked { denied_at: DateTime<Utc> },
}

impl DomainRecord {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed(_))
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }

    /// Whether an authorized domain was granted `scope`.
    pub fn allows(&self, scope: Scope) -> bool {
        match self {
            Self::Allowed(entry) => entry.allows(scope),
            Self::Blocked { .. } => false,
        }
    }
}

/// Key-value persistence for domain records.
#[async_trait]
pub trait AuthorizationStorage: Send + Sync {
    async fn get(&self, domain: &str) -> Result<Option<DomainRecord>, StoreError>;

    async fn set(&self, domain: &str, record: DomainRecord) -> Result<(), StoreError>;

    /// Remove a record. Returns whether one existed.
    async fn delete(&self, domain: &str) -> Result<bool, StoreError>;

    async fn list(&self) -> Result<Vec<(String, DomainRecord)>, StoreError>;
}

/// Volatile storage, lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: RwLock<BTreeMap<String, DomainRecord>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthorizationStorage for MemoryStorage {
    async fn get(&self, domain: &str) -> Result<Option<DomainRecord>, StoreError> {
        Ok(self.records.read().await.get(domain).cloned())
    }

    async fn set(&self, domain: &str, record: DomainRecord) -> Result<(), StoreError> {
        self.records.write().await.insert(domain.to_string(), record);
        Ok(())
    }

    async fn delete(&self, domain: &str) -> Result<bool, StoreError> {
        Ok(self.records.write().await.remove(domain).is_some())
    }

    async fn list(&self) -> Result<Vec<(String, DomainRecord)>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// Storage backed by a single JSON document on disk.
///
/// The whole document is rewritten on every change.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    records: RwLock<BTreeMap<String, DomainRecord>>,
}

impl JsonFileStorage {
    /// Open the document at `path`, starting empty if it does not exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(
            "Loaded {} authorization records from {}",
            records.len(),
            path.display()
        );
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, records: &BTreeMap<String, DomainRecord>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(records)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl AuthorizationStorage for JsonFileStorage {
    async fn get(&self, domain: &str) -> Result<Option<DomainRecord>, StoreError> {
        Ok(self.records.read().await.get(domain).cloned())
    }

    async fn set(&self, domain: &str, record: DomainRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        records.insert(domain.to_string(), record);
        self.persist(&records).await
    }

    async fn delete(&self, domain: &str) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        let existed = records.remove(domain).is_some();
        if existed {
            self.persist(&records).await?;
        }
        Ok(existed)
    }

    async fn list(&self) -> Result<Vec<(String, DomainRecord)>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// Authorization decisions keyed by domain.
#[derive(Clone)]
pub struct AuthorizationStore {
    storage: Arc<dyn AuthorizationStorage>,
}

impl Default for AuthorizationStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl AuthorizationStore {
    pub fn new(storage: Arc<dyn AuthorizationStorage>) -> Self {
        Self { storage }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    pub async fn status(&self, domain: &str) -> Result<Option<DomainRecord>, StoreError> {
        self.storage.get(&normalize_domain(domain)).await
    }

    pub async fn is_authorized(&self, domain: &str) -> Result<bool, StoreError> {
        Ok(self.status(domain).await?.map_or(false, |r| r.is_allowed()))
    }

    pub async fn is_blocked(&self, domain: &str) -> Result<bool, StoreError> {
        Ok(self.status(domain).await?.map_or(false, |r| r.is_blocked()))
    }

    /// Authorize a domain, replacing any block.
    pub async fn grant(
        &self,
        domain: &str,
        scopes: BTreeSet<Scope>,
    ) -> Result<AuthorizationEntry, StoreError> {
        let entry = AuthorizationEntry::now(scopes);
        self.storage
            .set(&normalize_domain(domain), DomainRecord::Allowed(entry.clone()))
            .await?;
        info!("Authorized {}", domain);
        Ok(entry)
    }

    /// Block a domain, replacing any authorization.
    pub async fn block(&self, domain: &str) -> Result<(), StoreError> {
        self.storage
            .set(
                &normalize_domain(domain),
                DomainRecord::Blocked {
                    denied_at: Utc::now(),
                },
            )
            .await?;
        info!("Blocked {}", domain);
        Ok(())
    }

    /// Forget a domain entirely. Returns whether anything was stored.
    pub async fn revoke(&self, domain: &str) -> Result<bool, StoreError> {
        let existed = self.storage.delete(&normalize_domain(domain)).await?;
        if existed {
            info!("Revoked {}", domain);
        }
        Ok(existed)
    }

    pub async fn authorized_domains(&self) -> Result<Vec<(String, AuthorizationEntry)>, StoreError> {
        Ok(self
            .storage
            .list()
            .await?
            .into_iter()
            .filter_map(|(domain, record)| match record {
                DomainRecord::Allowed(entry) => Some((domain, entry)),
                DomainRecord::Blocked { .. } => None,
            })
            .collect())
    }

    pub async fn blocked_domains(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .storage
            .list()
            .await?
            .into_iter()
            .filter(|(_, record)| record.is_blocked())
            .map(|(domain, _)| domain)
            .collect())
    }
}

/// Domains are compared case-insensitively.
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}
