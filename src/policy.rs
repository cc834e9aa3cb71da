//! Protection policy — settings snapshot, resolver and settings access
//!
//! The resolver is a pure function of (host, settings). Settings live in an
//! external store behind [`SettingsStore`]; [`SettingsCache`] keeps one
//! process-wide snapshot that is fetched lazily and dropped on an explicit
//! change notification.

use crate::error::{GuardError, Result};
use crate::urls;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Persisted user settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Master switch
    #[serde(default = "default_global_enabled")]
    pub global_enabled: bool,

    /// Domains (and their subdomains) under protection
    #[serde(default)]
    pub protected_domains: Vec<String>,

    /// Per-host overrides, taking precedence over the domain list
    #[serde(default)]
    pub site_overrides: BTreeMap<String, bool>,
}

fn default_global_enabled() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            global_enabled: true,
            protected_domains: Vec::new(),
            site_overrides: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Normalize hosts and drop unusable entries
    pub fn sanitize(self) -> Self {
        let mut protected_domains: Vec<String> = Vec::new();
        for domain in self.protected_domains.iter().filter_map(|d| urls::normalize_host(d)) {
            if !protected_domains.contains(&domain) {
                protected_domains.push(domain);
            }
        }

        let site_overrides = self
            .site_overrides
            .into_iter()
            .filter_map(|(host, enabled)| urls::normalize_host(&host).map(|h| (h, enabled)))
            .collect();

        Self {
            global_enabled: self.global_enabled,
            protected_domains,
            site_overrides,
        }
    }

    /// Explicit override for a normalized host
    pub fn site_override(&self, host: &str) -> Option<bool> {
        self.site_overrides.get(host).copied()
    }

    /// Whether the host is a protected domain or one of its subdomains
    pub fn domain_listed(&self, host: &str) -> bool {
        self.protected_domains
            .iter()
            .any(|domain| urls::domain_matches(host, domain))
    }

    /// Site-level protection, ignoring the global switch
    pub fn is_host_protected(&self, host: &str) -> bool {
        self.site_override(host)
            .unwrap_or_else(|| self.domain_listed(host))
    }

    /// Effective protection for a normalized host
    pub fn protection_enabled(&self, host: &str) -> bool {
        self.global_enabled && self.is_host_protected(host)
    }

    /// Effective protection for a URL; non-web URLs are never protected
    pub fn protection_enabled_for_url(&self, url: &str) -> bool {
        urls::host_from_url(url).is_some_and(|host| self.protection_enabled(&host))
    }

    /// Add a user-typed domain; returns false if it was already listed
    pub fn add_protected_domain(&mut self, input: &str) -> Result<bool> {
        let domain = urls::normalize_domain_input(input)
            .ok_or_else(|| GuardError::InvalidHost(input.to_string()))?;

        if self.protected_domains.contains(&domain) {
            return Ok(false);
        }

        self.protected_domains.push(domain);
        self.protected_domains.sort();
        Ok(true)
    }

    /// Remove a domain; returns false if it was not listed
    pub fn remove_protected_domain(&mut self, input: &str) -> bool {
        let Some(domain) = urls::normalize_host(input) else {
            return false;
        };
        let before = self.protected_domains.len();
        self.protected_domains.retain(|d| *d != domain);
        before != self.protected_domains.len()
    }
}

/// External settings storage
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Load persisted settings; `None` when nothing was ever saved
    async fn load(&self) -> Result<Option<Settings>>;

    /// Persist settings
    async fn save(&self, settings: &Settings) -> Result<()>;
}

/// JSON file-based settings store
///
/// Atomic writes via temp file + rename to prevent corruption.
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn load(&self) -> Result<Option<Settings>> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(GuardError::Settings(format!(
                    "Failed to read settings file {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let settings: Settings = serde_json::from_str(&json).map_err(|e| {
            GuardError::Settings(format!(
                "Failed to parse settings file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!(path = %self.path.display(), "Settings loaded");
        Ok(Some(settings))
    }

    async fn save(&self, settings: &Settings) -> Result<()> {
        let json = serde_json::to_string_pretty(settings)?;
        let tmp_path = self.path.with_extension("tmp");

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                GuardError::Settings(format!(
                    "Failed to create settings directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        tokio::fs::write(&tmp_path, json).await.map_err(|e| {
            GuardError::Settings(format!(
                "Failed to write settings file {}: {}",
                tmp_path.display(),
                e
            ))
        })?;

        tokio::fs::rename(&tmp_path, &self.path).await.map_err(|e| {
            GuardError::Settings(format!(
                "Failed to rename settings file {} → {}: {}",
                tmp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!(path = %self.path.display(), "Settings saved");
        Ok(())
    }
}

/// In-memory settings store for testing and embedding
#[derive(Default)]
pub struct MemorySettingsStore {
    state: std::sync::RwLock<Option<Settings>>,
}

impl MemorySettingsStore {
    /// Store pre-seeded with settings
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            state: std::sync::RwLock::new(Some(settings)),
        }
    }

    /// Replace the stored settings directly, as another writer would
    pub fn replace(&self, settings: Settings) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|e| GuardError::Settings(format!("Failed to acquire settings lock: {}", e)))?;
        *state = Some(settings);
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> Result<Option<Settings>> {
        let state = self
            .state
            .read()
            .map_err(|e| GuardError::Settings(format!("Failed to acquire settings lock: {}", e)))?;
        Ok(state.clone())
    }

    async fn save(&self, settings: &Settings) -> Result<()> {
        self.replace(settings.clone())
    }
}

/// Process-wide settings snapshot with explicit invalidation
///
/// Reads are cache-or-fetch. A change notification drops the snapshot and
/// bumps a generation counter so a fetch that started before the
/// notification never repopulates the cache with stale data.
pub struct SettingsCache {
    store: Arc<dyn SettingsStore>,
    cached: RwLock<Option<Arc<Settings>>>,
    generation: AtomicU64,
}

impl SettingsCache {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            store,
            cached: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Current settings, fetched from the store when not cached
    pub async fn get(&self) -> Result<Arc<Settings>> {
        if let Some(settings) = self.cached.read().await.as_ref() {
            return Ok(settings.clone());
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let settings = Arc::new(self.store.load().await?.unwrap_or_default().sanitize());

        let mut cached = self.cached.write().await;
        if self.generation.load(Ordering::SeqCst) == generation {
            *cached = Some(settings.clone());
        }
        Ok(settings)
    }

    /// Drop the snapshot after an external settings change
    pub async fn invalidate(&self) {
        let mut cached = self.cached.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        *cached = None;
    }

    /// Persist new settings and make them the cached snapshot
    pub async fn save(&self, settings: Settings) -> Result<Arc<Settings>> {
        let settings = Arc::new(settings.sanitize());
        self.store.save(&settings).await?;

        let mut cached = self.cached.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        *cached = Some(settings.clone());
        Ok(settings)
    }

    /// Seed the store with defaults if nothing was persisted yet
    pub async fn ensure_defaults(&self) -> Result<Arc<Settings>> {
        if self.store.load().await?.is_none() {
            tracing::info!("Seeding default settings");
            return self.save(Settings::default()).await;
        }
        self.get().await
    }

    pub async fn is_cached(&self) -> bool {
        self.cached.read().await.is_some()
    }
}
