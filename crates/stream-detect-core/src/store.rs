use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use stream_detect_config::{DiscoveryTuning, PathManager};
use stream_detect_models::{
    ContentCacheEntry, ExportSnapshot, MovieContext, ServiceCategory, ServiceList, ServiceOrigin,
    ServiceRecord, ServiceUsage, UserPreference,
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::discovery::DiscoveryMetadata;
use crate::domain::{derive_service_name, hash_title, normalize_domain};
use crate::error::StoreError;

const SERVICES_FILE: &str = "streaming_services.json";
const DISCOVERED_FILE: &str = "discovered_services.json";
const CONTENT_FILE: &str = "content_cache.json";
const PREFERENCES_FILE: &str = "user_preferences.json";

/// Export schema version.
pub const STORE_VERSION: u32 = 1;

/// Durable storage for service definitions, watch history, and user
/// preferences. Known and Discovered services live in separate tables
/// but form one lookup namespace.
///
/// Lifecycle is two-phase: `new()` is cheap and synchronous, `open()`
/// loads the tables and is idempotent; concurrent callers serialize on
/// the state lock. Every operation ensures openness first, so the
/// first call blocks until the store is ready.
///
/// Each mutating operation rewrites its own table file - one operation,
/// one transaction. No atomicity is promised across operations.
pub struct ServiceRegistry {
    store_dir: PathBuf,
    tuning: DiscoveryTuning,
    state: RwLock<Option<StoreState>>,
}

#[derive(Default)]
struct StoreState {
    known: HashMap<String, ServiceRecord>,
    discovered: HashMap<String, ServiceRecord>,
    content: HashMap<String, ContentCacheEntry>,
    preferences: HashMap<String, UserPreference>,
}

/// What a purge pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeOutcome {
    pub content_removed: usize,
    pub services_removed: usize,
}

impl ServiceRegistry {
    pub fn new(paths: &PathManager, tuning: DiscoveryTuning) -> Self {
        Self {
            store_dir: paths.store_dir(),
            tuning,
            state: RwLock::new(None),
        }
    }

    /// Load all tables from disk. Idempotent; safe to await from
    /// multiple callers. Corrupt table files are backed up and replaced
    /// with empty tables rather than failing the open.
    pub async fn open(&self) -> Result<(), StoreError> {
        let mut guard = self.state.write().await;
        if guard.is_some() {
            return Ok(());
        }

        std::fs::create_dir_all(&self.store_dir).map_err(|source| StoreError::Io {
            path: self.store_dir.clone(),
            source,
        })?;

        let known: Vec<ServiceRecord> = load_table(&self.table_path(SERVICES_FILE), "services")?;
        let discovered: Vec<ServiceRecord> =
            load_table(&self.table_path(DISCOVERED_FILE), "discovered")?;
        let content: Vec<ContentCacheEntry> = load_table(&self.table_path(CONTENT_FILE), "content")?;
        let preferences: Vec<UserPreference> =
            load_table(&self.table_path(PREFERENCES_FILE), "preferences")?;

        let state = StoreState {
            known: known.into_iter().map(|s| (s.domain.clone(), s)).collect(),
            discovered: discovered.into_iter().map(|s| (s.domain.clone(), s)).collect(),
            content: content.into_iter().map(|c| (c.id.clone(), c)).collect(),
            preferences: preferences.into_iter().map(|p| (p.key.clone(), p)).collect(),
        };

        debug!(
            known = state.known.len(),
            discovered = state.discovered.len(),
            content = state.content.len(),
            "Opened service registry at {:?}",
            self.store_dir
        );

        *guard = Some(state);
        Ok(())
    }

    async fn ensure_open(&self) -> Result<(), StoreError> {
        if self.state.read().await.is_some() {
            return Ok(());
        }
        self.open().await
    }

    /// Upsert the built-in catalog. Safe to call repeatedly; existing
    /// entries are overwritten, never duplicated. Returns the catalog
    /// size.
    pub async fn seed_known_services(&self) -> Result<usize, StoreError> {
        self.ensure_open().await?;
        let mut guard = self.state.write().await;
        let state = guard.as_mut().ok_or(StoreError::Unavailable)?;

        let catalog = crate::catalog::builtin_catalog();
        let count = catalog.len();
        for service in catalog {
            state.known.insert(service.domain.clone(), service);
        }
        self.persist_known(state)?;

        debug!(count, "Seeded built-in service catalog");
        Ok(count)
    }

    /// Resolve a domain to a service record. Exact match first, then
    /// substring match in either direction (subdomains and multi-TLD
    /// variants); Known records are consulted before Discovered. Among
    /// multiple substring matches the longest registered domain wins,
    /// which keeps the result deterministic.
    pub async fn lookup_by_domain(
        &self,
        domain: &str,
    ) -> Result<Option<ServiceRecord>, StoreError> {
        self.ensure_open().await?;
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or(StoreError::Unavailable)?;

        let needle = normalize_domain(domain);
        for table in [&state.known, &state.discovered] {
            if let Some(service) = table.get(&needle) {
                return Ok(Some(service.clone()));
            }
            if let Some(service) = substring_match(table, &needle) {
                return Ok(Some(service.clone()));
            }
        }
        Ok(None)
    }

    pub async fn is_known_domain(&self, domain: &str) -> Result<bool, StoreError> {
        Ok(self.lookup_by_domain(domain).await?.is_some())
    }

    /// Insert or update a Discovered record. Repeat sightings bump
    /// `last_seen` and `movie_count`, grow confidence by the configured
    /// increment (saturating at 1.0), union patterns, and merge
    /// selectors with new roles overwriting old ones.
    pub async fn record_discovery(
        &self,
        domain: &str,
        metadata: DiscoveryMetadata,
    ) -> Result<ServiceRecord, StoreError> {
        self.ensure_open().await?;
        let mut guard = self.state.write().await;
        let state = guard.as_mut().ok_or(StoreError::Unavailable)?;

        let domain = normalize_domain(domain);
        let now = Utc::now();

        let record = if let Some(existing) = state.discovered.get_mut(&domain) {
            if let ServiceOrigin::Discovered {
                last_seen,
                movie_count,
                confidence,
                ..
            } = &mut existing.origin
            {
                *last_seen = now;
                *movie_count += 1;
                *confidence = (*confidence + self.tuning.repeat_increment).min(1.0);
            }
            for pattern in metadata.patterns {
                if !existing.patterns.contains(&pattern) {
                    existing.patterns.push(pattern);
                }
            }
            existing.selectors.merge_from(&metadata.selectors);
            if let Some(name) = metadata.name {
                existing.name = name;
            }
            if let Some(category) = metadata.category {
                existing.category = category;
            }
            existing.clone()
        } else {
            let record = ServiceRecord {
                name: metadata
                    .name
                    .unwrap_or_else(|| derive_service_name(&domain)),
                category: metadata.category.unwrap_or(ServiceCategory::Unknown),
                patterns: dedup_preserving_order(metadata.patterns),
                selectors: metadata.selectors,
                origin: ServiceOrigin::Discovered {
                    first_detected: now,
                    last_seen: now,
                    movie_count: 1,
                    confidence: metadata
                        .confidence
                        .unwrap_or(self.tuning.seed_confidence)
                        .clamp(0.0, 1.0),
                },
                domain: domain.clone(),
            };
            state.discovered.insert(domain.clone(), record.clone());
            record
        };

        self.persist_discovered(state)?;
        info!(domain = %domain, "Recorded service discovery");
        Ok(record)
    }

    pub async fn list_all_services(&self) -> Result<ServiceList, StoreError> {
        self.ensure_open().await?;
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or(StoreError::Unavailable)?;

        let mut known: Vec<ServiceRecord> = state.known.values().cloned().collect();
        let mut discovered: Vec<ServiceRecord> = state.discovered.values().cloned().collect();
        known.sort_by(|a, b| a.domain.cmp(&b.domain));
        discovered.sort_by(|a, b| a.domain.cmp(&b.domain));

        let total = known.len() + discovered.len();
        Ok(ServiceList {
            known,
            discovered,
            total,
        })
    }

    /// Union of Known and Discovered domains, deduplicated.
    pub async fn list_all_domains(&self) -> Result<BTreeSet<String>, StoreError> {
        self.ensure_open().await?;
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or(StoreError::Unavailable)?;

        Ok(state
            .known
            .keys()
            .chain(state.discovered.keys())
            .cloned()
            .collect())
    }

    /// Append-only watch insert. A duplicate id is logged and ignored;
    /// the existing entry is never mutated.
    pub async fn record_watch(&self, entry: ContentCacheEntry) -> Result<(), StoreError> {
        self.ensure_open().await?;
        let mut guard = self.state.write().await;
        let state = guard.as_mut().ok_or(StoreError::Unavailable)?;

        if state.content.contains_key(&entry.id) {
            debug!(id = %entry.id, title = %entry.title, "Duplicate watch entry id, ignoring");
            return Ok(());
        }
        state.content.insert(entry.id.clone(), entry);
        self.persist_content(state)
    }

    /// Most recently watched first, truncated to `limit`.
    pub async fn recent_watches(
        &self,
        limit: usize,
    ) -> Result<Vec<ContentCacheEntry>, StoreError> {
        self.ensure_open().await?;
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or(StoreError::Unavailable)?;

        let mut entries: Vec<ContentCacheEntry> = state.content.values().cloned().collect();
        entries.sort_by(|a, b| b.last_watched.cmp(&a.last_watched));
        entries.truncate(limit);
        Ok(entries)
    }

    /// Per-service usage rollup, sorted by content count descending.
    /// Every registered service appears, including those with zero
    /// watches.
    pub async fn usage_stats(&self) -> Result<Vec<ServiceUsage>, StoreError> {
        self.ensure_open().await?;
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or(StoreError::Unavailable)?;

        let mut stats: HashMap<String, ServiceUsage> = HashMap::new();
        for service in state.known.values().chain(state.discovered.values()) {
            stats
                .entry(service.domain.clone())
                .or_insert_with(|| ServiceUsage {
                    domain: service.domain.clone(),
                    name: service.name.clone(),
                    category: service.category,
                    content_count: 0,
                    total_watch_time: 0.0,
                    last_used: None,
                });
        }

        for entry in state.content.values() {
            // Exact-key only: a watch on an unregistered domain does
            // not create a stats row
            if let Some(usage) = stats.get_mut(&entry.domain) {
                usage.content_count += 1;
                usage.total_watch_time += entry.duration;
                if usage.last_used.map_or(true, |t| entry.last_watched > t) {
                    usage.last_used = Some(entry.last_watched);
                }
            }
        }

        let mut rows: Vec<ServiceUsage> = stats.into_values().collect();
        rows.sort_by(|a, b| {
            b.content_count
                .cmp(&a.content_count)
                .then_with(|| a.domain.cmp(&b.domain))
        });
        Ok(rows)
    }

    pub async fn get_preference(
        &self,
        key: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        self.ensure_open().await?;
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or(StoreError::Unavailable)?;
        Ok(state.preferences.get(key).map(|p| p.value.clone()))
    }

    pub async fn set_preference(
        &self,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), StoreError> {
        self.ensure_open().await?;
        let mut guard = self.state.write().await;
        let state = guard.as_mut().ok_or(StoreError::Unavailable)?;
        state
            .preferences
            .insert(key.to_string(), UserPreference::new(key, value));
        self.persist_preferences(state)
    }

    /// Delete watch entries older than the cutoff, and Discovered
    /// records that are both below the confidence floor and stale.
    /// Known records are never purged.
    pub async fn purge_older_than(&self, days: i64) -> Result<PurgeOutcome, StoreError> {
        self.ensure_open().await?;
        let mut guard = self.state.write().await;
        let state = guard.as_mut().ok_or(StoreError::Unavailable)?;

        let cutoff = Utc::now() - chrono::Duration::days(days);
        let mut outcome = PurgeOutcome::default();

        let before = state.content.len();
        state.content.retain(|_, entry| entry.last_watched >= cutoff);
        outcome.content_removed = before - state.content.len();

        let floor = self.tuning.purge_floor;
        let before = state.discovered.len();
        state.discovered.retain(|_, service| {
            match service.origin {
                ServiceOrigin::Discovered {
                    last_seen,
                    confidence,
                    ..
                } => !(confidence < floor && last_seen < cutoff),
                // Known records never land in this table, but keep them
                // if one ever does
                ServiceOrigin::Known { .. } => true,
            }
        });
        outcome.services_removed = before - state.discovered.len();

        self.persist_content(state)?;
        self.persist_discovered(state)?;

        info!(
            content_removed = outcome.content_removed,
            services_removed = outcome.services_removed,
            days,
            "Purge completed"
        );
        Ok(outcome)
    }

    /// Read-only full dump for backup/analysis.
    pub async fn export_snapshot(&self) -> Result<ExportSnapshot, StoreError> {
        let services = self.list_all_services().await?;

        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or(StoreError::Unavailable)?;

        let mut content: Vec<ContentCacheEntry> = state.content.values().cloned().collect();
        content.sort_by(|a, b| a.id.cmp(&b.id));
        let mut preferences: Vec<UserPreference> = state.preferences.values().cloned().collect();
        preferences.sort_by(|a, b| a.key.cmp(&b.key));

        Ok(ExportSnapshot {
            timestamp: Utc::now().to_rfc3339(),
            version: STORE_VERSION,
            services,
            content,
            preferences,
        })
    }

    fn table_path(&self, file: &str) -> PathBuf {
        self.store_dir.join(file)
    }

    fn persist_known(&self, state: &StoreState) -> Result<(), StoreError> {
        let mut rows: Vec<&ServiceRecord> = state.known.values().collect();
        rows.sort_by(|a, b| a.domain.cmp(&b.domain));
        persist_table(&self.table_path(SERVICES_FILE), "services", &rows)
    }

    fn persist_discovered(&self, state: &StoreState) -> Result<(), StoreError> {
        let mut rows: Vec<&ServiceRecord> = state.discovered.values().collect();
        rows.sort_by(|a, b| a.domain.cmp(&b.domain));
        persist_table(&self.table_path(DISCOVERED_FILE), "discovered", &rows)
    }

    fn persist_content(&self, state: &StoreState) -> Result<(), StoreError> {
        let mut rows: Vec<&ContentCacheEntry> = state.content.values().collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        persist_table(&self.table_path(CONTENT_FILE), "content", &rows)
    }

    fn persist_preferences(&self, state: &StoreState) -> Result<(), StoreError> {
        let mut rows: Vec<&UserPreference> = state.preferences.values().collect();
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        persist_table(&self.table_path(PREFERENCES_FILE), "preferences", &rows)
    }
}

/// Build a watch entry from a classification result. The id embeds the
/// service name, a title hash, and a millisecond timestamp; collisions
/// are tolerated downstream.
pub fn entry_from_context(context: &MovieContext) -> ContentCacheEntry {
    let now = Utc::now();
    let title = context.title.clone().unwrap_or_default();
    ContentCacheEntry {
        id: format!(
            "{}_{}_{}",
            context.service_name,
            hash_title(&title),
            now.timestamp_millis()
        ),
        domain: context.domain.clone(),
        title,
        url: context.url.clone(),
        duration: context.duration,
        current_time: context.current_time,
        last_watched: now,
        watch_count: 1,
    }
}

fn substring_match<'a>(
    table: &'a HashMap<String, ServiceRecord>,
    needle: &str,
) -> Option<&'a ServiceRecord> {
    table
        .values()
        .filter(|service| needle.contains(&service.domain) || service.domain.contains(needle))
        .max_by_key(|service| service.domain.len())
}

fn dedup_preserving_order(patterns: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    patterns
        .into_iter()
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

fn load_table<T: DeserializeOwned>(path: &Path, table: &'static str) -> Result<Vec<T>, StoreError> {
    if !path.exists() {
        debug!(table, "Table file does not exist, starting empty");
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match serde_json::from_str(&content) {
        Ok(rows) => Ok(rows),
        Err(e) => {
            // Incompatible or corrupt table: back it up and start empty
            // rather than refusing to open the store
            let backup = path.with_extension("json.bak");
            if let Err(backup_err) = std::fs::copy(path, &backup) {
                warn!(
                    table,
                    "Corrupt table ({}); backup also failed: {}. Starting empty.", e, backup_err
                );
            } else {
                warn!(
                    table,
                    "Corrupt table ({}); backed up to {:?} and starting empty.", e, backup
                );
            }
            Ok(Vec::new())
        }
    }
}

fn persist_table<T: Serialize>(
    path: &Path,
    table: &'static str,
    rows: &[&T],
) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(rows)
        .map_err(|source| StoreError::Serialize { table, source })?;
    std::fs::write(path, json).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(table, rows = rows.len(), "Table persisted");
    Ok(())
}
