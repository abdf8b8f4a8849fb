//! Open the configured backend.

use std::sync::Arc;
use tracing::{info, warn};
use wayfarer_config::{AppConfig, StorageBackend};
use wayfarer_core::SkillStore;

use crate::facade::KnowledgeStore;
use crate::file_store::FileSkillStore;
use crate::noop::UnavailableStore;

/// Open the store named by `[storage]`.
///
/// Never fails: a backend that cannot be opened is replaced by an
/// [`UnavailableStore`] carrying the reason, so callers degrade softly.
pub async fn open_from_config(config: &AppConfig) -> KnowledgeStore {
    let inner: Arc<dyn SkillStore> = match config.storage.backend {
        StorageBackend::None => Arc::new(UnavailableStore::new("storage disabled (backend = none)")),
        StorageBackend::File => {
            let dir = config.data_dir();
            match FileSkillStore::new(&dir) {
                Ok(store) => {
                    info!(path = %dir.display(), "Using file knowledge store");
                    Arc::new(store)
                }
                Err(e) => {
                    warn!(error = %e, "File knowledge store unavailable");
                    Arc::new(UnavailableStore::new(e.to_string()))
                }
            }
        }
        StorageBackend::Sqlite => open_sqlite(config.storage.url.as_deref()).await,
    };
    KnowledgeStore::new(inner)
}

#[cfg(feature = "sqlite")]
async fn open_sqlite(url: Option<&str>) -> Arc<dyn SkillStore> {
    let Some(url) = url.filter(|u| !u.trim().is_empty()) else {
        return Arc::new(UnavailableStore::new("DB unavailable: missing database URL"));
    };
    match crate::sqlite::SqliteSkillStore::new(url).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(error = %e, "SQLite knowledge store unavailable");
            Arc::new(UnavailableStore::new(format!("DB unavailable: {e}")))
        }
    }
}

#[cfg(not(feature = "sqlite"))]
async fn open_sqlite(_url: Option<&str>) -> Arc<dyn SkillStore> {
    Arc::new(UnavailableStore::new("DB unavailable: built without sqlite support"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_config::StorageConfig;

    fn config(backend: StorageBackend, data_dir: Option<std::path::PathBuf>) -> AppConfig {
        AppConfig {
            storage: StorageConfig {
                backend,
                url: None,
                data_dir,
            },
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn none_backend_is_unavailable() {
        let store = open_from_config(&config(StorageBackend::None, None)).await;
        assert_eq!(store.backend(), "none");
        assert!(!store.ping().await);
    }

    #[tokio::test]
    async fn file_backend_opens_data_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_from_config(&config(StorageBackend::File, Some(tmp.path().into()))).await;
        assert_eq!(store.backend(), "file");
        assert!(store.ping().await);
    }

    #[tokio::test]
    async fn sqlite_without_url_degrades() {
        let store = open_from_config(&config(StorageBackend::Sqlite, None)).await;
        assert_eq!(store.backend(), "none");
    }
}
