use crate::cache::LatestEntryCache;
use crate::ingestion::Ingestor;
use crate::metrics::ServiceMetrics;
use crate::parse::ParsePolicy;
use crate::retrieval::Retriever;
use persistence::{EntryStore, RecoveryReport, StoreError};
use std::sync::Arc;

/// Settings the request handlers need; a subset of `Config`.
#[derive(Debug, Clone, Copy)]
pub struct ServiceSettings {
    pub parse_policy: ParsePolicy,
    pub max_count: u16,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            parse_policy: ParsePolicy::Lenient,
            max_count: u16::MAX,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<Ingestor>,
    pub retriever: Arc<Retriever>,
    pub cache: Arc<LatestEntryCache>,
    pub metrics: Arc<ServiceMetrics>,
    pub recovery: Option<Arc<RecoveryReport>>,
}

impl AppState {
    /// Wire the core around `store`. Seeds the latest-entry cache, so this
    /// must finish before the router is served.
    pub fn new(store: Arc<dyn EntryStore>, settings: ServiceSettings) -> Result<Self, StoreError> {
        let cache = Arc::new(LatestEntryCache::seed(store.as_ref())?);
        let metrics = Arc::new(ServiceMetrics::new());

        Ok(Self {
            ingestor: Arc::new(Ingestor::new(
                Arc::clone(&store),
                Arc::clone(&cache),
                Arc::clone(&metrics),
                settings.parse_policy,
            )),
            retriever: Arc::new(Retriever::new(
                store,
                Arc::clone(&cache),
                Arc::clone(&metrics),
                settings.max_count,
            )),
            cache,
            metrics,
            recovery: None,
        })
    }

    pub fn with_recovery_report(mut self, report: RecoveryReport) -> Self {
        self.recovery = Some(Arc::new(report));
        self
    }
}
