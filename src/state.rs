use crate::config::AppConfig;
use crate::domain::wizard::Wizard;
use crate::middleware::InFlight;
use crate::services::backend::BackendApi;
use crate::services::cache::QueryCache;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub backend: Arc<dyn BackendApi>,
    pub cache: QueryCache,
    pub in_flight: InFlight,
    pub wizard_sessions: Arc<RwLock<HashMap<Uuid, WizardSession>>>, // session id -> WizardSession
}

#[derive(Clone)]
pub struct WizardSession {
    pub wizard: Wizard,
    /// Digest of the bearer token that started the session.
    pub owner: String,
    pub last_seen: DateTime<Utc>,
}

impl WizardSession {
    pub fn new(wizard: Wizard, owner: String) -> Self {
        Self {
            wizard,
            owner,
            last_seen: Utc::now(),
        }
    }
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: AppConfig, backend: Arc<dyn BackendApi>) -> Self {
        let cache = QueryCache::new(config.refetch_delay);
        Self {
            config,
            backend,
            cache,
            in_flight: InFlight::new(),
            wizard_sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Drops wizard sessions idle for longer than the configured TTL.
    pub async fn sweep_wizard_sessions(&self) -> usize {
        let cutoff = Utc::now() - self.config.wizard_session_ttl;
        let mut sessions = self.wizard_sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.last_seen >= cutoff);
        before - sessions.len()
    }
}
