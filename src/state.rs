use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::config::Config;
use crate::db::FirestoreClient;
use crate::services::auth::AuthService;
use crate::services::document_ai::DocumentAiClient;
use crate::services::google_identity::GoogleIdentityClient;
use crate::services::pipeline::CurriculumPipeline;
use crate::services::speech::SpeechClient;
use crate::services::storage::StorageClient;
use crate::services::vertex_ai::VertexAiClient;

/// Application state: every cloud client is built once here at startup
/// and shared by reference, so there is no lazily-initialized global to
/// reason about and tests can build the whole graph from env alone.
#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    config: Arc<Config>,
    store: Arc<FirestoreClient>,
    auth: Arc<AuthService>,
    pipeline: Arc<CurriculumPipeline>,
}

impl AppState {
    pub fn from_config(config: Config) -> Self {
        let config = Arc::new(config);
        let store = Arc::new(FirestoreClient::new(&config));
        let identity = Arc::new(GoogleIdentityClient::new(&config));
        let document_ai = Arc::new(DocumentAiClient::new(&config));
        let vertex_ai = Arc::new(VertexAiClient::new(&config));
        let speech = Arc::new(SpeechClient::new(&config));
        let storage = Arc::new(StorageClient::new(&config));

        let auth = Arc::new(AuthService::new(
            Arc::clone(&store),
            identity,
            Arc::clone(&config),
        ));
        let pipeline = Arc::new(CurriculumPipeline::new(
            Arc::clone(&store),
            document_ai,
            vertex_ai,
            speech,
            storage,
            Arc::clone(&config),
        ));

        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            config,
            store,
            auth,
            pipeline,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    pub fn store(&self) -> Arc<FirestoreClient> {
        Arc::clone(&self.store)
    }

    pub fn auth(&self) -> Arc<AuthService> {
        Arc::clone(&self.auth)
    }

    pub fn pipeline(&self) -> Arc<CurriculumPipeline> {
        Arc::clone(&self.pipeline)
    }
}
