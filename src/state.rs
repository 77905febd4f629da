use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::bus::ChatBus;
use crate::core::config::{AppConfig, AppPaths};
use crate::ingest::IngestClient;
use crate::llm::provider_from_config;
use crate::rag::{AnswerGenerator, ContextRetriever, VectorStoreClient};
use crate::store::ChatStore;

#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: Arc<AppConfig>,
    pub store: ChatStore,
    pub generator: Arc<AnswerGenerator>,
    pub ingest: IngestClient,
    pub bus: Arc<ChatBus>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub async fn initialize() -> anyhow::Result<Arc<Self>> {
        let paths = Arc::new(AppPaths::new());
        let config = Arc::new(AppConfig::load(&paths)?);

        let store = ChatStore::new(paths.db_path.clone()).await?;
        let vector_store = Arc::new(VectorStoreClient::new(config.chroma_url.clone()));
        let retriever = ContextRetriever::new(vector_store);
        let provider = provider_from_config(&config);
        let generator = Arc::new(AnswerGenerator::new(retriever, provider));
        let ingest = IngestClient::new(config.ingest_url.clone());
        let bus = Arc::new(ChatBus::new());

        Ok(Arc::new(AppState {
            paths,
            config,
            store,
            generator,
            ingest,
            bus,
            started_at: Utc::now(),
        }))
    }
}
