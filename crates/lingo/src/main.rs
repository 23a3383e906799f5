use std::sync::Arc;

use lingo_core::{
    config::Config,
    engine::ConversationEngine,
    enrich::EnrichmentPipeline,
    providers::DictionaryProvider,
    store::WordStore,
};
use lingo_providers::{CambridgeProvider, GroqClient, WebsterProvider};
use lingo_store::SqliteStore;

#[tokio::main]
async fn main() -> Result<(), lingo_core::Error> {
    lingo_core::logging::init("lingo")?;

    let cfg = Arc::new(Config::load()?);

    let store: Arc<dyn WordStore> = Arc::new(SqliteStore::open(&cfg.db_path).await?);

    // Registration order doubles as the default source priority.
    let providers: Vec<Arc<dyn DictionaryProvider>> = vec![
        Arc::new(CambridgeProvider::new(&cfg.user_agent, cfg.scrape_timeout)),
        Arc::new(WebsterProvider::new(&cfg.user_agent, cfg.scrape_timeout)),
    ];
    let generation = Arc::new(GroqClient::new(
        cfg.groq_api_key.clone(),
        cfg.groq_model.clone(),
        cfg.generation_timeout,
    ));

    let pipeline = Arc::new(EnrichmentPipeline::new(
        store.clone(),
        providers,
        generation,
    ));
    let engine = Arc::new(ConversationEngine::new(
        store.clone(),
        pipeline,
        cfg.admin_ids.clone(),
        cfg.session_idle_timeout,
    ));

    lingo_telegram::router::run_polling(cfg, store, engine)
        .await
        .map_err(|e| lingo_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
