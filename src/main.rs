use doc_qa::api::{create_router, AppState};
use doc_qa::application::{AnswerGenerator, DocumentService, PromptTemplate, QaPipeline, RagService};
use doc_qa::domain::{ports::ByteStore, TextSplitter};
use doc_qa::infrastructure::{
    cache, config::LoggingConfig, AppConfig, CacheBackend, InMemoryByteStore, LocalDocumentStore,
    LocalFileStore, LogFormat, OpenAiProviders, RedisByteStore, TiktokenCounter,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_tracing(&config.config.logging);

    let addr = SocketAddr::new(
        config.config.server.host.parse()?,
        config.config.server.port,
    );
    let state = build_state(config)?;
    let app = create_router(state);

    info!("API server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| logging.filter.as_str().into());
    let registry = tracing_subscriber::registry().with(filter);

    match logging.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn build_state(config: AppConfig) -> anyhow::Result<AppState> {
    let cfg = &config.config;

    let counter = Arc::new(TiktokenCounter::new(&cfg.tokenizer.encoding)?);
    info!(encoding = counter.encoding(), "tokenizer loaded");
    let splitter = TextSplitter::new(cfg.splitter.clone(), counter)?;
    let documents = DocumentService::new(
        Arc::new(LocalDocumentStore::new(cfg.cache.files_dir())),
        splitter,
    );

    let mut redis_pool = None;
    let cache_store: Arc<dyn ByteStore> = match cfg.cache.backend {
        CacheBackend::File => Arc::new(LocalFileStore::new(cfg.cache.embeddings_dir())),
        CacheBackend::Memory => Arc::new(InMemoryByteStore::new()),
        CacheBackend::Redis => {
            let pool = cache::create_pool(&cfg.cache.redis_url)?;
            redis_pool = Some(pool.clone());
            Arc::new(RedisByteStore::new(pool))
        }
    };
    info!(backend = ?cfg.cache.backend, dir = %cfg.cache.dir.display(), "embedding cache ready");

    let rag = RagService::with_memo_capacity(
        cache_store,
        cfg.retrieval.top_k,
        cfg.retrieval.index_memo_capacity,
    );
    let answers = AnswerGenerator::new(PromptTemplate::new(config.prompts.system.clone())?);
    let providers = Arc::new(OpenAiProviders::new(
        cfg.llm.clone(),
        cfg.embedding.clone(),
    )?);
    info!(model = %cfg.llm.model, embeddings = %cfg.embedding.model, "providers configured");

    let pipeline = Arc::new(QaPipeline::new(documents, rag, answers, providers));
    let mut state = AppState::new(pipeline, config);
    if let Some(pool) = redis_pool {
        state = state.with_redis_pool(pool);
    }
    Ok(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    info!("shutting down");
}
