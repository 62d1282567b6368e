use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use tower_http::services::ServeDir;

use prompt_studio::{
    api::{self, AppState},
    cache::LocalFileStorage,
    config::Settings,
    filters::FilterStore,
    gateway::GatewayClient,
    logging::init_logging,
    mcp_server::StudioServer,
    store::{MemoryStore, Repository, SupabaseStore, TableStore},
    studio::Studio,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let settings = Settings::from_env()?;
    init_logging(&settings.log_level, settings.log_format);

    let table_store: Arc<dyn TableStore> = match &settings.supabase {
        Some(supabase) => Arc::new(
            SupabaseStore::new(&supabase.url, &supabase.service_key, settings.http_timeout)
                .context("building database client")?,
        ),
        None => {
            tracing::warn!("SUPABASE_URL not set, using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };
    let gateway = GatewayClient::new(
        &settings.gateway_url,
        &settings.gateway_api_key,
        settings.http_timeout,
    )
    .context("building gateway client")?;
    let storage = Arc::new(LocalFileStorage::new(
        settings.cache_dir.clone(),
        settings.cache_base_url.clone(),
    ));
    let studio = Arc::new(Studio::new(
        Arc::new(gateway),
        Repository::new(table_store),
        storage,
        settings.generation.clone(),
    ));
    let filters = Arc::new(
        FilterStore::open(&settings.prefs_dir)
            .await
            .context("opening filter store")?,
    );

    let studio_for_service = studio.clone();
    let service = StreamableHttpService::new(
        move || Ok(StudioServer::new(studio_for_service.clone())),
        LocalSessionManager::default().into(),
        Default::default(),
    );
    let mcp_path = settings.secret_path("/mcp");
    let router = api::router(AppState { studio, filters })
        .nest_service(&mcp_path, service)
        .nest_service("/cache", ServeDir::new(&settings.cache_dir));

    let bind_address = settings.bind_address();
    let tcp_listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(
        address = %bind_address,
        mcp = %mcp_path,
        models = ?settings.generation.image_models,
        "prompt studio listening"
    );

    axum::serve(tcp_listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}
