// Conduit API server entry point: parses CLI flags, wires the Dispatcher/
// EventBus/ObserverManager/ToolRegistry/CallModelAtom, and serves the axum
// router: tracing init, `Database::connect`, per-module state structs merged
// into one `Router`, `SwaggerUi` + CORS + trace layers, `axum::serve`.

mod chat_history;
mod cli;
mod config;
mod dispatcher;
mod error;
mod event_bus;
mod mcp_registry;
mod observer;
mod openapi;
mod presets;
mod query;
mod state;
mod tools_admin;
mod workflow_routes;
mod workspace_routes;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use conduit_core::atoms::CallModelAtom;
use conduit_core::llm::LlmProvider;
use conduit_core::retry::FallbackChain;
use conduit_storage::Database;
use conduit_tools::{
    DiscoveryCache, GetPromptTool, GetResourceTool, LargeOutputFetchTool, LargeOutputStore,
    ToolRegistry,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::cli::Cli;
use crate::config::ConfigModel;
use crate::dispatcher::{ActiveSessions, Dispatcher};
use crate::event_bus::EventBus;
use crate::observer::ObserverManager;
use crate::openapi::ApiDoc;
use crate::query::QueryState;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();
    init_tracing(&cli);

    tracing::info!("conduit-api starting...");

    let config = ConfigModel::load(&cli.config).unwrap_or_else(|err| {
        tracing::warn!(error = %err, path = %cli.config.display(), "no provider config loaded; starting with zero external providers");
        ConfigModel::default()
    });

    let db = Database::connect(&cli.db_path)
        .await
        .context("failed to connect to database")?;
    db.migrate().await.context("failed to run migrations")?;
    tracing::info!("connected to database and ran migrations");

    tokio::fs::create_dir_all(&cli.workspace_root)
        .await
        .context("failed to create workspace root")?;
    tokio::fs::create_dir_all(&cli.cache_dir)
        .await
        .context("failed to create discovery cache dir")?;

    let observers = Arc::new(ObserverManager::new());
    let event_bus = EventBus::new(observers.clone(), conduit_storage::create_db_event_emitter(db.clone()));
    let discovery = Arc::new(DiscoveryCache::new(&cli.cache_dir));
    let large_output = Arc::new(LargeOutputStore::with_default_threshold(cli.cache_dir.join("large-outputs")));

    let registry = Arc::new(build_tool_registry(&config, discovery.clone(), large_output.clone())?);

    let providers = build_llm_providers();
    if providers.is_empty() {
        tracing::warn!("no LLM API keys configured (OPENAI_API_KEY / ANTHROPIC_API_KEY); sessions will fail at CALL_LLM");
    }
    let default_chain = default_fallback_chain(&providers);
    let call_model = CallModelAtom::new(providers, default_chain.clone());

    let app_state = AppState {
        db,
        observers: observers.clone(),
        event_bus,
        registry,
        discovery,
        large_output,
        call_model,
        default_chain,
        config: Arc::new(config),
        workspace_root: cli.workspace_root.clone(),
    };

    let active_sessions = Arc::new(ActiveSessions::new());
    let dispatcher = Arc::new(Dispatcher::new(app_state.clone(), active_sessions.clone()));
    let query_state = QueryState {
        dispatcher,
        observers,
        active: active_sessions,
    };
    let mcp_registry_state = mcp_registry::McpRegistryState::new();

    let app = axum::Router::new()
        .merge(query::routes(query_state))
        .merge(chat_history::routes())
        .merge(presets::routes())
        .merge(workflow_routes::routes())
        .merge(tools_admin::routes())
        .merge(workspace_routes::routes())
        .merge(mcp_registry::routes(mcp_registry_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .with_state(app_state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", cli.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("failed to bind to address")?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

fn init_tracing(cli: &Cli) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("conduit_api={0},conduit_core={0},conduit_tools={0},conduit_orchestrator={0}", cli.log_level).into());

    match &cli.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .unwrap_or_else(|err| panic!("failed to open log file {}: {err}", path.display()));
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(file).with_ansi(false))
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

/// Registers the always-on virtual tools (§4.4). External providers
/// configured in `config.providers` would be added as `ToolClass::External`
/// entries via per-transport `conduit_tools::provider_client::ToolProviderClient`
/// implementations (§4.0 component table) — this build carries the trait
/// and the discovery/registry plumbing for them but ships no concrete
/// stdio/SSE transport, so `clients` is empty here rather than silently
/// pretending a provider is live (see DESIGN.md). Any provider present in
/// `config` is logged so the gap is visible at startup instead of only on
/// a failed tool call.
fn build_tool_registry(
    config: &ConfigModel,
    discovery: Arc<DiscoveryCache>,
    large_output: Arc<LargeOutputStore>,
) -> Result<ToolRegistry> {
    for provider in &config.providers {
        if provider.enabled {
            tracing::warn!(
                provider = %provider.name,
                transport = ?provider.transport,
                "provider configured but no ToolProviderClient transport is wired; its tools will not be discoverable"
            );
        }
    }

    let mut builder = ToolRegistry::builder();
    builder.add(Arc::new(GetPromptTool { clients: Vec::new(), cache: discovery }))?;
    builder.add(Arc::new(GetResourceTool { clients: Vec::new() }))?;
    builder.add(Arc::new(LargeOutputFetchTool { store: large_output }))?;
    Ok(builder.build())
}

fn build_llm_providers() -> Vec<Box<dyn LlmProvider>> {
    let mut providers: Vec<Box<dyn LlmProvider>> = Vec::new();
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        providers.push(Box::new(conduit_openai::OpenAiProvider::new(key)));
    }
    if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
        providers.push(Box::new(conduit_anthropic::AnthropicProvider::new(key)));
    }
    providers
}

/// Default chain order is configuration, not policy (§9 open question):
/// OpenAI first if configured, falling back to Anthropic, matching the
/// order `build_llm_providers` constructs them in.
fn default_fallback_chain(providers: &[Box<dyn LlmProvider>]) -> FallbackChain {
    let mut entries = providers
        .iter()
        .map(|p| conduit_core::retry::FallbackEntry {
            provider: p.name().to_string(),
            model: default_model_for(p.name()),
        });

    match entries.next() {
        Some(first) => {
            let mut chain = FallbackChain::single(first.provider, first.model);
            for entry in entries {
                chain = chain.with_entry(entry.provider, entry.model);
            }
            chain
        }
        None => FallbackChain::single("openai", "gpt-4o"),
    }
}

fn default_model_for(provider_name: &str) -> String {
    match provider_name {
        "anthropic" => "claude-3-5-sonnet-20241022".to_string(),
        _ => "gpt-4o".to_string(),
    }
}
