//! Serve command - runs the demo articles server

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::routing::get;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tracing::info;

use crate::api::AxumHost;
use crate::config::AppConfig;
use crate::domain::{Action, ChainSpec, Method, StepError, StepRegistry, step};
use crate::infrastructure::logging;

/// Data-model collaborator the demo steps query; the core treats it as
/// opaque.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn all(&self) -> Result<Vec<Value>, StepError>;
}

struct InMemoryArticleStore {
    articles: Vec<Value>,
}

#[async_trait]
impl ArticleStore for InMemoryArticleStore {
    async fn all(&self) -> Result<Vec<Value>, StepError> {
        Ok(self.articles.clone())
    }
}

/// Run the demo server.
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    logging::init_logging(&config.logging);

    let store = Arc::new(InMemoryArticleStore {
        articles: demo_articles(),
    });
    let router = build_router(store, &config)?;

    let addr = build_socket_addr(&config)?;
    info!("Starting demo server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

fn build_router(store: Arc<dyn ArticleStore>, config: &AppConfig) -> anyhow::Result<Router> {
    let load_store = store.clone();
    let registry = StepRegistry::new().with_step(
        "load_articles",
        step(move |ctx| {
            let store = load_store.clone();
            async move {
                let articles = store.all().await?;
                ctx.state.insert_out("articles", Value::Array(articles)).await;
                Ok(())
            }
        }),
    );

    let mut action = Action::new(registry).with_execution_mode(config.execution.mode);
    action.on(Method::Get, "/articles", ChainSpec::single("load_articles"))?;

    let action = Arc::new(action);
    let mut host = AxumHost::new();
    action.link(&mut host)?;

    let base = Router::new().route("/health", get(health));
    Ok(host.into_router(base))
}

async fn health() -> &'static str {
    "OK"
}

fn build_socket_addr(config: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    )))
}

fn demo_articles() -> Vec<Value> {
    vec![
        json!({"id": 1, "title": "First post"}),
        json!({"id": 2, "title": "Second post"}),
    ]
}
