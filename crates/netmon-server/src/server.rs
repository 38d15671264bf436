use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;
use axum::{Router, middleware, routing::get};
use netmon_auth::{AllowList, IdpClient, Key, SessionManager, derive_cookie_key};
use netmon_storage::{
    AwsCredentials, DynRecordStore, DynamoRecordStore, InMemoryRecordStore,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::{AppConfig, GatewayConfig, StoreBackend};
use crate::secrets::Secrets;
use crate::{gateway, handlers, middleware as app_middleware};

/// Shared, immutable application context.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
    pub allow_list: Arc<AllowList>,
    pub store: DynRecordStore,
    pub gateway: Arc<GatewayConfig>,
    pub cookie_key: Key,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

pub struct NetmonServer {
    addr: SocketAddr,
    app: Router,
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(gateway::index))
        .route("/login", get(gateway::login))
        // Unknown providers are answered with 404 by the handler
        .route("/login/{provider}/authorized", get(gateway::authorized))
        .route("/logout", get(gateway::logout))
        .route("/healthz", get(handlers::healthz))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(app_middleware::request_id))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|req: &axum::http::Request<_>| {
                            use tracing::field::Empty;
                            let req_id = req
                                .extensions()
                                .get::<axum::http::HeaderValue>()
                                .and_then(|v| v.to_str().ok())
                                .unwrap_or("")
                                .to_string();
                            tracing::info_span!(
                                "http.request",
                                http.method = %req.method(),
                                http.target = %req.uri().path(),
                                http.status_code = Empty,
                                request_id = %req_id
                            )
                        })
                        .on_response(
                            |res: &axum::http::Response<_>,
                             latency: std::time::Duration,
                             span: &tracing::Span| {
                                span.record(
                                    "http.status_code",
                                    tracing::field::display(res.status().as_u16()),
                                );
                                tracing::info!(
                                    http.status = %res.status().as_u16(),
                                    elapsed_ms = %latency.as_millis(),
                                    "request handled"
                                );
                            },
                        ),
                ),
        )
        .with_state(state)
}

/// Builds the record store selected by the configuration.
pub fn build_store(cfg: &AppConfig) -> anyhow::Result<DynRecordStore> {
    match cfg.store.backend {
        StoreBackend::Dynamodb => {
            let credentials = AwsCredentials::from_env().context(
                "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set for the dynamodb backend",
            )?;
            let store = DynamoRecordStore::new(cfg.store.dynamodb.clone(), credentials)?;
            tracing::info!(
                endpoint = %store.endpoint(),
                region = %cfg.store.dynamodb.region,
                "Using DynamoDB record store"
            );
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            let seed = cfg
                .store
                .seed_file
                .as_ref()
                .context("store.seed_file is required for the memory backend")?;
            let store = InMemoryRecordStore::from_seed_file(seed)?;
            tracing::info!(seed = %seed.display(), "Using in-memory record store");
            Ok(Arc::new(store))
        }
    }
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
    secrets: Option<Secrets>,
    store: Option<DynRecordStore>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
            secrets: None,
            store: None,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub fn with_secrets(mut self, secrets: Secrets) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// Use this store instead of the configured backend.
    pub fn with_store(mut self, store: DynRecordStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Assembles the application state. Secrets are read from
    /// `secrets_file` unless supplied with [`Self::with_secrets`].
    pub fn build_state(self) -> anyhow::Result<(SocketAddr, AppState)> {
        let secrets = match self.secrets {
            Some(s) => s,
            None => Secrets::load(&self.config.secrets_file)?,
        };
        secrets.validate()?;

        let mut provider = self.config.provider.clone();
        provider.client_id = secrets.google_client_id.clone();
        if let Some(secret) = &secrets.google_client_secret {
            provider.client_secret = Some(secret.clone());
        }
        let client = IdpClient::new(provider).context("identity provider configuration")?;

        let store = match self.store {
            Some(store) => store,
            None => build_store(&self.config)?,
        };

        let allow_list = secrets.allow_list();
        tracing::info!(
            provider = %client.provider_id(),
            allowed_users = allow_list.len(),
            backend = store.backend_name(),
            collection = %self.config.gateway.collection,
            "Gateway configured"
        );

        let state = AppState {
            sessions: SessionManager::new(Arc::new(client), self.config.session.clone()),
            allow_list: Arc::new(allow_list),
            store,
            gateway: Arc::new(self.config.gateway.clone()),
            cookie_key: derive_cookie_key(&secrets.secret_key),
        };
        Ok((self.addr, state))
    }

    pub fn build(self) -> anyhow::Result<NetmonServer> {
        let (addr, state) = self.build_state()?;
        Ok(NetmonServer {
            addr,
            app: build_app(state),
        })
    }
}

impl NetmonServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
