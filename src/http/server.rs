//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the breaker (cache, registry, worker, controller) from config
//! - Create the Axum Router with the application fallback, health and admin routes
//! - Wire up middleware (request ID, tracing, timeout, circuit breaker)
//! - Serve until shutdown, then stop the block worker

use axum::{
    http::{HeaderName, Method, StatusCode, Uri},
    middleware,
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::breaker::{
    BlockRegistry, BlockWorker, BreakerError, Controller, SystemClock, TtlCache,
};
use crate::config::BreakerServiceConfig;
use crate::http::request::{MakeRequestUuidV4, X_REQUEST_ID};
use crate::lifecycle::Shutdown;
use crate::security::{breaker_middleware, BreakerState};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<Controller>,
    pub config: Arc<BreakerServiceConfig>,
}

/// HTTP server fronted by the circuit breaker.
pub struct HttpServer {
    router: Router,
    state: AppState,
    worker: Option<BlockWorker>,
}

impl HttpServer {
    /// Build the breaker and router. Does not spawn anything yet.
    pub fn new(config: BreakerServiceConfig) -> Result<Self, BreakerError> {
        let breaker = &config.breaker;
        let clock = Arc::new(SystemClock);
        let cache = Arc::new(TtlCache::new(breaker.cache_max_cost, clock.clone()));
        let registry = Arc::new(BlockRegistry::new(
            cache,
            clock,
            Duration::from_secs(breaker.block_duration_secs),
            Duration::from_secs(breaker.bucket_secs),
        ));

        let (queue, worker) = BlockWorker::channel(registry.clone());
        let params = breaker.level.params();
        let controller = Arc::new(Controller::new(breaker.enabled, params, registry, queue)?);

        tracing::info!(
            enabled = breaker.enabled,
            level = %breaker.level,
            threshold = params.threshold_count(),
            activation_rps = params.activation_rps,
            block_duration_secs = breaker.block_duration_secs,
            "Circuit breaker configured"
        );

        let state = AppState { controller, config: Arc::new(config) };
        let router = Self::build_router(&state);
        Ok(Self { router, state, worker: Some(worker) })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: &AppState) -> Router {
        let config = &state.config;
        let breaker_state = BreakerState {
            controller: state.controller.clone(),
            ip_source: config.breaker.client_ip_source,
        };
        let request_id = HeaderName::from_static(X_REQUEST_ID);

        let mut router = Router::new().route("/health", get(health_handler));
        if config.admin.enabled {
            router = router.nest("/admin", setup_admin_router(state.clone()));
        }

        router
            .fallback(application_handler)
            .with_state(state.clone())
            .layer(middleware::from_fn_with_state(breaker_state, breaker_middleware))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuidV4))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(request_id))
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn controller(&self) -> Arc<Controller> {
        self.state.controller.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &BreakerServiceConfig {
        &self.state.config
    }

    /// Spawn the block worker. Returns `None` if it is already running.
    pub fn spawn_worker(&mut self, shutdown: broadcast::Receiver<()>) -> Option<JoinHandle<()>> {
        let worker = self.worker.take()?;
        Some(tokio::spawn(worker.run(shutdown)))
    }

    /// Run the server, accepting connections on the given listener until shutdown.
    pub async fn run(mut self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let worker = self.spawn_worker(shutdown.subscribe());
        let mut stop = shutdown.subscribe();

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await?;

        if let Some(handle) = worker {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Block worker task failed");
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

/// Stands in for the protected application.
async fn application_handler(method: Method, uri: Uri) -> impl IntoResponse {
    (StatusCode::OK, format!("{method} {}\n", uri.path()))
}
